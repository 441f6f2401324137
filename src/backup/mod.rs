//! Orchestrates a single configuration backup.
//!
//! The workflow opens a session through a [`Transport`], runs the RouterOS
//! export command, writes the output verbatim to the destination, and closes
//! the session. Close is attempted on every path once the session is open;
//! its failure is logged and never replaces the primary outcome.

use std::io::{self, Write};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::transport::{ConnectionParams, Transport};

mod error;

pub use error::{BackupError, BackupStage};

/// RouterOS command that prints the full configuration as a script.
pub const EXPORT_COMMAND: &str = "/export";

/// Executes backups through an injected transport.
#[derive(Debug)]
pub struct BackupService<T> {
    transport: T,
}

impl<T> BackupService<T>
where
    T: Transport,
{
    /// Creates a new service.
    #[must_use]
    pub const fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Returns a reference to the underlying transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Consumes the service and returns the transport.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Runs one backup against the device described by `params`.
    ///
    /// `output` is written to and flushed but never closed; the caller owns
    /// it. Nothing is retried and a failed write is not rolled back.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::Connect`], [`BackupError::Export`], or
    /// [`BackupError::Write`] depending on which step failed. The underlying
    /// cause is kept as the error source.
    pub async fn execute<W>(
        &mut self,
        cancel: &CancellationToken,
        params: ConnectionParams,
        output: &mut W,
    ) -> Result<(), BackupError<T::Error>>
    where
        W: Write + ?Sized,
    {
        let host = params.host.clone();
        debug!(%host, stage = %BackupStage::Connect, "opening session");
        self.transport
            .open(params, cancel)
            .await
            .map_err(BackupError::Connect)?;

        let outcome = self.export_to(cancel, output).await;

        if let Err(err) = self.transport.close().await {
            warn!(%host, error = %err, "failed to close session");
        }

        match outcome {
            Ok(bytes) => {
                info!(%host, bytes, "configuration exported");
                Ok(())
            }
            Err(err) => {
                debug!(%host, stage = %err.stage(), "backup failed");
                Err(err)
            }
        }
    }

    async fn export_to<W>(
        &mut self,
        cancel: &CancellationToken,
        output: &mut W,
    ) -> Result<usize, BackupError<T::Error>>
    where
        W: Write + ?Sized,
    {
        debug!(stage = %BackupStage::Export, command = EXPORT_COMMAND, "running export");
        let config = self
            .transport
            .run_command(EXPORT_COMMAND, cancel)
            .await
            .map_err(BackupError::Export)?;

        debug!(stage = %BackupStage::Write, bytes = config.len(), "writing output");
        write_output(cancel, output, config.as_bytes()).map_err(BackupError::Write)?;
        Ok(config.len())
    }
}

fn write_output<W>(cancel: &CancellationToken, output: &mut W, bytes: &[u8]) -> io::Result<()>
where
    W: Write + ?Sized,
{
    if cancel.is_cancelled() {
        return Err(io::Error::new(
            io::ErrorKind::Interrupted,
            "backup cancelled before writing output",
        ));
    }
    output.write_all(bytes)?;
    output.flush()
}
