//! Stage-tagged errors for the backup workflow.

use std::fmt;
use std::io;

use thiserror::Error;

/// Step of the backup workflow at which a failure occurred.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum BackupStage {
    /// Establishing the authenticated session.
    Connect,
    /// Running the export command on the device.
    Export,
    /// Writing the exported text to the destination.
    Write,
}

impl BackupStage {
    /// Lower-case stage label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Export => "export",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for BackupStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced while performing a backup.
#[derive(Debug, Error)]
pub enum BackupError<TransportError>
where
    TransportError: std::error::Error + 'static,
{
    /// Raised when the session cannot be established.
    #[error("failed to connect: {0}")]
    Connect(#[source] TransportError),
    /// Raised when the export command fails on an open session.
    #[error("failed to export configuration: {0}")]
    Export(#[source] TransportError),
    /// Raised when the exported text cannot be written to the destination.
    #[error("failed to write output: {0}")]
    Write(#[source] io::Error),
}

impl<TransportError> BackupError<TransportError>
where
    TransportError: std::error::Error + 'static,
{
    /// Returns the stage that failed.
    #[must_use]
    pub const fn stage(&self) -> BackupStage {
        match self {
            Self::Connect(_) => BackupStage::Connect,
            Self::Export(_) => BackupStage::Export,
            Self::Write(_) => BackupStage::Write,
        }
    }

    /// Returns the transport error behind a connect or export failure.
    #[must_use]
    pub const fn transport_error(&self) -> Option<&TransportError> {
        match self {
            Self::Connect(err) | Self::Export(err) => Some(err),
            Self::Write(_) => None,
        }
    }
}

impl BackupError<crate::transport::TransportError> {
    /// Returns `true` when the step failed because the caller cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Connect(err) | Self::Export(err) => err.is_cancelled(),
            Self::Write(err) => err.kind() == io::ErrorKind::Interrupted,
        }
    }
}
