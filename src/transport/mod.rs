//! Remote command transport abstraction and the OpenSSH implementation.
//!
//! A [`Transport`] opens one authenticated session to a device, runs commands
//! over it, and closes it again. The backup orchestrator only ever talks to
//! this trait, so tests can substitute a scripted double and production code
//! can use [`OpenSshTransport`].

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use camino::Utf8PathBuf;
use tokio_util::sync::CancellationToken;

mod config;
mod process;

pub use config::{
    CONFIG_PATH_ENV, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_HOST_KEY_POLICY, SshConfig,
    SshConfigError, SshConfigLoadError,
};
pub use process::{OpenSshTransport, TransportError};

/// Conventional SSH port used when none is configured.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Connection details for a single device.
///
/// The credential fields are interpreted by the transport; this type does not
/// enforce that exactly one of them is populated.
#[derive(Clone, Eq, PartialEq)]
pub struct ConnectionParams {
    /// Hostname or IP address of the device.
    pub host: String,
    /// TCP port of the SSH service.
    pub port: u16,
    /// Login name.
    pub username: String,
    /// Password used for keyboard or password authentication.
    pub password: Option<String>,
    /// Private key file used for public key authentication.
    pub key_file: Option<Utf8PathBuf>,
}

impl ConnectionParams {
    /// Creates parameters for `username@host:port` with no credential set.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: None,
            key_file: None,
        }
    }

    /// Sets the password credential.
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the private key credential.
    #[must_use]
    pub fn with_key_file(mut self, key_file: impl Into<Utf8PathBuf>) -> Self {
        self.key_file = Some(key_file.into());
        self
    }

    /// Returns `user@host`, the destination form used by SSH clients.
    #[must_use]
    pub fn destination(&self) -> String {
        format!("{}@{}", self.username, self.host)
    }

    /// Returns `true` when a non-empty password or key path is present.
    #[must_use]
    pub fn has_credential(&self) -> bool {
        self.password.as_deref().is_some_and(|value| !value.is_empty())
            || self
                .key_file
                .as_ref()
                .is_some_and(|path| !path.as_str().is_empty())
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("key_file", &self.key_file)
            .finish()
    }
}

/// Future returned by transport operations.
pub type TransportFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Session-oriented remote command execution.
///
/// Implementations must honour `cancel` in [`Transport::open`] and
/// [`Transport::run_command`] so a dead peer cannot hang the caller.
/// [`Transport::close`] takes no token: releasing a session is never
/// cancelled.
pub trait Transport {
    /// Transport specific error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Establishes an authenticated session.
    fn open<'a>(
        &'a mut self,
        params: ConnectionParams,
        cancel: &'a CancellationToken,
    ) -> TransportFuture<'a, (), Self::Error>;

    /// Runs `command` on the open session and returns its complete output.
    fn run_command<'a>(
        &'a mut self,
        command: &'a str,
        cancel: &'a CancellationToken,
    ) -> TransportFuture<'a, String, Self::Error>;

    /// Releases the session.
    fn close(&mut self) -> TransportFuture<'_, (), Self::Error>;
}
