//! Core library for the `mikrotik-backup` tool.
//!
//! The crate exposes a transport abstraction for running commands on a
//! RouterOS device, an OpenSSH implementation of it, and the orchestrator
//! that turns one session into a configuration backup
//! (connect → export → write → close).

pub mod backup;
pub mod logging;
pub mod output;
pub mod test_support;
pub mod transport;
pub mod version;

pub use backup::{BackupError, BackupService, BackupStage, EXPORT_COMMAND};
pub use logging::{LogConfig, LoggingError};
pub use output::{BackupFile, DEFAULT_OUTPUT, OutputError};
pub use transport::{
    ConnectionParams, DEFAULT_SSH_PORT, OpenSshTransport, SshConfig, SshConfigError,
    SshConfigLoadError, Transport, TransportError, TransportFuture,
};
pub use version::BuildInfo;
