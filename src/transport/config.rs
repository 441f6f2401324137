//! SSH client settings and validation.
//!
//! [`SshConfig`] tunes how [`super::OpenSshTransport`] drives the system SSH
//! client. Values are loaded via `ortho-config`, which merges defaults,
//! `mikrotik-backup.toml`, and `MIKROTIK_SSH_*` environment variables.

use std::ffi::OsString;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

/// Environment variable that points at an explicit configuration file.
///
/// Settings in that file are top-level keys, for example `ssh_bin = "..."`.
pub const CONFIG_PATH_ENV: &str = "MIKROTIK_BACKUP_CONFIG_PATH";

/// Default `ConnectTimeout` passed to the SSH client, in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default `StrictHostKeyChecking` policy.
pub const DEFAULT_HOST_KEY_POLICY: &str = "accept-new";

/// SSH client settings loaded via `ortho-config`.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "MIKROTIK_SSH",
    discovery(
        app_name = "mikrotik-backup",
        env_var = "MIKROTIK_BACKUP_CONFIG_PATH",
        config_file_name = "mikrotik-backup.toml",
        dotfile_name = ".mikrotik-backup.toml",
        project_file_name = "mikrotik-backup.toml"
    )
)]
pub struct SshConfig {
    /// Path to the `ssh` executable.
    #[ortho_config(default = "ssh".to_owned())]
    pub ssh_bin: String,
    /// Path to the `sshpass` executable, used only for password
    /// authentication.
    #[ortho_config(default = "sshpass".to_owned())]
    pub sshpass_bin: String,
    /// Seconds to wait for the TCP connection and handshake.
    #[ortho_config(default = DEFAULT_CONNECT_TIMEOUT_SECS)]
    pub connect_timeout_secs: u64,
    /// Value for the `StrictHostKeyChecking` option (`yes`, `accept-new`,
    /// `no`).
    #[ortho_config(default = DEFAULT_HOST_KEY_POLICY.to_owned())]
    pub strict_host_key_checking: String,
    /// Known hosts file override. When unset the client default applies.
    pub known_hosts_file: Option<String>,
    /// Directory holding the control master socket. Defaults to the system
    /// temporary directory. Keep it short: Unix socket paths are limited to
    /// roughly 100 bytes.
    pub control_dir: Option<String>,
}

/// Errors raised when loading the SSH configuration from layered sources.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum SshConfigLoadError {
    /// Indicates that parsing or merging configuration layers failed.
    #[error("ssh configuration parsing failed: {0}")]
    Parse(String),
}

/// Errors raised when SSH settings fail validation.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SshConfigError {
    /// Raised when a setting is missing or unusable.
    #[error("invalid {field}: set MIKROTIK_SSH_{env_suffix} or add {field} to mikrotik-backup.toml", env_suffix = field.to_uppercase())]
    InvalidConfig {
        /// Configuration field that failed validation.
        field: String,
    },
}

impl SshConfig {
    /// Loads configuration using defaults, configuration files, and
    /// environment variables, without parsing process arguments.
    ///
    /// # Errors
    ///
    /// Returns [`SshConfigLoadError::Parse`] when merging sources fails.
    pub fn load_without_cli_args() -> Result<Self, SshConfigLoadError> {
        Self::load_from_iter([OsString::from("mikrotik-backup")])
            .map_err(|err| SshConfigLoadError::Parse(err.to_string()))
    }

    /// Ensures every setting is usable.
    ///
    /// # Errors
    ///
    /// Returns [`SshConfigError::InvalidConfig`] when a binary path or the
    /// host key policy is blank, an optional path is set but blank, or the
    /// connect timeout is zero.
    pub fn validate(&self) -> Result<(), SshConfigError> {
        Self::require_value(&self.ssh_bin, "ssh_bin")?;
        Self::require_value(&self.sshpass_bin, "sshpass_bin")?;
        Self::require_value(&self.strict_host_key_checking, "strict_host_key_checking")?;
        Self::require_optional_value(self.known_hosts_file.as_deref(), "known_hosts_file")?;
        Self::require_optional_value(self.control_dir.as_deref(), "control_dir")?;
        if self.connect_timeout_secs == 0 {
            return Err(Self::invalid("connect_timeout_secs"));
        }
        Ok(())
    }

    /// Directory in which control sockets are created.
    #[must_use]
    pub fn control_directory(&self) -> Utf8PathBuf {
        self.control_dir.as_deref().map_or_else(
            || {
                Utf8PathBuf::from_path_buf(std::env::temp_dir())
                    .unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
            },
            Utf8PathBuf::from,
        )
    }

    fn require_optional_value(value: Option<&str>, field: &str) -> Result<(), SshConfigError> {
        match value {
            None => Ok(()),
            Some(v) if !v.trim().is_empty() => Ok(()),
            Some(_) => Err(Self::invalid(field)),
        }
    }

    fn require_value(value: &str, field: &str) -> Result<(), SshConfigError> {
        Self::require_optional_value(Some(value), field)
    }

    fn invalid(field: &str) -> SshConfigError {
        SshConfigError::InvalidConfig {
            field: field.to_owned(),
        }
    }
}
