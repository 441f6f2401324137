//! Transport backed by the system OpenSSH client.
//!
//! `open` starts a control master (`ssh -M -f -N`) that keeps the
//! authenticated connection alive in the background; `run_command` reuses it
//! through the control socket and `close` asks the master to exit. Password
//! authentication goes through `sshpass -e` so the secret only ever travels
//! in the child's environment.

use std::ffi::OsString;
use std::process::{ExitStatus, Stdio};

use camino::Utf8PathBuf;
use shell_escape::unix::escape;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{ConnectionParams, SshConfig, SshConfigError, Transport, TransportFuture};

const SSHPASS_ENV: &str = "SSHPASS";

/// Errors surfaced by [`OpenSshTransport`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum TransportError {
    /// Raised when `open` is called while a session is already established.
    #[error("an ssh session is already open")]
    AlreadyOpen,
    /// Raised when a command is issued without an open session.
    #[error("no ssh session is open")]
    NotConnected,
    /// Raised when the caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,
    /// Raised when a client process cannot be started.
    #[error("failed to spawn {program}: {message}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Operating system error string.
        message: String,
    },
    /// Raised when a client process completes with a non-zero exit code.
    #[error("{program} exited with status {status_text}: {stderr}")]
    CommandFailure {
        /// Program that was run.
        program: String,
        /// Exit status as reported by the OS.
        status: Option<i32>,
        /// Human readable representation of the exit status.
        status_text: String,
        /// Trimmed stderr captured from the process.
        stderr: String,
    },
    /// Raised when a client process prints output that is not valid UTF-8.
    #[error("{program} produced output that is not valid UTF-8: {message}")]
    InvalidOutput {
        /// Program that was run.
        program: String,
        /// Decoder error describing the first invalid byte.
        message: String,
    },
}

impl TransportError {
    /// Returns `true` when the error stems from cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// A fully resolved client process invocation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct Invocation {
    pub(crate) program: String,
    pub(crate) args: Vec<OsString>,
    secret: Option<String>,
}

impl Invocation {
    /// Returns `true` when the invocation carries a secret in its environment.
    #[cfg(test)]
    pub(crate) const fn has_secret(&self) -> bool {
        self.secret.is_some()
    }

    /// Shell-like rendering used for debug logs; never includes the secret.
    pub(crate) fn command_line(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(escape(self.program.as_str().into()).into_owned());
        parts.extend(
            self.args
                .iter()
                .map(|arg| escape(arg.to_string_lossy()).into_owned()),
        );
        parts.join(" ")
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).stdin(Stdio::null()).kill_on_drop(true);
        if let Some(ref secret) = self.secret {
            command.env(SSHPASS_ENV, secret);
        }
        command
    }

    fn spawn_error(&self, err: &std::io::Error) -> TransportError {
        TransportError::Spawn {
            program: self.program.clone(),
            message: err.to_string(),
        }
    }

    fn failure(&self, status: ExitStatus, stderr: &str) -> TransportError {
        let code = status.code();
        TransportError::CommandFailure {
            program: self.program.clone(),
            status: code,
            status_text: code.map_or_else(|| String::from("unknown"), |value| value.to_string()),
            stderr: stderr.trim().to_owned(),
        }
    }
}

/// [`super::Transport`] implementation that drives the system `ssh` binary.
#[derive(Debug)]
pub struct OpenSshTransport {
    config: SshConfig,
    control_socket: Utf8PathBuf,
    session: Option<ConnectionParams>,
}

impl OpenSshTransport {
    /// Creates a transport with a fresh control socket path.
    ///
    /// # Errors
    ///
    /// Returns [`SshConfigError::InvalidConfig`] when validation fails.
    pub fn new(config: SshConfig) -> Result<Self, SshConfigError> {
        config.validate()?;
        let control_socket = config
            .control_directory()
            .join(format!("mtb-{}.sock", Uuid::new_v4().simple()));
        Ok(Self {
            config,
            control_socket,
            session: None,
        })
    }

    /// Returns a reference to the underlying configuration.
    #[must_use]
    pub const fn config(&self) -> &SshConfig {
        &self.config
    }

    /// Path of the control socket used by this transport's master.
    #[must_use]
    pub const fn control_socket(&self) -> &Utf8PathBuf {
        &self.control_socket
    }

    /// Returns `true` while a session is open.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub(crate) fn master_invocation(&self, params: &ConnectionParams) -> Invocation {
        let password = params
            .password
            .as_deref()
            .filter(|value| !value.is_empty());

        let mut ssh_args = vec![
            OsString::from("-M"),
            OsString::from("-S"),
            OsString::from(self.control_socket.as_str()),
            OsString::from("-f"),
            OsString::from("-N"),
            OsString::from("-o"),
            OsString::from("ControlPersist=yes"),
        ];
        ssh_args.extend(self.auth_options(params, password.is_none()));
        ssh_args.push(OsString::from(params.destination()));

        match password {
            Some(secret) => {
                let mut args = vec![OsString::from("-e"), OsString::from(&self.config.ssh_bin)];
                args.extend(ssh_args);
                Invocation {
                    program: self.config.sshpass_bin.clone(),
                    args,
                    secret: Some(secret.to_owned()),
                }
            }
            None => Invocation {
                program: self.config.ssh_bin.clone(),
                args: ssh_args,
                secret: None,
            },
        }
    }

    pub(crate) fn exec_invocation(&self, params: &ConnectionParams, command: &str) -> Invocation {
        let mut args = self.multiplexed_options(params);
        args.push(OsString::from(params.destination()));
        args.push(OsString::from(command));
        Invocation {
            program: self.config.ssh_bin.clone(),
            args,
            secret: None,
        }
    }

    pub(crate) fn exit_invocation(&self, params: &ConnectionParams) -> Invocation {
        let mut args = self.multiplexed_options(params);
        args.push(OsString::from("-O"));
        args.push(OsString::from("exit"));
        args.push(OsString::from(params.destination()));
        Invocation {
            program: self.config.ssh_bin.clone(),
            args,
            secret: None,
        }
    }

    fn auth_options(&self, params: &ConnectionParams, batch_mode: bool) -> Vec<OsString> {
        let mut args = vec![OsString::from("-p"), OsString::from(params.port.to_string())];

        if let Some(ref key_file) = params.key_file
            && !key_file.as_str().is_empty()
        {
            args.push(OsString::from("-i"));
            args.push(OsString::from(key_file.as_str()));
        }

        if batch_mode {
            args.push(OsString::from("-o"));
            args.push(OsString::from("BatchMode=yes"));
        }

        args.push(OsString::from("-o"));
        args.push(OsString::from(format!(
            "ConnectTimeout={}",
            self.config.connect_timeout_secs
        )));
        args.push(OsString::from("-o"));
        args.push(OsString::from(format!(
            "StrictHostKeyChecking={}",
            self.config.strict_host_key_checking
        )));

        if let Some(ref known_hosts) = self.config.known_hosts_file {
            args.push(OsString::from("-o"));
            args.push(OsString::from(format!("UserKnownHostsFile={known_hosts}")));
        }

        args
    }

    fn multiplexed_options(&self, params: &ConnectionParams) -> Vec<OsString> {
        vec![
            OsString::from("-S"),
            OsString::from(self.control_socket.as_str()),
            OsString::from("-p"),
            OsString::from(params.port.to_string()),
            OsString::from("-o"),
            OsString::from("BatchMode=yes"),
        ]
    }

    async fn open_session(
        &mut self,
        params: ConnectionParams,
        cancel: &CancellationToken,
    ) -> Result<(), TransportError> {
        if self.session.is_some() {
            return Err(TransportError::AlreadyOpen);
        }
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }

        let invocation = self.master_invocation(&params);
        wait_for_exit(&invocation, cancel).await?;
        debug!(host = %params.host, port = params.port, "ssh control master established");
        self.session = Some(params);
        Ok(())
    }

    async fn exec(
        &self,
        command: &str,
        cancel: &CancellationToken,
    ) -> Result<String, TransportError> {
        let params = self.session.as_ref().ok_or(TransportError::NotConnected)?;
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }

        let invocation = self.exec_invocation(params, command);
        capture_stdout(&invocation, cancel).await
    }

    async fn close_session(&mut self) -> Result<(), TransportError> {
        let Some(params) = self.session.take() else {
            return Ok(());
        };

        let invocation = self.exit_invocation(&params);
        capture_stdout(&invocation, &CancellationToken::new())
            .await
            .map(|_| ())
    }
}

impl Transport for OpenSshTransport {
    type Error = TransportError;

    fn open<'a>(
        &'a mut self,
        params: ConnectionParams,
        cancel: &'a CancellationToken,
    ) -> TransportFuture<'a, (), Self::Error> {
        Box::pin(self.open_session(params, cancel))
    }

    fn run_command<'a>(
        &'a mut self,
        command: &'a str,
        cancel: &'a CancellationToken,
    ) -> TransportFuture<'a, String, Self::Error> {
        Box::pin(self.exec(command, cancel))
    }

    fn close(&mut self) -> TransportFuture<'_, (), Self::Error> {
        Box::pin(self.close_session())
    }
}

impl Drop for OpenSshTransport {
    fn drop(&mut self) {
        let Some(params) = self.session.take() else {
            return;
        };

        warn!(host = %params.host, "ssh session still open on drop; stopping control master");
        let invocation = self.exit_invocation(&params);
        let outcome = std::process::Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        if let Err(err) = outcome {
            warn!(error = %err, "failed to stop ssh control master");
        }
    }
}

/// Runs `invocation` without capturing stdout, waiting only for the client
/// itself to exit. A backgrounded control master may keep inherited pipes
/// open, so stderr is read only once a failure is known.
async fn wait_for_exit(
    invocation: &Invocation,
    cancel: &CancellationToken,
) -> Result<(), TransportError> {
    debug!(command = %invocation.command_line(), "spawning ssh client");
    let mut child = invocation
        .command()
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| invocation.spawn_error(&err))?;

    let waited = tokio::select! {
        biased;
        () = cancel.cancelled() => None,
        status = child.wait() => Some(status),
    };

    let Some(status) = waited else {
        child.start_kill().ok();
        return Err(TransportError::Cancelled);
    };
    let exit_status = status.map_err(|err| invocation.spawn_error(&err))?;
    if exit_status.success() {
        return Ok(());
    }

    let mut stderr = String::new();
    if let Some(mut pipe) = child.stderr.take() {
        pipe.read_to_string(&mut stderr).await.ok();
    }
    Err(invocation.failure(exit_status, &stderr))
}

/// Runs `invocation` to completion and returns its stdout.
async fn capture_stdout(
    invocation: &Invocation,
    cancel: &CancellationToken,
) -> Result<String, TransportError> {
    debug!(command = %invocation.command_line(), "spawning ssh client");
    let child = invocation
        .command()
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| invocation.spawn_error(&err))?;

    // Dropping the wait future on cancellation drops the child, which kills it.
    let output = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(TransportError::Cancelled),
        output = child.wait_with_output() => {
            output.map_err(|err| invocation.spawn_error(&err))?
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(invocation.failure(output.status, &stderr));
    }

    String::from_utf8(output.stdout).map_err(|err| TransportError::InvalidOutput {
        program: invocation.program.clone(),
        message: err.utf8_error().to_string(),
    })
}
