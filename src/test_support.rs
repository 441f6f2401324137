//! Test support utilities shared across unit and integration tests.

use std::env;
use std::ffi::OsString;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};
use tokio_util::sync::CancellationToken;

use crate::transport::{ConnectionParams, Transport, TransportFuture};

/// Errors produced by [`ScriptedTransport`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ScriptedTransportError {
    /// Scripted failure returned from `open`.
    #[error("{0}")]
    Connect(String),
    /// Scripted failure returned from `run_command`.
    #[error("{0}")]
    Export(String),
    /// Scripted failure returned from `close`.
    #[error("{0}")]
    Close(String),
    /// Returned when the cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,
}

/// A single call observed by [`ScriptedTransport`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TransportCall {
    /// `open` was invoked with these parameters.
    Open(ConnectionParams),
    /// `run_command` was invoked with this command.
    Run(String),
    /// `close` was invoked.
    Close,
}

#[derive(Debug, Default)]
struct State {
    output: String,
    open_error: Option<ScriptedTransportError>,
    run_error: Option<ScriptedTransportError>,
    close_error: Option<ScriptedTransportError>,
    hold_open_until_cancelled: bool,
    cancel_on_run: bool,
    calls: Vec<TransportCall>,
}

/// Scripted transport that records calls and returns pre-seeded results.
///
/// Clones share state, so a test can keep a handle while the service owns
/// another.
#[derive(Clone, Debug, Default)]
pub struct ScriptedTransport {
    state: Arc<Mutex<State>>,
}

impl ScriptedTransport {
    /// Creates a transport whose operations all succeed with empty output.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport that returns `output` from `run_command`.
    #[must_use]
    pub fn with_output(output: impl Into<String>) -> Self {
        let transport = Self::new();
        transport.set_output(output);
        transport
    }

    /// Replaces the text returned from `run_command`.
    pub fn set_output(&self, output: impl Into<String>) {
        self.lock().output = output.into();
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes `open` fail with `message`.
    pub fn fail_open(&self, message: &str) {
        self.lock().open_error = Some(ScriptedTransportError::Connect(message.to_owned()));
    }

    /// Makes `run_command` fail with `message`.
    pub fn fail_run(&self, message: &str) {
        self.lock().run_error = Some(ScriptedTransportError::Export(message.to_owned()));
    }

    /// Makes `close` fail with `message`.
    pub fn fail_close(&self, message: &str) {
        self.lock().close_error = Some(ScriptedTransportError::Close(message.to_owned()));
    }

    /// Makes `open` wait until the caller cancels, then fail.
    pub fn hold_open_until_cancelled(&self) {
        self.lock().hold_open_until_cancelled = true;
    }

    /// Makes `run_command` cancel the caller's token and fail, simulating a
    /// signal arriving mid-export.
    pub fn cancel_on_run(&self) {
        self.lock().cancel_on_run = true;
    }

    /// Returns a snapshot of all calls recorded so far.
    #[must_use]
    pub fn calls(&self) -> Vec<TransportCall> {
        self.lock().calls.clone()
    }

    /// Number of `open` calls.
    #[must_use]
    pub fn open_calls(&self) -> usize {
        self.count(|call| matches!(call, TransportCall::Open(_)))
    }

    /// Commands passed to `run_command`, in order.
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                TransportCall::Run(command) => Some(command.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of `close` calls.
    #[must_use]
    pub fn close_calls(&self) -> usize {
        self.count(|call| matches!(call, TransportCall::Close))
    }

    fn count(&self, predicate: impl Fn(&TransportCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|call| predicate(call)).count()
    }

    fn record(&self, call: TransportCall) {
        self.lock().calls.push(call);
    }
}

impl Transport for ScriptedTransport {
    type Error = ScriptedTransportError;

    fn open<'a>(
        &'a mut self,
        params: ConnectionParams,
        cancel: &'a CancellationToken,
    ) -> TransportFuture<'a, (), Self::Error> {
        Box::pin(async move {
            self.record(TransportCall::Open(params));
            let (error, hold) = {
                let state = self.lock();
                (state.open_error.clone(), state.hold_open_until_cancelled)
            };
            if hold {
                cancel.cancelled().await;
            }
            if cancel.is_cancelled() {
                return Err(ScriptedTransportError::Cancelled);
            }
            error.map_or(Ok(()), Err)
        })
    }

    fn run_command<'a>(
        &'a mut self,
        command: &'a str,
        cancel: &'a CancellationToken,
    ) -> TransportFuture<'a, String, Self::Error> {
        Box::pin(async move {
            self.record(TransportCall::Run(command.to_owned()));
            if self.lock().cancel_on_run {
                cancel.cancel();
            }
            if cancel.is_cancelled() {
                return Err(ScriptedTransportError::Cancelled);
            }
            let state = self.lock();
            state
                .run_error
                .clone()
                .map_or_else(|| Ok(state.output.clone()), Err)
        })
    }

    fn close(&mut self) -> TransportFuture<'_, (), Self::Error> {
        Box::pin(async move {
            self.record(TransportCall::Close);
            self.lock().close_error.clone().map_or(Ok(()), Err)
        })
    }
}

/// Writer that rejects every write, for exercising destination failures.
#[derive(Clone, Copy, Debug, Default)]
pub struct FailingWriter;

impl io::Write for FailingWriter {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::other("disk full"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: AsyncMutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in self.previous.iter().rev() {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}

#[cfg(unix)]
pub use stub::StubSsh;

#[cfg(unix)]
mod stub {
    use std::fs;
    use std::io;
    use std::os::unix::fs::PermissionsExt;

    use camino::{Utf8Path, Utf8PathBuf};

    /// Shell script standing in for the `ssh` client.
    ///
    /// The stub treats `-M` as a control master request, `-O` as a control
    /// command, and anything else as a remote command whose output is the
    /// configured export text. Every invocation is appended to `calls.log`.
    #[derive(Clone, Debug)]
    pub struct StubSsh {
        dir: Utf8PathBuf,
        export: Vec<u8>,
        master_exit: i32,
        master_stderr: String,
        master_sleep_secs: u32,
        exec_exit: i32,
        exec_sleep_secs: u32,
    }

    impl StubSsh {
        /// Creates a stub whose files live in `dir`.
        #[must_use]
        pub fn new(dir: &Utf8Path) -> Self {
            Self {
                dir: dir.to_path_buf(),
                export: Vec::new(),
                master_exit: 0,
                master_stderr: String::new(),
                master_sleep_secs: 0,
                exec_exit: 0,
                exec_sleep_secs: 0,
            }
        }

        /// Sets the text printed for remote commands.
        #[must_use]
        pub fn export(mut self, text: impl Into<String>) -> Self {
            self.export = text.into().into_bytes();
            self
        }

        /// Sets raw bytes printed for remote commands.
        #[must_use]
        pub fn export_bytes(mut self, bytes: impl Into<Vec<u8>>) -> Self {
            self.export = bytes.into();
            self
        }

        /// Makes the control master fail with `code` and `stderr`.
        #[must_use]
        pub fn master_fails(mut self, code: i32, stderr: impl Into<String>) -> Self {
            self.master_exit = code;
            self.master_stderr = stderr.into();
            self
        }

        /// Makes the control master hang for `secs` seconds.
        #[must_use]
        pub const fn master_sleeps(mut self, secs: u32) -> Self {
            self.master_sleep_secs = secs;
            self
        }

        /// Makes remote commands hang for `secs` seconds.
        #[must_use]
        pub const fn exec_sleeps(mut self, secs: u32) -> Self {
            self.exec_sleep_secs = secs;
            self
        }

        /// Makes remote commands exit with `code`.
        #[must_use]
        pub const fn exec_fails(mut self, code: i32) -> Self {
            self.exec_exit = code;
            self
        }

        /// Writes the script and its fixtures, returning the script path.
        ///
        /// # Errors
        ///
        /// Returns any I/O error raised while writing files.
        pub fn install(&self) -> io::Result<Utf8PathBuf> {
            let export_path = self.dir.join("export.rsc");
            let stderr_path = self.dir.join("master.stderr");
            let log_path = self.dir.join("calls.log");
            let script_path = self.dir.join("ssh");

            fs::write(&export_path, &self.export)?;
            fs::write(&stderr_path, &self.master_stderr)?;

            let master_action = if self.master_sleep_secs > 0 {
                format!("exec sleep {}", self.master_sleep_secs)
            } else {
                format!("cat '{stderr_path}' >&2; exit {}", self.master_exit)
            };
            let exec_action = if self.exec_sleep_secs > 0 {
                format!("exec sleep {}\n", self.exec_sleep_secs)
            } else {
                String::new()
            };
            let script = format!(
                concat!(
                    "#!/bin/sh\n",
                    "echo \"$*\" >> '{log}'\n",
                    "for arg in \"$@\"; do\n",
                    "  case \"$arg\" in\n",
                    "    -M) {master} ;;\n",
                    "    -O) exit 0 ;;\n",
                    "  esac\n",
                    "done\n",
                    "{exec_action}",
                    "cat '{export}'\n",
                    "exit {exec}\n",
                ),
                log = log_path,
                master = master_action,
                exec_action = exec_action,
                export = export_path,
                exec = self.exec_exit,
            );
            fs::write(&script_path, script)?;
            fs::set_permissions(&script_path, fs::Permissions::from_mode(0o755))?;
            Ok(script_path)
        }

        /// Returns the logged argument lines, one per invocation.
        ///
        /// # Errors
        ///
        /// Returns any I/O error other than a missing log.
        pub fn calls(&self) -> io::Result<Vec<String>> {
            match fs::read_to_string(self.dir.join("calls.log")) {
                Ok(contents) => Ok(contents.lines().map(str::to_owned).collect()),
                Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
                Err(err) => Err(err),
            }
        }
    }
}
