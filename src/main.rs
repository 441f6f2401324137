//! Binary entry point for the `mikrotik-backup` CLI.

use std::io::{self, Write};
use std::process;

use clap::Parser;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use mikrotik_backup::{
    BackupError, BackupFile, BackupService, BuildInfo, ConnectionParams, LogConfig,
    OpenSshTransport, OutputError, SshConfig, TransportError, logging,
};

mod cli;

use cli::{BackupCommand, Cli, Command};

#[derive(Debug, Error)]
enum CliError {
    #[error("either --password or --key must be provided")]
    MissingCredential,
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Output(#[from] OutputError),
    #[error("backup failed: {0}")]
    Backup(#[from] BackupError<TransportError>),
    #[error("runtime error: {0}")]
    Runtime(String),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = logging::init(LogConfig {
        json: cli.log_json,
        verbose: cli.verbose,
    }) {
        writeln!(io::stderr(), "{err}").ok();
    }

    let exit_code = match dispatch(cli.command).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

async fn dispatch(command: Command) -> Result<(), CliError> {
    match command {
        Command::Backup(args) => run_backup(args).await,
        Command::Version => write_version(io::stdout(), &BuildInfo::current()),
    }
}

async fn run_backup(args: BackupCommand) -> Result<(), CliError> {
    let params = connection_params(&args)?;
    let ssh_config =
        SshConfig::load_without_cli_args().map_err(|err| CliError::Config(err.to_string()))?;
    let transport =
        OpenSshTransport::new(ssh_config).map_err(|err| CliError::Config(err.to_string()))?;
    let mut output = BackupFile::create(&args.output)?;
    debug!(path = %output.path(), temp = %output.temp_path(), "staging backup output");

    let cancel = CancellationToken::new();
    let signals = tokio::spawn(cancel_on_signal(cancel.clone()));
    let mut service = BackupService::new(transport);
    let outcome = service.execute(&cancel, params, &mut output).await;
    signals.abort();

    match outcome {
        Ok(()) => {
            let path = output.persist()?;
            info!(path = %path, "backup written");
            writeln!(io::stdout(), "Backed up {}:{} to {path}", args.host, args.port).ok();
            Ok(())
        }
        Err(err) => {
            if err.is_cancelled() {
                debug!("backup interrupted by signal");
            }
            if let Err(discard_err) = output.discard() {
                warn!(error = %discard_err, "failed to remove partial output");
            }
            Err(err.into())
        }
    }
}

fn connection_params(args: &BackupCommand) -> Result<ConnectionParams, CliError> {
    let mut params = ConnectionParams::new(args.host.clone(), args.port, args.username.clone());
    params.password = args.password.clone().filter(|value| !value.is_empty());
    params.key_file = args.key.clone().filter(|path| !path.as_str().is_empty());

    if params.has_credential() {
        Ok(params)
    } else {
        Err(CliError::MissingCredential)
    }
}

async fn cancel_on_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received SIGINT; cancelling backup"),
        () = terminate => info!("received SIGTERM; cancelling backup"),
    }
    cancel.cancel();
}

fn write_version(mut target: impl Write, info: &BuildInfo) -> Result<(), CliError> {
    writeln!(target, "{info}").map_err(|err| CliError::Runtime(err.to_string()))
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "Error: {err}").ok();
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
