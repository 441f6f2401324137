//! Command-line interface definitions for the `mikrotik-backup` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// Top-level CLI for the `mikrotik-backup` binary.
#[derive(Debug, Parser)]
#[command(
    name = "mikrotik-backup",
    about = "Back up MikroTik RouterOS configuration over SSH",
    arg_required_else_help = true
)]
pub(crate) struct Cli {
    /// Enable debug logging.
    #[arg(short, long, global = true, env = "MIKROTIK_VERBOSE")]
    pub(crate) verbose: bool,
    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true, env = "MIKROTIK_LOG_JSON")]
    pub(crate) log_json: bool,
    /// Subcommand to run.
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// Subcommands understood by `mikrotik-backup`.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Export the device configuration to a local file.
    #[command(name = "backup", about = "Export the device configuration to a local file")]
    Backup(BackupCommand),
    /// Print build provenance.
    #[command(name = "version", visible_alias = "v", about = "Print version information")]
    Version,
}

/// Arguments for the `mikrotik-backup backup` subcommand.
#[derive(Debug, Args)]
pub(crate) struct BackupCommand {
    /// Hostname or IP address of the device.
    #[arg(short = 'H', long, env = "MIKROTIK_HOST", value_name = "HOST")]
    pub(crate) host: String,
    /// SSH port of the device.
    #[arg(
        short,
        long,
        env = "MIKROTIK_PORT",
        default_value_t = 22,
        value_parser = clap::value_parser!(u16).range(1..),
        value_name = "PORT"
    )]
    pub(crate) port: u16,
    /// Login name.
    #[arg(short, long, env = "MIKROTIK_USERNAME", default_value = "admin")]
    pub(crate) username: String,
    /// Password for password authentication.
    ///
    /// Prefer the environment variable over the flag: command lines are
    /// visible to other users of the machine.
    #[arg(
        short = 'P',
        long,
        env = "MIKROTIK_PASSWORD",
        hide_env_values = true,
        value_name = "PASSWORD"
    )]
    pub(crate) password: Option<String>,
    /// Private key file for public key authentication.
    ///
    /// The environment fallback is `MIKROTIK_KEY_FILE`, not `MIKROTIK_KEY`.
    #[arg(short, long, env = "MIKROTIK_KEY_FILE", value_name = "PATH")]
    pub(crate) key: Option<Utf8PathBuf>,
    /// Destination file for the exported configuration.
    #[arg(
        short,
        long,
        env = "MIKROTIK_OUTPUT",
        default_value = "backup.rsc",
        value_name = "PATH"
    )]
    pub(crate) output: Utf8PathBuf,
}
