//! Unit tests for the `mikrotik-backup` CLI binary implementation.
//!
//! Keeping these tests in a separate module helps keep `src/main.rs` focused
//! on dispatch.

use camino::Utf8PathBuf;
use clap::CommandFactory;
use mikrotik_backup::{DEFAULT_OUTPUT, DEFAULT_SSH_PORT};
use rstest::{fixture, rstest};

use super::*;

#[fixture]
fn args() -> BackupCommand {
    BackupCommand {
        host: String::from("192.168.88.1"),
        port: 22,
        username: String::from("admin"),
        password: None,
        key: None,
        output: Utf8PathBuf::from(DEFAULT_OUTPUT),
    }
}

#[test]
fn backup_defaults_match_library_constants() {
    let cli = Cli::try_parse_from(["mikrotik-backup", "backup", "-H", "router", "-P", "secret"])
        .expect("arguments should parse");

    let Command::Backup(args) = cli.command else {
        panic!("expected backup command");
    };
    assert_eq!(args.port, DEFAULT_SSH_PORT);
    assert_eq!(args.output, DEFAULT_OUTPUT);
    assert_eq!(args.password.as_deref(), Some("secret"));
}

#[test]
fn key_help_names_its_environment_variable() {
    let mut command = Cli::command();
    let backup = command
        .find_subcommand_mut("backup")
        .expect("backup subcommand should exist");
    let help = backup.render_long_help().to_string();

    assert!(
        help.contains("The environment fallback is `MIKROTIK_KEY_FILE`, not `MIKROTIK_KEY`"),
        "help: {help}"
    );
}

#[rstest]
#[case::zero("0")]
#[case::out_of_range("65536")]
fn backup_rejects_invalid_ports(#[case] port: &str) {
    let result = Cli::try_parse_from([
        "mikrotik-backup",
        "backup",
        "-H",
        "router",
        "-P",
        "secret",
        "-p",
        port,
    ]);

    assert!(result.is_err(), "port {port} should be rejected");
}

#[rstest]
#[case::neither(None, None)]
#[case::empty_password(Some(""), None)]
#[case::empty_key(None, Some(""))]
fn connection_params_requires_a_credential(
    mut args: BackupCommand,
    #[case] password: Option<&str>,
    #[case] key: Option<&str>,
) {
    args.password = password.map(str::to_owned);
    args.key = key.map(Utf8PathBuf::from);

    let err = connection_params(&args).expect_err("missing credential should fail");

    assert!(matches!(err, CliError::MissingCredential));
    assert_eq!(
        err.to_string(),
        "either --password or --key must be provided"
    );
}

#[rstest]
fn connection_params_keeps_supplied_credentials(mut args: BackupCommand) {
    args.password = Some(String::from("secret"));
    args.key = Some(Utf8PathBuf::from(""));

    let params = connection_params(&args).expect("password should suffice");

    assert_eq!(params.destination(), "admin@192.168.88.1");
    assert_eq!(params.password.as_deref(), Some("secret"));
    assert_eq!(params.key_file, None);
}

#[rstest]
fn connection_params_accepts_key_only(mut args: BackupCommand) {
    args.key = Some(Utf8PathBuf::from("/home/admin/.ssh/id_ed25519"));

    let params = connection_params(&args).expect("key should suffice");

    assert_eq!(params.password, None);
    assert_eq!(
        params.key_file.as_deref().map(camino::Utf8Path::as_str),
        Some("/home/admin/.ssh/id_ed25519")
    );
}

#[test]
fn write_error_prefixes_message() {
    let mut buf = Vec::new();
    write_error(&mut buf, &CliError::MissingCredential);

    let rendered = String::from_utf8(buf).expect("utf8");
    assert_eq!(
        rendered,
        "Error: either --password or --key must be provided\n"
    );
}

#[test]
fn backup_errors_keep_stage_in_message() {
    let err = CliError::from(BackupError::Connect(TransportError::NotConnected));

    assert_eq!(
        err.to_string(),
        "backup failed: failed to connect: no ssh session is open"
    );
}

#[test]
fn write_version_renders_build_info() {
    let mut buf = Vec::new();
    let info = BuildInfo {
        version: "0.1.0",
        commit: "none",
        date: "unknown",
        rustc: "unknown",
    };

    write_version(&mut buf, &info).expect("write version");

    let rendered = String::from_utf8(buf).expect("utf8");
    assert!(
        rendered.starts_with("mikrotik-backup version 0.1.0\n  commit: none\n"),
        "rendered: {rendered}"
    );
    assert!(rendered.ends_with("rustc:  unknown\n"), "rendered: {rendered}");
}

#[tokio::test]
async fn cancel_on_signal_leaves_token_untouched_without_signal() {
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(cancel_on_signal(cancel.clone()));

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    handle.abort();

    assert!(!cancel.is_cancelled());
}
