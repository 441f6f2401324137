//! Build script for the `mikrotik-backup` man page and build provenance.
//!
//! The man page is rendered into the build output directory with
//! clap-mangen. Commit, commit date, and compiler version are exported as
//! compile-time environment variables for the `version` subcommand.

use std::env;
use std::io::Write;
use std::process::Command;

use camino::Utf8PathBuf;
use cap_std::{ambient_authority, fs_utf8::Dir};
use clap::CommandFactory;
use clap_mangen::Man;

#[path = "src/cli/mod.rs"]
mod cli;

use cli::Cli;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = std::io::stdout();
    writeln!(stdout, "cargo:rerun-if-changed=build.rs")?;
    writeln!(stdout, "cargo:rerun-if-changed=src/cli/mod.rs")?;
    writeln!(stdout, "cargo:rerun-if-changed=.git/HEAD")?;

    let commit = capture("git", &["rev-parse", "--short", "HEAD"]).unwrap_or_else(|| "none".into());
    let date = capture("git", &["log", "-1", "--format=%cI"]).unwrap_or_else(|| "unknown".into());
    let rustc = env::var("RUSTC").unwrap_or_else(|_| String::from("rustc"));
    let rustc_version = capture(&rustc, &["--version"]).unwrap_or_else(|| "unknown".into());
    writeln!(stdout, "cargo:rustc-env=MIKROTIK_BACKUP_COMMIT={commit}")?;
    writeln!(stdout, "cargo:rustc-env=MIKROTIK_BACKUP_BUILD_DATE={date}")?;
    writeln!(stdout, "cargo:rustc-env=MIKROTIK_BACKUP_RUSTC={rustc_version}")?;

    let out_dir = env::var("OUT_DIR").map(Utf8PathBuf::from).map_err(|_| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "OUT_DIR was not set")
    })?;

    let mut buffer = Vec::new();
    Man::new(Cli::command()).render(&mut buffer)?;

    let dir = Dir::open_ambient_dir(&out_dir, ambient_authority())?;
    dir.write("mikrotik-backup.1", &buffer)?;

    Ok(())
}

fn capture(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let value = String::from_utf8(output.stdout).ok()?;
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}
