//! Build provenance reported by `mikrotik-backup version`.
//!
//! The build script embeds the commit, commit date, and compiler version as
//! `MIKROTIK_BACKUP_*` compile-time variables. Builds outside a git checkout
//! fall back to placeholder values.

use std::fmt;

/// Placeholder used when no commit information is available.
pub const UNKNOWN_COMMIT: &str = "none";

/// Placeholder used when a date or compiler version is unavailable.
pub const UNKNOWN: &str = "unknown";

/// Provenance of the running binary.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BuildInfo {
    /// Crate version from `Cargo.toml`.
    pub version: &'static str,
    /// Short commit hash.
    pub commit: &'static str,
    /// Commit timestamp in RFC 3339 form.
    pub date: &'static str,
    /// Output of `rustc --version`.
    pub rustc: &'static str,
}

impl BuildInfo {
    /// Returns the values embedded at build time.
    #[must_use]
    pub fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            commit: non_empty(option_env!("MIKROTIK_BACKUP_COMMIT"), UNKNOWN_COMMIT),
            date: non_empty(option_env!("MIKROTIK_BACKUP_BUILD_DATE"), UNKNOWN),
            rustc: non_empty(option_env!("MIKROTIK_BACKUP_RUSTC"), UNKNOWN),
        }
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "mikrotik-backup version {}", self.version)?;
        writeln!(f, "  commit: {}", self.commit)?;
        writeln!(f, "  built:  {}", self.date)?;
        write!(f, "  rustc:  {}", self.rustc)
    }
}

fn non_empty(value: Option<&'static str>, fallback: &'static str) -> &'static str {
    value
        .map(str::trim)
        .filter(|candidate| !candidate.is_empty())
        .unwrap_or(fallback)
}
