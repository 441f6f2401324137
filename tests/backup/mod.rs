//! BDD coverage for `BackupService`.

mod bdd_steps;
mod scenarios;
mod test_helpers;
