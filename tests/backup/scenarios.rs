//! BDD scenarios for the backup workflow.

use rstest_bdd_macros::scenario;

use super::test_helpers::{BackupContext, backup_context};

#[scenario(
    path = "tests/features/backup.feature",
    name = "Export the configuration to the destination"
)]
fn scenario_export_success(backup_context: BackupContext) {
    drop(backup_context);
}

#[scenario(
    path = "tests/features/backup.feature",
    name = "Connection failures skip export and close"
)]
fn scenario_connect_failure(backup_context: BackupContext) {
    drop(backup_context);
}

#[scenario(
    path = "tests/features/backup.feature",
    name = "Export failures still close the session"
)]
fn scenario_export_failure(backup_context: BackupContext) {
    drop(backup_context);
}

#[scenario(
    path = "tests/features/backup.feature",
    name = "Write failures still close the session"
)]
fn scenario_write_failure(backup_context: BackupContext) {
    drop(backup_context);
}

#[scenario(
    path = "tests/features/backup.feature",
    name = "Close failures do not mask a successful backup"
)]
fn scenario_close_failure_after_success(backup_context: BackupContext) {
    drop(backup_context);
}

#[scenario(
    path = "tests/features/backup.feature",
    name = "Close failures do not mask an export failure"
)]
fn scenario_close_failure_after_export_failure(backup_context: BackupContext) {
    drop(backup_context);
}
