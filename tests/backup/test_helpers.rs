//! Shared fixtures and helpers for backup BDD scenarios.

use std::cell::{Cell, RefCell};

use mikrotik_backup::test_support::ScriptedTransport;
use mikrotik_backup::{BackupStage, ConnectionParams};
use rstest::fixture;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BackupOutcome {
    Success,
    Failure { stage: BackupStage, message: String },
}

#[derive(Debug, Default)]
pub struct BackupContext {
    pub transport: ScriptedTransport,
    pub writer_fails: Cell<bool>,
    pub output: RefCell<Vec<u8>>,
    pub outcome: RefCell<Option<BackupOutcome>>,
}

#[fixture]
pub fn backup_context() -> BackupContext {
    BackupContext::default()
}

pub fn router_params() -> ConnectionParams {
    ConnectionParams::new("192.168.88.1", 22, "admin").with_password("password")
}
