//! BDD step definitions for the backup workflow.

use mikrotik_backup::test_support::FailingWriter;
use mikrotik_backup::{BackupService, EXPORT_COMMAND};
use rstest_bdd_macros::{given, then, when};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

use super::test_helpers::{BackupContext, BackupOutcome, router_params};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("test setup failed: {0}")]
    Setup(String),
    #[error("assertion failed: {0}")]
    Assertion(String),
}

#[given("a router that exports \"{text}\"")]
fn router_exports(backup_context: &BackupContext, text: String) {
    backup_context.transport.set_output(format!("{text}\n"));
}

#[given("a router that refuses connections with \"{message}\"")]
fn router_refuses_connections(backup_context: &BackupContext, message: String) {
    backup_context.transport.fail_open(&message);
}

#[given("a router whose export fails with \"{message}\"")]
fn router_export_fails(backup_context: &BackupContext, message: String) {
    backup_context.transport.fail_run(&message);
}

#[given("a destination that rejects writes")]
fn destination_rejects_writes(backup_context: &BackupContext) {
    backup_context.writer_fails.set(true);
}

#[given("closing the session fails with \"{message}\"")]
fn close_fails(backup_context: &BackupContext, message: String) {
    backup_context.transport.fail_close(&message);
}

#[when("I run the backup")]
fn run_backup(backup_context: &BackupContext) -> Result<(), StepError> {
    let runtime = Runtime::new().map_err(|err| StepError::Setup(err.to_string()))?;
    let mut service = BackupService::new(backup_context.transport.clone());
    let cancel = CancellationToken::new();

    let result = if backup_context.writer_fails.get() {
        runtime.block_on(service.execute(&cancel, router_params(), &mut FailingWriter))
    } else {
        let mut output = backup_context.output.borrow_mut();
        runtime.block_on(service.execute(&cancel, router_params(), &mut *output))
    };

    let outcome = match result {
        Ok(()) => BackupOutcome::Success,
        Err(err) => BackupOutcome::Failure {
            stage: err.stage(),
            message: err.to_string(),
        },
    };
    backup_context.outcome.replace(Some(outcome));
    Ok(())
}

#[then("the backup succeeds")]
fn backup_succeeds(backup_context: &BackupContext) -> Result<(), StepError> {
    match *backup_context.outcome.borrow() {
        Some(BackupOutcome::Success) => Ok(()),
        ref other => Err(StepError::Assertion(format!(
            "expected success, got {other:?}"
        ))),
    }
}

#[then("the backup fails at the \"{stage}\" stage")]
fn backup_fails_at(backup_context: &BackupContext, stage: String) -> Result<(), StepError> {
    match *backup_context.outcome.borrow() {
        Some(BackupOutcome::Failure { stage: actual, .. }) if actual.as_str() == stage => Ok(()),
        ref other => Err(StepError::Assertion(format!(
            "expected failure at {stage}, got {other:?}"
        ))),
    }
}

#[then("the error mentions \"{text}\"")]
fn error_mentions(backup_context: &BackupContext, text: String) -> Result<(), StepError> {
    match *backup_context.outcome.borrow() {
        Some(BackupOutcome::Failure { ref message, .. }) if message.contains(&text) => Ok(()),
        ref other => Err(StepError::Assertion(format!(
            "expected error mentioning {text:?}, got {other:?}"
        ))),
    }
}

#[then("the destination contains \"{text}\"")]
fn destination_contains(backup_context: &BackupContext, text: String) -> Result<(), StepError> {
    let output = backup_context.output.borrow();
    let expected = format!("{text}\n");
    if output.as_slice() == expected.as_bytes() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "destination holds {:?}",
            String::from_utf8_lossy(&output)
        )))
    }
}

#[then("the destination is empty")]
fn destination_is_empty(backup_context: &BackupContext) -> Result<(), StepError> {
    let output = backup_context.output.borrow();
    if output.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected empty destination, got {} bytes",
            output.len()
        )))
    }
}

#[then("the export command was run")]
fn export_was_run(backup_context: &BackupContext) -> Result<(), StepError> {
    let commands = backup_context.transport.commands();
    if commands == [EXPORT_COMMAND] {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected a single export, got {commands:?}"
        )))
    }
}

#[then("no command was run")]
fn no_command_run(backup_context: &BackupContext) -> Result<(), StepError> {
    let commands = backup_context.transport.commands();
    if commands.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected no commands, got {commands:?}"
        )))
    }
}

#[then("the session is closed once")]
fn session_closed_once(backup_context: &BackupContext) -> Result<(), StepError> {
    expect_close_calls(backup_context, 1)
}

#[then("the session is never closed")]
fn session_never_closed(backup_context: &BackupContext) -> Result<(), StepError> {
    expect_close_calls(backup_context, 0)
}

fn expect_close_calls(backup_context: &BackupContext, expected: usize) -> Result<(), StepError> {
    let actual = backup_context.transport.close_calls();
    if actual == expected {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {expected} close calls, got {actual}"
        )))
    }
}
