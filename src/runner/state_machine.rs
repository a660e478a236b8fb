//! Maps (operation, runner result) to the next subtask state.
//!
//! | operation     | runs                | ok         | error  |
//! |---------------|---------------------|------------|--------|
//! | EXECUTE       | forward logic       | SUCCESSFUL | FAILED |
//! | RETRY         | forward logic       | SUCCESSFUL | FAILED |
//! | ROLLBACK      | compensating logic  | PENDING    | FAILED |
//! | CANCEL        | interrupt + hook    | FAILED     | FAILED |
//! | SKIP          | nothing             | SUCCESSFUL |        |
//! | ROLLBACK_SKIP | nothing             | PENDING    |        |

use super::{ExecutionScope, SubtaskRunner, TaskError};
use crate::subtask::{Operation, SubtaskInstance, SubtaskState};
use crate::timeout::watchdog::panic_message;
use std::panic::{catch_unwind, AssertUnwindSafe};

pub const ROLLBACK_PROHIBITED: &str = "ROLLBACK_PROHIBITED";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationOutcome {
    pub state: SubtaskState,
    /// The contained failure, if the operation did not go to plan.
    pub error: Option<TaskError>,
}

impl OperationOutcome {
    fn landed(state: SubtaskState) -> Self {
        Self { state, error: None }
    }

    fn failed(error: TaskError) -> Self {
        Self {
            state: SubtaskState::Failed,
            error: Some(error),
        }
    }
}

/// Rejects operations the current state cannot accept. Only RETRY has a
/// precondition: the previous attempt must have failed.
pub fn check_precondition(instance: &SubtaskInstance) -> Result<(), String> {
    match instance.operation {
        Operation::Retry if instance.state != SubtaskState::Failed => Err(format!(
            "RETRY requires a FAILED subtask, found {}",
            instance.state
        )),
        _ => Ok(()),
    }
}

/// Runs `instance.operation` and applies its effects to `instance`'s
/// context. Never panics outward and never returns an error: every failure
/// becomes a FAILED outcome with the reason recorded in the context.
pub fn run_operation(
    runner: &dyn SubtaskRunner,
    instance: &mut SubtaskInstance,
    scope: &mut ExecutionScope<'_>,
) -> OperationOutcome {
    let outcome = match instance.operation {
        Operation::Execute | Operation::Retry => forward(runner, instance, scope),
        Operation::Rollback => rollback(runner, instance, scope),
        Operation::Cancel => cancel(runner, instance, scope),
        Operation::Skip => OperationOutcome::landed(SubtaskState::Successful),
        Operation::RollbackSkip => OperationOutcome::landed(SubtaskState::Pending),
    };

    match outcome.error.as_ref() {
        Some(err) => instance.record_failure(err.code(), &err.to_string()),
        None => instance.clear_failure(),
    }
    outcome
}

fn forward(
    runner: &dyn SubtaskRunner,
    instance: &mut SubtaskInstance,
    scope: &mut ExecutionScope<'_>,
) -> OperationOutcome {
    let snapshot = instance.clone();
    match contained(|| runner.execute(&snapshot, scope)) {
        Ok(result) => {
            if result.prohibit_rollback {
                instance.prohibit_rollback();
            }
            instance.context.absorb(&result.context);
            OperationOutcome::landed(SubtaskState::Successful)
        }
        Err(err) => OperationOutcome::failed(err),
    }
}

fn rollback(
    runner: &dyn SubtaskRunner,
    instance: &mut SubtaskInstance,
    scope: &mut ExecutionScope<'_>,
) -> OperationOutcome {
    if instance.rollback_prohibited() {
        return OperationOutcome::failed(TaskError::domain(
            ROLLBACK_PROHIBITED,
            format!(
                "series {} declared its work irreversible; rollback skipped",
                instance.series_id
            ),
        ));
    }

    let snapshot = instance.clone();
    match contained(|| runner.rollback(&snapshot, scope)) {
        Ok(()) => OperationOutcome::landed(SubtaskState::Pending),
        Err(err @ TaskError::RollbackNotSupported { .. }) => {
            instance.prohibit_rollback();
            OperationOutcome::failed(err)
        }
        Err(err) => OperationOutcome::failed(err),
    }
}

fn cancel(
    runner: &dyn SubtaskRunner,
    instance: &mut SubtaskInstance,
    scope: &mut ExecutionScope<'_>,
) -> OperationOutcome {
    // Waits still in flight for this subtask belong to an attempt that is
    // being abandoned.
    scope.interrupt_waits();
    let snapshot = instance.clone();
    match contained(|| runner.cancel(&snapshot, scope)) {
        Ok(()) => OperationOutcome::failed(TaskError::Cancelled),
        Err(err) => OperationOutcome::failed(err),
    }
}

fn contained<T, F>(call: F) -> Result<T, TaskError>
where
    F: FnOnce() -> Result<T, TaskError>,
{
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(result) => result,
        Err(panic) => Err(TaskError::Unexpected(format!(
            "runner panicked: {}",
            panic_message(&*panic)
        ))),
    }
}
