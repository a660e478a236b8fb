//! Runner contract and the operation state machine.

pub mod error;
pub mod scope;
pub mod state_machine;

pub use error::TaskError;
pub use scope::ExecutionScope;
pub use state_machine::{check_precondition, run_operation, OperationOutcome};

use crate::context::Context;
use crate::subtask::SubtaskInstance;

/// Result of forward logic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecuteOutcome {
    /// Values to fold into the subtask's context.
    pub context: Context,
    /// Set when the work just done cannot be compensated.
    pub prohibit_rollback: bool,
}

impl ExecuteOutcome {
    pub fn with_context(context: Context) -> Self {
        Self {
            context,
            prohibit_rollback: false,
        }
    }

    pub fn prohibiting_rollback(mut self) -> Self {
        self.prohibit_rollback = true;
        self
    }
}

/// One execution strategy. Implementations are selected by node type.
///
/// Errors and panics from any of these methods are contained by the engine.
pub trait SubtaskRunner: Send + Sync {
    fn execute(
        &self,
        instance: &SubtaskInstance,
        scope: &mut ExecutionScope<'_>,
    ) -> Result<ExecuteOutcome, TaskError>;

    fn rollback(
        &self,
        _instance: &SubtaskInstance,
        _scope: &mut ExecutionScope<'_>,
    ) -> Result<(), TaskError> {
        Err(TaskError::RollbackNotSupported {
            reason: "runner has no compensating logic".to_string(),
        })
    }

    fn cancel(
        &self,
        _instance: &SubtaskInstance,
        _scope: &mut ExecutionScope<'_>,
    ) -> Result<(), TaskError> {
        Ok(())
    }
}
