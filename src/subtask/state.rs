use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubtaskState {
    Ready,
    Running,
    Successful,
    Failed,
    /// Landing state after a successful rollback; the node may be executed
    /// again from scratch.
    Pending,
}

impl SubtaskState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SubtaskState::Successful | SubtaskState::Failed | SubtaskState::Pending
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SubtaskState::Ready => "READY",
            SubtaskState::Running => "RUNNING",
            SubtaskState::Successful => "SUCCESSFUL",
            SubtaskState::Failed => "FAILED",
            SubtaskState::Pending => "PENDING",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "READY" => Ok(Self::Ready),
            "RUNNING" => Ok(Self::Running),
            "SUCCESSFUL" => Ok(Self::Successful),
            "FAILED" => Ok(Self::Failed),
            "PENDING" => Ok(Self::Pending),
            other => Err(format!("unknown subtask state `{other}`")),
        }
    }
}

impl std::fmt::Display for SubtaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    Execute,
    Retry,
    Rollback,
    Cancel,
    Skip,
    RollbackSkip,
}

impl Operation {
    pub const ALL: [Operation; 6] = [
        Operation::Execute,
        Operation::Retry,
        Operation::Rollback,
        Operation::Cancel,
        Operation::Skip,
        Operation::RollbackSkip,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Execute => "EXECUTE",
            Operation::Retry => "RETRY",
            Operation::Rollback => "ROLLBACK",
            Operation::Cancel => "CANCEL",
            Operation::Skip => "SKIP",
            Operation::RollbackSkip => "ROLLBACK_SKIP",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "EXECUTE" => Ok(Self::Execute),
            "RETRY" => Ok(Self::Retry),
            "ROLLBACK" => Ok(Self::Rollback),
            "CANCEL" => Ok(Self::Cancel),
            "SKIP" => Ok(Self::Skip),
            "ROLLBACK_SKIP" => Ok(Self::RollbackSkip),
            other => Err(format!("unknown operation `{other}`")),
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_successful_failed_and_pending() {
        assert!(!SubtaskState::Ready.is_terminal());
        assert!(!SubtaskState::Running.is_terminal());
        assert!(SubtaskState::Successful.is_terminal());
        assert!(SubtaskState::Failed.is_terminal());
        assert!(SubtaskState::Pending.is_terminal());
    }

    #[test]
    fn operation_names_parse_back() {
        for operation in Operation::ALL {
            assert_eq!(Operation::parse(operation.as_str()), Ok(operation));
        }
        assert_eq!(Operation::parse("rollback_skip"), Ok(Operation::RollbackSkip));
        assert!(Operation::parse("PAUSE").is_err());
    }

    #[test]
    fn serde_uses_upper_snake_case() {
        assert_eq!(
            serde_json::to_string(&Operation::RollbackSkip).expect("encode"),
            "\"ROLLBACK_SKIP\""
        );
        assert_eq!(
            serde_json::to_string(&SubtaskState::Successful).expect("encode"),
            "\"SUCCESSFUL\""
        );
    }
}
