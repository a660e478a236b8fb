/// Failures raised by runner logic. None of these ever escape the engine;
/// they become a FAILED transition with the code and message recorded in the
/// subtask context.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    #[error("[{code}] {message}")]
    Domain { code: String, message: String },
    #[error("unexpected error: {0}")]
    Unexpected(String),
    #[error("rollback is not supported: {reason}")]
    RollbackNotSupported { reason: String },
    #[error("wait timed out after {waited_ms}ms")]
    Timeout { waited_ms: u64 },
    #[error("operation cancelled")]
    Cancelled,
}

impl TaskError {
    pub fn domain(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Domain {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    pub fn code(&self) -> &str {
        match self {
            TaskError::Domain { code, .. } => code,
            TaskError::Unexpected(_) => "UNEXPECTED_ERROR",
            TaskError::RollbackNotSupported { .. } => "ROLLBACK_NOT_SUPPORTED",
            TaskError::Timeout { .. } => "WAIT_TIMEOUT",
            TaskError::Cancelled => "CANCELLED",
        }
    }
}

impl From<std::io::Error> for TaskError {
    fn from(value: std::io::Error) -> Self {
        Self::Unexpected(value.to_string())
    }
}
