use crate::logs::SubtaskLogEntry;
use crate::shared::ids::SubtaskId;
use crate::subtask::SubtaskInstance;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("sqlite open failed at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("failed to create database parent {path}: {source}")]
    CreateParent {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("sqlite statement failed: {source}")]
    Sql {
        #[source]
        source: rusqlite::Error,
    },
    #[error("failed to encode {field} of subtask {subtask_id}: {source}")]
    Encode {
        subtask_id: SubtaskId,
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("stored subtask {subtask_id} is invalid: {message}")]
    Decode {
        subtask_id: SubtaskId,
        message: String,
    },
    #[error("subtask store unavailable: {reason}")]
    Unavailable { reason: String },
}

impl From<rusqlite::Error> for RepositoryError {
    fn from(source: rusqlite::Error) -> Self {
        Self::Sql { source }
    }
}

/// Persistence gateway for subtask instances and their log stream.
///
/// Every call runs in its own transaction, independent of whatever the
/// caller is doing.
pub trait SubtaskRepository: Send + Sync {
    fn ensure_schema(&self) -> Result<(), RepositoryError>;

    fn insert(&self, instance: &SubtaskInstance) -> Result<(), RepositoryError>;

    fn load(&self, subtask_id: SubtaskId) -> Result<Option<SubtaskInstance>, RepositoryError>;

    /// Writes the instance and, when given, its terminal log entry atomically.
    fn persist_transition(
        &self,
        instance: &SubtaskInstance,
        terminal_entry: Option<&SubtaskLogEntry>,
    ) -> Result<(), RepositoryError>;

    fn append_log(&self, entry: &SubtaskLogEntry) -> Result<(), RepositoryError>;

    /// Entries in append order.
    fn load_logs(&self, subtask_id: SubtaskId) -> Result<Vec<SubtaskLogEntry>, RepositoryError>;
}
