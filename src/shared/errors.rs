use crate::accessor::RepositoryError;
use crate::config::ConfigError;
use crate::shared::ids::{NodeType, SubtaskId};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("no runner registered for node type `{node_type}` (subtask {subtask_id})")]
    UnknownNodeType {
        node_type: NodeType,
        subtask_id: SubtaskId,
    },
    #[error("runner for node type `{node_type}` is already registered")]
    DuplicateRunner { node_type: NodeType },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
