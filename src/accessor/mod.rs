//! Persistence gateway for subtask transitions and log entries.

pub mod repository;
pub mod sqlite;

pub use repository::{RepositoryError, SubtaskRepository};
pub use sqlite::SqliteSubtaskRepository;

use crate::logs::{transition_summary, SubtaskLogEntry};
use crate::shared::logging::EngineLog;
use crate::shared::time::now_millis;
use crate::subtask::SubtaskInstance;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Records transitions without ever failing the caller.
///
/// A failed write is logged and counted, and the caller gets the instance as
/// it was before the transition. Callers must not assume the returned value
/// reflects what is persisted.
pub struct SubtaskAccessor {
    repository: Arc<dyn SubtaskRepository>,
    log: EngineLog,
    failed_transitions: AtomicU64,
    failed_log_appends: AtomicU64,
}

impl SubtaskAccessor {
    pub fn new(repository: Arc<dyn SubtaskRepository>, log: EngineLog) -> Self {
        Self {
            repository,
            log,
            failed_transitions: AtomicU64::new(0),
            failed_log_appends: AtomicU64::new(0),
        }
    }

    pub fn repository(&self) -> &dyn SubtaskRepository {
        self.repository.as_ref()
    }

    /// Persists `updated`; terminal states also get a summary log entry in the
    /// same transaction.
    pub fn record_transition(
        &self,
        previous: &SubtaskInstance,
        updated: SubtaskInstance,
    ) -> SubtaskInstance {
        let terminal_entry = updated.state.is_terminal().then(|| {
            SubtaskLogEntry::new(
                updated.id,
                updated.run_time,
                transition_summary(&updated),
                updated.end_time.unwrap_or_else(now_millis),
            )
        });

        match self
            .repository
            .persist_transition(&updated, terminal_entry.as_ref())
        {
            Ok(()) => updated,
            Err(err) => {
                self.failed_transitions.fetch_add(1, Ordering::Relaxed);
                self.log.error(
                    "accessor.transition_failed",
                    &format!("failed to persist transition: {err}"),
                    &[
                        ("subtask_id", Value::from(updated.id.get())),
                        ("from_state", Value::from(previous.state.as_str())),
                        ("to_state", Value::from(updated.state.as_str())),
                        ("operation", Value::from(updated.operation.as_str())),
                    ],
                );
                previous.clone()
            }
        }
    }

    /// Appends to the log stream; failures are logged and counted only.
    pub fn append_log(&self, entry: &SubtaskLogEntry) -> bool {
        match self.repository.append_log(entry) {
            Ok(()) => true,
            Err(err) => {
                self.failed_log_appends.fetch_add(1, Ordering::Relaxed);
                self.log.error(
                    "accessor.log_append_failed",
                    &format!("failed to append subtask log: {err}"),
                    &[("subtask_id", Value::from(entry.subtask_id.get()))],
                );
                false
            }
        }
    }

    pub fn failed_transitions(&self) -> u64 {
        self.failed_transitions.load(Ordering::Relaxed)
    }

    pub fn failed_log_appends(&self) -> u64 {
        self.failed_log_appends.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::ids::{NodeType, SeriesId, SubtaskId};
    use crate::subtask::SubtaskState;
    use tempfile::tempdir;

    fn instance() -> SubtaskInstance {
        SubtaskInstance::new(
            SubtaskId(11),
            SeriesId(1),
            NodeType::parse("noop").expect("node type"),
        )
    }

    fn sqlite_accessor(dir: &std::path::Path) -> SubtaskAccessor {
        let repo = SqliteSubtaskRepository::open(&dir.join("engine.db")).expect("open");
        repo.ensure_schema().expect("schema");
        SubtaskAccessor::new(Arc::new(repo), EngineLog::disabled())
    }

    #[test]
    fn running_transition_writes_no_log_entry() {
        let dir = tempdir().expect("tempdir");
        let accessor = sqlite_accessor(dir.path());
        let before = instance();
        let mut running = before.clone();
        running.mark_running(1_000);

        let returned = accessor.record_transition(&before, running.clone());
        assert_eq!(returned, running);
        assert!(accessor
            .repository()
            .load_logs(before.id)
            .expect("logs")
            .is_empty());
    }

    #[test]
    fn terminal_transition_appends_a_summary() {
        let dir = tempdir().expect("tempdir");
        let accessor = sqlite_accessor(dir.path());
        let before = instance();
        let mut done = before.clone();
        done.mark_running(1_000);
        done.finish(SubtaskState::Successful, 2_000);

        accessor.record_transition(&before, done);
        let logs = accessor.repository().load_logs(before.id).expect("logs");
        assert_eq!(logs.len(), 1);
        assert!(logs[0].content.starts_with("[EXECUTE]"));
        assert_eq!(logs[0].created_at, 2_000);
        assert_eq!(accessor.failed_transitions(), 0);
    }
}
