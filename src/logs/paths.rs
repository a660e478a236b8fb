use crate::config::StatePaths;
use crate::shared::ids::SubtaskId;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

/// `<state_root>/logs/subtasks/<YYYY-MM-DD>/<subtask_id>.log`
pub fn subtask_log_path(state_root: &Path, day: NaiveDate, subtask_id: SubtaskId) -> PathBuf {
    StatePaths::new(state_root)
        .subtask_logs_dir()
        .join(day.format("%Y-%m-%d").to_string())
        .join(format!("{subtask_id}.log"))
}
