//! Append-only subtask log stream and its on-disk layout.

pub mod entry;
pub mod paths;

pub use entry::{
    parse_separator, separator, split_attempts, transition_summary, AttemptLog, Separator,
    SubtaskLogEntry,
};
pub use paths::subtask_log_path;
