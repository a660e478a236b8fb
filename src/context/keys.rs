//! Well-known context keys.
//!
//! Domain runners define their own keys; only the ones the engine itself
//! reads or writes live here.

pub const LATEST_EXECUTION_START_TIME: &str = "latest_execution_start_time";
pub const LATEST_EXECUTION_END_TIME: &str = "latest_execution_end_time";
pub const FAILURE_REASON: &str = "failure_reason";
pub const FAILURE_CODE: &str = "failure_code";
pub const TRACE_ID: &str = "trace_id";

/// List key holding the series ids whose forward logic declared itself
/// impossible to roll back.
pub const ROLLBACK_PROHIBITED_SERIES: &str = "rollback_prohibited_series";

/// Keys exempt from merge conflict detection. The incoming value wins.
pub const EXCLUSIVE_KEYS: [&str; 5] = [
    LATEST_EXECUTION_START_TIME,
    LATEST_EXECUTION_END_TIME,
    FAILURE_REASON,
    FAILURE_CODE,
    TRACE_ID,
];

pub fn is_exclusive(key: &str) -> bool {
    EXCLUSIVE_KEYS.contains(&key)
}
