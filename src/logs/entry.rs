use crate::shared::ids::SubtaskId;
use crate::shared::time::millis_to_rfc3339;
use crate::subtask::{Operation, SubtaskInstance};
use serde::{Deserialize, Serialize};

const SEPARATOR_FENCE: &str = "####";

/// One immutable chunk of a subtask's log stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtaskLogEntry {
    pub subtask_id: SubtaskId,
    pub run_time: u32,
    pub content: String,
    pub created_at: i64,
}

impl SubtaskLogEntry {
    pub fn new(
        subtask_id: SubtaskId,
        run_time: u32,
        content: impl Into<String>,
        created_at: i64,
    ) -> Self {
        Self {
            subtask_id,
            run_time,
            content: content.into(),
            created_at,
        }
    }
}

/// Parsed form of an attempt boundary line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Separator {
    pub operation: Operation,
    pub run_time: u32,
    pub started_at: String,
}

/// Boundary line written before every attempt, newline terminated.
pub fn separator(operation: Operation, run_time: u32, started_at_millis: i64) -> String {
    format!(
        "{SEPARATOR_FENCE} {operation} run_time={run_time} started_at={} {SEPARATOR_FENCE}\n",
        millis_to_rfc3339(started_at_millis)
    )
}

pub fn parse_separator(line: &str) -> Option<Separator> {
    let inner = line
        .trim_end()
        .strip_prefix(SEPARATOR_FENCE)?
        .strip_suffix(SEPARATOR_FENCE)?;
    let mut parts = inner.split_whitespace();
    let operation = Operation::parse(parts.next()?).ok()?;
    let run_time = parts.next()?.strip_prefix("run_time=")?.parse().ok()?;
    let started_at = parts.next()?.strip_prefix("started_at=")?.to_string();
    if parts.next().is_some() {
        return None;
    }
    Some(Separator {
        operation,
        run_time,
        started_at,
    })
}

/// Human-readable record appended when an instance lands in a terminal state.
pub fn transition_summary(instance: &SubtaskInstance) -> String {
    let mut line = format!(
        "[{}] subtask {} finished in {} (run_time={}",
        instance.operation, instance.id, instance.state, instance.run_time
    );
    if let Some(end) = instance.end_time {
        line.push_str(&format!(", ended_at={}", millis_to_rfc3339(end)));
    }
    line.push(')');
    if let Some(reason) = instance.failure_reason() {
        line.push_str(": ");
        line.push_str(reason);
    }
    line.push('\n');
    line
}

/// The slice of a log stream produced by one attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttemptLog {
    /// `None` for output recorded before the first boundary.
    pub operation: Option<Operation>,
    pub run_time: Option<u32>,
    pub started_at: Option<String>,
    pub content: String,
}

/// Splits a stored stream back into per-attempt segments. Boundaries are
/// entries made of a single separator line, as the engine writes them;
/// separator-shaped text inside runner output is kept as content.
pub fn split_attempts(entries: &[SubtaskLogEntry]) -> Vec<AttemptLog> {
    let mut attempts: Vec<AttemptLog> = Vec::new();
    for entry in entries {
        if let Some(boundary) = boundary_entry(entry) {
            attempts.push(AttemptLog {
                operation: Some(boundary.operation),
                run_time: Some(boundary.run_time),
                started_at: Some(boundary.started_at),
                content: String::new(),
            });
            continue;
        }
        match attempts.last_mut() {
            Some(current) => current.content.push_str(&entry.content),
            None => attempts.push(AttemptLog {
                content: entry.content.clone(),
                ..AttemptLog::default()
            }),
        }
    }
    attempts
}

fn boundary_entry(entry: &SubtaskLogEntry) -> Option<Separator> {
    let line = entry.content.strip_suffix('\n').unwrap_or(&entry.content);
    if line.contains('\n') {
        return None;
    }
    parse_separator(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::ids::{NodeType, SeriesId};
    use crate::subtask::SubtaskState;

    fn entry(content: &str) -> SubtaskLogEntry {
        SubtaskLogEntry::new(SubtaskId(3), 1, content, 0)
    }

    #[test]
    fn separator_parses_back() {
        let line = separator(Operation::RollbackSkip, 4, 1_700_000_000_000);
        assert_eq!(
            line,
            "#### ROLLBACK_SKIP run_time=4 started_at=2023-11-14T22:13:20.000Z ####\n"
        );
        let parsed = parse_separator(&line).expect("separator");
        assert_eq!(parsed.operation, Operation::RollbackSkip);
        assert_eq!(parsed.run_time, 4);
    }

    #[test]
    fn ordinary_lines_are_not_separators() {
        assert!(parse_separator("#### not a boundary ####").is_none());
        assert!(parse_separator("EXECUTE run_time=1").is_none());
    }

    #[test]
    fn stream_splits_at_each_boundary() {
        let entries = vec![
            entry("stray line\n"),
            entry(&separator(Operation::Execute, 1, 0)),
            entry("connecting\nfailed\n"),
            entry(&separator(Operation::Retry, 2, 1_000)),
            entry("connecting\nok\n"),
        ];

        let attempts = split_attempts(&entries);
        assert_eq!(attempts.len(), 3);
        assert_eq!(attempts[0].operation, None);
        assert_eq!(attempts[0].content, "stray line\n");
        assert_eq!(attempts[1].operation, Some(Operation::Execute));
        assert_eq!(attempts[1].content, "connecting\nfailed\n");
        assert_eq!(attempts[2].operation, Some(Operation::Retry));
        assert_eq!(attempts[2].run_time, Some(2));
        assert_eq!(attempts[2].content, "connecting\nok\n");
    }

    #[test]
    fn separator_text_inside_runner_output_is_not_a_boundary() {
        let echoed = format!("replaying old log:\n{}done\n", separator(Operation::Execute, 7, 0));
        let entries = vec![
            entry(&separator(Operation::Execute, 1, 0)),
            entry(&echoed),
            entry(&separator(Operation::Execute, 7, 0)),
        ];

        let attempts = split_attempts(&entries);
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].run_time, Some(1));
        assert_eq!(attempts[0].content, echoed);
        assert_eq!(attempts[1].run_time, Some(7));
        assert!(attempts[1].content.is_empty());
    }

    #[test]
    fn summary_names_operation_state_and_reason() {
        let mut instance = SubtaskInstance::new(
            SubtaskId(9),
            SeriesId(1),
            NodeType::parse("noop").expect("node type"),
        );
        instance.run_time = 1;
        instance.record_failure("E1", "[E1] boom");
        instance.finish(SubtaskState::Failed, 0);

        let summary = transition_summary(&instance);
        assert!(summary.starts_with("[EXECUTE] subtask 9 finished in FAILED (run_time=1"));
        assert!(summary.trim_end().ends_with(": [E1] boom"));
    }
}
