use super::{Operation, SubtaskState};
use crate::context::{keys, Context};
use crate::shared::ids::{NodeType, SeriesId, SubtaskId};
use crate::shared::time::millis_to_rfc3339;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtaskInstance {
    pub id: SubtaskId,
    pub series_id: SeriesId,
    pub node_type: NodeType,
    pub state: SubtaskState,
    pub operation: Operation,
    #[serde(default)]
    pub context: Context,
    /// Attempt counter, bumped every time an operation is dispatched.
    #[serde(default)]
    pub run_time: u32,
    #[serde(default)]
    pub start_time: Option<i64>,
    #[serde(default)]
    pub end_time: Option<i64>,
    /// `None` when the subtask is not one of a fan-out.
    #[serde(default)]
    pub parallel_idx: Option<usize>,
    #[serde(default)]
    pub upstreams: Vec<SubtaskId>,
    #[serde(default)]
    pub downstreams: Vec<SubtaskId>,
    #[serde(default)]
    pub prohibit_rollback: bool,
}

impl SubtaskInstance {
    pub fn new(id: SubtaskId, series_id: SeriesId, node_type: NodeType) -> Self {
        Self {
            id,
            series_id,
            node_type,
            state: SubtaskState::Ready,
            operation: Operation::Execute,
            context: Context::default(),
            run_time: 0,
            start_time: None,
            end_time: None,
            parallel_idx: None,
            upstreams: Vec::new(),
            downstreams: Vec::new(),
            prohibit_rollback: false,
        }
    }

    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operation = operation;
        self
    }

    pub fn with_state(mut self, state: SubtaskState) -> Self {
        self.state = state;
        self
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    pub fn with_parallel_idx(mut self, idx: usize) -> Self {
        self.parallel_idx = Some(idx);
        self
    }

    pub fn with_upstreams(mut self, upstreams: impl IntoIterator<Item = SubtaskId>) -> Self {
        self.upstreams = upstreams.into_iter().collect();
        self
    }

    pub fn with_downstreams(mut self, downstreams: impl IntoIterator<Item = SubtaskId>) -> Self {
        self.downstreams = downstreams.into_iter().collect();
        self
    }

    /// The context as this instance's runner should see it.
    pub fn effective_context(&self) -> Context {
        match self.parallel_idx {
            Some(idx) => self.context.parallel_view(idx),
            None => self.context.clone(),
        }
    }

    /// Enters RUNNING for a new attempt. `start_time` is only ever set once.
    pub fn mark_running(&mut self, now: i64) {
        self.run_time = self.run_time.saturating_add(1);
        self.state = SubtaskState::Running;
        self.start_time.get_or_insert(now);
        self.end_time = None;
        self.context
            .put(keys::LATEST_EXECUTION_START_TIME, millis_to_rfc3339(now));
    }

    pub fn finish(&mut self, state: SubtaskState, now: i64) {
        self.state = state;
        if state == SubtaskState::Running {
            self.end_time = None;
            return;
        }
        self.end_time = Some(now);
        self.context
            .put(keys::LATEST_EXECUTION_END_TIME, millis_to_rfc3339(now));
    }

    pub fn record_failure(&mut self, code: &str, reason: &str) {
        self.context
            .put(keys::FAILURE_CODE, code)
            .put(keys::FAILURE_REASON, reason);
    }

    pub fn clear_failure(&mut self) {
        self.context.string_map.remove(keys::FAILURE_CODE);
        self.context.string_map.remove(keys::FAILURE_REASON);
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.context.get_string(keys::FAILURE_REASON)
    }

    /// Sticky: once set it is never cleared.
    pub fn prohibit_rollback(&mut self) {
        self.prohibit_rollback = true;
        self.context.append_list(
            keys::ROLLBACK_PROHIBITED_SERIES,
            self.series_id.to_string(),
        );
    }

    pub fn rollback_prohibited(&self) -> bool {
        self.prohibit_rollback
            || self.context.list_contains(
                keys::ROLLBACK_PROHIBITED_SERIES,
                &self.series_id.to_string(),
            )
    }
}
