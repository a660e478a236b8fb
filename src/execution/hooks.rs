use crate::shared::ids::{NodeType, SubtaskId};
use crate::shared::logging::EngineLog;
use crate::timeout::watchdog::panic_message;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    Before,
    After,
}

impl HookPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::After => "after",
        }
    }
}

/// Side-effect callback around a subtask attempt (metrics, auditing).
/// Its outcome never changes the subtask's.
pub trait LifecycleHook: Send + Sync {
    fn name(&self) -> &str;

    fn before(&self, _subtask_id: SubtaskId) -> Result<(), String> {
        Ok(())
    }

    fn after(&self, _subtask_id: SubtaskId) -> Result<(), String> {
        Ok(())
    }
}

#[derive(Default)]
pub struct HookRegistry {
    hooks: HashMap<NodeType, Vec<Arc<dyn LifecycleHook>>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, node_type: NodeType, hook: Arc<dyn LifecycleHook>) {
        self.hooks.entry(node_type).or_default().push(hook);
    }

    pub fn hooks_for(&self, node_type: &NodeType) -> &[Arc<dyn LifecycleHook>] {
        self.hooks
            .get(node_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Runs every hook for `node_type` in registration order. Each one is
    /// isolated from the others; returns how many failed.
    pub fn run(
        &self,
        phase: HookPhase,
        node_type: &NodeType,
        subtask_id: SubtaskId,
        log: &EngineLog,
    ) -> usize {
        let mut failures = 0;
        for hook in self.hooks_for(node_type) {
            let result = catch_unwind(AssertUnwindSafe(|| match phase {
                HookPhase::Before => hook.before(subtask_id),
                HookPhase::After => hook.after(subtask_id),
            }))
            .unwrap_or_else(|panic| Err(format!("panicked: {}", panic_message(&*panic))));

            if let Err(message) = result {
                failures += 1;
                log.warn(
                    "hook.failed",
                    &format!("{} hook `{}` failed: {message}", phase.as_str(), hook.name()),
                    &[
                        ("subtask_id", Value::from(subtask_id.get())),
                        ("node_type", Value::from(node_type.as_str())),
                        ("hook", Value::from(hook.name())),
                    ],
                );
            }
        }
        failures
    }
}
