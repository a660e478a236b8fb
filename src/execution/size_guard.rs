use crate::shared::logging::EngineLog;
use crate::subtask::SubtaskInstance;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};

/// Soft ceiling on the serialized context. Oversized contexts are reported,
/// never truncated or failed.
#[derive(Debug)]
pub struct ContextSizeGuard {
    limit_bytes: usize,
    oversized: AtomicU64,
}

impl ContextSizeGuard {
    pub fn new(limit_bytes: usize) -> Self {
        Self {
            limit_bytes,
            oversized: AtomicU64::new(0),
        }
    }

    pub fn limit_bytes(&self) -> usize {
        self.limit_bytes
    }

    /// Returns false when the context is over the limit.
    pub fn check(&self, instance: &SubtaskInstance, log: &EngineLog) -> bool {
        let size = instance.context.serialized_size();
        if size <= self.limit_bytes {
            return true;
        }

        self.oversized.fetch_add(1, Ordering::Relaxed);
        log.warn(
            "context.oversized",
            &format!(
                "context of subtask {} is {size} bytes, over the {} byte limit",
                instance.id, self.limit_bytes
            ),
            &[
                ("subtask_id", Value::from(instance.id.get())),
                ("size_bytes", Value::from(size)),
                ("limit_bytes", Value::from(self.limit_bytes)),
            ],
        );
        false
    }

    pub fn oversized_count(&self) -> u64 {
        self.oversized.load(Ordering::Relaxed)
    }
}
