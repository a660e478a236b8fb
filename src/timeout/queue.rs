//! Deadline-ordered singly-linked list.
//!
//! `head` is the sentinel link: it never holds a node of its own, it only
//! points at the earliest deadline. Insertion is a linear scan, which is fine
//! for the tens of waits outstanding at any time.

use super::cancel::UnitOfWork;
use crate::shared::ids::SubtaskId;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Stand-in deadline for timeouts too large to add to an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Identifies one registration. Several waits may share a subtask id; the
/// sequence number tells them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeoutHandle {
    pub id: SubtaskId,
    pub seq: u64,
}

pub struct TimeoutNode {
    pub id: SubtaskId,
    pub seq: u64,
    pub unit: Arc<dyn UnitOfWork>,
    pub timeout: Duration,
    pub deadline: Instant,
    next: Option<Box<TimeoutNode>>,
}

impl TimeoutNode {
    pub fn new(
        handle: TimeoutHandle,
        unit: Arc<dyn UnitOfWork>,
        timeout: Duration,
        now: Instant,
    ) -> Self {
        let deadline = now
            .checked_add(timeout)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now);
        Self {
            id: handle.id,
            seq: handle.seq,
            unit,
            timeout,
            deadline,
            next: None,
        }
    }

    pub fn handle(&self) -> TimeoutHandle {
        TimeoutHandle {
            id: self.id,
            seq: self.seq,
        }
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.deadline.saturating_duration_since(now)
    }
}

impl std::fmt::Debug for TimeoutNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeoutNode")
            .field("id", &self.id)
            .field("seq", &self.seq)
            .field("timeout", &self.timeout)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct TimeoutQueue {
    head: Option<Box<TimeoutNode>>,
    len: usize,
}

impl TimeoutQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Inserts after every node with a deadline at or before this one, so
    /// equal deadlines fire in registration order.
    pub fn insert(&mut self, mut node: TimeoutNode) {
        let deadline = node.deadline;
        let mut cursor = &mut self.head;
        while cursor
            .as_ref()
            .is_some_and(|current| current.deadline <= deadline)
        {
            let Some(current) = cursor else { break };
            cursor = &mut current.next;
        }
        node.next = cursor.take();
        *cursor = Some(Box::new(node));
        self.len += 1;
    }

    /// Unlinks the first node registered under `id`.
    pub fn remove(&mut self, id: SubtaskId) -> Option<TimeoutNode> {
        self.unlink_first(|node| node.id == id)
    }

    /// Unlinks exactly the registration `handle` names.
    pub fn remove_handle(&mut self, handle: TimeoutHandle) -> Option<TimeoutNode> {
        self.unlink_first(|node| node.handle() == handle)
    }

    /// Unlinks every node registered under `id`, earliest deadline first.
    pub fn remove_all(&mut self, id: SubtaskId) -> Vec<TimeoutNode> {
        let mut removed = Vec::new();
        while let Some(node) = self.remove(id) {
            removed.push(node);
        }
        removed
    }

    fn unlink_first<P>(&mut self, matches: P) -> Option<TimeoutNode>
    where
        P: Fn(&TimeoutNode) -> bool,
    {
        let mut cursor = &mut self.head;
        while cursor.as_ref().is_some_and(|current| !matches(current)) {
            let Some(current) = cursor else { break };
            cursor = &mut current.next;
        }
        let mut removed = cursor.take()?;
        *cursor = removed.next.take();
        self.len -= 1;
        Some(*removed)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.head.as_ref().map(|node| node.deadline)
    }

    /// Detaches every node whose deadline is at or before `now`.
    pub fn pop_expired(&mut self, now: Instant) -> Vec<TimeoutNode> {
        let mut expired = Vec::new();
        while self.head.as_ref().is_some_and(|node| node.deadline <= now) {
            let Some(mut node) = self.head.take() else {
                break;
            };
            self.head = node.next.take();
            self.len -= 1;
            expired.push(*node);
        }
        expired
    }

    pub fn clear(&mut self) -> usize {
        let dropped = self.len;
        let mut link = self.head.take();
        while let Some(mut node) = link {
            link = node.next.take();
        }
        self.len = 0;
        dropped
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            next: self.head.as_deref(),
        }
    }

    pub fn deadlines(&self) -> Vec<Instant> {
        self.iter().map(|node| node.deadline).collect()
    }
}

impl Drop for TimeoutQueue {
    fn drop(&mut self) {
        self.clear();
    }
}

pub struct Iter<'a> {
    next: Option<&'a TimeoutNode>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a TimeoutNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next?;
        self.next = node.next.as_deref();
        Some(node)
    }
}
