//! Rate-monotonic ready queue.
//!
//! Tasks are ordered by ascending period. Tasks with equal periods are served
//! in the order they were enqueued, except that a job put back after
//! preemption goes ahead of its equal-period peers: it was dispatched before
//! any of them and resumes first. All operations are O(log n) and never
//! block, so the queue may be touched from timer callbacks.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use crate::task::TaskId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct ReadyKey {
    period: Duration,
    /// Negative for jobs put back at the front.
    seq: i64,
}

/// Period-ordered queue of Ready tasks.
#[derive(Debug, Default)]
pub struct ReadyQueue {
    order: BTreeMap<ReadyKey, TaskId>,
    index: HashMap<TaskId, ReadyKey>,
    next_seq: i64,
    next_front_seq: i64,
}

impl ReadyQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue `id` behind every task with a period less than or equal to
    /// `period`. Returns `false` if the task is already queued.
    pub fn insert(&mut self, id: TaskId, period: Duration) -> bool {
        if self.index.contains_key(&id) {
            return false;
        }
        let seq = self.next_seq;
        self.next_seq = seq.wrapping_add(1);
        self.push(id, ReadyKey { period, seq });
        true
    }

    /// Enqueue `id` ahead of every task with an equal period, as a job
    /// resuming after preemption. Returns `false` if the task is already queued.
    pub fn insert_front(&mut self, id: TaskId, period: Duration) -> bool {
        if self.index.contains_key(&id) {
            return false;
        }
        self.next_front_seq = self.next_front_seq.wrapping_sub(1);
        self.push(
            id,
            ReadyKey {
                period,
                seq: self.next_front_seq,
            },
        );
        true
    }

    fn push(&mut self, id: TaskId, key: ReadyKey) {
        self.order.insert(key, id);
        self.index.insert(id, key);
    }

    /// Remove `id` if queued. Removing an absent task is a no-op.
    pub fn remove(&mut self, id: TaskId) -> bool {
        match self.index.remove(&id) {
            Some(key) => {
                self.order.remove(&key);
                true
            }
            None => false,
        }
    }

    /// Highest-priority task with its period.
    #[must_use]
    pub fn peek_head(&self) -> Option<(TaskId, Duration)> {
        self.order
            .first_key_value()
            .map(|(key, id)| (*id, key.period))
    }

    /// Remove and return the highest-priority task.
    pub fn pop_head(&mut self) -> Option<TaskId> {
        let (_, id) = self.order.pop_first()?;
        self.index.remove(&id);
        Some(id)
    }

    /// Whether `id` is queued.
    #[must_use]
    pub fn contains(&self, id: TaskId) -> bool {
        self.index.contains_key(&id)
    }

    /// Number of queued tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Queued tasks in dispatch order.
    pub fn iter(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.order.values().copied()
    }

    /// Drop every queued task.
    pub fn clear(&mut self) {
        self.order.clear();
        self.index.clear();
    }
}
