//! Periodic task identity and per-task scheduling record.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// Opaque task identifier. In the Linux deployment this is a process id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(u32);

impl TaskId {
    /// Wrap a raw identifier.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw identifier value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for TaskId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

/// Handle to the externally-owned execution context behind a task id.
///
/// Produced by a [`HandleResolver`](crate::resolver::HandleResolver) and
/// consumed by a [`PriorityController`](crate::priority::PriorityController).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecHandle(u32);

impl ExecHandle {
    /// Wrap a raw OS handle.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw OS handle value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ExecHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handle#{}", self.0)
    }
}

/// Scheduling state of a registered task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    /// Waiting for its next release.
    Sleeping,
    /// Released and queued for dispatch.
    Ready,
    /// Holds the running slot.
    Running,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Sleeping => write!(f, "sleeping"),
            TaskState::Ready => write!(f, "ready"),
            TaskState::Running => write!(f, "running"),
        }
    }
}

/// Registration-time view of a task, as reported by
/// [`RmScheduler::snapshot`](crate::RmScheduler::snapshot).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInfo {
    /// Task identifier.
    pub task_id: TaskId,
    /// Release period.
    pub period: Duration,
    /// Declared compute budget per period.
    pub budget: Duration,
}

/// Per-task scheduling record, guarded by the run-state lock.
#[derive(Debug, Clone)]
pub struct PeriodicTask {
    /// Task identifier.
    pub id: TaskId,
    /// Resolved execution handle.
    pub handle: ExecHandle,
    /// Release period.
    pub period: Duration,
    /// Declared compute budget (advisory).
    pub budget: Duration,
    /// Current scheduling state.
    pub state: TaskState,
    /// Absolute time of the next period boundary.
    pub next_release: Instant,
    /// Set when a new job is released; cleared when that job is first dispatched.
    pub(crate) job_pending: bool,
    /// Set once the OS priority of a granted task has been raised.
    pub(crate) resumed: bool,
}

impl PeriodicTask {
    /// Create a sleeping task whose first release is at `first_release`.
    #[must_use]
    pub fn new(
        id: TaskId,
        handle: ExecHandle,
        period: Duration,
        budget: Duration,
        first_release: Instant,
    ) -> Self {
        Self {
            id,
            handle,
            period,
            budget,
            state: TaskState::Sleeping,
            next_release: first_release,
            job_pending: false,
            resumed: false,
        }
    }

    /// Mark a new job as released.
    pub(crate) fn release(&mut self) {
        self.state = TaskState::Ready;
        self.job_pending = true;
    }

    /// Take the running slot. Advances `next_release` by exactly one period
    /// the first time a job is dispatched, so boundaries never drift with
    /// dispatch latency.
    pub(crate) fn grant(&mut self) {
        self.state = TaskState::Running;
        self.resumed = false;
        if self.job_pending {
            // Registration rejects periods whose boundary would not fit in an
            // `Instant`; a boundary that still overflows stays where it is.
            if let Some(next) = self.next_release.checked_add(self.period) {
                self.next_release = next;
            }
            self.job_pending = false;
        }
    }

    /// Lose the running slot to a higher-priority task. The job is resumed
    /// later, so `next_release` is left alone.
    pub(crate) fn preempt(&mut self) {
        self.state = TaskState::Ready;
        self.resumed = false;
    }

    /// Time left until the next period boundary, or `None` once it has passed.
    #[must_use]
    pub fn time_to_release(&self, now: Instant) -> Option<Duration> {
        self.next_release
            .checked_duration_since(now)
            .filter(|remaining| !remaining.is_zero())
    }

    /// Registration-time view of this task.
    #[must_use]
    pub fn info(&self) -> TaskInfo {
        TaskInfo {
            task_id: self.id,
            period: self.period,
            budget: self.budget,
        }
    }
}
