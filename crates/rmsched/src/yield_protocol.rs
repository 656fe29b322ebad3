//! Yield protocol: a task handing back its period.
//!
//! A task ends its job by yielding. If its next release is still in the
//! future it sleeps until then; if the boundary has already passed the next
//! job is released on the spot and queued. In both cases the running slot is
//! freed and the dispatcher is woken.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::dispatcher::RunState;
use crate::error::{SchedError, SchedResult};
use crate::task::{ExecHandle, TaskId, TaskState};

/// What a yield did to the calling task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum YieldOutcome {
    /// The task sleeps until its next release.
    Sleeping {
        /// Time left until the release timer fires.
        remaining: Duration,
    },
    /// The next release had already passed; the task was queued again.
    Requeued,
    /// The task had no job in progress; nothing changed.
    NotRunning(TaskState),
}

/// State changes a yield made, and the side effects still to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct YieldTransition {
    pub(crate) outcome: YieldOutcome,
    pub(crate) handle: ExecHandle,
    /// Release timer to arm.
    pub(crate) arm_at: Option<Instant>,
    /// Whether the task held the running slot.
    pub(crate) freed_slot: bool,
}

impl RunState {
    /// Apply a yield from `id` at `now`.
    ///
    /// A job in progress is either running or was preempted and sits in the
    /// ready queue waiting to resume. A yield from any other state (sleeping,
    /// or released but not yet dispatched) changes nothing.
    pub(crate) fn begin_yield(&mut self, id: TaskId, now: Instant) -> SchedResult<YieldTransition> {
        let holds_slot = self.current == Some(id);
        let task = self.tasks.get_mut(&id).ok_or(SchedError::NotFound(id))?;

        let in_progress = match task.state {
            TaskState::Running => holds_slot,
            TaskState::Ready => !task.job_pending,
            TaskState::Sleeping => false,
        };
        if !in_progress {
            return Ok(YieldTransition {
                outcome: YieldOutcome::NotRunning(task.state),
                handle: task.handle,
                arm_at: None,
                freed_slot: false,
            });
        }

        // A preempted job is still queued; take it out before deciding.
        self.ready.remove(id);
        if holds_slot {
            self.current = None;
        }
        task.resumed = false;

        let (outcome, arm_at) = match task.time_to_release(now) {
            Some(remaining) => {
                task.state = TaskState::Sleeping;
                (YieldOutcome::Sleeping { remaining }, Some(task.next_release))
            }
            None => {
                task.release();
                self.ready.insert(id, task.period);
                (YieldOutcome::Requeued, None)
            }
        };

        Ok(YieldTransition {
            outcome,
            handle: task.handle,
            arm_at,
            freed_slot: holds_slot,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::task::PeriodicTask;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    /// Task 1 (P=100ms) dispatched with its first release at `release`.
    fn running_state(release: Instant) -> RunState {
        let mut state = RunState::default();
        let id = TaskId::new(1);
        state.tasks.insert(
            id,
            PeriodicTask::new(id, ExecHandle::new(1), ms(100), ms(10), release),
        );
        state.release(id);
        state.evaluate();
        state
    }

    #[test]
    fn test_yield_with_time_left_sleeps() {
        let start = Instant::now();
        let mut state = running_state(start);
        let id = TaskId::new(1);

        let t = state.begin_yield(id, start + ms(70)).unwrap();
        assert_eq!(
            t.outcome,
            YieldOutcome::Sleeping {
                remaining: ms(30)
            }
        );
        assert_eq!(t.arm_at, Some(start + ms(100)));
        assert!(t.freed_slot);
        assert_eq!(state.current, None);
        assert_eq!(state.tasks[&id].state, TaskState::Sleeping);
        assert!(!state.ready.contains(id));
    }

    #[test]
    fn test_yield_past_release_requeues() {
        let start = Instant::now();
        let mut state = running_state(start);
        let id = TaskId::new(1);

        let t = state.begin_yield(id, start + ms(130)).unwrap();
        assert_eq!(t.outcome, YieldOutcome::Requeued);
        assert_eq!(t.arm_at, None);
        assert_eq!(state.current, None);
        assert_eq!(state.tasks[&id].state, TaskState::Ready);
        assert!(state.ready.contains(id));

        // The next dispatch starts a new job one period on.
        state.evaluate();
        assert_eq!(state.tasks[&id].next_release, start + ms(200));
    }

    #[test]
    fn test_yield_from_sleeping_changes_nothing() {
        let mut state = RunState::default();
        let id = TaskId::new(1);
        let now = Instant::now();
        state.tasks.insert(
            id,
            PeriodicTask::new(id, ExecHandle::new(1), ms(100), ms(10), now),
        );

        let t = state.begin_yield(id, now).unwrap();
        assert_eq!(t.outcome, YieldOutcome::NotRunning(TaskState::Sleeping));
        assert!(!t.freed_slot);

        // Released but not yet dispatched is not a job in progress either.
        state.release(id);
        let t = state.begin_yield(id, now).unwrap();
        assert_eq!(t.outcome, YieldOutcome::NotRunning(TaskState::Ready));
        assert!(state.ready.contains(id));
    }

    #[test]
    fn test_yield_from_preempted_job_leaves_queue() {
        let start = Instant::now();
        let mut state = running_state(start);
        let low = TaskId::new(1);
        let high = TaskId::new(2);
        state.tasks.insert(
            high,
            PeriodicTask::new(high, ExecHandle::new(2), ms(50), ms(10), start),
        );
        state.release(high);
        state.evaluate();
        assert!(state.ready.contains(low));

        let t = state.begin_yield(low, start + ms(60)).unwrap();
        assert!(matches!(t.outcome, YieldOutcome::Sleeping { .. }));
        assert!(!t.freed_slot);
        assert_eq!(state.current, Some(high));
        assert!(!state.ready.contains(low));
    }

    #[test]
    fn test_yield_unknown_task() {
        let mut state = RunState::default();
        assert_eq!(
            state.begin_yield(TaskId::new(5), Instant::now()),
            Err(SchedError::NotFound(TaskId::new(5)))
        );
    }
}
