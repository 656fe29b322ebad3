//! Dispatcher: the single loop that owns the running slot.
//!
//! Scheduling state that timer callbacks, yields and the dispatcher all touch
//! lives in [`RunState`] behind one short-held lock. The dispatcher thread
//! blocks on a wake channel, evaluates the head of the ready queue under that
//! lock, and applies the resulting OS priority changes after releasing it.
//!
//! Granting the slot is two-phase: the state transition happens under the
//! lock, the task is elevated outside it, and only then is the task marked
//! resumed and its waiter notified. A grant that lost its task in between
//! (deregistration, stop) is undone.

use crossbeam::channel::{Receiver, Sender, TrySendError};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, trace, warn};

use crate::priority::{PriorityController, SchedClass};
use crate::ready_queue::ReadyQueue;
use crate::task::{ExecHandle, PeriodicTask, TaskId, TaskState};

/// Reason the dispatcher was woken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// Dispatcher thread just started.
    Start,
    /// A task's release timer fired.
    Released(TaskId),
    /// A task yielded the running slot.
    Yielded(TaskId),
    /// A task was deregistered.
    Deregistered(TaskId),
    /// Terminal stop request.
    Stop,
}

/// Post a wake without blocking. A full channel already holds a pending
/// wake that will observe the new state, so the event may be dropped.
pub(crate) fn signal(tx: &Sender<Wake>, wake: Wake) {
    match tx.try_send(wake) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => trace!("wake channel full, dropping {:?}", wake),
        Err(TrySendError::Disconnected(_)) => debug!("dispatcher gone, dropping {:?}", wake),
    }
}

/// What a timer fire did to its task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReleaseOutcome {
    /// Sleeping → Ready and queued.
    Released,
    /// The id is no longer registered.
    Unknown,
    /// The task was not sleeping; nothing changed.
    Ignored(TaskState),
}

/// Outcome of one dispatcher evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decision {
    /// Nothing is ready.
    Idle,
    /// The running task keeps the slot.
    Keep {
        running: TaskId,
        head: TaskId,
    },
    /// The slot was free and `task` took it.
    Grant {
        task: TaskId,
        handle: ExecHandle,
    },
    /// `preempted` lost the slot to the shorter-period `task`.
    Preempt {
        preempted: TaskId,
        preempted_handle: ExecHandle,
        task: TaskId,
        handle: ExecHandle,
    },
}

/// Scheduling state shared by the dispatcher, timer callbacks and yields.
#[derive(Debug, Default)]
pub(crate) struct RunState {
    pub(crate) tasks: HashMap<TaskId, PeriodicTask>,
    pub(crate) ready: ReadyQueue,
    pub(crate) current: Option<TaskId>,
    pub(crate) stopped: bool,
}

impl RunState {
    /// Timer fire: Sleeping → Ready.
    pub(crate) fn release(&mut self, id: TaskId) -> ReleaseOutcome {
        let Some(task) = self.tasks.get_mut(&id) else {
            return ReleaseOutcome::Unknown;
        };
        if task.state != TaskState::Sleeping {
            return ReleaseOutcome::Ignored(task.state);
        }
        task.release();
        self.ready.insert(id, task.period);
        ReleaseOutcome::Released
    }

    /// Pick the head of the ready queue and decide whether it runs.
    pub(crate) fn evaluate(&mut self) -> Decision {
        if self.stopped {
            return Decision::Idle;
        }
        let Some((head, head_period)) = self.ready.peek_head() else {
            return Decision::Idle;
        };

        let running = self
            .current
            .and_then(|id| self.tasks.get(&id).map(|t| (id, t.period, t.handle)));

        match running {
            None => {
                self.current = None;
                match self.grant(head) {
                    Some(handle) => Decision::Grant { task: head, handle },
                    None => Decision::Idle,
                }
            }
            Some((running, running_period, running_handle)) if running_period > head_period => {
                if let Some(task) = self.tasks.get_mut(&running) {
                    task.preempt();
                }
                self.current = None;
                let granted = self.grant(head);
                self.ready.insert_front(running, running_period);
                match granted {
                    Some(handle) => Decision::Preempt {
                        preempted: running,
                        preempted_handle: running_handle,
                        task: head,
                        handle,
                    },
                    None => Decision::Idle,
                }
            }
            Some((running, _, _)) => Decision::Keep { running, head },
        }
    }

    fn grant(&mut self, id: TaskId) -> Option<ExecHandle> {
        self.ready.remove(id);
        let task = self.tasks.get_mut(&id)?;
        task.grant();
        self.current = Some(id);
        Some(task.handle)
    }

    /// Phase two of a grant: mark the task resumed if it still holds the slot.
    pub(crate) fn confirm_grant(&mut self, id: TaskId) -> bool {
        if self.stopped || self.current != Some(id) {
            return false;
        }
        match self.tasks.get_mut(&id) {
            Some(task) if task.state == TaskState::Running => {
                task.resumed = true;
                true
            }
            _ => false,
        }
    }

    /// Number of tasks in the Running state.
    pub(crate) fn running_count(&self) -> usize {
        self.tasks
            .values()
            .filter(|t| t.state == TaskState::Running)
            .count()
    }
}

/// Run state plus the condition tasks wait on for their next grant.
#[derive(Debug, Default)]
pub(crate) struct SharedRun {
    pub(crate) state: Mutex<RunState>,
    pub(crate) granted: Condvar,
}

/// The dispatcher loop and its capabilities.
pub(crate) struct Dispatcher {
    pub(crate) run: Arc<SharedRun>,
    pub(crate) wake_rx: Receiver<Wake>,
    pub(crate) stop: Arc<AtomicBool>,
    pub(crate) priority: Arc<dyn PriorityController>,
    pub(crate) rt_class: SchedClass,
    pub(crate) rt_priority: i32,
}

impl Dispatcher {
    /// Block on wakes until a stop request arrives.
    pub(crate) fn run(self) {
        info!("dispatcher started");

        loop {
            let wake = match self.wake_rx.recv() {
                Ok(Wake::Stop) | Err(_) => break,
                Ok(wake) => wake,
            };
            if self.stop.load(Ordering::Acquire) {
                break;
            }
            trace!("dispatcher woken by {:?}", wake);

            let decision = self.run.state.lock().evaluate();
            self.apply(decision);
        }

        info!("dispatcher stopped");
    }

    /// Apply the OS side of a decision made under the run-state lock.
    pub(crate) fn apply(&self, decision: Decision) {
        match decision {
            Decision::Idle => trace!("ready queue empty"),
            Decision::Keep { running, head } => {
                debug!("task {} keeps the slot over {}", running, head);
            }
            Decision::Grant { task, handle } => {
                info!("dispatching task {}", task);
                self.resume(task, handle);
            }
            Decision::Preempt {
                preempted,
                preempted_handle,
                task,
                handle,
            } => {
                info!("task {} preempted by task {}", preempted, task);
                self.demote(preempted_handle);
                self.resume(task, handle);
            }
        }
    }

    fn resume(&self, task: TaskId, handle: ExecHandle) {
        if let Err(e) = self
            .priority
            .elevate(handle, self.rt_class, self.rt_priority)
        {
            warn!("failed to elevate task {}: {}", task, e);
        }

        let confirmed = self.run.state.lock().confirm_grant(task);
        if confirmed {
            self.run.granted.notify_all();
        } else {
            debug!("task {} lost the slot before resuming, demoting", task);
            self.demote(handle);
        }
    }

    fn demote(&self, handle: ExecHandle) {
        if let Err(e) = self.priority.reset(handle) {
            warn!("failed to demote {}: {}", handle, e);
        }
    }
}
