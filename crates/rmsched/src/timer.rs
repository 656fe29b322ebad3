//! Release timer service.
//!
//! A single worker thread hosts one cancellable one-shot timer per task id.
//! Re-arming a task replaces its pending timer. Callbacks run on the worker
//! thread without the service lock held, and [`TimerService::cancel_sync`]
//! waits for an in-flight callback for the same id before returning, so a
//! caller may drop per-task state as soon as it returns.

use parking_lot::{Condvar, Mutex, MutexGuard};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Instant;
use tracing::{debug, warn};

use crate::error::{SchedError, SchedResult};
use crate::task::TaskId;

/// Callback invoked on the worker thread when a task's timer fires.
pub type ReleaseCallback = Arc<dyn Fn(TaskId) + Send + Sync>;

#[derive(Debug, Default)]
struct TimerState {
    pending: HashMap<TaskId, (Instant, u64)>,
    heap: BinaryHeap<Reverse<(Instant, u64, TaskId)>>,
    next_seq: u64,
    in_flight: Option<TaskId>,
    shutdown: bool,
}

impl TimerState {
    /// Earliest live timer, discarding heap entries superseded by re-arm or cancel.
    fn next_due(&mut self) -> Option<(Instant, TaskId)> {
        while let Some(Reverse((deadline, seq, id))) = self.heap.peek().copied() {
            if self.pending.get(&id) == Some(&(deadline, seq)) {
                return Some((deadline, id));
            }
            self.heap.pop();
        }
        None
    }

    fn take(&mut self, id: TaskId) {
        self.heap.pop();
        self.pending.remove(&id);
    }
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<TimerState>,
    /// Signalled when the timer set changes or shutdown is requested.
    changed: Condvar,
    /// Signalled when an in-flight callback completes.
    idle: Condvar,
}

/// One-shot timer service keyed by task id.
pub struct TimerService {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
}

impl TimerService {
    /// Spawn the worker thread.
    ///
    /// # Errors
    ///
    /// Returns [`SchedError::SpawnFailed`] if the thread cannot be created.
    pub fn spawn(name: &str, callback: ReleaseCallback) -> SchedResult<Self> {
        let shared = Arc::new(Shared::default());
        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || Self::worker_main(&worker_shared, &callback))
            .map_err(|e| SchedError::SpawnFailed(e.to_string()))?;
        let worker_id = worker.thread().id();

        Ok(Self {
            shared,
            worker: Mutex::new(Some(worker)),
            worker_id,
        })
    }

    /// Arm (or re-arm) the timer for `id` to fire at `deadline`.
    ///
    /// A deadline at or before now fires as soon as the worker gets to it.
    pub fn arm_at(&self, id: TaskId, deadline: Instant) {
        let mut state = self.shared.state.lock();
        if state.shutdown {
            warn!("timer armed for task {} after shutdown, ignoring", id);
            return;
        }
        let seq = state.next_seq;
        state.next_seq = state.next_seq.wrapping_add(1);
        state.pending.insert(id, (deadline, seq));
        state.heap.push(Reverse((deadline, seq, id)));
        drop(state);
        self.shared.changed.notify_one();
    }

    /// Cancel the pending timer for `id` and wait for any in-flight callback
    /// for `id` to finish. Returns whether a pending timer was removed.
    pub fn cancel_sync(&self, id: TaskId) -> bool {
        let mut state = self.shared.state.lock();
        let removed = state.pending.remove(&id).is_some();
        if thread::current().id() != self.worker_id {
            while state.in_flight == Some(id) {
                self.shared.idle.wait(&mut state);
            }
        }
        removed
    }

    /// Deadline of the pending timer for `id`, if armed.
    #[must_use]
    pub fn deadline_of(&self, id: TaskId) -> Option<Instant> {
        self.shared
            .state
            .lock()
            .pending
            .get(&id)
            .map(|(deadline, _)| *deadline)
    }

    /// Whether a timer is pending for `id`.
    #[must_use]
    pub fn is_armed(&self, id: TaskId) -> bool {
        self.shared.state.lock().pending.contains_key(&id)
    }

    /// Number of pending timers.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.shared.state.lock().pending.len()
    }

    /// Drop every pending timer, stop the worker and join it.
    pub fn shutdown(&self) {
        {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
            state.pending.clear();
            state.heap.clear();
        }
        self.shared.changed.notify_all();

        if thread::current().id() == self.worker_id {
            return;
        }
        if let Some(worker) = self.worker.lock().take()
            && worker.join().is_err()
        {
            warn!("timer worker panicked");
        }
    }

    fn worker_main(shared: &Shared, callback: &ReleaseCallback) {
        debug!("timer worker started");
        let mut state = shared.state.lock();
        loop {
            if state.shutdown {
                break;
            }
            match state.next_due() {
                None => shared.changed.wait(&mut state),
                Some((deadline, id)) => {
                    if deadline > Instant::now() {
                        // Woken early by a re-arm, a cancel or a spurious wake: re-evaluate.
                        shared.changed.wait_until(&mut state, deadline);
                        continue;
                    }
                    state.take(id);
                    state.in_flight = Some(id);
                    MutexGuard::unlocked(&mut state, || callback(id));
                    state.in_flight = None;
                    shared.idle.notify_all();
                }
            }
        }
        debug!("timer worker stopped");
    }
}

impl Drop for TimerService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for TimerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerService")
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}
