//! The scheduler context tying registry, timers and dispatcher together.

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::admission::AdmissionController;
use crate::config::SchedulerConfig;
use crate::dispatcher::{Dispatcher, ReleaseOutcome, SharedRun, Wake, signal};
use crate::error::{SchedError, SchedResult};
use crate::priority::PriorityController;
use crate::registry::{Registry, RegistryEntry};
use crate::resolver::HandleResolver;
use crate::task::{PeriodicTask, TaskId, TaskInfo, TaskState};
use crate::timer::{ReleaseCallback, TimerService};
use crate::yield_protocol::YieldOutcome;

/// Rate-monotonic scheduler instance.
///
/// Each instance owns its registry, ready queue, release timer thread and
/// (once started) dispatcher thread. All operations take `&self`, so an
/// instance is typically shared behind an `Arc` between the threads that
/// register, yield and deregister.
///
/// # Example
///
/// ```no_run
/// use rmsched::prelude::*;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let resolver = Arc::new(StaticResolver::with_ids([7]));
/// let scheduler = RmScheduler::new(
///     SchedulerConfig::default(),
///     resolver,
///     NoopPriorityController,
/// )?;
/// scheduler.start()?;
///
/// let task = TaskId::new(7);
/// scheduler.register(task, Duration::from_millis(100), Duration::from_millis(20))?;
/// loop {
///     scheduler.yield_current(task)?;
///     // One period's worth of work.
/// }
/// # Ok::<(), rmsched::SchedError>(())
/// ```
pub struct RmScheduler {
    config: SchedulerConfig,
    admission: AdmissionController,
    registry: Registry,
    run: Arc<SharedRun>,
    timers: TimerService,
    wake_tx: Sender<Wake>,
    wake_rx: Receiver<Wake>,
    stop: Arc<AtomicBool>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    resolver: Arc<dyn HandleResolver>,
    priority: Arc<dyn PriorityController>,
}

impl RmScheduler {
    /// Create a scheduler and spawn its release timer thread.
    ///
    /// The dispatcher does not run until [`start`](Self::start) is called;
    /// releases that happen before then queue up and are evaluated on start.
    ///
    /// # Errors
    ///
    /// Returns [`SchedError::InvalidConfig`] for an invalid configuration or
    /// [`SchedError::SpawnFailed`] if the timer thread cannot be created.
    pub fn new<R, P>(config: SchedulerConfig, resolver: R, priority: P) -> SchedResult<Self>
    where
        R: HandleResolver + 'static,
        P: PriorityController + 'static,
    {
        config.validate()?;

        let run = Arc::new(SharedRun::default());
        let (wake_tx, wake_rx) = channel::bounded(config.wake_capacity);

        let callback: ReleaseCallback = {
            let run = Arc::clone(&run);
            let wake_tx = wake_tx.clone();
            Arc::new(move |id| release_task(&run, &wake_tx, id))
        };
        let timers = TimerService::spawn(&config.timer_thread_name, callback)?;

        Ok(Self {
            admission: AdmissionController::new(config.utilization_bound_permille),
            registry: Registry::new(config.lock_timeout),
            run,
            timers,
            wake_tx,
            wake_rx,
            stop: Arc::new(AtomicBool::new(false)),
            dispatcher: Mutex::new(None),
            resolver: Arc::new(resolver),
            priority: Arc::new(priority),
            config,
        })
    }

    /// Create a scheduler using the platform resolver and priority controller.
    ///
    /// # Errors
    ///
    /// See [`new`](Self::new).
    pub fn with_platform(config: SchedulerConfig) -> SchedResult<Self> {
        Self::new(
            config,
            crate::PlatformResolver::new(),
            crate::PlatformPriorityController::new(),
        )
    }

    /// Spawn the dispatcher thread.
    ///
    /// # Errors
    ///
    /// Returns [`SchedError::Stopped`] after [`stop`](Self::stop), or
    /// [`SchedError::SpawnFailed`].
    pub fn start(&self) -> SchedResult<()> {
        if self.stop.load(Ordering::Acquire) {
            return Err(SchedError::Stopped);
        }
        let mut slot = self.dispatcher.lock();
        if slot.is_some() {
            return Ok(());
        }

        let dispatcher = Dispatcher {
            run: Arc::clone(&self.run),
            wake_rx: self.wake_rx.clone(),
            stop: Arc::clone(&self.stop),
            priority: Arc::clone(&self.priority),
            rt_class: self.config.rt_class,
            rt_priority: self.config.rt_priority,
        };
        let handle = thread::Builder::new()
            .name(self.config.dispatcher_thread_name.clone())
            .spawn(move || dispatcher.run())
            .map_err(|e| SchedError::SpawnFailed(e.to_string()))?;
        *slot = Some(handle);
        drop(slot);

        signal(&self.wake_tx, Wake::Start);
        info!("scheduler started");
        Ok(())
    }

    /// Whether the dispatcher thread is running.
    pub fn is_running(&self) -> bool {
        self.dispatcher.lock().is_some() && !self.stop.load(Ordering::Acquire)
    }

    /// Stop the dispatcher, drop pending releases and demote the running task.
    ///
    /// Tasks blocked in [`yield_current`](Self::yield_current) or
    /// [`wait_for_dispatch`](Self::wait_for_dispatch) return
    /// [`SchedError::Stopped`]. Stopping is terminal and idempotent.
    pub fn stop(&self) {
        if self.stop.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("stopping scheduler");

        let running = {
            let mut state = self.run.state.lock();
            state.stopped = true;
            let current = state.current.take();
            current.and_then(|id| state.tasks.get(&id).map(|t| t.handle))
        };
        self.run.granted.notify_all();

        signal(&self.wake_tx, Wake::Stop);
        if let Some(handle) = self.dispatcher.lock().take()
            && handle.join().is_err()
        {
            warn!("dispatcher thread panicked");
        }
        self.timers.shutdown();

        if let Some(handle) = running
            && let Err(e) = self.priority.reset(handle)
        {
            warn!("failed to demote {} on stop: {}", handle, e);
        }
        info!("scheduler stopped");
    }

    /// Register a periodic task.
    ///
    /// The task starts Sleeping with its first release armed
    /// `first_release_offset` from now.
    ///
    /// # Errors
    ///
    /// - [`SchedError::InvalidTiming`] for a zero period or budget, or a
    ///   period too long to schedule a release for
    /// - [`SchedError::AlreadyRegistered`] for a live id
    /// - [`SchedError::AdmissionFailed`] if the utilization bound would be exceeded
    /// - [`SchedError::UnknownTaskId`] if the id does not resolve
    /// - [`SchedError::LockUnavailable`] if the registry could not be entered
    pub fn register(&self, id: TaskId, period: Duration, budget: Duration) -> SchedResult<()> {
        if period.is_zero() || budget.is_zero() {
            return Err(SchedError::InvalidTiming { period, budget });
        }
        // Both the first release and the boundary after it must be representable.
        let Some(first_release) = Instant::now()
            .checked_add(self.config.first_release_offset)
            .filter(|release| release.checked_add(period).is_some())
        else {
            warn!("registration for task {} failed: period {:?} out of range", id, period);
            return Err(SchedError::InvalidTiming { period, budget });
        };

        let mut registry = self.registry.enter()?;
        if registry.contains(id) {
            return Err(SchedError::AlreadyRegistered(id));
        }

        let decision = self.admission.evaluate(registry.timings(), budget, period);
        if !decision.admitted() {
            warn!(
                "registration for task {} failed admission control: {}‰ + {}‰ > {}‰",
                id,
                decision.existing_permille,
                decision.requested_permille,
                decision.bound_permille
            );
            return Err(SchedError::AdmissionFailed {
                requested_permille: decision.requested_permille,
                total_permille: decision.existing_permille,
                bound_permille: decision.bound_permille,
            });
        }

        let Some(handle) = self.resolver.resolve(id) else {
            warn!("registration for task {} failed: no live handle", id);
            return Err(SchedError::UnknownTaskId(id));
        };

        registry.insert(RegistryEntry {
            info: TaskInfo {
                task_id: id,
                period,
                budget,
            },
            handle,
        })?;
        self.run.state.lock().tasks.insert(
            id,
            PeriodicTask::new(id, handle, period, budget, first_release),
        );
        self.timers.arm_at(id, first_release);

        info!(
            "registered task {} with P={:?} C={:?} ({}‰ total)",
            id,
            period,
            budget,
            decision.total_permille()
        );
        Ok(())
    }

    /// Remove a task from every structure and cancel its release timer.
    ///
    /// If the task held the running slot it is demoted and the dispatcher is
    /// woken to fill the slot. A blocked yield for the task returns
    /// [`SchedError::NotFound`].
    ///
    /// # Errors
    ///
    /// Returns [`SchedError::NotFound`] or [`SchedError::LockUnavailable`].
    pub fn deregister(&self, id: TaskId) -> SchedResult<()> {
        let mut registry = self.registry.enter()?;
        if !registry.contains(id) {
            info!("deregistration for task {} ignored: not registered", id);
            return Err(SchedError::NotFound(id));
        }

        self.timers.cancel_sync(id);
        let (record, was_running) = {
            let mut state = self.run.state.lock();
            state.ready.remove(id);
            let was_running = state.current == Some(id);
            if was_running {
                state.current = None;
            }
            (state.tasks.remove(&id), was_running)
        };
        self.run.granted.notify_all();
        let entry = registry.remove(id)?;
        drop(registry);

        if was_running && let Err(e) = self.priority.reset(entry.handle) {
            warn!("failed to demote deregistered task {}: {}", id, e);
        }
        if record.is_none() {
            debug!("task {} had no scheduling record", id);
        }
        signal(&self.wake_tx, Wake::Deregistered(id));
        info!("deregistered task {}", id);
        Ok(())
    }

    /// End the caller's current job and block until it is dispatched again.
    ///
    /// # Errors
    ///
    /// - [`SchedError::NotFound`] if the task is not (or no longer) registered
    /// - [`SchedError::Stopped`] if the scheduler stops while waiting
    /// - [`SchedError::LockUnavailable`] if the registry could not be entered
    pub fn yield_current(&self, id: TaskId) -> SchedResult<YieldOutcome> {
        let outcome = self.begin_yield(id)?;
        self.wait_for_dispatch(id)?;
        Ok(outcome)
    }

    /// Perform the state transition of a yield without blocking.
    ///
    /// The task's OS priority is demoted before this returns. Front-ends that
    /// serve many tasks from one thread use this instead of
    /// [`yield_current`](Self::yield_current).
    ///
    /// # Errors
    ///
    /// Returns [`SchedError::NotFound`] or [`SchedError::LockUnavailable`].
    pub fn begin_yield(&self, id: TaskId) -> SchedResult<YieldOutcome> {
        // Held until the timer is armed so a concurrent deregistration either
        // runs first or cancels the timer armed here.
        let registry = self.registry.enter()?;
        if !registry.contains(id) {
            info!("yield for task {} ignored: not registered", id);
            return Err(SchedError::NotFound(id));
        }

        let transition = self.run.state.lock().begin_yield(id, Instant::now())?;

        if let Some(deadline) = transition.arm_at {
            self.timers.arm_at(id, deadline);
        }
        drop(registry);

        if transition.freed_slot
            && let Err(e) = self.priority.reset(transition.handle)
        {
            warn!("failed to demote yielding task {}: {}", id, e);
        }
        if !matches!(transition.outcome, YieldOutcome::NotRunning(_)) {
            signal(&self.wake_tx, Wake::Yielded(id));
        }

        debug!("task {} yielded: {:?}", id, transition.outcome);
        Ok(transition.outcome)
    }

    /// Block until `id` holds the running slot with its priority raised.
    ///
    /// # Errors
    ///
    /// Returns [`SchedError::NotFound`] if the task is deregistered while
    /// waiting, or [`SchedError::Stopped`] if the scheduler stops.
    pub fn wait_for_dispatch(&self, id: TaskId) -> SchedResult<()> {
        let mut state = self.run.state.lock();
        loop {
            if state.stopped {
                return Err(SchedError::Stopped);
            }
            match state.tasks.get(&id) {
                None => return Err(SchedError::NotFound(id)),
                Some(task) if task.state == TaskState::Running && task.resumed => return Ok(()),
                Some(_) => self.run.granted.wait(&mut state),
            }
        }
    }

    /// Like [`wait_for_dispatch`](Self::wait_for_dispatch) but gives up after `timeout`.
    ///
    /// Returns `Ok(false)` on timeout.
    ///
    /// # Errors
    ///
    /// See [`wait_for_dispatch`](Self::wait_for_dispatch).
    pub fn wait_for_dispatch_timeout(&self, id: TaskId, timeout: Duration) -> SchedResult<bool> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self.wait_for_dispatch(id).map(|()| true);
        };
        let mut state = self.run.state.lock();
        loop {
            if state.stopped {
                return Err(SchedError::Stopped);
            }
            match state.tasks.get(&id) {
                None => return Err(SchedError::NotFound(id)),
                Some(task) if task.state == TaskState::Running && task.resumed => {
                    return Ok(true);
                }
                Some(_) => {
                    if self
                        .run
                        .granted
                        .wait_until(&mut state, deadline)
                        .timed_out()
                    {
                        return Ok(false);
                    }
                }
            }
        }
    }

    /// Registration parameters of `id`.
    ///
    /// # Errors
    ///
    /// Returns [`SchedError::NotFound`] or [`SchedError::LockUnavailable`].
    pub fn find(&self, id: TaskId) -> SchedResult<TaskInfo> {
        self.registry.find(id).map(|entry| entry.info)
    }

    /// Registered tasks in registration order.
    ///
    /// # Errors
    ///
    /// Returns [`SchedError::LockUnavailable`].
    pub fn snapshot(&self) -> SchedResult<Vec<TaskInfo>> {
        self.registry.snapshot()
    }

    /// Admitted utilization in permille.
    ///
    /// # Errors
    ///
    /// Returns [`SchedError::LockUnavailable`].
    pub fn utilization_permille(&self) -> SchedResult<u64> {
        let registry = self.registry.enter()?;
        Ok(crate::admission::total_utilization_permille(
            registry.timings(),
        ))
    }

    /// Scheduling state of `id`, if registered.
    pub fn state_of(&self, id: TaskId) -> Option<TaskState> {
        self.run.state.lock().tasks.get(&id).map(|t| t.state)
    }

    /// Next period boundary of `id`, if registered.
    pub fn next_release_of(&self, id: TaskId) -> Option<Instant> {
        self.run.state.lock().tasks.get(&id).map(|t| t.next_release)
    }

    /// Deadline of the pending release timer for `id`, if armed.
    pub fn release_timer_deadline(&self, id: TaskId) -> Option<Instant> {
        self.timers.deadline_of(id)
    }

    /// Task holding the running slot.
    pub fn current(&self) -> Option<TaskId> {
        self.run.state.lock().current
    }

    /// Ready tasks in dispatch order.
    pub fn ready_tasks(&self) -> Vec<TaskId> {
        self.run.state.lock().ready.iter().collect()
    }

    /// Number of tasks in the Running state.
    pub fn running_count(&self) -> usize {
        self.run.state.lock().running_count()
    }

    /// The active configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Release `id` now, exactly as its timer would.
    #[cfg(test)]
    pub(crate) fn release_now(&self, id: TaskId) {
        release_task(&self.run, &self.wake_tx, id);
    }

    /// Run one dispatcher evaluation on the calling thread.
    #[cfg(test)]
    pub(crate) fn dispatch_once(&self) {
        let dispatcher = Dispatcher {
            run: Arc::clone(&self.run),
            wake_rx: self.wake_rx.clone(),
            stop: Arc::clone(&self.stop),
            priority: Arc::clone(&self.priority),
            rt_class: self.config.rt_class,
            rt_priority: self.config.rt_priority,
        };
        let decision = self.run.state.lock().evaluate();
        dispatcher.apply(decision);
    }
}

impl Drop for RmScheduler {
    fn drop(&mut self) {
        if !self.stop.load(Ordering::Acquire) {
            debug!("scheduler dropped while running - stopping");
            self.stop();
        }
    }
}

impl std::fmt::Debug for RmScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RmScheduler")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

/// Timer callback: move a sleeping task to Ready and wake the dispatcher.
/// Runs on the timer thread and never touches the registry.
fn release_task(run: &SharedRun, wake_tx: &Sender<Wake>, id: TaskId) {
    let outcome = run.state.lock().release(id);
    match outcome {
        ReleaseOutcome::Released => {
            debug!("task {} released", id);
            signal(wake_tx, Wake::Released(id));
        }
        ReleaseOutcome::Unknown => debug!("release for unregistered task {} ignored", id),
        ReleaseOutcome::Ignored(state) => {
            debug!("release for task {} ignored while {}", id, state);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::priority::{PriorityEvent, RecordingPriorityController, SchedClass};
    use crate::resolver::StaticResolver;
    use crate::task::ExecHandle;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn id(v: u32) -> TaskId {
        TaskId::new(v)
    }

    /// Scheduler whose timers never fire on their own during a test.
    fn manual() -> (RmScheduler, Arc<RecordingPriorityController>) {
        let recorder = Arc::new(RecordingPriorityController::new());
        let config = SchedulerConfig::builder()
            .first_release_offset(Duration::from_secs(3600))
            .build()
            .unwrap();
        let scheduler = RmScheduler::new(
            config,
            StaticResolver::with_ids(1..=16),
            Arc::clone(&recorder),
        )
        .unwrap();
        (scheduler, recorder)
    }

    #[test]
    fn test_register_then_snapshot() {
        let (s, _) = manual();
        s.register(id(1), ms(100), ms(20)).unwrap();

        assert_eq!(
            s.snapshot().unwrap(),
            vec![TaskInfo {
                task_id: id(1),
                period: ms(100),
                budget: ms(20)
            }]
        );
        assert_eq!(s.state_of(id(1)), Some(TaskState::Sleeping));
        assert!(s.release_timer_deadline(id(1)).is_some());

        s.deregister(id(1)).unwrap();
        assert!(s.snapshot().unwrap().is_empty());
        assert_eq!(s.state_of(id(1)), None);
        assert_eq!(s.release_timer_deadline(id(1)), None);
    }

    #[test]
    fn test_admission_rejects_without_side_effects() {
        let (s, _) = manual();
        s.register(id(1), ms(100), ms(20)).unwrap();

        let err = s.register(id(2), ms(50), ms(40)).unwrap_err();
        assert_eq!(
            err,
            SchedError::AdmissionFailed {
                requested_permille: 800,
                total_permille: 200,
                bound_permille: 693
            }
        );
        assert_eq!(s.snapshot().unwrap().len(), 1);
        assert_eq!(s.state_of(id(2)), None);
        assert_eq!(s.utilization_permille().unwrap(), 200);
    }

    #[test]
    fn test_unresolvable_id_rejected() {
        let (s, _) = manual();
        assert_eq!(
            s.register(id(99), ms(100), ms(10)),
            Err(SchedError::UnknownTaskId(id(99)))
        );
        assert!(s.snapshot().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_timing_and_duplicates() {
        let (s, _) = manual();
        assert!(matches!(
            s.register(id(1), Duration::ZERO, ms(1)),
            Err(SchedError::InvalidTiming { .. })
        ));
        s.register(id(1), ms(100), ms(10)).unwrap();
        assert_eq!(
            s.register(id(1), ms(200), ms(10)),
            Err(SchedError::AlreadyRegistered(id(1)))
        );
    }

    #[test]
    fn test_unschedulable_period_rejected() {
        let (s, _) = manual();
        for period in [Duration::from_secs(u64::MAX), Duration::MAX] {
            assert_eq!(
                s.register(id(1), period, ms(1)),
                Err(SchedError::InvalidTiming {
                    period,
                    budget: ms(1)
                })
            );
        }
        assert!(s.snapshot().unwrap().is_empty());
        assert_eq!(s.state_of(id(1)), None);
        assert_eq!(s.release_timer_deadline(id(1)), None);

        // Dispatch is unaffected.
        s.register(id(2), ms(50), ms(10)).unwrap();
        s.release_now(id(2));
        s.dispatch_once();
        assert_eq!(s.current(), Some(id(2)));
    }

    #[test]
    fn test_wait_with_unbounded_timeout() {
        let (s, _) = manual();
        s.register(id(1), ms(100), ms(10)).unwrap();
        s.release_now(id(1));
        s.dispatch_once();

        assert_eq!(s.wait_for_dispatch_timeout(id(1), Duration::MAX), Ok(true));
        assert_eq!(s.wait_for_dispatch_timeout(id(1), ms(1)), Ok(true));
    }

    #[test]
    fn test_yield_racing_deregister_leaves_no_timer() {
        let (s, _) = manual();
        for _ in 0..200 {
            s.register(id(1), ms(100), ms(10)).unwrap();
            s.release_now(id(1));
            s.dispatch_once();

            let (yielded, deregistered) = thread::scope(|scope| {
                let yielder = scope.spawn(|| s.begin_yield(id(1)));
                let remover = scope.spawn(|| s.deregister(id(1)));
                (yielder.join().unwrap(), remover.join().unwrap())
            });

            assert_eq!(deregistered, Ok(()));
            assert!(matches!(
                yielded,
                Ok(YieldOutcome::Sleeping { .. }) | Err(SchedError::NotFound(_))
            ));
            assert_eq!(s.release_timer_deadline(id(1)), None);
            assert_eq!(s.state_of(id(1)), None);
        }
    }

    #[test]
    fn test_shorter_period_runs_first() {
        let (s, recorder) = manual();
        s.register(id(1), ms(100), ms(10)).unwrap();
        s.register(id(2), ms(50), ms(10)).unwrap();
        s.release_now(id(1));
        s.release_now(id(2));

        assert_eq!(s.ready_tasks(), vec![id(2), id(1)]);
        s.dispatch_once();

        assert_eq!(s.current(), Some(id(2)));
        assert_eq!(s.state_of(id(1)), Some(TaskState::Ready));
        assert_eq!(s.ready_tasks(), vec![id(1)]);
        assert_eq!(
            recorder.events(),
            vec![PriorityEvent::Elevated {
                handle: ExecHandle::new(2),
                class: SchedClass::Fifo,
                level: 99
            }]
        );
        assert_eq!(s.running_count(), 1);
    }

    #[test]
    fn test_preemption_demotes_then_elevates() {
        let (s, recorder) = manual();
        s.register(id(1), ms(100), ms(10)).unwrap();
        s.register(id(2), ms(50), ms(10)).unwrap();
        s.release_now(id(1));
        s.dispatch_once();
        recorder.clear();

        s.release_now(id(2));
        s.dispatch_once();

        assert_eq!(s.current(), Some(id(2)));
        assert_eq!(s.state_of(id(1)), Some(TaskState::Ready));
        assert_eq!(
            recorder.events(),
            vec![
                PriorityEvent::Reset {
                    handle: ExecHandle::new(1)
                },
                PriorityEvent::Elevated {
                    handle: ExecHandle::new(2),
                    class: SchedClass::Fifo,
                    level: 99
                },
            ]
        );
    }

    #[test]
    fn test_yield_sleeps_and_rearms_timer() {
        let (s, recorder) = manual();
        s.register(id(1), ms(200), ms(10)).unwrap();
        s.release_now(id(1));
        s.dispatch_once();
        let release = s.next_release_of(id(1)).unwrap();

        let outcome = s.begin_yield(id(1)).unwrap();
        assert!(matches!(outcome, YieldOutcome::Sleeping { .. }));
        assert_eq!(s.current(), None);
        assert_eq!(s.state_of(id(1)), Some(TaskState::Sleeping));
        assert_eq!(s.release_timer_deadline(id(1)), Some(release));
        assert!(!recorder.is_elevated(ExecHandle::new(1)));
    }

    #[test]
    fn test_deregister_running_task_frees_slot() {
        let (s, recorder) = manual();
        s.register(id(1), ms(100), ms(10)).unwrap();
        s.release_now(id(1));
        s.dispatch_once();
        assert!(recorder.is_elevated(ExecHandle::new(1)));

        s.deregister(id(1)).unwrap();
        assert_eq!(s.current(), None);
        assert!(!recorder.is_elevated(ExecHandle::new(1)));
        assert_eq!(s.wait_for_dispatch(id(1)), Err(SchedError::NotFound(id(1))));
    }

    #[test]
    fn test_unknown_ids_are_not_found() {
        let (s, _) = manual();
        s.register(id(1), ms(100), ms(10)).unwrap();
        for _ in 0..2 {
            assert_eq!(s.deregister(id(9)), Err(SchedError::NotFound(id(9))));
        }
        assert_eq!(s.begin_yield(id(9)), Err(SchedError::NotFound(id(9))));
        assert_eq!(s.find(id(9)), Err(SchedError::NotFound(id(9))));
        assert_eq!(s.snapshot().unwrap().len(), 1);
    }

    #[test]
    fn test_release_after_deregister_is_swallowed() {
        let (s, _) = manual();
        s.register(id(1), ms(100), ms(10)).unwrap();
        s.deregister(id(1)).unwrap();
        s.release_now(id(1));
        assert!(s.ready_tasks().is_empty());
    }

    #[test]
    fn test_stop_releases_waiters_and_is_terminal() {
        let (s, recorder) = manual();
        s.register(id(1), ms(100), ms(10)).unwrap();
        s.release_now(id(1));
        s.dispatch_once();

        s.stop();
        assert_eq!(s.wait_for_dispatch(id(1)), Err(SchedError::Stopped));
        assert!(!recorder.is_elevated(ExecHandle::new(1)));
        assert_eq!(s.start(), Err(SchedError::Stopped));
        s.stop();
    }
}
