//! Registry of admitted tasks.
//!
//! The registry is the blocking exclusive region of the scheduler: admission,
//! insertion and removal all happen while it is held. It is never entered from
//! a timer callback. Entry is bounded by a timeout so a stuck holder surfaces
//! as [`SchedError::LockUnavailable`] instead of hanging the caller.

use parking_lot::{Mutex, MutexGuard};
use std::time::Duration;

use crate::error::{SchedError, SchedResult};
use crate::task::{ExecHandle, TaskId, TaskInfo};

/// A registered task as the registry sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryEntry {
    /// Registration parameters.
    pub info: TaskInfo,
    /// Handle resolved at registration.
    pub handle: ExecHandle,
}

/// Registration-ordered set of admitted tasks.
#[derive(Debug)]
pub struct Registry {
    entries: Mutex<Vec<RegistryEntry>>,
    lock_timeout: Duration,
}

impl Registry {
    /// Create an empty registry whose lock is waited on for at most `lock_timeout`.
    #[must_use]
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            lock_timeout,
        }
    }

    /// Enter the exclusive region.
    ///
    /// # Errors
    ///
    /// Returns [`SchedError::LockUnavailable`] if the region could not be
    /// entered within the lock timeout.
    pub fn enter(&self) -> SchedResult<RegistryGuard<'_>> {
        self.entries
            .try_lock_for(self.lock_timeout)
            .map(|entries| RegistryGuard { entries })
            .ok_or(SchedError::LockUnavailable)
    }

    /// Add an entry.
    ///
    /// # Errors
    ///
    /// Returns [`SchedError::AlreadyRegistered`] for a live id, or
    /// [`SchedError::LockUnavailable`].
    pub fn register(&self, entry: RegistryEntry) -> SchedResult<()> {
        self.enter()?.insert(entry)
    }

    /// Remove an entry.
    ///
    /// # Errors
    ///
    /// Returns [`SchedError::NotFound`] or [`SchedError::LockUnavailable`].
    pub fn deregister(&self, id: TaskId) -> SchedResult<RegistryEntry> {
        self.enter()?.remove(id)
    }

    /// Look up an entry.
    ///
    /// # Errors
    ///
    /// Returns [`SchedError::NotFound`] or [`SchedError::LockUnavailable`].
    pub fn find(&self, id: TaskId) -> SchedResult<RegistryEntry> {
        self.enter()?.find(id).ok_or(SchedError::NotFound(id))
    }

    /// Registered tasks in registration order.
    ///
    /// # Errors
    ///
    /// Returns [`SchedError::LockUnavailable`].
    pub fn snapshot(&self) -> SchedResult<Vec<TaskInfo>> {
        Ok(self.enter()?.snapshot())
    }
}

/// Exclusive access to the registry contents.
#[derive(Debug)]
pub struct RegistryGuard<'a> {
    entries: MutexGuard<'a, Vec<RegistryEntry>>,
}

impl RegistryGuard<'_> {
    /// Look up an entry by id.
    #[must_use]
    pub fn find(&self, id: TaskId) -> Option<RegistryEntry> {
        self.entries.iter().find(|e| e.info.task_id == id).copied()
    }

    /// Whether `id` is registered.
    #[must_use]
    pub fn contains(&self, id: TaskId) -> bool {
        self.entries.iter().any(|e| e.info.task_id == id)
    }

    /// Append an entry.
    ///
    /// # Errors
    ///
    /// Returns [`SchedError::AlreadyRegistered`] if the id is live.
    pub fn insert(&mut self, entry: RegistryEntry) -> SchedResult<()> {
        if self.contains(entry.info.task_id) {
            return Err(SchedError::AlreadyRegistered(entry.info.task_id));
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Remove an entry, preserving the order of the rest.
    ///
    /// # Errors
    ///
    /// Returns [`SchedError::NotFound`] if the id is not registered.
    pub fn remove(&mut self, id: TaskId) -> SchedResult<RegistryEntry> {
        let pos = self
            .entries
            .iter()
            .position(|e| e.info.task_id == id)
            .ok_or(SchedError::NotFound(id))?;
        Ok(self.entries.remove(pos))
    }

    /// `(budget, period)` of every registered task, for admission.
    pub fn timings(&self) -> impl Iterator<Item = (Duration, Duration)> + '_ {
        self.entries.iter().map(|e| (e.info.budget, e.info.period))
    }

    /// Registered task ids in registration order.
    pub fn ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.entries.iter().map(|e| e.info.task_id)
    }

    /// Registered tasks in registration order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<TaskInfo> {
        self.entries.iter().map(|e| e.info).collect()
    }

    /// Number of registered tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no task is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn entry(id: u32, period_ms: u64, budget_ms: u64) -> RegistryEntry {
        RegistryEntry {
            info: TaskInfo {
                task_id: TaskId::new(id),
                period: Duration::from_millis(period_ms),
                budget: Duration::from_millis(budget_ms),
            },
            handle: ExecHandle::new(id),
        }
    }

    #[test]
    fn test_register_find_deregister() {
        let registry = Registry::new(Duration::from_millis(50));
        registry.register(entry(1, 100, 20)).unwrap();

        let found = registry.find(TaskId::new(1)).unwrap();
        assert_eq!(found.info.period, Duration::from_millis(100));

        registry.deregister(TaskId::new(1)).unwrap();
        assert_eq!(
            registry.find(TaskId::new(1)),
            Err(SchedError::NotFound(TaskId::new(1)))
        );
    }

    #[test]
    fn test_snapshot_keeps_registration_order() {
        let registry = Registry::new(Duration::from_millis(50));
        registry.register(entry(9, 300, 10)).unwrap();
        registry.register(entry(2, 50, 10)).unwrap();
        registry.register(entry(5, 100, 10)).unwrap();
        registry.deregister(TaskId::new(2)).unwrap();

        let ids: Vec<u32> = registry
            .snapshot()
            .unwrap()
            .iter()
            .map(|t| t.task_id.get())
            .collect();
        assert_eq!(ids, vec![9, 5]);
    }

    #[test]
    fn test_duplicate_rejected() {
        let registry = Registry::new(Duration::from_millis(50));
        registry.register(entry(1, 100, 20)).unwrap();
        assert_eq!(
            registry.register(entry(1, 200, 20)),
            Err(SchedError::AlreadyRegistered(TaskId::new(1)))
        );
        assert_eq!(registry.snapshot().unwrap().len(), 1);
    }

    #[test]
    fn test_deregister_unknown_twice() {
        let registry = Registry::new(Duration::from_millis(50));
        registry.register(entry(1, 100, 20)).unwrap();
        for _ in 0..2 {
            assert_eq!(
                registry.deregister(TaskId::new(99)),
                Err(SchedError::NotFound(TaskId::new(99)))
            );
        }
        assert_eq!(registry.snapshot().unwrap().len(), 1);
    }

    #[test]
    fn test_lock_unavailable_when_held() {
        let registry = Arc::new(Registry::new(Duration::from_millis(10)));
        let guard = registry.enter().unwrap();

        let contender = Arc::clone(&registry);
        let result = thread::spawn(move || contender.find(TaskId::new(1)).err())
            .join()
            .unwrap();
        assert_eq!(result, Some(SchedError::LockUnavailable));
        drop(guard);
    }
}
