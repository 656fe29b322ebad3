//! Task id to execution handle resolution.

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::task::{ExecHandle, TaskId};

/// Capability to resolve a task id to a live execution handle.
pub trait HandleResolver: Send + Sync {
    /// Handle for `id`, or `None` if nothing live answers to it.
    fn resolve(&self, id: TaskId) -> Option<ExecHandle>;
}

impl<T: HandleResolver + ?Sized> HandleResolver for std::sync::Arc<T> {
    fn resolve(&self, id: TaskId) -> Option<ExecHandle> {
        (**self).resolve(id)
    }
}

/// In-memory resolver with an explicit id → handle table.
///
/// Useful for embedding the scheduler around in-process workers and for tests.
#[derive(Debug, Default)]
pub struct StaticResolver {
    table: RwLock<HashMap<TaskId, ExecHandle>>,
}

impl StaticResolver {
    /// Empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver where each listed id maps to a handle of the same raw value.
    pub fn with_ids<I>(ids: I) -> Self
    where
        I: IntoIterator<Item = u32>,
    {
        let resolver = Self::new();
        for raw in ids {
            resolver.insert(TaskId::new(raw), ExecHandle::new(raw));
        }
        resolver
    }

    /// Make `id` resolvable.
    pub fn insert(&self, id: TaskId, handle: ExecHandle) {
        self.table.write().insert(id, handle);
    }

    /// Make `id` unresolvable.
    pub fn remove(&self, id: TaskId) -> Option<ExecHandle> {
        self.table.write().remove(&id)
    }
}

impl HandleResolver for StaticResolver {
    fn resolve(&self, id: TaskId) -> Option<ExecHandle> {
        self.table.read().get(&id).copied()
    }
}
