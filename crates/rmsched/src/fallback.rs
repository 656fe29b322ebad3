//! Fallback platform implementation for non-Linux systems.

use tracing::debug;

use crate::error::SchedResult;
use crate::priority::{PriorityController, SchedClass};
use crate::resolver::HandleResolver;
use crate::task::{ExecHandle, TaskId};

/// Priority controller that only logs; no OS priority change is made.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformPriorityController;

impl PlatformPriorityController {
    /// Create the controller.
    pub fn new() -> Self {
        Self
    }
}

impl PriorityController for PlatformPriorityController {
    fn elevate(&self, handle: ExecHandle, class: SchedClass, level: i32) -> SchedResult {
        debug!("priority elevation for {} to {} {} not supported", handle, class, level);
        Ok(())
    }

    fn reset(&self, handle: ExecHandle) -> SchedResult {
        debug!("priority reset for {} not supported", handle);
        Ok(())
    }
}

/// Resolver that maps every non-zero id to a handle of the same value.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformResolver;

impl PlatformResolver {
    /// Create the resolver.
    pub fn new() -> Self {
        Self
    }
}

impl HandleResolver for PlatformResolver {
    fn resolve(&self, id: TaskId) -> Option<ExecHandle> {
        (id.get() != 0).then(|| ExecHandle::new(id.get()))
    }
}
