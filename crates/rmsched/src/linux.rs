//! Linux-specific platform implementation.

use libc::{SCHED_FIFO, SCHED_OTHER, SCHED_RR, c_int, pid_t, sched_param, sched_setscheduler};
use std::path::PathBuf;

use crate::error::{SchedError, SchedResult};
use crate::priority::{PriorityController, SchedClass};
use crate::resolver::HandleResolver;
use crate::task::{ExecHandle, TaskId};

/// Priority controller backed by `sched_setscheduler(2)`.
///
/// Raising a process into a real-time class needs `CAP_SYS_NICE`; without it
/// every elevation fails with `EPERM`, which the scheduler logs and tolerates.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformPriorityController;

impl PlatformPriorityController {
    /// Create the controller.
    pub fn new() -> Self {
        Self
    }

    fn set_scheduler(handle: ExecHandle, policy: c_int, level: i32) -> SchedResult {
        let pid = pid_t::try_from(handle.raw())
            .map_err(|_| SchedError::priority_change(handle, "handle outside pid range"))?;
        let param = sched_param {
            sched_priority: level,
        };

        // SAFETY: `param` is initialized and outlives the call; the kernel
        // copies it and does not retain the pointer.
        let rc = unsafe { sched_setscheduler(pid, policy, &param) };
        if rc != 0 {
            return Err(SchedError::priority_change(
                handle,
                std::io::Error::last_os_error().to_string(),
            ));
        }
        Ok(())
    }
}

impl PriorityController for PlatformPriorityController {
    fn elevate(&self, handle: ExecHandle, class: SchedClass, level: i32) -> SchedResult {
        let policy = match class {
            SchedClass::Fifo => SCHED_FIFO,
            SchedClass::RoundRobin => SCHED_RR,
            SchedClass::Normal => return Self::set_scheduler(handle, SCHED_OTHER, 0),
        };
        Self::set_scheduler(handle, policy, level)
    }

    fn reset(&self, handle: ExecHandle) -> SchedResult {
        Self::set_scheduler(handle, SCHED_OTHER, 0)
    }
}

/// Resolver that treats a task id as a pid and checks `/proc/<pid>`.
#[derive(Debug, Clone)]
pub struct PlatformResolver {
    proc_root: PathBuf,
}

impl PlatformResolver {
    /// Resolve against the live `/proc`.
    pub fn new() -> Self {
        Self::with_proc_root("/proc")
    }

    /// Resolve against an alternate procfs mount.
    pub fn with_proc_root(root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: root.into(),
        }
    }
}

impl Default for PlatformResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleResolver for PlatformResolver {
    fn resolve(&self, id: TaskId) -> Option<ExecHandle> {
        if id.get() == 0 {
            return None;
        }
        self.proc_root
            .join(id.get().to_string())
            .is_dir()
            .then(|| ExecHandle::new(id.get()))
    }
}
