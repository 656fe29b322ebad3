//! OS scheduling priority control.
//!
//! The dispatcher never touches the OS directly; it elevates and demotes
//! tasks through a [`PriorityController`]. The platform controller lives in
//! the Linux/fallback modules, and [`RecordingPriorityController`] records
//! every call for tests and dry runs.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SchedResult;
use crate::task::ExecHandle;

/// Highest user real-time priority level on Linux (`MAX_USER_RT_PRIO - 1`).
pub const MAX_RT_PRIORITY: i32 = 99;

/// OS scheduling class a handle can be moved into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchedClass {
    /// First-in first-out real-time class.
    Fifo,
    /// Round-robin real-time class.
    RoundRobin,
    /// The OS default time-sharing class.
    Normal,
}

impl fmt::Display for SchedClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedClass::Fifo => write!(f, "SCHED_FIFO"),
            SchedClass::RoundRobin => write!(f, "SCHED_RR"),
            SchedClass::Normal => write!(f, "SCHED_OTHER"),
        }
    }
}

/// Capability to change the OS scheduling priority of an execution handle.
pub trait PriorityController: Send + Sync {
    /// Move `handle` into `class` at `level`.
    ///
    /// # Errors
    ///
    /// Returns [`SchedError::PriorityChange`](crate::SchedError::PriorityChange)
    /// if the OS refuses the change.
    fn elevate(&self, handle: ExecHandle, class: SchedClass, level: i32) -> SchedResult;

    /// Return `handle` to the default class.
    ///
    /// # Errors
    ///
    /// Returns [`SchedError::PriorityChange`](crate::SchedError::PriorityChange)
    /// if the OS refuses the change.
    fn reset(&self, handle: ExecHandle) -> SchedResult;
}

/// Controller that accepts every request and does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPriorityController;

impl PriorityController for NoopPriorityController {
    fn elevate(&self, _handle: ExecHandle, _class: SchedClass, _level: i32) -> SchedResult {
        Ok(())
    }

    fn reset(&self, _handle: ExecHandle) -> SchedResult {
        Ok(())
    }
}

/// A priority change observed by [`RecordingPriorityController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityEvent {
    /// `elevate` was called.
    Elevated {
        /// Target handle.
        handle: ExecHandle,
        /// Requested class.
        class: SchedClass,
        /// Requested level.
        level: i32,
    },
    /// `reset` was called.
    Reset {
        /// Target handle.
        handle: ExecHandle,
    },
}

impl PriorityEvent {
    /// Handle the event applies to.
    #[must_use]
    pub fn handle(&self) -> ExecHandle {
        match self {
            PriorityEvent::Elevated { handle, .. } | PriorityEvent::Reset { handle } => *handle,
        }
    }
}

/// Controller that records every call and tracks which handles are elevated.
#[derive(Debug, Default)]
pub struct RecordingPriorityController {
    events: Mutex<Vec<PriorityEvent>>,
}

impl RecordingPriorityController {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call so far, in order.
    #[must_use]
    pub fn events(&self) -> Vec<PriorityEvent> {
        self.events.lock().clone()
    }

    /// Forget recorded calls.
    pub fn clear(&self) {
        self.events.lock().clear();
    }

    /// Handles whose most recent event is an elevation.
    #[must_use]
    pub fn elevated(&self) -> Vec<ExecHandle> {
        let events = self.events.lock();
        let mut elevated: Vec<ExecHandle> = Vec::new();
        for event in events.iter() {
            match event {
                PriorityEvent::Elevated { handle, .. } => {
                    if !elevated.contains(handle) {
                        elevated.push(*handle);
                    }
                }
                PriorityEvent::Reset { handle } => elevated.retain(|h| h != handle),
            }
        }
        elevated
    }

    /// Whether `handle` is currently elevated.
    #[must_use]
    pub fn is_elevated(&self, handle: ExecHandle) -> bool {
        self.elevated().contains(&handle)
    }
}

impl PriorityController for RecordingPriorityController {
    fn elevate(&self, handle: ExecHandle, class: SchedClass, level: i32) -> SchedResult {
        self.events.lock().push(PriorityEvent::Elevated {
            handle,
            class,
            level,
        });
        Ok(())
    }

    fn reset(&self, handle: ExecHandle) -> SchedResult {
        self.events.lock().push(PriorityEvent::Reset { handle });
        Ok(())
    }
}

impl<T: PriorityController + ?Sized> PriorityController for std::sync::Arc<T> {
    fn elevate(&self, handle: ExecHandle, class: SchedClass, level: i32) -> SchedResult {
        (**self).elevate(handle, class, level)
    }

    fn reset(&self, handle: ExecHandle) -> SchedResult {
        (**self).reset(handle)
    }
}
