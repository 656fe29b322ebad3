//! Prelude module for common scheduler types.
//!
//! This module provides a convenient way to import the most commonly used
//! types from the scheduler crate.

pub use crate::config::SchedulerConfig;
pub use crate::error::{SchedError, SchedResult};
pub use crate::priority::{NoopPriorityController, PriorityController, SchedClass};
pub use crate::resolver::{HandleResolver, StaticResolver};
pub use crate::scheduler::RmScheduler;
pub use crate::task::{ExecHandle, TaskId, TaskInfo, TaskState};
pub use crate::yield_protocol::YieldOutcome;
pub use crate::{PlatformPriorityController, PlatformResolver};
