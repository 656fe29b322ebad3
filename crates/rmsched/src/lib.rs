//! Rate-monotonic scheduling of periodic tasks.
//!
//! Tasks register a period and a per-period compute budget. Admission control
//! keeps total utilization under the rate-monotonic bound (693‰ by default,
//! roughly ln 2). Admitted tasks are released once per period by a timer
//! thread, and a dispatcher thread hands the single running slot to the ready
//! task with the shortest period, raising its OS priority while it runs.
//!
//! - **Admission**: integer permille utilization test on registration
//! - **Registry**: registered tasks behind a timed lock
//! - **ReadyQueue**: released tasks ordered by period
//! - **TimerService**: one-shot release timers with synchronous cancellation
//! - **Dispatcher**: single loop owning the running slot, with preemption
//! - **Yield protocol**: a task ends its job and sleeps until its next release
//!
//! # Task lifecycle
//!
//! ```text
//! register ──▶ Sleeping ──release──▶ Ready ──dispatch──▶ Running
//!                 ▲                    ▲                    │
//!                 │                    └────preempt─────────┤
//!                 └─────────────────yield───────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use rmsched::prelude::*;
//! use std::time::Duration;
//!
//! let scheduler = RmScheduler::with_platform(SchedulerConfig::default())?;
//! scheduler.start()?;
//!
//! let me = TaskId::new(std::process::id());
//! scheduler.register(me, Duration::from_millis(100), Duration::from_millis(20))?;
//! loop {
//!     scheduler.yield_current(me)?;
//!     // Work for at most 20ms.
//! }
//! # Ok::<(), rmsched::SchedError>(())
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]
#![deny(static_mut_refs)]
#![deny(unused_must_use)]

pub mod admission;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod priority;
pub mod ready_queue;
pub mod registry;
pub mod resolver;
pub mod scheduler;
pub mod task;
pub mod timer;
pub mod yield_protocol;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(not(target_os = "linux"))]
mod fallback;

pub mod prelude;

pub use admission::{
    AdmissionController, AdmissionDecision, DEFAULT_UTILIZATION_BOUND_PERMILLE, can_admit,
    utilization_permille,
};
pub use config::{SchedulerConfig, SchedulerConfigBuilder};
pub use dispatcher::Wake;
pub use error::{SchedError, SchedResult};
pub use priority::{
    MAX_RT_PRIORITY, NoopPriorityController, PriorityController, PriorityEvent,
    RecordingPriorityController, SchedClass,
};
pub use ready_queue::ReadyQueue;
pub use registry::{Registry, RegistryEntry, RegistryGuard};
pub use resolver::{HandleResolver, StaticResolver};
pub use scheduler::RmScheduler;
pub use task::{ExecHandle, PeriodicTask, TaskId, TaskInfo, TaskState};
pub use timer::{ReleaseCallback, TimerService};
pub use yield_protocol::YieldOutcome;

#[cfg(target_os = "linux")]
pub use linux::{PlatformPriorityController, PlatformResolver};

#[cfg(not(target_os = "linux"))]
pub use fallback::{PlatformPriorityController, PlatformResolver};
