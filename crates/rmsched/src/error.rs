//! Error types for the scheduler crate.

use std::time::Duration;

use thiserror::Error;

use crate::task::{ExecHandle, TaskId};

/// Errors returned by scheduler operations.
///
/// None of these are fatal to the scheduler itself: every variant describes a
/// single rejected or aborted request and leaves shared state untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedError {
    /// Admitting the candidate would push utilization past the bound.
    #[error(
        "admission failed: requested {requested_permille}‰ on top of {total_permille}‰ exceeds bound {bound_permille}‰"
    )]
    AdmissionFailed {
        /// Utilization of the candidate task alone.
        requested_permille: u64,
        /// Utilization already admitted.
        total_permille: u64,
        /// Configured admission bound.
        bound_permille: u64,
    },

    /// The task id does not resolve to a live execution handle.
    #[error("task {0} does not resolve to a live execution handle")]
    UnknownTaskId(TaskId),

    /// The task id is not registered.
    #[error("task {0} is not registered")]
    NotFound(TaskId),

    /// The task id is already registered.
    #[error("task {0} is already registered")]
    AlreadyRegistered(TaskId),

    /// Period or budget is zero.
    #[error("invalid timing: period {period:?}, budget {budget:?}")]
    InvalidTiming {
        /// Requested period.
        period: Duration,
        /// Requested budget.
        budget: Duration,
    },

    /// The registry could not be entered within the configured timeout.
    #[error("registry lock unavailable")]
    LockUnavailable,

    /// Invalid configuration provided.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The scheduler was stopped while the caller was waiting.
    #[error("scheduler stopped")]
    Stopped,

    /// A worker thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    SpawnFailed(String),

    /// The OS refused a scheduling priority change.
    #[error("priority change for {handle} failed: {reason}")]
    PriorityChange {
        /// Handle whose priority was being changed.
        handle: ExecHandle,
        /// OS-reported reason.
        reason: String,
    },
}

impl SchedError {
    /// Create a priority change error.
    #[must_use]
    pub fn priority_change(handle: ExecHandle, reason: impl Into<String>) -> Self {
        Self::PriorityChange {
            handle,
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig(reason.into())
    }

    /// Whether retrying the same request later may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LockUnavailable | Self::SpawnFailed(_))
    }

    /// Whether the request was turned away before any state was created.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::AdmissionFailed { .. }
                | Self::UnknownTaskId(_)
                | Self::AlreadyRegistered(_)
                | Self::InvalidTiming { .. }
        )
    }
}

/// A specialized `Result` type for scheduler operations.
pub type SchedResult<T = ()> = Result<T, SchedError>;
