//! Scheduler configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::admission::DEFAULT_UTILIZATION_BOUND_PERMILLE;
use crate::error::{SchedError, SchedResult};
use crate::priority::{MAX_RT_PRIORITY, SchedClass};

/// Longest accepted delay between registration and first release.
pub const MAX_FIRST_RELEASE_OFFSET: Duration = Duration::from_secs(24 * 60 * 60);

/// Longest accepted registry lock timeout.
pub const MAX_LOCK_TIMEOUT: Duration = Duration::from_secs(60);

/// Tunables for an [`RmScheduler`](crate::RmScheduler) instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Admission bound on total utilization, in permille.
    pub utilization_bound_permille: u64,
    /// OS class a dispatched task is elevated into.
    pub rt_class: SchedClass,
    /// OS priority level a dispatched task is elevated to.
    pub rt_priority: i32,
    /// Longest wait to enter the registry before giving up.
    pub lock_timeout: Duration,
    /// Capacity of the dispatcher wake channel.
    pub wake_capacity: usize,
    /// Delay between registration and the first release.
    pub first_release_offset: Duration,
    /// Name of the dispatcher thread.
    pub dispatcher_thread_name: String,
    /// Name of the release timer thread.
    pub timer_thread_name: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            utilization_bound_permille: DEFAULT_UTILIZATION_BOUND_PERMILLE,
            rt_class: SchedClass::Fifo,
            rt_priority: MAX_RT_PRIORITY,
            lock_timeout: Duration::from_millis(100),
            wake_capacity: 64,
            first_release_offset: Duration::ZERO,
            dispatcher_thread_name: "rms-dispatcher".to_owned(),
            timer_thread_name: "rms-timer".to_owned(),
        }
    }
}

impl SchedulerConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SchedError::InvalidConfig`] if any value is out of range.
    pub fn validate(&self) -> SchedResult<()> {
        if self.utilization_bound_permille == 0 || self.utilization_bound_permille > 1000 {
            return Err(SchedError::invalid_config(
                "utilization_bound_permille must be in 1..=1000",
            ));
        }
        if self.rt_class == SchedClass::Normal {
            return Err(SchedError::invalid_config(
                "rt_class must be a real-time class",
            ));
        }
        if !(1..=MAX_RT_PRIORITY).contains(&self.rt_priority) {
            return Err(SchedError::invalid_config("rt_priority must be in 1..=99"));
        }
        if self.lock_timeout.is_zero() || self.lock_timeout > MAX_LOCK_TIMEOUT {
            return Err(SchedError::invalid_config(
                "lock_timeout must be in (0, 60s]",
            ));
        }
        if self.first_release_offset > MAX_FIRST_RELEASE_OFFSET {
            return Err(SchedError::invalid_config(
                "first_release_offset must be at most 24h",
            ));
        }
        if self.wake_capacity == 0 {
            return Err(SchedError::invalid_config(
                "wake_capacity must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Create a configuration builder.
    #[must_use]
    pub fn builder() -> SchedulerConfigBuilder {
        SchedulerConfigBuilder::default()
    }
}

/// Builder for [`SchedulerConfig`].
#[derive(Debug, Default)]
pub struct SchedulerConfigBuilder {
    config: SchedulerConfig,
}

impl SchedulerConfigBuilder {
    /// Set the admission bound in permille.
    #[must_use]
    pub fn utilization_bound_permille(mut self, permille: u64) -> Self {
        self.config.utilization_bound_permille = permille;
        self
    }

    /// Set the real-time class and level used on dispatch.
    #[must_use]
    pub fn rt_priority(mut self, class: SchedClass, level: i32) -> Self {
        self.config.rt_class = class;
        self.config.rt_priority = level;
        self
    }

    /// Set the registry lock timeout.
    #[must_use]
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.config.lock_timeout = timeout;
        self
    }

    /// Set the dispatcher wake channel capacity.
    #[must_use]
    pub fn wake_capacity(mut self, capacity: usize) -> Self {
        self.config.wake_capacity = capacity;
        self
    }

    /// Set the delay between registration and first release.
    #[must_use]
    pub fn first_release_offset(mut self, offset: Duration) -> Self {
        self.config.first_release_offset = offset;
        self
    }

    /// Set the worker thread names.
    #[must_use]
    pub fn thread_names(mut self, dispatcher: impl Into<String>, timer: impl Into<String>) -> Self {
        self.config.dispatcher_thread_name = dispatcher.into();
        self.config.timer_thread_name = timer.into();
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> SchedResult<SchedulerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = SchedulerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.utilization_bound_permille, 693);
        assert_eq!(config.rt_priority, 99);
        assert_eq!(config.rt_class, SchedClass::Fifo);
    }

    #[test]
    fn test_builder_validates() {
        let err = SchedulerConfig::builder()
            .utilization_bound_permille(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, SchedError::InvalidConfig(_)));

        let err = SchedulerConfig::builder()
            .rt_priority(SchedClass::Normal, 0)
            .build()
            .unwrap_err();
        assert!(matches!(err, SchedError::InvalidConfig(_)));

        let config = SchedulerConfig::builder()
            .utilization_bound_permille(1000)
            .rt_priority(SchedClass::RoundRobin, 50)
            .lock_timeout(Duration::from_millis(5))
            .build()
            .unwrap();
        assert_eq!(config.rt_priority, 50);
        assert_eq!(config.lock_timeout, Duration::from_millis(5));
    }

    #[test]
    fn test_durations_are_bounded() {
        let err = SchedulerConfig::builder()
            .first_release_offset(Duration::from_secs(u64::MAX))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchedError::InvalidConfig(_)));

        let err = SchedulerConfig::builder()
            .lock_timeout(Duration::MAX)
            .build()
            .unwrap_err();
        assert!(matches!(err, SchedError::InvalidConfig(_)));

        let config = SchedulerConfig::builder()
            .first_release_offset(MAX_FIRST_RELEASE_OFFSET)
            .lock_timeout(MAX_LOCK_TIMEOUT)
            .build()
            .unwrap();
        assert_eq!(config.first_release_offset, MAX_FIRST_RELEASE_OFFSET);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SchedulerConfig =
            serde_json::from_str(r#"{"utilization_bound_permille": 500}"#).unwrap();
        assert_eq!(config.utilization_bound_permille, 500);
        assert_eq!(config.wake_capacity, 64);
        assert!(config.validate().is_ok());
    }
}
