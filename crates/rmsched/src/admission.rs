//! Rate-monotonic admission control.
//!
//! Utilization is kept in integer permille (C·1000/P per task, truncated per
//! term) so the check is exact and free of floating point. The default bound
//! of 693 approximates 1000·ln 2, the Liu–Layland limit for rate-monotonic
//! schedulability as the number of tasks grows.

use std::time::Duration;

/// Default admission bound in permille (≈ ln 2).
pub const DEFAULT_UTILIZATION_BOUND_PERMILLE: u64 = 693;

/// Utilization of a single task in permille.
///
/// A zero period saturates to `u64::MAX` so that it can never be admitted.
#[must_use]
pub fn utilization_permille(budget: Duration, period: Duration) -> u64 {
    let period_ns = period.as_nanos();
    if period_ns == 0 {
        return u64::MAX;
    }
    let permille = budget.as_nanos().saturating_mul(1000) / period_ns;
    u64::try_from(permille).unwrap_or(u64::MAX)
}

/// Total utilization of `(budget, period)` pairs in permille.
#[must_use]
pub fn total_utilization_permille<I>(tasks: I) -> u64
where
    I: IntoIterator<Item = (Duration, Duration)>,
{
    tasks
        .into_iter()
        .map(|(budget, period)| utilization_permille(budget, period))
        .fold(0u64, u64::saturating_add)
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionDecision {
    /// Utilization of the candidate alone.
    pub requested_permille: u64,
    /// Utilization already admitted.
    pub existing_permille: u64,
    /// Bound the check ran against.
    pub bound_permille: u64,
}

impl AdmissionDecision {
    /// Utilization after admitting the candidate.
    #[must_use]
    pub fn total_permille(&self) -> u64 {
        self.existing_permille
            .saturating_add(self.requested_permille)
    }

    /// Whether the candidate fits under the bound.
    #[must_use]
    pub fn admitted(&self) -> bool {
        self.total_permille() <= self.bound_permille
    }
}

/// Admission controller with a fixed utilization bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionController {
    bound_permille: u64,
}

impl AdmissionController {
    /// Controller accepting up to `bound_permille` total utilization.
    #[must_use]
    pub const fn new(bound_permille: u64) -> Self {
        Self { bound_permille }
    }

    /// Configured bound in permille.
    #[must_use]
    pub const fn bound_permille(&self) -> u64 {
        self.bound_permille
    }

    /// Evaluate a candidate `(budget, period)` against the existing tasks.
    #[must_use]
    pub fn evaluate<I>(&self, existing: I, budget: Duration, period: Duration) -> AdmissionDecision
    where
        I: IntoIterator<Item = (Duration, Duration)>,
    {
        AdmissionDecision {
            requested_permille: utilization_permille(budget, period),
            existing_permille: total_utilization_permille(existing),
            bound_permille: self.bound_permille,
        }
    }

    /// Whether a candidate can be admitted alongside `existing`.
    #[must_use]
    pub fn can_admit<I>(&self, existing: I, budget: Duration, period: Duration) -> bool
    where
        I: IntoIterator<Item = (Duration, Duration)>,
    {
        self.evaluate(existing, budget, period).admitted()
    }
}

impl Default for AdmissionController {
    fn default() -> Self {
        Self::new(DEFAULT_UTILIZATION_BOUND_PERMILLE)
    }
}

/// Check a candidate against the default bound.
#[must_use]
pub fn can_admit<I>(existing: I, budget: Duration, period: Duration) -> bool
where
    I: IntoIterator<Item = (Duration, Duration)>,
{
    AdmissionController::default().can_admit(existing, budget, period)
}
