//! Rate-budget aware polling cadence.
//!
//! Maps the service's remaining request budget to a polling interval with a
//! fixed step function. One budget read per decision, no other state.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_BASE_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(30);

/// At or above this budget the base cadence is used.
pub const HIGH_WATER_MARK: u64 = 1000;
/// Below `HIGH_WATER_MARK` and at or above this, the cadence is 1.5x base.
pub const CAUTION_MARK: u64 = 500;
/// Below this budget the cadence jumps straight to the maximum interval.
pub const CRITICAL_MARK: u64 = 100;

/// Accessor for the externally reported remaining budget.
pub type RemainingFn = Arc<dyn Fn() -> u64 + Send + Sync>;

#[derive(Clone)]
pub struct AdaptivePoller {
    base_interval: Duration,
    max_interval: Duration,
    remaining: RemainingFn,
}

impl fmt::Debug for AdaptivePoller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdaptivePoller")
            .field("base_interval", &self.base_interval)
            .field("max_interval", &self.max_interval)
            .finish_non_exhaustive()
    }
}

impl AdaptivePoller {
    /// Poller with the default 2s base and 30s maximum.
    pub fn new<F>(remaining: F) -> Self
    where
        F: Fn() -> u64 + Send + Sync + 'static,
    {
        Self::with_intervals(DEFAULT_BASE_INTERVAL, DEFAULT_MAX_INTERVAL, remaining)
    }

    pub fn with_intervals<F>(base_interval: Duration, max_interval: Duration, remaining: F) -> Self
    where
        F: Fn() -> u64 + Send + Sync + 'static,
    {
        Self {
            base_interval,
            max_interval,
            remaining: Arc::new(remaining),
        }
    }

    pub fn base_interval(&self) -> Duration {
        self.base_interval
    }

    pub fn max_interval(&self) -> Duration {
        self.max_interval
    }

    /// Interval to wait before the next poll given the current budget.
    pub fn next_interval(&self) -> Duration {
        interval_for(self.base_interval, self.max_interval, (self.remaining)())
    }
}

/// The cadence step function.
///
/// | remaining      | interval     |
/// |----------------|--------------|
/// | `>= 1000`      | base         |
/// | `500..=999`    | 1.5 × base   |
/// | `100..=499`    | 2 × base     |
/// | `< 100`        | max          |
pub fn interval_for(base: Duration, max: Duration, remaining: u64) -> Duration {
    if remaining < CRITICAL_MARK {
        max
    } else if remaining < CAUTION_MARK {
        base.saturating_mul(2)
    } else if remaining < HIGH_WATER_MARK {
        base.saturating_add(base / 2)
    } else {
        base
    }
}
