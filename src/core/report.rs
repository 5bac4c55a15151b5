//! # Shutdown outcome.
//!
//! [`ShutdownReport`] is what [`Lifecycle::shutdown`](crate::Lifecycle::shutdown)
//! returns. A missed deadline is a diagnostic, not an error: the report names the
//! stragglers and the shutdown call still returns normally.

use std::time::Duration;

/// Result of the (single) shutdown body execution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShutdownReport {
    /// Every registered unit finished within the deadline.
    Drained,
    /// The deadline elapsed with units still running.
    TimedOut {
        /// The deadline that elapsed.
        max_wait: Duration,
        /// Sorted names of services whose loop had not exited.
        stragglers: Vec<String>,
        /// Sessions still running.
        sessions_outstanding: usize,
    },
}

impl ShutdownReport {
    /// True if everything finished in time.
    pub fn is_drained(&self) -> bool {
        matches!(self, ShutdownReport::Drained)
    }

    /// Names of services that missed the deadline (empty when drained).
    pub fn stragglers(&self) -> &[String] {
        match self {
            ShutdownReport::Drained => &[],
            ShutdownReport::TimedOut { stragglers, .. } => stragglers,
        }
    }

    /// Sessions that missed the deadline (zero when drained).
    pub fn sessions_outstanding(&self) -> usize {
        match self {
            ShutdownReport::Drained => 0,
            ShutdownReport::TimedOut {
                sessions_outstanding,
                ..
            } => *sessions_outstanding,
        }
    }
}
