//! # Global runtime configuration.
//!
//! Provides [`Config`] centralized settings for the lifecycle coordinator.
//!
//! ## Sentinel values
//! - `bus_capacity = 0` and `failure_window = 0` are clamped to 1.

use std::time::Duration;

use crate::policies::DEFAULT_WINDOW;

/// Global configuration for the lifecycle coordinator.
///
/// ## Field semantics
/// - `grace`: drain deadline used by [`Lifecycle::shutdown_on_signal`](crate::Lifecycle::shutdown_on_signal)
/// - `bus_capacity`: event bus ring buffer size (min 1)
/// - `failure_window`: failures remembered per service for restart backoff (min 1)
///
/// ## Notes
/// All fields are public for flexibility. Prefer the helper accessors to avoid
/// sprinkling sentinel checks across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum time to wait for units to finish after an OS shutdown signal.
    ///
    /// Units still running afterwards are reported as stragglers, never killed.
    pub grace: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// A listener that lags behind more than `bus_capacity` events skips the oldest.
    pub bus_capacity: usize,

    /// Number of recent failures each service keeps to compute its failure rate.
    pub failure_window: usize,
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns the failure window size clamped to a minimum of 1.
    #[inline]
    pub fn failure_window_clamped(&self) -> usize {
        self.failure_window.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `grace = 60s`
    /// - `bus_capacity = 1024`
    /// - `failure_window = 5`
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(60),
            bus_capacity: 1024,
            failure_window: DEFAULT_WINDOW,
        }
    }
}
