//! # Failure-rate driven backoff.
//!
//! [`FailureWindow`] keeps the instants of the most recent failures of one service in
//! a fixed-capacity ring (oldest overwritten first) and derives the delay before the
//! next restart from the failure **rate** over that window:
//!
//! ```text
//! rate  = count / (now - earliest)            (count == 1 && span < 1s ⇒ span = 1s)
//! power = min(ceil(rate) - 1, 3)
//! delay = trunc(2^power) seconds
//! ```
//!
//! The truncation is what makes an empty window yield no delay (`2^-1 = 0.5 → 0`),
//! one failure per second yield `1s`, and any rate of 4/s or more saturate at `8s`.
//! Failures are never evicted by age, only by overwrite; an old burst therefore decays
//! towards a `1s` delay rather than disappearing.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use tokio::time::Instant;
//! use lifevisor::FailureWindow;
//!
//! let start = Instant::now();
//! let mut window = FailureWindow::new(5);
//! assert_eq!(window.next_delay(start), Duration::ZERO);
//!
//! window.record_failure(start);
//! assert_eq!(window.next_delay(start), Duration::from_secs(1));
//!
//! for i in 1..4 {
//!     window.record_failure(start + Duration::from_millis(100 * i));
//! }
//! assert_eq!(window.next_delay(start + Duration::from_millis(400)), Duration::from_secs(8));
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

/// Default number of failures a window remembers.
pub const DEFAULT_WINDOW: usize = 5;

/// Largest exponent applied to the base delay (`2^3 = 8s`).
const MAX_POWER: f64 = 3.0;

/// Sliding window of recent failure instants for a single service.
#[derive(Clone, Debug)]
pub struct FailureWindow {
    capacity: usize,
    stamps: VecDeque<Instant>,
}

impl Default for FailureWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl FailureWindow {
    /// Creates an empty window remembering at most `capacity` failures (min 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            stamps: VecDeque::with_capacity(capacity),
        }
    }

    /// Records a failure at `at`, evicting the oldest one when the window is full.
    pub fn record_failure(&mut self, at: Instant) {
        if self.stamps.len() == self.capacity {
            self.stamps.pop_front();
        }
        self.stamps.push_back(at);
    }

    /// Failures per second over the span from the oldest retained failure to `now`.
    ///
    /// Returns `0.0` for an empty window. A single failure younger than a second is
    /// treated as one failure per second. Several failures at the very same instant
    /// give an infinite rate.
    pub fn rate(&self, now: Instant) -> f64 {
        let Some(&earliest) = self.stamps.front() else {
            return 0.0;
        };
        let count = self.stamps.len();

        let mut span = now.saturating_duration_since(earliest);
        if count == 1 && span < Duration::from_secs(1) {
            span = Duration::from_secs(1);
        }
        count as f64 / span.as_secs_f64()
    }

    /// Delay to wait before the next attempt, derived from [`rate`](Self::rate).
    pub fn next_delay(&self, now: Instant) -> Duration {
        let power = (self.rate(now).ceil() - 1.0).min(MAX_POWER);
        // Whole seconds, truncated toward zero.
        Duration::from_secs(2f64.powf(power) as u64)
    }

    /// Number of failures currently retained.
    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    /// Returns true if no failure has been recorded.
    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    /// Maximum number of failures retained.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Retained failure instants, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Instant> {
        self.stamps.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_empty_rate_and_delay() {
        let window = FailureWindow::new(5);
        let now = Instant::now();
        assert_eq!(window.rate(now), 0.0);
        assert_eq!(window.next_delay(now), Duration::ZERO);
    }

    #[test]
    fn test_two_failures_one_second_apart() {
        let start = Instant::now();
        let mut window = FailureWindow::new(5);
        window.record_failure(start);
        window.record_failure(start + secs(1));
        assert_eq!(window.rate(start + secs(1)), 2.0);
    }

    #[test]
    fn test_single_recent_failure_is_clamped_to_one_second() {
        let start = Instant::now();
        let mut window = FailureWindow::new(5);
        window.record_failure(start);

        assert_eq!(window.rate(start), 1.0);
        assert_eq!(window.next_delay(start), secs(1));
        assert_eq!(window.next_delay(start + Duration::from_millis(900)), secs(1));
    }

    #[test]
    fn test_more_records_than_capacity_keeps_most_recent() {
        let start = Instant::now();
        let mut window = FailureWindow::new(5);
        for i in 0..10 {
            window.record_failure(start + secs(i));
        }

        assert_eq!(window.len(), 5);
        let kept: Vec<Instant> = window.iter().copied().collect();
        let expected: Vec<Instant> = (5..10).map(|i| start + secs(i)).collect();
        assert_eq!(kept, expected);

        // 5 failures over [start+5s, start+10s].
        assert_eq!(window.rate(start + secs(10)), 1.0);
        assert_eq!(window.next_delay(start + secs(10)), secs(1));
    }

    #[test]
    fn test_rate_decays_after_lull() {
        let start = Instant::now();
        let mut window = FailureWindow::new(5);
        for i in 0..10 {
            window.record_failure(start + secs(i));
        }

        let later = start + secs(10 * 60 * 60);
        assert!(window.rate(later) < 0.01);
        // ceil(rate) - 1 == 0 while any failure is retained.
        assert_eq!(window.next_delay(later), secs(1));
    }

    #[test]
    fn test_stampede_saturates_at_eight_seconds() {
        let start = Instant::now();
        let mut window = FailureWindow::new(5);
        for _ in 0..10 {
            window.record_failure(start + Duration::from_millis(1));
        }
        assert!(window.rate(start + Duration::from_millis(20)) > 2.0);
        assert_eq!(window.next_delay(start + Duration::from_millis(20)), secs(8));
    }

    #[test]
    fn test_four_failures_subsecond_saturates() {
        let start = Instant::now();
        let mut window = FailureWindow::new(5);
        for i in 0..4 {
            window.record_failure(start + Duration::from_millis(5 * i));
        }
        assert_eq!(window.next_delay(start + Duration::from_millis(50)), secs(8));
    }

    #[test]
    fn test_delay_table() {
        let start = Instant::now();

        // rate 2/s → ceil 2 → 2^1
        let mut window = FailureWindow::new(5);
        window.record_failure(start);
        window.record_failure(start + secs(1));
        assert_eq!(window.next_delay(start + secs(1)), secs(2));

        // rate 3/s → ceil 3 → 2^2
        let mut window = FailureWindow::new(5);
        for i in 0..3 {
            window.record_failure(start + Duration::from_millis(250 * i));
        }
        assert_eq!(window.next_delay(start + secs(1)), secs(4));
    }

    #[test]
    fn test_identical_instants_give_infinite_rate() {
        let start = Instant::now();
        let mut window = FailureWindow::new(5);
        window.record_failure(start);
        window.record_failure(start);
        assert!(window.rate(start).is_infinite());
        assert_eq!(window.next_delay(start), secs(8));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut window = FailureWindow::new(0);
        assert_eq!(window.capacity(), 1);
        let now = Instant::now();
        window.record_failure(now);
        window.record_failure(now + secs(1));
        assert_eq!(window.len(), 1);
    }
}
