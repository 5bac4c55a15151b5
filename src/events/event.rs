//! # Runtime events emitted by the lifecycle coordinator and its units.
//!
//! The [`EventKind`] enum classifies event types across two categories:
//! - **Shutdown events**: shutdown start and its outcome (drained or deadline exceeded)
//! - **Unit events**: session failures and the service attempt loop
//!
//! The [`Event`] struct carries additional metadata such as timestamps, unit name,
//! reasons, and backoff delays.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use lifevisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::ServiceFailed)
//!     .with_unit("listener")
//!     .with_reason("boom")
//!     .with_attempt(3);
//!
//! assert_eq!(ev.kind, EventKind::ServiceFailed);
//! assert_eq!(ev.unit.as_deref(), Some("listener"));
//! assert_eq!(ev.reason.as_deref(), Some("boom"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::error::UnitError;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Shutdown events ===
    /// Shutdown body started: cancellation is about to be broadcast.
    ///
    /// Sets:
    /// - `timeout_ms`: maximum drain wait (absent for an unbounded wait)
    /// - `reason`: signal name, when triggered by an OS signal
    ShutdownRequested,

    /// All pending units finished within the drain deadline.
    AllStoppedWithin,

    /// Drain deadline exceeded; some units did not finish in time.
    ///
    /// Sets:
    /// - `timeout_ms`: the deadline that elapsed
    /// - `stragglers`: names of unfinished services
    /// - `reason`: summary including the outstanding session count
    GraceExceeded,

    // === Session events ===
    /// Session body returned an error or panicked.
    ///
    /// Sets:
    /// - `unit`: `session-<id>`
    /// - `reason`: failure message
    /// - `panicked`: true for an intercepted panic
    /// - `trace`: captured backtrace (panics only)
    SessionFailed,

    // === Service events ===
    /// Service registered with the coordinator.
    ///
    /// Sets:
    /// - `unit`: service name
    ServiceRegistered,

    /// Service attempt is starting.
    ///
    /// Sets:
    /// - `unit`: service name
    /// - `attempt`: attempt number (1-based, per service)
    ServiceStarting,

    /// Service body returned (`Ok` or graceful cancellation).
    ///
    /// Sets:
    /// - `unit`: service name
    /// - `attempt`: attempt number
    ServiceStopped,

    /// Service attempt failed with an error or panicked.
    ///
    /// Sets:
    /// - `unit`: service name
    /// - `attempt`: attempt number
    /// - `reason`: failure message
    /// - `panicked`: true for an intercepted panic
    /// - `trace`: captured backtrace (panics only)
    ServiceFailed,

    /// Next attempt delayed by the failure-rate backoff.
    ///
    /// Sets:
    /// - `unit`: service name
    /// - `attempt`: previous attempt number
    /// - `delay_ms`: delay before the next attempt (ms)
    BackoffScheduled,

    /// Service supervisor loop exited after observing cancellation.
    ///
    /// Sets:
    /// - `unit`: service name
    /// - `attempt`: last attempt number
    ServiceFinished,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,

    /// Timeout/deadline in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Backoff delay before next attempt in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Human-readable reason (failure message, shutdown summary).
    pub reason: Option<Arc<str>>,
    /// Captured panic backtrace.
    pub trace: Option<Arc<str>>,
    /// Whether the failure was an intercepted panic.
    pub panicked: bool,
    /// Attempt count (starting from 1).
    pub attempt: Option<u32>,
    /// Name of the session or service, if applicable.
    pub unit: Option<Arc<str>>,
    /// Unfinished services at the drain deadline.
    pub stragglers: Option<Arc<[String]>>,
    /// Event classification.
    pub kind: EventKind,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            kind,
            at: SystemTime::now(),
            attempt: None,
            timeout_ms: None,
            reason: None,
            trace: None,
            panicked: false,
            delay_ms: None,
            unit: None,
            stragglers: None,
        }
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a unit name.
    #[inline]
    pub fn with_unit(mut self, unit: impl Into<Arc<str>>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(clamp_ms(d));
        self
    }

    /// Attaches a backoff delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(clamp_ms(d));
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches the names of units that missed the drain deadline.
    #[inline]
    pub fn with_stragglers(mut self, names: impl Into<Arc<[String]>>) -> Self {
        self.stragglers = Some(names.into());
        self
    }

    /// Attaches a unit failure: message, panic flag and (for panics) the trace.
    pub fn with_failure(mut self, err: &UnitError) -> Self {
        self.reason = Some(err.as_message().into());
        if let UnitError::Panicked(fault) = err {
            self.panicked = true;
            self.trace = Some(fault.trace().into());
        }
        self
    }
}

fn clamp_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::Fault;

    #[test]
    fn seq_is_monotonic() {
        let a = Event::new(EventKind::ServiceStarting);
        let b = Event::new(EventKind::ServiceStarting);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn failure_carries_panic_trace() {
        let err = UnitError::from(Fault::new("boom", None, "frame 0"));
        let ev = Event::new(EventKind::ServiceFailed).with_failure(&err);
        assert!(ev.panicked);
        assert_eq!(ev.trace.as_deref(), Some("frame 0"));
        assert_eq!(ev.reason.as_deref(), Some("panic: 'boom'"));

        let ev = Event::new(EventKind::ServiceFailed).with_failure(&UnitError::fail("io"));
        assert!(!ev.panicked);
        assert!(ev.trace.is_none());
    }

    #[test]
    fn durations_are_clamped() {
        let ev = Event::new(EventKind::ShutdownRequested).with_timeout(Duration::MAX);
        assert_eq!(ev.timeout_ms, Some(u32::MAX));
    }
}
