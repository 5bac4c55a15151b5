//! # LogWriter: events to `tracing`
//!
//! A subscriber that turns every runtime [`Event`] into a structured `tracing` record.
//! Installed by default by [`Lifecycle::new`](crate::Lifecycle::new); pair it with any
//! `tracing` subscriber (e.g. `tracing_subscriber::fmt`) to see the output.
//!
//! ## Example output (fmt subscriber)
//! ```text
//!  INFO lifevisor: orderly shutdown commenced max_wait_ms=Some(100)
//! ERROR lifevisor: service attempt failed unit="listener" attempt=3 panicked=true reason="panic: 'boom' at src/main.rs:10:5"
//!  WARN lifevisor: service restart delayed unit="listener" delay_ms=8000 after_attempt=3
//!  WARN lifevisor: units did not terminate in a timely fashion stragglers=["listener"] reason="1 service(s), 0 session(s) outstanding"
//! ```
//!
//! Levels: failures are `error`, backoff and deadline misses `warn`, shutdown progress
//! `info`, per-attempt chatter `debug`, panic backtraces `trace`.

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let unit = e.unit.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::ShutdownRequested => {
                tracing::info!(max_wait_ms = ?e.timeout_ms, reason, "orderly shutdown commenced");
            }
            EventKind::AllStoppedWithin => {
                tracing::info!("all units stopped");
            }
            EventKind::GraceExceeded => {
                tracing::warn!(
                    stragglers = ?e.stragglers.as_deref().unwrap_or_default(),
                    max_wait_ms = ?e.timeout_ms,
                    reason,
                    "units did not terminate in a timely fashion"
                );
            }
            EventKind::SessionFailed => {
                tracing::error!(unit, panicked = e.panicked, reason, "session ended in error");
            }
            EventKind::ServiceRegistered => {
                tracing::debug!(unit, "service registered");
            }
            EventKind::ServiceStarting => {
                tracing::debug!(unit, attempt = ?e.attempt, "service starting");
            }
            EventKind::ServiceStopped => {
                tracing::info!(unit, attempt = ?e.attempt, "service attempt returned");
            }
            EventKind::ServiceFailed => {
                tracing::error!(
                    unit,
                    attempt = ?e.attempt,
                    panicked = e.panicked,
                    reason,
                    "service attempt failed"
                );
            }
            EventKind::BackoffScheduled => {
                tracing::warn!(
                    unit,
                    delay_ms = ?e.delay_ms,
                    after_attempt = ?e.attempt,
                    "service restart delayed"
                );
            }
            EventKind::ServiceFinished => {
                tracing::info!(unit, attempts = ?e.attempt, "service finished");
            }
        }

        if let Some(trace) = e.trace.as_deref() {
            tracing::trace!(unit, %trace, "panic backtrace");
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
