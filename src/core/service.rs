//! # Service supervisor loop.
//!
//! Supervises one registered [`Service`] until the lifecycle is cancelled:
//! - runs the body through [`guarded`] so panics become ordinary failures,
//! - restarts it whenever it returns, fails or panics before cancellation,
//! - delays restarts per the service's private [`FailureWindow`].
//!
//! ## Event flow
//! ```text
//! [BackoffScheduled → sleep] → ServiceStarting → [body] → ServiceStopped (Ok / Canceled)
//!                                                       → ServiceFailed  (error / panic)
//! on exit: ServiceFinished
//! ```
//!
//! ## Architecture
//! ```text
//! Lifecycle::spawn_service ──► tokio::spawn(run_service)
//!
//! loop {
//!   ├─► cancelled? → break
//!   ├─► delay = window.next_delay(now)        (0 while no failures are retained)
//!   ├─► if delay > 0: publish BackoffScheduled, sleep(delay) (cancellable → break)
//!   ├─► publish ServiceStarting
//!   ├─► guarded(service.run(ctx))
//!   │     ├─ Ok / Canceled → publish ServiceStopped
//!   │     └─ Fail / Panic  → publish ServiceFailed, window.record_failure(now)
//!   └─► yield_now()
//! }
//! registry.mark_finished(id) → ticket.complete() → publish ServiceFinished
//! ```
//!
//! ## Rules
//! - Attempts run **sequentially** within one service (never parallel)
//! - Attempt counter **increments on each start** (monotonic, never resets)
//! - Cancellation is checked at **safe points** only: loop head and backoff sleep;
//!   a body that never polls cancellation keeps the loop (and shutdown) waiting

use tokio::{select, time, time::Instant};

use crate::core::{Lifecycle, pending::Ticket, registry::ServiceId};
use crate::error::UnitError;
use crate::events::{Event, EventKind};
use crate::fault::guarded;
use crate::policies::FailureWindow;
use crate::units::ServiceRef;

/// Runs the supervisor loop of `service` until cancellation is observed.
pub(crate) async fn run_service(ctx: Lifecycle, id: ServiceId, service: ServiceRef, ticket: Ticket) {
    let bus = ctx.inner.bus.clone();
    let name = service.name().to_string();
    let mut window = FailureWindow::new(ctx.inner.cfg.failure_window_clamped());
    let mut attempt: u32 = 0;

    loop {
        if ctx.is_cancelled() {
            break;
        }

        let delay = window.next_delay(Instant::now());
        if !delay.is_zero() {
            bus.publish(
                Event::new(EventKind::BackoffScheduled)
                    .with_unit(name.as_str())
                    .with_delay(delay)
                    .with_attempt(attempt),
            );

            let sleep = time::sleep(delay);
            tokio::pin!(sleep);
            select! {
                _ = &mut sleep => {}
                _ = ctx.cancelled() => { break; }
            }
        }

        attempt = attempt.saturating_add(1);
        bus.publish(
            Event::new(EventKind::ServiceStarting)
                .with_unit(name.as_str())
                .with_attempt(attempt),
        );

        let body = ServiceRef::clone(&service);
        let body_ctx = ctx.clone();
        let res = guarded(async move { body.run(body_ctx).await }).await;

        match res {
            Ok(()) | Err(UnitError::Canceled) => {
                bus.publish(
                    Event::new(EventKind::ServiceStopped)
                        .with_unit(name.as_str())
                        .with_attempt(attempt),
                );
            }
            Err(e) => {
                bus.publish(
                    Event::new(EventKind::ServiceFailed)
                        .with_unit(name.as_str())
                        .with_attempt(attempt)
                        .with_failure(&e),
                );
                window.record_failure(Instant::now());
            }
        }

        // An immediately failing body must not monopolize the worker thread.
        tokio::task::yield_now().await;
    }

    ctx.inner.registry.mark_finished(id);
    ticket.complete();
    bus.publish(
        Event::new(EventKind::ServiceFinished)
            .with_unit(name)
            .with_attempt(attempt),
    );
}
