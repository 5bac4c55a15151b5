//! # Session wrapper: one-shot unit under lifecycle accounting.
//!
//! Runs a session body once through [`guarded`], publishes a
//! [`EventKind::SessionFailed`] event for any error or panic, and releases the
//! session's pending increment on every exit path.
//!
//! ## Rules
//! - No restart: a failed session is reported and forgotten.
//! - `UnitError::Canceled` is a graceful exit (no event).
//! - Release happens in [`SessionGuard`]'s `Drop`, so it also covers a task aborted
//!   by runtime teardown.

use std::future::Future;

use crate::core::{Lifecycle, pending::Ticket, registry::SessionId};
use crate::error::UnitError;
use crate::events::{Event, EventKind};
use crate::fault::guarded;

/// Keeps a session counted as live and pending until dropped.
pub(crate) struct SessionGuard {
    ctx: Lifecycle,
    ticket: Ticket,
}

impl SessionGuard {
    /// Counts a new session. Call before spawning it.
    pub(crate) fn new(ctx: &Lifecycle) -> Self {
        let ticket = ctx.inner.pending.add();
        ctx.inner.registry.session_started();
        Self {
            ctx: ctx.clone(),
            ticket,
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.ticket.complete() {
            self.ctx.inner.registry.session_finished();
        }
    }
}

/// Runs a session body once.
pub(crate) async fn run_session<F, Fut>(id: SessionId, guard: SessionGuard, f: F)
where
    F: FnOnce(Lifecycle) -> Fut,
    Fut: Future<Output = Result<(), UnitError>>,
{
    let ctx = guard.ctx.clone();
    let res = guarded(async move { f(ctx).await }).await;

    match res {
        Ok(()) | Err(UnitError::Canceled) => {}
        Err(e) => {
            guard.ctx.inner.bus.publish(
                Event::new(EventKind::SessionFailed)
                    .with_unit(id.to_string())
                    .with_failure(&e),
            );
        }
    }
    drop(guard);
}
