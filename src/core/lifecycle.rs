//! # Lifecycle: registration, cancellation broadcast and bounded shutdown.
//!
//! The [`Lifecycle`] owns the cancellation signal, the pending-unit counter and the
//! service registry. Handles are cheap to clone; every clone refers to the same
//! coordinator, and a clone is what unit bodies receive as their context.
//!
//! ## Key responsibilities
//! - spawn sessions (one-shot) and services (restart loop) on their own Tokio task
//! - count every unit as pending until it finishes (single-fire release)
//! - broadcast cancellation once, level-triggered, to every observer
//! - drain with a deadline and name the stragglers
//!
//! ## State machine
//! ```text
//! Running ──(first shutdown call)──► Draining ──(counter == 0 | max_wait elapsed)──► Stopped
//! ```
//!
//! ## Shutdown path
//! ```text
//! shutdown(max_wait)  (body runs once; concurrent callers wait for its report)
//!   ├─► publish ShutdownRequested
//!   ├─► token.cancel()          → is_cancelled() == true everywhere, forever
//!   ├─► sentinel.complete()     → counter no longer held by the coordinator
//!   └─► timeout(max_wait, pending.drained()):
//!          ├─ Ok      → publish AllStoppedWithin   → ShutdownReport::Drained
//!          └─ Elapsed → registry.stragglers()
//!                       publish GraceExceeded      → ShutdownReport::TimedOut
//! ```
//!
//! Units that ignore cancellation are never aborted; they keep running after
//! `shutdown` returns and show up in the report.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use lifevisor::{Lifecycle, UnitError};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let lc = Lifecycle::new();
//!
//!     lc.service("ticker", |ctx: Lifecycle| async move {
//!         while !ctx.is_cancelled() {
//!             tokio::time::sleep(Duration::from_millis(10)).await;
//!         }
//!         Ok::<_, UnitError>(())
//!     });
//!
//!     lc.session(|_ctx| async move {
//!         // one connection worth of work
//!         Ok::<(), UnitError>(())
//!     });
//!
//!     let report = lc.shutdown(Duration::from_secs(1)).await;
//!     assert!(report.is_drained());
//! }
//! ```

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::core::builder::LifecycleBuilder;
use crate::core::pending::{Pending, Ticket};
use crate::core::registry::{Registry, ServiceId, ServiceStatus, SessionId};
use crate::core::report::ShutdownReport;
use crate::core::{Config, service, session, shutdown};
use crate::error::{RuntimeError, UnitError};
use crate::events::{Bus, Event, EventKind};
use crate::units::{ServiceFn, ServiceRef};

/// Shared coordinator state.
pub(crate) struct Inner {
    pub(crate) cfg: Config,
    pub(crate) bus: Bus,
    pub(crate) token: CancellationToken,
    pub(crate) pending: Arc<Pending>,
    pub(crate) registry: Registry,
    sentinel: Ticket,
    next_id: AtomicU64,
    /// Set by the caller that spawns the shutdown body.
    shutdown_started: AtomicBool,
    /// `Some` once the shutdown body has finished.
    report: watch::Sender<Option<ShutdownReport>>,
}

/// Handle to the lifecycle coordinator.
#[derive(Clone)]
pub struct Lifecycle {
    pub(crate) inner: Arc<Inner>,
}

impl Lifecycle {
    /// Creates a coordinator with default [`Config`] and the built-in
    /// [`LogWriter`](crate::LogWriter) subscriber.
    ///
    /// Installs the process-wide panic trace hook (see
    /// [`install_trace_hook`](crate::install_trace_hook)); use
    /// [`LifecycleBuilder::with_trace_hook`] to opt out.
    ///
    /// # Panics
    /// Panics if called outside of a Tokio runtime.
    pub fn new() -> Self {
        Self::builder(Config::default()).build()
    }

    /// Starts building a coordinator with the given configuration.
    pub fn builder(cfg: Config) -> LifecycleBuilder {
        LifecycleBuilder::new(cfg)
    }

    pub(crate) fn from_parts(cfg: Config, bus: Bus) -> Self {
        let pending = Pending::new();
        let sentinel = pending.add();
        let (report, _rx) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                cfg,
                bus,
                token: CancellationToken::new(),
                pending,
                registry: Registry::new(),
                sentinel,
                next_id: AtomicU64::new(1),
                shutdown_started: AtomicBool::new(false),
                report,
            }),
        }
    }

    fn next_id(&self) -> u64 {
        self.inner.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Runs `f` once on its own task, tracked until it finishes.
    ///
    /// Errors and panics are published as [`EventKind::SessionFailed`]; nothing
    /// escapes the session. Returns immediately.
    pub fn session<F, Fut>(&self, f: F) -> SessionId
    where
        F: FnOnce(Lifecycle) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), UnitError>> + Send + 'static,
    {
        let id = SessionId(self.next_id());
        let guard = session::SessionGuard::new(self);
        tokio::spawn(session::run_session(id, guard, f));
        id
    }

    /// Registers a service named `name` whose body is `f`, re-invoked per attempt.
    ///
    /// Shorthand for [`spawn_service`](Self::spawn_service) with a [`ServiceFn`].
    pub fn service<F, Fut>(&self, name: impl Into<Cow<'static, str>>, f: F) -> ServiceId
    where
        F: Fn(Lifecycle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), UnitError>> + Send + 'static,
    {
        self.spawn_service(ServiceFn::arc(name, f))
    }

    /// Registers a service and starts its supervisor loop. Returns immediately.
    ///
    /// The service is restarted whenever its body returns, fails or panics before
    /// cancellation, after a delay derived from its recent failure rate.
    pub fn spawn_service(&self, service: ServiceRef) -> ServiceId {
        let ticket = self.inner.pending.add();
        let id = ServiceId(self.next_id());
        self.inner.registry.register(id, service.name().into());
        self.inner
            .bus
            .publish(Event::new(EventKind::ServiceRegistered).with_unit(service.name()));

        tokio::spawn(service::run_service(self.clone(), id, service, ticket));
        id
    }

    /// Whether shutdown has begun. Never reverts once true.
    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Resolves once shutdown has begun (immediately if it already has).
    pub async fn cancelled(&self) {
        self.inner.token.cancelled().await
    }

    /// A token that fires together with the lifecycle's cancellation signal.
    ///
    /// The returned token is a child: cancelling it does not cancel the lifecycle.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.token.child_token()
    }

    /// Broadcasts cancellation and waits up to `max_wait` for every unit to finish.
    ///
    /// The shutdown body runs exactly once per coordinator, on its own task, so
    /// dropping a caller (e.g. under `timeout` or `select!`) neither cancels nor
    /// repeats it. Later or concurrent calls wait for it and return the same report
    /// (whatever `max_wait` they pass).
    /// Never fails and never aborts a unit: units still running when the deadline
    /// elapses are reported in [`ShutdownReport::TimedOut`].
    pub async fn shutdown(&self, max_wait: Duration) -> ShutdownReport {
        self.shutdown_with(Some(max_wait), None).await
    }

    /// Shutdown without a deadline: returns once every unit has finished.
    pub async fn shutdown_and_wait(&self) -> ShutdownReport {
        self.shutdown_with(None, None).await
    }

    /// Waits for SIGINT/SIGTERM/SIGQUIT (Ctrl-C elsewhere), then shuts down with
    /// [`Config::grace`] as the deadline.
    ///
    /// The signal name is recorded as the reason of the `ShutdownRequested` event.
    pub async fn shutdown_on_signal(&self) -> Result<ShutdownReport, RuntimeError> {
        let signal = shutdown::wait_for_shutdown_signal().await?;
        Ok(self
            .shutdown_with(Some(self.inner.cfg.grace), Some(signal))
            .await)
    }

    async fn shutdown_with(
        &self,
        max_wait: Option<Duration>,
        cause: Option<&'static str>,
    ) -> ShutdownReport {
        let mut rx = self.inner.report.subscribe();

        if !self.inner.shutdown_started.swap(true, Ordering::AcqRel) {
            let lc = self.clone();
            tokio::spawn(async move {
                let report = lc.shutdown_body(max_wait, cause).await;
                lc.inner.report.send_replace(Some(report));
            });
        }

        // The sender lives in `self.inner`, so the channel cannot close while we wait.
        let _ = rx.wait_for(Option::is_some).await;
        let settled = rx.borrow().clone();
        settled.unwrap_or(ShutdownReport::Drained)
    }

    async fn shutdown_body(
        &self,
        max_wait: Option<Duration>,
        cause: Option<&'static str>,
    ) -> ShutdownReport {
        let mut requested = Event::new(EventKind::ShutdownRequested);
        if let Some(d) = max_wait {
            requested = requested.with_timeout(d);
        }
        if let Some(signal) = cause {
            requested = requested.with_reason(signal);
        }
        self.inner.bus.publish(requested);

        self.inner.token.cancel();
        self.inner.sentinel.complete();

        let drained = self.inner.pending.drained();
        let max_wait = match max_wait {
            Some(d) => match time::timeout(d, drained).await {
                Ok(()) => None,
                Err(_elapsed) => Some(d),
            },
            None => {
                drained.await;
                None
            }
        };

        let Some(max_wait) = max_wait else {
            self.inner
                .bus
                .publish(Event::new(EventKind::AllStoppedWithin));
            return ShutdownReport::Drained;
        };

        let stragglers = self.inner.registry.stragglers();
        let sessions_outstanding = self.inner.registry.live_sessions();
        self.inner.bus.publish(
            Event::new(EventKind::GraceExceeded)
                .with_timeout(max_wait)
                .with_reason(format!(
                    "{} service(s), {} session(s) outstanding",
                    stragglers.len(),
                    sessions_outstanding
                ))
                .with_stragglers(stragglers.clone()),
        );
        ShutdownReport::TimedOut {
            max_wait,
            stragglers,
            sessions_outstanding,
        }
    }

    /// Snapshot of every registered service, sorted by name.
    pub fn services(&self) -> Vec<ServiceStatus> {
        self.inner.registry.snapshot()
    }

    /// Units registered and not yet finished, plus the coordinator's own hold until
    /// shutdown begins.
    pub fn pending(&self) -> usize {
        self.inner.pending.current()
    }

    /// The configuration this coordinator was built with.
    pub fn config(&self) -> &Config {
        &self.inner.cfg
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("cancelled", &self.is_cancelled())
            .field("pending", &self.pending())
            .field("services", &self.inner.registry.snapshot().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    fn quiet() -> Lifecycle {
        Lifecycle::builder(Config::default())
            .with_subscribers(Vec::new())
            .build()
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_coordinator_holds_sentinel() {
        let lc = quiet();
        assert_eq!(lc.pending(), 1);
        assert!(!lc.is_cancelled());
        assert!(lc.services().is_empty());

        let report = lc.shutdown(Duration::from_millis(10)).await;
        assert!(report.is_drained());
        assert_eq!(lc.pending(), 0);
        assert!(lc.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn pending_counts_units_until_they_finish() {
        let lc = quiet();
        lc.session(|ctx| async move {
            ctx.cancelled().await;
            Err::<(), _>(UnitError::Canceled)
        });
        lc.service("waiter", |ctx: Lifecycle| async move {
            ctx.cancelled().await;
            Ok::<(), UnitError>(())
        });
        assert_eq!(lc.pending(), 3);

        let report = lc.shutdown(Duration::from_secs(1)).await;
        assert!(report.is_drained());
        assert_eq!(lc.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_shutdown_returns_first_report() {
        let lc = quiet();
        lc.service("stubborn", |_ctx: Lifecycle| async move {
            time::sleep(Duration::from_secs(3600)).await;
            Ok::<(), UnitError>(())
        });
        tokio::task::yield_now().await;

        let first = lc.shutdown(Duration::from_millis(50)).await;
        assert_eq!(first.stragglers(), ["stubborn".to_string()]);

        // The deadline of a later call is ignored; the stored report comes back at once.
        let start = time::Instant::now();
        let second = lc.shutdown(Duration::from_secs(10)).await;
        assert_eq!(second, first);
        assert_eq!(lc.shutdown_and_wait().await, first);
        assert!(start.elapsed() < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn child_token_does_not_cancel_lifecycle() {
        let lc = quiet();
        let token = lc.cancellation_token();
        token.cancel();
        assert!(!lc.is_cancelled());

        let other = lc.cancellation_token();
        lc.shutdown(Duration::from_millis(10)).await;
        assert!(other.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn nested_sessions_are_tracked() {
        let lc = quiet();
        let done = Arc::new(AtomicUsize::new(0));

        let outer_done = Arc::clone(&done);
        lc.session(move |ctx| async move {
            let inner_done = Arc::clone(&outer_done);
            ctx.session(move |ctx| async move {
                ctx.cancelled().await;
                inner_done.fetch_add(1, Ordering::SeqCst);
                Ok::<(), UnitError>(())
            });
            outer_done.fetch_add(1, Ordering::SeqCst);
            Ok::<(), UnitError>(())
        });

        time::sleep(Duration::from_millis(1)).await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert_eq!(lc.pending(), 2);

        let report = lc.shutdown(Duration::from_secs(1)).await;
        assert!(report.is_drained());
        assert_eq!(done.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_session_is_counted_as_outstanding() {
        let lc = quiet();
        lc.session(|_ctx| async move {
            time::sleep(Duration::from_secs(3600)).await;
            Ok::<(), UnitError>(())
        });

        let report = lc.shutdown(Duration::from_millis(100)).await;
        assert_eq!(report.sessions_outstanding(), 1);
        assert!(report.stragglers().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn services_with_same_name_get_distinct_ids() {
        let lc = quiet();
        let a = lc.service("dup", |ctx: Lifecycle| async move {
            ctx.cancelled().await;
            Ok::<(), UnitError>(())
        });
        let b = lc.service("dup", |ctx: Lifecycle| async move {
            ctx.cancelled().await;
            Ok::<(), UnitError>(())
        });
        assert_ne!(a, b);
        assert_eq!(lc.services().len(), 2);

        lc.shutdown(Duration::from_secs(1)).await;
        time::sleep(Duration::from_millis(1)).await;
        assert!(lc.services().iter().all(|s| s.finished));
    }
}
