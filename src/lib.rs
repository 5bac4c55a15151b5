//! # lifevisor
//!
//! **Lifevisor** is a small process-lifecycle supervisor for Tokio applications.
//!
//! It manages the birth, cooperative cancellation and bounded-time graceful shutdown
//! of concurrently running units of work, and keeps a unit's panic from taking the
//! process down: panics are converted into ordinary, loggable errors, and long-running
//! units are restarted with a backoff derived from their recent failure rate.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     session(f)          service(name, f)      service(name, f)
//!         │                      │                     │
//!         ▼                      ▼                     ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Lifecycle (coordinator)                                          │
//! │  - CancellationToken (one-shot, level-triggered broadcast)        │
//! │  - Pending counter (+1 sentinel until shutdown, single-fire -1)   │
//! │  - Registry (service id → name, finished; live sessions)          │
//! │  - Bus (broadcast events)                                         │
//! └──────┬──────────────────┬──────────────────┬───────────────┬──────┘
//!        ▼                  ▼                  ▼               │
//!  ┌─────────────┐   ┌──────────────┐   ┌──────────────┐       │
//!  │ run_session │   │ run_service  │   │ run_service  │       │
//!  │ (one shot)  │   │ (retry loop) │   │ (retry loop) │       │
//!  └─────┬───────┘   └──────┬───────┘   └──────┬───────┘       │
//!        │ guarded()        │ guarded()        │ guarded()     │
//!        │ SessionFailed    │ ServiceFailed    │ BackoffSched. │
//!        ▼                  ▼                  ▼               ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       listener ──► SubscriberSet ──► LogWriter (tracing), custom...
//! ```
//!
//! ### Service loop
//! ```text
//! loop {
//!   ├─► cancelled? → exit
//!   ├─► delay = FailureWindow::next_delay(now)   (0s / 1s / 2s / 4s / 8s)
//!   ├─► sleep(delay) (cancellable)
//!   ├─► guarded(body(ctx))
//!   │       ├─ Ok / Canceled → restart
//!   │       └─ Fail / Panic  → record failure, restart
//!   └─► yield
//! }
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types                              |
//! |-------------------|---------------------------------------------------------------|----------------------------------------|
//! | **Coordination**  | Register units, broadcast cancellation, bounded shutdown.     | [`Lifecycle`], [`ShutdownReport`]      |
//! | **Units**         | One-shot sessions and restartable services.                   | [`Service`], [`ServiceFn`]             |
//! | **Backoff**       | Failure-rate driven restart delay.                            | [`FailureWindow`]                      |
//! | **Faults**        | Panics recovered as errors with payload and backtrace.        | [`Fault`], [`guarded`]                 |
//! | **Errors**        | Typed errors for units and the runtime.                       | [`UnitError`], [`RuntimeError`]        |
//! | **Events**        | Lifecycle events fanned out to subscribers.                   | [`Event`], [`Subscribe`], [`LogWriter`]|
//! | **Configuration** | Centralize runtime settings.                                  | [`Config`]                             |
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
//!     // Long-running: restarted if it returns, fails or panics before shutdown.
//!     lc.service("accept-loop", |ctx: Lifecycle| async move {
//!         while !ctx.is_cancelled() {
//!             tokio::time::sleep(Duration::from_millis(20)).await;
//!             // accept a connection, then hand it to a session:
//!             ctx.session(|conn_ctx| async move {
//!                 if conn_ctx.is_cancelled() {
//!                     return Err(UnitError::Canceled);
//!                 }
//!                 Ok::<(), UnitError>(())
//!             });
//!         }
//!         Ok::<(), UnitError>(())
//!     });
//!
//!     tokio::time::sleep(Duration::from_millis(100)).await;
//!     let report = lc.shutdown(Duration::from_secs(1)).await;
//!     assert!(report.is_drained());
//! }
//! ```

mod core;
mod error;
mod events;
mod fault;
mod policies;
mod subscribers;
mod units;

// ---- Public re-exports ----

pub use crate::core::{
    Config, Lifecycle, LifecycleBuilder, ServiceId, ServiceStatus, SessionId, ShutdownReport,
    wait_for_shutdown_signal,
};
pub use error::{RuntimeError, UnitError};
pub use events::{Event, EventKind};
pub use fault::{Fault, guarded, install_trace_hook};
pub use policies::{DEFAULT_WINDOW, FailureWindow};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use units::{Service, ServiceFn, ServiceRef};
