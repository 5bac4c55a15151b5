//! Runtime core: coordination and lifecycle.
//!
//! The public API from this module is [`Lifecycle`] (plus its builder, config,
//! identifiers and shutdown report).
//!
//! Internal modules:
//! - [`lifecycle`]: the coordinator; registration, cancellation, bounded shutdown;
//! - [`pending`]: pending-unit counter with single-fire tickets;
//! - [`registry`]: service entries and live-session count for straggler reports;
//! - [`session`]: one-shot unit wrapper;
//! - [`service`]: restart loop with failure-rate backoff;
//! - [`shutdown`]: cross-platform shutdown signal handling.

mod builder;
mod config;
mod lifecycle;
mod pending;
mod registry;
mod report;
mod service;
mod session;
mod shutdown;

pub use builder::LifecycleBuilder;
pub use config::Config;
pub use lifecycle::Lifecycle;
pub use registry::{ServiceId, ServiceStatus, SessionId};
pub use report::ShutdownReport;
pub use shutdown::wait_for_shutdown_signal;
