//! Restart policies.
//!
//! This module groups the knobs that control **how long** a service waits between
//! attempts.
//!
//! ## Contents
//! - [`FailureWindow`] sliding window of recent failures → rate → restart delay
//!
//! ## Quick wiring
//! ```text
//! core::service::run_service
//!      ├─► window.next_delay(now) before every attempt (0 while healthy)
//!      └─► window.record_failure(now) after a failed or panicked attempt
//! ```
//!
//! ## Defaults
//! - window capacity = [`DEFAULT_WINDOW`] (5), overridable with
//!   [`Config::failure_window`](crate::Config::failure_window).

mod backoff;

pub use backoff::{DEFAULT_WINDOW, FailureWindow};
