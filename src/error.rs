//! Error types used by the lifevisor runtime and by supervised units.
//!
//! This module defines two main error enums:
//!
//! - [`UnitError`]: outcome of a single session run or service attempt.
//! - [`RuntimeError`]: errors raised by the runtime itself.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics.
//!
//! A shutdown that exceeds its deadline is **not** an error: it is reported through
//! [`ShutdownReport`](crate::ShutdownReport).

use std::fmt;

use thiserror::Error;

use crate::fault::Fault;

/// # Errors produced by a supervised unit.
///
/// Sessions and services return `Result<(), UnitError>`. A panic inside a unit body is
/// recovered by the runtime and surfaces as [`UnitError::Panicked`], so from the
/// supervisor's point of view it is handled exactly like a returned failure.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum UnitError {
    /// Unit execution failed; a service will be restarted after backoff.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Unit body panicked; the panic was intercepted and recovered.
    #[error(transparent)]
    Panicked(#[from] Fault),

    /// Unit observed cancellation and exited gracefully.
    #[error("context cancelled")]
    Canceled,
}

impl UnitError {
    /// Builds a [`UnitError::Fail`] from anything printable.
    ///
    /// # Example
    /// ```
    /// use lifevisor::UnitError;
    ///
    /// let err = UnitError::fail("connection refused");
    /// assert_eq!(err.to_string(), "execution failed: connection refused");
    /// ```
    pub fn fail(error: impl fmt::Display) -> Self {
        UnitError::Fail {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use lifevisor::UnitError;
    ///
    /// assert_eq!(UnitError::Canceled.as_label(), "unit_canceled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            UnitError::Fail { .. } => "unit_failed",
            UnitError::Panicked(_) => "unit_panicked",
            UnitError::Canceled => "unit_canceled",
        }
    }

    /// Returns a human-readable message with details about the error.
    ///
    /// For panics only the payload and location are included; the captured trace is
    /// available through [`Fault::trace`].
    pub fn as_message(&self) -> String {
        match self {
            UnitError::Fail { error } => format!("error: {error}"),
            UnitError::Panicked(fault) => match fault.location() {
                Some(loc) => format!("panic: '{}' at {loc}", fault.payload()),
                None => format!("panic: '{}'", fault.payload()),
            },
            UnitError::Canceled => "context cancelled".to_string(),
        }
    }

    /// Whether this outcome counts as a failure for restart backoff.
    ///
    /// `Canceled` is a graceful exit and is never counted.
    pub fn is_failure(&self) -> bool {
        !matches!(self, UnitError::Canceled)
    }

    /// Whether this error was produced by an intercepted panic.
    pub fn is_panic(&self) -> bool {
        matches!(self, UnitError::Panicked(_))
    }
}

/// # Errors produced by the lifevisor runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Registering OS signal listeners failed.
    #[error("failed to listen for shutdown signals: {0}")]
    Signal(#[from] std::io::Error),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Signal(_) => "runtime_signal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(UnitError::fail("x").as_label(), "unit_failed");
        assert_eq!(UnitError::Canceled.as_label(), "unit_canceled");
        let panicked = UnitError::from(Fault::new("boom", None, String::new()));
        assert_eq!(panicked.as_label(), "unit_panicked");
    }

    #[test]
    fn canceled_is_not_a_failure() {
        assert!(!UnitError::Canceled.is_failure());
        assert!(UnitError::fail("x").is_failure());
        assert!(UnitError::from(Fault::new("boom", None, String::new())).is_failure());
    }

    #[test]
    fn panic_message_includes_location() {
        let err = UnitError::from(Fault::new("boom", Some("src/a.rs:1:2".into()), String::new()));
        assert_eq!(err.as_message(), "panic: 'boom' at src/a.rs:1:2");
        assert!(err.is_panic());
    }
}
