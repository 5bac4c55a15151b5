//! # Service abstraction.
//!
//! A [`Service`] has a stable [`name`](Service::name) and an async [`run`](Service::run)
//! method that receives the [`Lifecycle`] handle. `run` is invoked again every time it
//! returns, fails or panics before cancellation, so it is expected to be a loop that
//! polls [`Lifecycle::is_cancelled`] and exits promptly once shutdown starts.

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::Lifecycle;
use crate::error::UnitError;

/// Shared handle to a service.
pub type ServiceRef = Arc<dyn Service>;

/// # Named, long-running, restartable unit.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use async_trait::async_trait;
/// use lifevisor::{Lifecycle, Service, UnitError};
///
/// struct Ticker;
///
/// #[async_trait]
/// impl Service for Ticker {
///     fn name(&self) -> &str { "ticker" }
///
///     async fn run(&self, ctx: Lifecycle) -> Result<(), UnitError> {
///         while !ctx.is_cancelled() {
///             tokio::time::sleep(Duration::from_millis(100)).await;
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Returns a stable, human-readable service name.
    fn name(&self) -> &str;

    /// Runs one attempt of the service body.
    async fn run(&self, ctx: Lifecycle) -> Result<(), UnitError>;
}
