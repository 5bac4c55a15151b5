//! # Function-backed service (`ServiceFn`)
//!
//! [`ServiceFn`] wraps a closure `F: Fn(Lifecycle) -> Fut`, producing a fresh future
//! per attempt. Nothing is shared between attempts unless the closure captures it
//! explicitly (e.g. an `Arc<AtomicUsize>` counter).
//!
//! ## Example
//! ```rust
//! use lifevisor::{Lifecycle, ServiceFn, ServiceRef, UnitError};
//!
//! let svc: ServiceRef = ServiceFn::arc("worker", |ctx: Lifecycle| async move {
//!     while !ctx.is_cancelled() {
//!         ctx.cancelled().await;
//!     }
//!     Ok::<_, UnitError>(())
//! });
//!
//! assert_eq!(svc.name(), "worker");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::Lifecycle;
use crate::error::UnitError;
use crate::units::Service;

/// Function-backed service implementation.
pub struct ServiceFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> ServiceFn<F> {
    /// Creates a new function-backed service.
    ///
    /// Prefer [`ServiceFn::arc`] when you immediately need a [`ServiceRef`](crate::ServiceRef).
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the service and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> Service for ServiceFn<F>
where
    F: Fn(Lifecycle) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), UnitError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: Lifecycle) -> Result<(), UnitError> {
        (self.f)(ctx).await
    }
}
