//! # Unit abstractions.
//!
//! This module provides the service-side unit types:
//! - [`Service`] - trait for implementing a named, restartable async body
//! - [`ServiceFn`] - function-based service implementation
//! - [`ServiceRef`] - shared reference to a service (`Arc<dyn Service>`)
//!
//! Sessions need no trait: they are plain `FnOnce(Lifecycle) -> Future` closures
//! passed to [`Lifecycle::session`](crate::Lifecycle::session).

mod service;
mod service_fn;

pub use service::{Service, ServiceRef};
pub use service_fn::ServiceFn;
