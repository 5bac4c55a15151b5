//! # Event subscribers for the lifevisor runtime.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out and the
//! built-in [`LogWriter`].
//!
//! ## Architecture
//! ```text
//! Lifecycle / units ── publish(Event) ──► Bus ──► listener ──► SubscriberSet::emit(&Event)
//!                                                                 ┌─────────┼─────────┐
//!                                                                 ▼         ▼         ▼
//!                                                             LogWriter  Metrics   Custom
//! ```

mod log;
mod set;
mod subscribe;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
