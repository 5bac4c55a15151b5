use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;

use crate::core::{Config, Lifecycle};
use crate::events::Bus;
use crate::fault;
use crate::subscribers::{LogWriter, Subscribe, SubscriberSet};

/// Builder for constructing a [`Lifecycle`] with custom subscribers.
pub struct LifecycleBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    trace_hook: bool,
}

impl LifecycleBuilder {
    /// Creates a new builder with the given configuration.
    ///
    /// The subscriber list starts with the built-in [`LogWriter`].
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: vec![Arc::new(LogWriter::new())],
            trace_hook: true,
        }
    }

    /// Replaces the event subscribers (including the default [`LogWriter`]).
    ///
    /// Subscribers receive runtime events through dedicated workers with bounded
    /// queues. Pass an empty vector to disable event delivery entirely.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Adds one subscriber to the current list.
    pub fn with_subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Whether [`build`](Self::build) installs the panic trace hook (default `true`).
    ///
    /// The hook is process-wide: once installed it captures a full backtrace for
    /// **every** panic in the process, not only panics inside units. With the hook
    /// off, a unit panic still becomes a [`Fault`](crate::Fault), but its trace is
    /// taken at the recovery site and its location is unknown. A hook installed
    /// earlier (by another builder or [`install_trace_hook`](crate::install_trace_hook))
    /// stays installed.
    pub fn with_trace_hook(mut self, enabled: bool) -> Self {
        self.trace_hook = enabled;
        self
    }

    /// Builds the coordinator and starts the event listener.
    ///
    /// The listener ends (after flushing subscriber queues) once the last
    /// [`Lifecycle`] handle is dropped.
    ///
    /// # Panics
    /// Panics if called outside of a Tokio runtime.
    pub fn build(self) -> Lifecycle {
        if self.trace_hook {
            fault::install_trace_hook();
        }
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        spawn_listener(&bus, self.subscribers);
        Lifecycle::from_parts(self.cfg, bus)
    }
}

/// Subscribes to the bus and forwards events to the subscriber set (fire-and-forget).
fn spawn_listener(bus: &Bus, subscribers: Vec<Arc<dyn Subscribe>>) {
    if subscribers.is_empty() {
        return;
    }
    let mut rx = bus.subscribe();
    let set = SubscriberSet::new(subscribers);

    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ev) => set.emit(&ev),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event listener lagged; events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
        set.shutdown().await;
    });
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn trace_hook_is_on_by_default() {
        assert!(LifecycleBuilder::new(Config::default()).trace_hook);
        assert!(
            !LifecycleBuilder::new(Config::default())
                .with_trace_hook(false)
                .trace_hook
        );
    }

    #[tokio::test]
    async fn builds_without_trace_hook() {
        let lc = LifecycleBuilder::new(Config::default())
            .with_subscribers(Vec::new())
            .with_trace_hook(false)
            .build();
        assert_eq!(lc.pending(), 1);
        assert!(lc.shutdown(Duration::from_millis(10)).await.is_drained());
    }
}
