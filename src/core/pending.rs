//! # Pending-unit accounting.
//!
//! [`Pending`] counts units that were registered but have not finished yet, plus the
//! coordinator's own sentinel. Every increment is represented by a [`Ticket`]; a
//! ticket releases its increment **exactly once**, either explicitly through
//! [`Ticket::complete`] or when dropped, so a unit that returns, errors, panics or has
//! its task aborted is always accounted for and never double-counted.
//!
//! ```text
//! add() ──► count += 1 ──► Ticket
//!                            ├─ complete()  ─┐
//!                            └─ drop        ─┴─► CAS fired false→true ─► count -= 1 (once)
//!
//! drained() ──► watch::Receiver::wait_for(count == 0)
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;

/// Counter of registered-but-unfinished units.
#[derive(Debug)]
pub(crate) struct Pending {
    count: watch::Sender<usize>,
}

impl Pending {
    /// Creates a counter at zero.
    pub(crate) fn new() -> Arc<Self> {
        let (count, _rx) = watch::channel(0);
        Arc::new(Self { count })
    }

    /// Increments the counter and returns the ticket that releases it.
    pub(crate) fn add(self: &Arc<Self>) -> Ticket {
        self.count.send_modify(|n| *n += 1);
        Ticket {
            pending: Arc::clone(self),
            fired: AtomicBool::new(false),
        }
    }

    /// Current value.
    pub(crate) fn current(&self) -> usize {
        *self.count.borrow()
    }

    /// Resolves once the counter reaches zero.
    pub(crate) async fn drained(&self) {
        let mut rx = self.count.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    fn release(&self) {
        self.count.send_modify(|n| *n = n.saturating_sub(1));
    }
}

/// Single-fire release of one [`Pending`] increment.
#[derive(Debug)]
pub(crate) struct Ticket {
    pending: Arc<Pending>,
    fired: AtomicBool,
}

impl Ticket {
    /// Releases the increment. Returns `false` if it was already released.
    pub(crate) fn complete(&self) -> bool {
        let first = self
            .fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if first {
            self.pending.release();
        }
        first
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        self.complete();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn complete_is_single_fire() {
        let pending = Pending::new();
        let a = pending.add();
        let b = pending.add();
        assert_eq!(pending.current(), 2);

        assert!(a.complete());
        assert!(!a.complete());
        drop(a);
        assert_eq!(pending.current(), 1);

        drop(b);
        assert_eq!(pending.current(), 0);
    }

    #[test]
    fn concurrent_completion_counts_once() {
        let pending = Pending::new();
        let _other = pending.add();
        let ticket = Arc::new(pending.add());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let t = Arc::clone(&ticket);
                std::thread::spawn(move || t.complete())
            })
            .collect();
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(wins, 1);
        assert_eq!(pending.current(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn drained_waits_for_last_ticket() {
        let pending = Pending::new();
        let ticket = pending.add();

        let waiter = {
            let pending = Arc::clone(&pending);
            tokio::spawn(async move { pending.drained().await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(ticket);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("drained should resolve")
            .unwrap();
    }
}
