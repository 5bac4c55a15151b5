//! # Unit registry.
//!
//! Keeps one entry per registered service (`id → name + finished`) and a live count of
//! sessions. Entries are keyed by a unique [`ServiceId`], so registering two services
//! under the same name yields two entries.
//!
//! ## Rules
//! - The map is behind a `std::sync::Mutex`; the lock is never held across an `.await`.
//! - `finished` flips `false → true` once, when the service loop exits.
//! - Finished entries are kept: the registry is the source of the straggler report
//!   and of [`Lifecycle::services`](crate::Lifecycle::services).

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Identifier of a registered service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServiceId(pub(crate) u64);

/// Identifier of a registered session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub(crate) u64);

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "service-{}", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Snapshot of one registry entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceStatus {
    /// Registry key.
    pub id: ServiceId,
    /// Name given at registration.
    pub name: Arc<str>,
    /// Whether the service loop has exited.
    pub finished: bool,
}

#[derive(Debug)]
struct Entry {
    name: Arc<str>,
    finished: bool,
}

/// Registry of services and live-session count.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    services: Mutex<BTreeMap<ServiceId, Entry>>,
    sessions: AtomicUsize,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<ServiceId, Entry>> {
        // Entries stay consistent even if a holder panicked: every write is a single insert/assign.
        self.services.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds an unfinished entry for `name` under `id`.
    pub(crate) fn register(&self, id: ServiceId, name: Arc<str>) {
        self.lock().insert(
            id,
            Entry {
                name,
                finished: false,
            },
        );
    }

    /// Marks the entry finished. Returns `false` if it was already finished or unknown.
    pub(crate) fn mark_finished(&self, id: ServiceId) -> bool {
        match self.lock().get_mut(&id) {
            Some(entry) if !entry.finished => {
                entry.finished = true;
                true
            }
            _ => false,
        }
    }

    /// Sorted names of services that have not finished.
    pub(crate) fn stragglers(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .lock()
            .values()
            .filter(|e| !e.finished)
            .map(|e| e.name.to_string())
            .collect();
        names.sort_unstable();
        names
    }

    /// All entries, sorted by name then id.
    pub(crate) fn snapshot(&self) -> Vec<ServiceStatus> {
        let mut all: Vec<ServiceStatus> = self
            .lock()
            .iter()
            .map(|(id, e)| ServiceStatus {
                id: *id,
                name: Arc::clone(&e.name),
                finished: e.finished,
            })
            .collect();
        all.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        all
    }

    pub(crate) fn session_started(&self) {
        self.sessions.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn session_finished(&self) {
        self.sessions.fetch_sub(1, Ordering::AcqRel);
    }

    /// Sessions registered and not yet finished.
    pub(crate) fn live_sessions(&self) -> usize {
        self.sessions.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_name_gives_distinct_entries() {
        let reg = Registry::new();
        reg.register(ServiceId(1), "worker".into());
        reg.register(ServiceId(2), "worker".into());

        let all = reg.snapshot();
        assert_eq!(all.len(), 2);
        assert_eq!(reg.stragglers(), vec!["worker", "worker"]);
    }

    #[test]
    fn finished_entries_are_not_stragglers() {
        let reg = Registry::new();
        reg.register(ServiceId(1), "b".into());
        reg.register(ServiceId(2), "a".into());
        reg.register(ServiceId(3), "c".into());

        assert!(reg.mark_finished(ServiceId(3)));
        assert!(!reg.mark_finished(ServiceId(3)));
        assert!(!reg.mark_finished(ServiceId(42)));

        assert_eq!(reg.stragglers(), vec!["a", "b"]);
        let names: Vec<(String, bool)> = reg
            .snapshot()
            .into_iter()
            .map(|s| (s.name.to_string(), s.finished))
            .collect();
        assert_eq!(
            names,
            vec![
                ("a".to_string(), false),
                ("b".to_string(), false),
                ("c".to_string(), true)
            ]
        );
    }

    #[test]
    fn concurrent_registration_keeps_every_entry() {
        let reg = Arc::new(Registry::new());
        let handles: Vec<_> = (0..32)
            .map(|i| {
                let reg = Arc::clone(&reg);
                std::thread::spawn(move || {
                    reg.register(ServiceId(i), format!("svc-{}", i % 4).into());
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(reg.snapshot().len(), 32);
    }

    #[test]
    fn session_count() {
        let reg = Registry::new();
        reg.session_started();
        reg.session_started();
        reg.session_finished();
        assert_eq!(reg.live_sessions(), 1);
    }
}
