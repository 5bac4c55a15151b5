//! # Panic interception for supervised units.
//!
//! [`guarded`] is the protected-call boundary every session and service attempt runs
//! behind. A panic raised while the unit future is polled is caught with
//! `catch_unwind` and returned as [`UnitError::Panicked`] carrying a [`Fault`], so it
//! flows through the same path as an ordinary returned error.
//!
//! ## Traces
//! By the time `catch_unwind` returns, the panicking frames are gone. To keep the
//! stack of the panic site, [`install_trace_hook`] registers a process-wide panic hook
//! (once, chained in front of whatever hook was installed before) which records a
//! backtrace and the panic location into a thread-local slot. Unit futures are polled
//! and caught on the same thread, so [`guarded`] picks up the slot right after the
//! unwind. The slot is cleared before every poll, so a capture left by a panic caught
//! elsewhere never leaks into a unit's fault. If the slot is empty (another hook
//! replaced ours) the trace of the recovery site is captured instead.
//!
//! ```text
//! guarded(fut)
//!   └─► AssertUnwindSafe(fut).catch_unwind()
//!         ├─ Ok(res)    ─► res
//!         └─ Err(panic) ─► hook slot (trace + location) ─► Fault ─► UnitError::Panicked
//! ```
//!
//! **Warning**: `AssertUnwindSafe` is used, which can leave shared state inconsistent
//! if a unit uses `Arc<Mutex<T>>` and panics while holding the lock.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::Cell;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::pin;
use std::sync::{Arc, Mutex, Once, PoisonError};

use futures::FutureExt;
use futures::future::poll_fn;
use thiserror::Error;

use crate::error::UnitError;

/// Trace data recorded by the panic hook for the current thread.
struct Captured {
    location: Option<String>,
    trace: String,
}

thread_local! {
    static LAST_PANIC: Cell<Option<Captured>> = const { Cell::new(None) };
}

static TRACE_HOOK: Once = Once::new();

/// Original panic value, shared by clones of a [`Fault`].
type RawPayload = Arc<Mutex<Option<Box<dyn Any + Send>>>>;

/// A recovered panic: payload, panic location and a captured backtrace.
///
/// Behaves as an ordinary error; `Display` shows the payload text and location only.
/// The original panic value is kept as well and can be taken back with
/// [`take_payload`](Fault::take_payload).
#[derive(Error, Clone)]
pub struct Fault {
    payload: String,
    raw: RawPayload,
    location: Option<String>,
    trace: Arc<str>,
}

impl Fault {
    /// Creates a fault from its parts.
    pub fn new(
        payload: impl Into<String>,
        location: Option<String>,
        trace: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            payload: payload.into(),
            raw: Arc::new(Mutex::new(None)),
            location,
            trace: trace.into(),
        }
    }

    /// Builds a fault from a `catch_unwind` payload, consuming the hook slot of the
    /// current thread.
    pub(crate) fn from_panic(panic: Box<dyn Any + Send>) -> Self {
        let text = panic_message(&*panic);
        let fault = match LAST_PANIC.with(Cell::take) {
            Some(captured) => Self::new(text, captured.location, captured.trace),
            None => Self::new(text, None, Backtrace::force_capture().to_string()),
        };
        *fault.raw_slot() = Some(panic);
        fault
    }

    fn raw_slot(&self) -> std::sync::MutexGuard<'_, Option<Box<dyn Any + Send>>> {
        self.raw.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Panic payload rendered as text (`"unknown panic"` for non-string payloads).
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Takes the original panic value, e.g. to downcast it or hand it to
    /// [`std::panic::resume_unwind`].
    ///
    /// Clones share the value: the first call on any of them gets it, later calls
    /// (and faults built with [`Fault::new`]) return `None`.
    pub fn take_payload(&self) -> Option<Box<dyn Any + Send>> {
        self.raw_slot().take()
    }

    /// Whether the original panic value is still held and is of type `T`.
    pub fn payload_is<T: Any>(&self) -> bool {
        self.raw_slot().as_ref().is_some_and(|p| p.is::<T>())
    }

    /// `file:line:col` of the panic, when known.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Captured backtrace, rendered.
    pub fn trace(&self) -> &str {
        &self.trace
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "panic: '{}'", self.payload)?;
        if let Some(loc) = &self.location {
            write!(f, " at {loc}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fault")
            .field("payload", &self.payload)
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

/// Installs the trace-recording panic hook. Idempotent; the previous hook keeps running.
///
/// The hook is process-wide and captures a full backtrace for every panic on any
/// thread, including panics outside supervised units.
/// [`LifecycleBuilder::build`](crate::LifecycleBuilder::build) calls this unless
/// [`with_trace_hook(false)`](crate::LifecycleBuilder::with_trace_hook) was set.
pub fn install_trace_hook() {
    TRACE_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let captured = Captured {
                location: info
                    .location()
                    .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column())),
                trace: Backtrace::force_capture().to_string(),
            };
            LAST_PANIC.with(|slot| slot.set(Some(captured)));
            previous(info);
        }));
    });
}

/// Runs `fut` to completion, converting a panic into [`UnitError::Panicked`].
///
/// Construct the unit's future *inside* the argument (e.g. `guarded(async move {
/// body(ctx).await })`) so that panics raised while building it are caught too.
pub async fn guarded<F>(fut: F) -> Result<(), UnitError>
where
    F: Future<Output = Result<(), UnitError>>,
{
    let mut caught = pin!(AssertUnwindSafe(fut).catch_unwind());
    let outcome = poll_fn(|cx| {
        // Drop captures of panics recovered elsewhere on this thread.
        LAST_PANIC.with(Cell::take);
        caught.as_mut().poll(cx)
    })
    .await;

    match outcome {
        Ok(res) => res,
        Err(panic) => Err(UnitError::Panicked(Fault::from_panic(panic))),
    }
}

pub(crate) fn panic_message(any: &(dyn Any + Send)) -> String {
    if let Some(msg) = any.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = any.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn explode() -> Result<(), UnitError> {
        panic!("Immediate panic, oh no")
    }

    async fn explode_with(n: u32) -> Result<(), UnitError> {
        panic!("counter reached {n}")
    }

    async fn explode_opaque() -> Result<(), UnitError> {
        std::panic::panic_any(42_u32)
    }

    #[tokio::test]
    async fn ok_and_err_pass_through() {
        assert!(guarded(async { Ok(()) }).await.is_ok());

        let res = guarded(async { Err(UnitError::fail("nope")) }).await;
        assert!(matches!(res, Err(UnitError::Fail { ref error }) if error == "nope"));
    }

    #[tokio::test]
    async fn str_panic_becomes_fault() {
        install_trace_hook();
        let res = guarded(explode()).await;

        let Err(UnitError::Panicked(fault)) = res else {
            panic!("expected a fault");
        };
        assert_eq!(fault.payload(), "Immediate panic, oh no");
        assert!(fault.location().is_some_and(|l| l.contains("fault.rs")));
        assert!(!fault.trace().is_empty());
    }

    #[tokio::test]
    async fn formatted_panic_payload_is_kept() {
        install_trace_hook();
        let res = guarded(explode_with(5)).await;
        let err = res.unwrap_err();
        assert!(err.is_panic());
        assert!(err.to_string().starts_with("panic: 'counter reached 5'"));
    }

    #[tokio::test]
    async fn non_string_payload_is_unknown_but_kept() {
        install_trace_hook();
        let res = guarded(explode_opaque()).await;
        let Err(UnitError::Panicked(fault)) = res else {
            panic!("expected a fault");
        };
        assert_eq!(fault.payload(), "unknown panic");
        assert!(fault.payload_is::<u32>());

        let copy = fault.clone();
        let raw = copy.take_payload().expect("original payload");
        assert_eq!(raw.downcast_ref::<u32>(), Some(&42));
        assert!(fault.take_payload().is_none());
    }

    #[tokio::test]
    async fn stale_capture_is_discarded() {
        LAST_PANIC.with(|slot| {
            slot.set(Some(Captured {
                location: Some("elsewhere.rs:1:1".into()),
                trace: "stale".into(),
            }))
        });

        assert!(guarded(async { Ok(()) }).await.is_ok());
        assert!(LAST_PANIC.with(Cell::take).is_none());
    }

    #[test]
    fn display_without_location() {
        let fault = Fault::new("boom", None, "");
        assert_eq!(fault.to_string(), "panic: 'boom'");
        assert!(fault.take_payload().is_none());
    }
}
