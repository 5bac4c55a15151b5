//! # OS termination signals.
//!
//! [`wait_for_shutdown_signal`] resolves with the name of the first termination signal
//! the process receives. [`Lifecycle::shutdown_on_signal`](crate::Lifecycle::shutdown_on_signal)
//! pairs it with a drain bounded by [`Config::grace`](crate::Config::grace).
//!
//! | Platform  | Signals                       |
//! |-----------|-------------------------------|
//! | Unix      | `SIGINT`, `SIGTERM`, `SIGQUIT` |
//! | elsewhere | Ctrl-C                        |

use crate::error::RuntimeError;

/// Waits for a termination signal and returns its name (e.g. `"SIGTERM"`).
///
/// Listeners are registered per call. Fails with [`RuntimeError::Signal`] if the OS
/// refuses the registration.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> Result<&'static str, RuntimeError> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut quit = signal(SignalKind::quit())?;

    let name = tokio::select! {
        _ = interrupt.recv() => "SIGINT",
        _ = terminate.recv() => "SIGTERM",
        _ = quit.recv() => "SIGQUIT",
    };
    Ok(name)
}

/// Waits for a termination signal and returns its name (`"ctrl-c"`).
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> Result<&'static str, RuntimeError> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}
