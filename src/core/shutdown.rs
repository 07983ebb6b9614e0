//! # Process termination signals.
//!
//! [`termination`] completes when the host process is asked to stop. It is the default
//! shutdown trigger of [`Synchronizer::run`](crate::Synchronizer::run); hosts with their
//! own signal handling use [`Synchronizer::run_until`](crate::Synchronizer::run_until).
//!
//! **Unix:** `SIGINT`, `SIGTERM` (systemd/Kubernetes), `SIGQUIT`.
//! **Other platforms:** `Ctrl-C` via [`tokio::signal::ctrl_c`].

/// Completes on the first termination signal.
///
/// If the listeners cannot be installed, a warning is logged and the future never
/// completes, so the synchronizer keeps polling instead of stopping at startup.
pub(crate) async fn termination() {
    if let Err(e) = wait_for_signal().await {
        tracing::warn!(error = %e, "cannot listen for termination signals");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = sigint.recv()  => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
