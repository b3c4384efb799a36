//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT)
//! - Translate signals to the internal shutdown event
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Config reload is driven by the file watcher, not SIGHUP

use crate::lifecycle::shutdown::Shutdown;

/// Listen for termination signals and trigger shutdown once.
///
/// Consumes the coordinator; subscribe all interested tasks first.
pub fn spawn_signal_handler(shutdown: Shutdown) {
    tokio::spawn(async move {
        wait_for_termination().await;
        shutdown.trigger();
    });
}

#[cfg(unix)]
async fn wait_for_termination() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("SIGINT received, shutting down");
        }
        _ = sigterm.recv() => {
            tracing::info!("SIGTERM received, shutting down");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_termination() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("Ctrl+C received, shutting down");
    }
}
