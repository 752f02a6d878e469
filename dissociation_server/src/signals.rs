// SPDX-License-Identifier: MIT OR Apache-2.0
//! Unix signal handling for graceful shutdown.

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns when either signal is received. If a handler cannot be
/// registered the error is logged and the future never resolves.
pub async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                (Err(e), _) | (_, Err(e)) => {
                    tracing::error!("Failed to register shutdown signal handlers: {}", e);
                    return std::future::pending().await;
                },
            };

        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                tracing::info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl+c: {}", e);
            return std::future::pending().await;
        }
        tracing::info!("Received Ctrl+C");
    }
}
