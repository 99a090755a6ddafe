//! Signal handling for the long-running samples.

use tokio::signal;
use tracing::{error, info};

/// Waits for SIGTERM or SIGINT.
///
/// A handler that cannot be installed never fires; the other one still
/// does.
pub async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}
