use super::{CamviewApp, ShutdownReason};
use crate::error::{CamviewError, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::oneshot;
use tracing::{info, warn};

type SharedSender = Arc<Mutex<Option<oneshot::Sender<ShutdownReason>>>>;

impl CamviewApp {
    /// Wait for a shutdown request or signal, then shut down gracefully
    pub async fn run(&mut self) -> Result<i32> {
        info!("camview is running");

        let shutdown_receiver =
            self.shutdown_receiver
                .take()
                .ok_or_else(|| CamviewError::System {
                    message: "Shutdown receiver already taken".to_string(),
                })?;

        setup_signal_handlers(Arc::clone(&self.shutdown_sender));

        let shutdown_reason = shutdown_receiver.await.map_err(|_| CamviewError::System {
            message: "Shutdown channel closed unexpectedly".to_string(),
        })?;

        info!("Shutdown initiated: {:?}", shutdown_reason);

        let mut exit_code = self.shutdown().await?;
        if matches!(shutdown_reason, ShutdownReason::Error(_)) {
            exit_code = exit_code.max(1);
        }

        info!("camview shutdown complete");
        Ok(exit_code)
    }
}

fn send_reason(sender: &SharedSender, reason: ShutdownReason) {
    if let Some(sender) = sender.lock().take() {
        let _ = sender.send(reason);
    }
}

/// Set up signal handlers for graceful shutdown
fn setup_signal_handlers(shutdown_sender: SharedSender) {
    // SIGTERM from systemd and friends
    #[cfg(unix)]
    {
        let sender = Arc::clone(&shutdown_sender);
        tokio::spawn(async move {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    if sigterm.recv().await.is_some() {
                        info!("Received SIGTERM signal");
                        send_reason(&sender, ShutdownReason::Signal("SIGTERM".to_string()));
                    }
                }
                Err(e) => warn!("Failed to register SIGTERM handler: {}", e),
            }
        });
    }

    tokio::spawn(async move {
        if let Ok(()) = signal::ctrl_c().await {
            info!("Received SIGINT signal (Ctrl+C)");
            send_reason(&shutdown_sender, ShutdownReason::Signal("SIGINT".to_string()));
        }
    });
}
