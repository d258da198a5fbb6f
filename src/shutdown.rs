use anyhow::Result;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::observability::engine_metrics;

/// Graceful shutdown for the long-running sweeper.
///
/// Holds a watch flag; sweeps check it between processes, so an
/// in-flight transition always finishes.
pub struct ShutdownCoordinator {
    sender: Arc<watch::Sender<bool>>,
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }

    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.sender.borrow()
    }

    /// Flip the flag on Ctrl-C
    pub fn install_signal_handlers(&self) -> Result<()> {
        info!("Installing signal handlers for graceful shutdown");
        let sender = self.sender.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Shutdown signal received, finishing in-flight work");
                    sender.send_replace(true);
                }
                Err(e) => warn!("Failed to listen for shutdown signal: {}", e),
            }
        });
        Ok(())
    }

    /// Final bookkeeping once the workers have stopped
    pub fn finish(&self) {
        engine_metrics().log_stats();
        info!("Graceful shutdown completed successfully");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_reaches_subscribers() {
        let coordinator = ShutdownCoordinator::new();
        let mut rx = coordinator.subscribe();
        assert!(!*rx.borrow());

        coordinator.trigger();
        rx.changed().await.unwrap();
        assert!(*rx.borrow());
        assert!(coordinator.is_triggered());
    }
}
