//! Handles for background services.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

/// A spawned periodic service with an explicit shutdown signal.
#[derive(Debug)]
pub struct ServiceHandle {
    name: &'static str,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ServiceHandle {
    pub(crate) fn new(name: &'static str, shutdown: watch::Sender<bool>, task: JoinHandle<()>) -> Self {
        Self { name, shutdown, task }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal shutdown and wait for the current iteration to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(service = self.name, error = %e, "Service task ended abnormally");
        }
    }
}
