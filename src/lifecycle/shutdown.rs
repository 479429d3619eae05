//! Shutdown coordination.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Stops background tasks and waits for their last export.
///
/// Tasks subscribe before they are spawned and are handed back with
/// [`Shutdown::track`]; [`Shutdown::complete`] signals them and waits for each.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            tasks: Vec::new(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Wait for `handle` when shutting down.
    pub fn track(&mut self, name: &'static str, handle: JoinHandle<()>) {
        self.tasks.push((name, handle));
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Signal every subscriber, then give each tracked task up to `grace` to
    /// finish. Returns how many finished cleanly.
    pub async fn complete(self, grace: Duration) -> usize {
        self.trigger();

        let mut finished = 0;
        for (name, handle) in self.tasks {
            match tokio::time::timeout(grace, handle).await {
                Ok(Ok(())) => {
                    tracing::debug!(task = name, "Task stopped");
                    finished += 1;
                }
                Ok(Err(e)) => {
                    tracing::error!(task = name, error = %e, "Task failed during shutdown");
                }
                Err(_) => {
                    tracing::warn!(
                        task = name,
                        grace_ms = grace.as_millis() as u64,
                        "Task did not stop in time, abandoning it"
                    );
                }
            }
        }
        finished
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
