use std::sync::Arc;
use std::time::Duration as StdDuration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::registry::SessionRegistry;

/// Handle to the background sweeper task. Dropping it does not stop the
/// task — call `stop` explicitly to join it.
pub struct SweeperHandle {
    cancel: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl SweeperHandle {
    pub async fn stop(self) {
        let _ = self.cancel.send(true);
        let _ = self.join.await;
    }
}

impl SessionRegistry {
    /// `StartSweeper(ctx)`: background loop at `interval`, stops on
    /// cancellation signalled through `stop()`.
    pub fn start_sweeper(self: &Arc<Self>, interval: StdDuration) -> SweeperHandle {
        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        let registry = self.clone();

        let join = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        let n = registry.sweep();
                        if n > 0 {
                            debug!(evicted = n, "session sweeper evicted expired sessions");
                        }
                    }
                    _ = cancel_rx.changed() => {
                        if *cancel_rx.borrow() {
                            info!("session sweeper stopping");
                            break;
                        }
                    }
                }
            }
        });

        SweeperHandle { cancel: cancel_tx, join }
    }
}
