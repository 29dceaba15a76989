use std::sync::Arc;

use tokio::{sync::watch, task::JoinHandle};

use crate::queue::OfflineQueue;

/// Follows the connectivity signal and runs the queue each time it goes
/// from offline to online, starting from the queue's own notion of
/// connectivity.
///
/// The task ends when the sender side of `online` is dropped.
pub fn watch_connectivity(
    queue: Arc<OfflineQueue>,
    mut online: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut was_online = queue.is_online();
        loop {
            let is_online = *online.borrow_and_update();
            queue.set_online(is_online);
            if is_online && !was_online {
                tracing::info!("back online, replaying queue");
                if let Err(err) = queue.process_queue().await {
                    tracing::error!("queue run failed: {err}");
                }
            } else if !is_online && was_online {
                tracing::info!("went offline, mutations will be queued");
            }
            was_online = is_online;

            if online.changed().await.is_err() {
                break;
            }
        }
    })
}
