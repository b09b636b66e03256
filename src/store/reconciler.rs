use super::models::InAppMessage;
use super::store::MessageStore;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error};

/// Reconciles locally stored messages against the remote active set.
///
/// Messages absent from the remote set are dropped from the returned
/// survivors synchronously, while their database deletion happens in
/// background tasks gated by a permit pool so a large stale backlog cannot
/// flood the blocking thread pool.
pub struct MessageReconciler {
    store: Arc<dyn MessageStore>,
    delete_permits: Arc<Semaphore>,
}

impl MessageReconciler {
    /// Must be called from within a tokio runtime, deletions are spawned
    /// onto it.
    pub fn new(store: Arc<dyn MessageStore>, max_concurrent_deletes: usize) -> Self {
        Self {
            store,
            delete_permits: Arc::new(Semaphore::new(max_concurrent_deletes)),
        }
    }

    /// Return the subset of `saved` still present in `remote`, comparing by
    /// full value. Every dropped message gets a background delete; the
    /// caller never waits for those to land.
    pub fn reconcile(
        &self,
        remote: &[InAppMessage],
        saved: Vec<InAppMessage>,
    ) -> Vec<InAppMessage> {
        let mut survivors = Vec::with_capacity(saved.len());
        for message in saved {
            if remote.contains(&message) {
                survivors.push(message);
            } else {
                debug!("Dropping in-app message {} absent from remote set", message.message_id);
                self.spawn_delete(message.message_id);
            }
        }
        survivors
    }

    fn spawn_delete(&self, message_id: String) {
        let store = self.store.clone();
        let permits = self.delete_permits.clone();
        tokio::spawn(async move {
            // Semaphore is never closed, acquire only fails after close
            let _permit = permits.acquire_owned().await;
            let joined = tokio::task::spawn_blocking(move || {
                store.delete(&message_id);
            })
            .await;
            if let Err(e) = joined {
                error!("In-app message delete task failed: {}", e);
            }
        });
    }
}
