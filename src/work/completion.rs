//! One-shot completion handle for background work.

use tokio::sync::oneshot;
use tracing::debug;

/// Create a linked completer/result pair for one unit of background work.
pub fn completion_channel<T>() -> (TaskCompleter<T>, TaskResult<T>) {
    let (tx, rx) = oneshot::channel();
    (TaskCompleter { tx }, TaskResult { rx })
}

/// Write side of the one-shot result handle.
///
/// `resolve` consumes the completer, so resolving a task twice does not
/// compile: the first writer wins structurally rather than via a runtime
/// check.
pub struct TaskCompleter<T> {
    tx: oneshot::Sender<T>,
}

impl<T> TaskCompleter<T> {
    pub fn resolve(self, value: T) {
        if self.tx.send(value).is_err() {
            debug!("Task result receiver dropped before resolution");
        }
    }
}

/// Read side of the one-shot result handle.
pub struct TaskResult<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> TaskResult<T> {
    /// Wait for the task to settle. Returns None when the completer was
    /// dropped without resolving.
    pub async fn settled(self) -> Option<T> {
        self.rx.await.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_delivers_value() {
        let (completer, result) = completion_channel();
        completer.resolve(41usize);
        assert_eq!(result.settled().await, Some(41));
    }

    #[tokio::test]
    async fn test_dropped_completer_settles_as_none() {
        let (completer, result) = completion_channel::<usize>();
        drop(completer);
        assert_eq!(result.settled().await, None);
    }

    #[tokio::test]
    async fn test_resolve_without_receiver_does_not_panic() {
        let (completer, result) = completion_channel();
        drop(result);
        completer.resolve(1usize);
    }
}
