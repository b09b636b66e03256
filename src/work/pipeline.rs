//! Notification processing pipeline.
//!
//! One processing cycle builds a notification and a delivery event, hands
//! them to the registered handler (if any), and guarantees that the final
//! notification is delivered downstream exactly once, on both the success
//! and the failure path.

use super::completion::TaskCompleter;
use super::models::{NotificationRecord, WorkRequest};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Errors surfaced by one processing cycle.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("malformed notification payload: {0}")]
    Deserialization(#[from] serde_json::Error),
    #[error("notification handler failed: {0}")]
    Handler(#[source] anyhow::Error),
}

/// Cycle metadata passed to the external handler alongside the event.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    pub is_restoring: bool,
    pub timestamp: i64,
}

/// External handler invoked at most once per processed notification.
///
/// The handler may mutate state and complete the event itself (possibly with
/// a modified notification) before returning. Returning an error maps the
/// handler "throwing": the pipeline then force-completes the event with the
/// original notification and propagates the error.
pub trait ReceivedHandler: Send + Sync {
    fn notification_received(
        &self,
        ctx: &HandlerContext,
        event: &ReceivedEvent,
    ) -> anyhow::Result<()>;
}

/// Downstream consumer of the finally-delivered notification.
pub trait DeliverySink: Send + Sync {
    fn deliver(&self, notification: NotificationRecord);
}

/// Owns the completion of one processing cycle.
///
/// Both the handler and the pipeline's forced path may attempt completion;
/// the first attempt wins and repeats are ignored.
pub struct DeliveryController {
    sink: Arc<dyn DeliverySink>,
    completed: AtomicBool,
}

impl DeliveryController {
    fn new(sink: Arc<dyn DeliverySink>) -> Self {
        Self {
            sink,
            completed: AtomicBool::new(false),
        }
    }

    fn complete(&self, notification: NotificationRecord) {
        if self.completed.swap(true, Ordering::SeqCst) {
            debug!(
                "Notification {} already completed, ignoring repeat completion",
                notification.notification_id
            );
            return;
        }
        self.sink.deliver(notification);
    }
}

/// Delivery event bound to one controller and notification.
#[derive(Clone)]
pub struct ReceivedEvent {
    controller: Arc<DeliveryController>,
    notification: NotificationRecord,
}

impl ReceivedEvent {
    /// The notification as received, before any handler modification.
    pub fn notification(&self) -> &NotificationRecord {
        &self.notification
    }

    /// Complete the cycle with the final (possibly modified) notification.
    /// Delivers downstream exactly once; later attempts are no-ops.
    pub fn complete(&self, notification: NotificationRecord) {
        self.controller.complete(notification);
    }
}

/// The processing pipeline itself: one instance shared by the gateway's
/// inline path and the background scheduler.
pub struct NotificationPipeline {
    handler: Option<Arc<dyn ReceivedHandler>>,
    sink: Arc<dyn DeliverySink>,
}

impl NotificationPipeline {
    /// Pipeline without an external handler: every notification is delivered
    /// as received.
    pub fn new(sink: Arc<dyn DeliverySink>) -> Self {
        Self {
            handler: None,
            sink,
        }
    }

    pub fn with_handler(sink: Arc<dyn DeliverySink>, handler: Arc<dyn ReceivedHandler>) -> Self {
        Self {
            handler: Some(handler),
            sink,
        }
    }

    /// Execute one processing cycle for an already-parsed payload.
    ///
    /// A handler failure is logged, the event is force-completed with the
    /// original unmodified notification, and the failure is returned so the
    /// executing context observes the task as failed.
    pub fn process(
        &self,
        request: &WorkRequest,
        payload: serde_json::Value,
    ) -> Result<(), ProcessError> {
        let notification = request.to_notification(payload);
        let controller = Arc::new(DeliveryController::new(Arc::clone(&self.sink)));
        let event = ReceivedEvent {
            controller,
            notification: notification.clone(),
        };
        let ctx = HandlerContext {
            is_restoring: request.is_restoring,
            timestamp: request.timestamp,
        };

        match &self.handler {
            Some(handler) => {
                if let Err(e) = handler.notification_received(&ctx, &event) {
                    error!(
                        "Notification handler failed for {}: {:#}. Delivering the unmodified notification.",
                        request.notification_id, e
                    );
                    event.complete(notification);
                    return Err(ProcessError::Handler(e));
                }
                Ok(())
            }
            None => {
                warn!(
                    "No notification handler registered, delivering notification {} as-is",
                    request.notification_id
                );
                event.complete(notification);
                Ok(())
            }
        }
    }

    /// Background entry point: parses the payload and resolves the one-shot
    /// completer exactly once. A deserialization failure resolves the handle
    /// with the error and skips the pipeline entirely.
    pub fn process_background(
        &self,
        request: &WorkRequest,
        completer: TaskCompleter<Result<(), ProcessError>>,
    ) {
        match request.parse_payload() {
            Err(e) => {
                error!(
                    "Error parsing payload for queued notification {}: {}",
                    request.notification_id, e
                );
                completer.resolve(Err(ProcessError::Deserialization(e)));
            }
            Ok(payload) => {
                let result = self.process(request, payload);
                completer.resolve(result);
            }
        }
    }
}
