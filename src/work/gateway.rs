//! Work submission gateway.

use super::models::{WorkPolicy, WorkRequest};
use super::pipeline::{NotificationPipeline, ProcessError};
use super::scheduler::WorkScheduler;
use std::sync::Arc;
use tracing::{debug, error};

/// Entry point for inbound notification work.
///
/// Callers gate submissions through the
/// [`InFlightRegistry`](crate::dedup::InFlightRegistry) before reaching the
/// gateway; the gateway itself only decides between inline and background
/// execution.
pub struct WorkGateway {
    pipeline: Arc<NotificationPipeline>,
    scheduler: Arc<dyn WorkScheduler>,
}

impl WorkGateway {
    pub fn new(pipeline: Arc<NotificationPipeline>, scheduler: Arc<dyn WorkScheduler>) -> Self {
        Self {
            pipeline,
            scheduler,
        }
    }

    /// Submit notification work.
    ///
    /// With `needs_background_work` false the pipeline runs synchronously on
    /// the caller and this returns only after the cycle fully completes; a
    /// malformed payload is logged and the submission aborts with no further
    /// effect. With `needs_background_work` true the request is submitted to
    /// the scheduler under the keep policy and this returns immediately.
    ///
    /// `is_high_priority` on the request is accepted but does not influence
    /// scheduling.
    pub fn begin_enqueue(
        &self,
        request: WorkRequest,
        needs_background_work: bool,
    ) -> Result<(), ProcessError> {
        if !needs_background_work {
            let payload = match request.parse_payload() {
                Ok(payload) => payload,
                Err(e) => {
                    error!(
                        "Error parsing payload in begin_enqueue for notification {}: {}",
                        request.notification_id, e
                    );
                    return Ok(());
                }
            };
            return self.pipeline.process(&request, payload);
        }

        debug!(
            "Enqueueing notification work for {} under keep policy",
            request.notification_id
        );
        self.scheduler.submit(request, WorkPolicy::Keep);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::work::models::NotificationRecord;
    use crate::work::pipeline::DeliverySink;
    use crate::work::scheduler::TokioWorkScheduler;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingSink {
        delivered: Mutex<Vec<NotificationRecord>>,
    }

    impl DeliverySink for RecordingSink {
        fn deliver(&self, notification: NotificationRecord) {
            self.delivered.lock().unwrap().push(notification);
        }
    }

    /// Scheduler double that only counts submissions.
    #[derive(Default)]
    struct CountingScheduler {
        submissions: AtomicUsize,
    }

    impl WorkScheduler for CountingScheduler {
        fn submit(&self, _request: WorkRequest, _policy: WorkPolicy) {
            self.submissions.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn request(id: &str, payload: &str) -> WorkRequest {
        WorkRequest {
            notification_id: id.to_string(),
            platform_id: 1,
            payload: payload.to_string(),
            timestamp: 1_700_000_000,
            is_restoring: false,
            is_high_priority: false,
        }
    }

    #[test]
    fn test_inline_path_processes_synchronously() {
        let sink = Arc::new(RecordingSink::default());
        let pipeline = Arc::new(NotificationPipeline::new(sink.clone()));
        let scheduler = Arc::new(CountingScheduler::default());
        let gateway = WorkGateway::new(pipeline, scheduler.clone());

        gateway
            .begin_enqueue(request("n1", r#"{"title":"t"}"#), false)
            .unwrap();

        // Delivery happened before begin_enqueue returned, no scheduling
        assert_eq!(sink.delivered.lock().unwrap().len(), 1);
        assert_eq!(scheduler.submissions.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_inline_malformed_payload_aborts_silently() {
        let sink = Arc::new(RecordingSink::default());
        let pipeline = Arc::new(NotificationPipeline::new(sink.clone()));
        let scheduler = Arc::new(CountingScheduler::default());
        let gateway = WorkGateway::new(pipeline, scheduler.clone());

        let result = gateway.begin_enqueue(request("n2", "{broken"), false);

        assert!(result.is_ok());
        assert!(sink.delivered.lock().unwrap().is_empty());
        assert_eq!(scheduler.submissions.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_background_path_submits_to_scheduler() {
        let sink = Arc::new(RecordingSink::default());
        let pipeline = Arc::new(NotificationPipeline::new(sink.clone()));
        let scheduler = Arc::new(CountingScheduler::default());
        let gateway = WorkGateway::new(pipeline, scheduler.clone());

        gateway
            .begin_enqueue(request("n3", r#"{"title":"t"}"#), true)
            .unwrap();

        assert_eq!(scheduler.submissions.load(Ordering::SeqCst), 1);
        // Nothing runs inline on the background path
        assert!(sink.delivered.lock().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_background_path_end_to_end() {
        let sink = Arc::new(RecordingSink::default());
        let pipeline = Arc::new(NotificationPipeline::new(sink.clone()));
        let scheduler = Arc::new(TokioWorkScheduler::new(pipeline.clone()));
        let gateway = WorkGateway::new(pipeline, scheduler);

        gateway
            .begin_enqueue(request("n4", r#"{"title":"t"}"#), true)
            .unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while sink.delivered.lock().unwrap().is_empty() {
            assert!(std::time::Instant::now() < deadline, "delivery never happened");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(sink.delivered.lock().unwrap().len(), 1);
    }
}
