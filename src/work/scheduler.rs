//! Background work scheduler with per-key dispatch policies.

use super::completion::completion_channel;
use super::models::{WorkPolicy, WorkRequest};
use super::pipeline::NotificationPipeline;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, error};

/// Capability interface for keyed background work submission.
///
/// Under [`WorkPolicy::Keep`] at most one job per key is outstanding; a
/// duplicate submission is silently dropped. The submitter gets no
/// synchronous return value, and scheduled work supports no cancellation or
/// timeout: it runs to completion or fails silently (logged, not retried).
pub trait WorkScheduler: Send + Sync {
    fn submit(&self, request: WorkRequest, policy: WorkPolicy);
}

/// Scheduler executing notification work on the caller's tokio runtime.
///
/// A key counts as outstanding from the moment its submission is accepted
/// until the spawned job settles, success or failure. The pipeline runs on
/// the blocking pool since handlers are synchronous caller code.
pub struct TokioWorkScheduler {
    pipeline: Arc<NotificationPipeline>,
    /// Outstanding job count per key. Keep consults it; Replace bypasses it.
    outstanding: Arc<Mutex<HashMap<String, u32>>>,
}

impl TokioWorkScheduler {
    pub fn new(pipeline: Arc<NotificationPipeline>) -> Self {
        Self {
            pipeline,
            outstanding: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of keys with outstanding work.
    pub fn outstanding_keys(&self) -> usize {
        self.outstanding.lock().unwrap().len()
    }
}

impl WorkScheduler for TokioWorkScheduler {
    fn submit(&self, request: WorkRequest, policy: WorkPolicy) {
        let key = request.notification_id.clone();

        {
            let mut outstanding = self.outstanding.lock().unwrap();
            if policy == WorkPolicy::Keep && outstanding.get(&key).copied().unwrap_or(0) > 0 {
                debug!(
                    "Work for key {} already queued or running, dropping submission",
                    key
                );
                return;
            }
            *outstanding.entry(key.clone()).or_insert(0) += 1;
        }

        debug!("Scheduling notification work for key {}", key);

        let pipeline = Arc::clone(&self.pipeline);
        let outstanding = Arc::clone(&self.outstanding);
        tokio::spawn(async move {
            let start_time = Instant::now();
            let (completer, result) = completion_channel();

            let run_request = request.clone();
            let join = tokio::task::spawn_blocking(move || {
                pipeline.process_background(&run_request, completer)
            })
            .await;
            if let Err(e) = join {
                error!(
                    "Notification work task for {} panicked: {}",
                    request.notification_id, e
                );
            }

            match result.settled().await {
                Some(Ok(())) => debug!(
                    "Notification work for {} completed in {:?}",
                    request.notification_id,
                    start_time.elapsed()
                ),
                Some(Err(e)) => error!(
                    "Notification work for {} failed after {:?}: {}",
                    request.notification_id,
                    start_time.elapsed(),
                    e
                ),
                None => error!(
                    "Notification work for {} settled without resolving its completion",
                    request.notification_id
                ),
            }

            let mut outstanding = outstanding.lock().unwrap();
            if let Some(count) = outstanding.get_mut(&key) {
                *count -= 1;
                if *count == 0 {
                    outstanding.remove(&key);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::work::models::NotificationRecord;
    use crate::work::pipeline::{DeliverySink, HandlerContext, ReceivedEvent, ReceivedHandler};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    const RECV_TIMEOUT: Duration = Duration::from_secs(5);

    #[derive(Default)]
    struct CountingSink {
        delivered: AtomicUsize,
    }

    impl DeliverySink for CountingSink {
        fn deliver(&self, _notification: NotificationRecord) {
            self.delivered.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Handler that reports when it starts running and holds its job
    /// outstanding until the test releases it.
    struct GatedHandler {
        started: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl GatedHandler {
        fn new() -> (Arc<Self>, mpsc::Receiver<()>, mpsc::Sender<()>) {
            let (started_tx, started_rx) = mpsc::channel();
            let (release_tx, release_rx) = mpsc::channel();
            let handler = Arc::new(Self {
                started: Mutex::new(started_tx),
                release: Mutex::new(release_rx),
            });
            (handler, started_rx, release_tx)
        }
    }

    impl ReceivedHandler for GatedHandler {
        fn notification_received(
            &self,
            _ctx: &HandlerContext,
            event: &ReceivedEvent,
        ) -> anyhow::Result<()> {
            self.started.lock().unwrap().send(()).ok();
            self.release.lock().unwrap().recv().ok();
            event.complete(event.notification().clone());
            Ok(())
        }
    }

    struct FailingHandler;

    impl ReceivedHandler for FailingHandler {
        fn notification_received(
            &self,
            _ctx: &HandlerContext,
            _event: &ReceivedEvent,
        ) -> anyhow::Result<()> {
            anyhow::bail!("integration blew up")
        }
    }

    fn request(id: &str) -> WorkRequest {
        WorkRequest {
            notification_id: id.to_string(),
            platform_id: 1,
            payload: r#"{"title":"t"}"#.to_string(),
            timestamp: 1_700_000_000,
            is_restoring: false,
            is_high_priority: false,
        }
    }

    /// Poll `condition` until it holds, panicking after a generous deadline.
    async fn wait_for(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not met in time");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_keep_policy_drops_duplicate_of_outstanding_key() {
        let sink = Arc::new(CountingSink::default());
        let (handler, started_rx, release_tx) = GatedHandler::new();
        let pipeline = Arc::new(NotificationPipeline::with_handler(sink.clone(), handler));
        let scheduler = TokioWorkScheduler::new(pipeline);

        scheduler.submit(request("dup"), WorkPolicy::Keep);
        // The key is provably outstanding once the handler reports in.
        started_rx.recv_timeout(RECV_TIMEOUT).unwrap();
        scheduler.submit(request("dup"), WorkPolicy::Keep);

        release_tx.send(()).unwrap();
        wait_for(|| scheduler.outstanding_keys() == 0).await;

        assert_eq!(sink.delivered.load(Ordering::SeqCst), 1);
        // The duplicate never started a second job.
        assert!(started_rx.try_recv().is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_replace_policy_accepts_duplicate_of_outstanding_key() {
        let sink = Arc::new(CountingSink::default());
        let (handler, started_rx, release_tx) = GatedHandler::new();
        let pipeline = Arc::new(NotificationPipeline::with_handler(sink.clone(), handler));
        let scheduler = TokioWorkScheduler::new(pipeline);

        scheduler.submit(request("dup"), WorkPolicy::Replace);
        started_rx.recv_timeout(RECV_TIMEOUT).unwrap();
        scheduler.submit(request("dup"), WorkPolicy::Replace);
        // The outstanding job is never cancelled, so the second one starts
        // alongside it.
        started_rx.recv_timeout(RECV_TIMEOUT).unwrap();

        release_tx.send(()).unwrap();
        release_tx.send(()).unwrap();
        wait_for(|| scheduler.outstanding_keys() == 0).await;

        assert_eq!(sink.delivered.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_key_is_reusable_after_job_settles() {
        let sink = Arc::new(CountingSink::default());
        let pipeline = Arc::new(NotificationPipeline::new(sink.clone()));
        let scheduler = TokioWorkScheduler::new(pipeline);

        scheduler.submit(request("again"), WorkPolicy::Keep);
        wait_for(|| scheduler.outstanding_keys() == 0).await;
        scheduler.submit(request("again"), WorkPolicy::Keep);
        wait_for(|| scheduler.outstanding_keys() == 0).await;

        assert_eq!(sink.delivered.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_distinct_keys_run_independently() {
        let sink = Arc::new(CountingSink::default());
        let pipeline = Arc::new(NotificationPipeline::new(sink.clone()));
        let scheduler = TokioWorkScheduler::new(pipeline);

        scheduler.submit(request("a"), WorkPolicy::Keep);
        scheduler.submit(request("b"), WorkPolicy::Keep);
        wait_for(|| scheduler.outstanding_keys() == 0).await;

        assert_eq!(sink.delivered.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_handler_failure_still_delivers_and_frees_the_key() {
        let sink = Arc::new(CountingSink::default());
        let pipeline = Arc::new(NotificationPipeline::with_handler(
            sink.clone(),
            Arc::new(FailingHandler),
        ));
        let scheduler = TokioWorkScheduler::new(pipeline);

        scheduler.submit(request("failing"), WorkPolicy::Keep);
        wait_for(|| scheduler.outstanding_keys() == 0).await;

        // Forced completion delivered the original notification and the
        // failed job released its key.
        assert_eq!(sink.delivered.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_malformed_payload_settles_as_failed_without_delivery() {
        let sink = Arc::new(CountingSink::default());
        let pipeline = Arc::new(NotificationPipeline::new(sink.clone()));
        let scheduler = TokioWorkScheduler::new(pipeline);

        let mut req = request("bad");
        req.payload = "{broken".to_string();
        scheduler.submit(req, WorkPolicy::Keep);
        wait_for(|| scheduler.outstanding_keys() == 0).await;

        assert_eq!(sink.delivered.load(Ordering::SeqCst), 0);
    }
}
