//! Randomly delayed fire-and-forget task execution.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Runs tasks after a uniform random delay of `0..=max_delay_secs` seconds.
///
/// Tasks are fire-and-forget: the caller gets no handle. `shutdown_now`
/// drops every task still waiting on its delay; tasks already running are
/// unaffected.
pub struct DelayTaskExecutor {
    min_delay_secs: u64,
    max_delay_secs: u64,
    shutdown: CancellationToken,
}

impl DelayTaskExecutor {
    pub fn new(max_delay_secs: u64) -> Self {
        Self::with_delay_bounds(0, max_delay_secs)
    }

    /// Executor picking delays from `min..=max` seconds.
    pub fn with_delay_bounds(min_delay_secs: u64, max_delay_secs: u64) -> Self {
        Self {
            min_delay_secs,
            max_delay_secs,
            shutdown: CancellationToken::new(),
        }
    }

    /// Schedule `task` to run after a random delay.
    pub fn delay_by_random<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let delay_secs = rand::rng().random_range(self.min_delay_secs..=self.max_delay_secs);
        debug!("Delaying task by {} seconds", delay_secs);

        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(delay_secs)) => {
                    task.await;
                }
                _ = shutdown.cancelled() => {
                    debug!("Dropping delayed task during shutdown");
                }
            }
        });
    }

    /// Drop all tasks still waiting on their delay.
    pub fn shutdown_now(&self) {
        self.shutdown.cancel();
    }
}
