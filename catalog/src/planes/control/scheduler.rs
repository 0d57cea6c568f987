use crate::planes::control::operation::ReconcileOperation;
use shared::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Fixed-interval trigger for the reconciliation pass.
///
/// The first pass runs one full interval after start. Ticks missed while a pass was running are
/// skipped rather than replayed. Overlap with passes started elsewhere (e.g. on shutdown) is
/// rejected by the reconciler itself.
///
/// Only guards a single process: several service instances sharing one cache store would each
/// run their own pass.
pub struct ReconcileScheduler {
    job: Arc<dyn ReconcileOperation>,
    interval: Duration,
}

impl ReconcileScheduler {
    pub fn new(job: Arc<dyn ReconcileOperation>, interval: Duration) -> Self {
        Self { job, interval }
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }

    pub async fn run(&self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            "View reconciliation scheduled every {}s",
            self.interval.as_secs()
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("View reconciliation scheduler stopped");
                    break;
                }
                _ = ticker.tick() => self.tick().await,
            }
        }
    }

    async fn tick(&self) {
        match self.job.reconcile().await {
            Ok(report) => tracing::debug!(
                "Scheduled reconciliation finished: {} applied, {} skipped",
                report.applied,
                report.skipped
            ),
            Err(Error::ReconcileInProgress) => {
                tracing::warn!("Previous reconciliation still running, skipping this tick")
            }
            Err(e) => tracing::error!("Scheduled reconciliation failed: {}", e),
        }
    }
}

impl std::fmt::Debug for ReconcileScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconcileScheduler")
            .field("interval", &self.interval)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::response::ReconcileReport;
    use async_trait::async_trait;
    use shared::Result;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingJob {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl ReconcileOperation for CountingJob {
        async fn reconcile(&self) -> Result<ReconcileReport> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(ReconcileReport::empty())
        }
    }

    struct FailingJob;

    #[async_trait]
    impl ReconcileOperation for FailingJob {
        async fn reconcile(&self) -> Result<ReconcileReport> {
            Err(Error::Unavailable("cache store down".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_once_per_interval() {
        let job = Arc::new(CountingJob::default());
        let token = CancellationToken::new();
        let handle = ReconcileScheduler::new(job.clone(), Duration::from_secs(6000))
            .spawn(token.clone());

        tokio::time::sleep(Duration::from_secs(5999)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(6000)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 2);

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_keeps_running_after_failures() {
        let token = CancellationToken::new();
        let handle = ReconcileScheduler::new(Arc::new(FailingJob), Duration::from_secs(60))
            .spawn(token.clone());

        tokio::time::sleep(Duration::from_secs(185)).await;
        assert!(!handle.is_finished());

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_stops_the_loop() {
        let token = CancellationToken::new();
        let handle = ReconcileScheduler::new(
            Arc::new(CountingJob::default()),
            Duration::from_secs(6000),
        )
        .spawn(token.clone());

        token.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("scheduler did not stop")
            .unwrap();
    }
}
