use crate::domain::ViewDelta;
use crate::domain::response::ReconcileReport;
use crate::keys::{VIEW_PREFIX, baseline_key, parse_view_key};
use crate::planes::control::operation::ReconcileOperation;
use crate::planes::data::view_counter::{parse_counter, read_baseline};
use crate::ports::{CacheStore, CatalogStore, Settlement};
use async_trait::async_trait;
use chrono::Utc;
use shared::{Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Flushes pending view counters into the durable catalog.
///
/// One pass scans `productView*`, applies every parseable delta of a known product inside a
/// single catalog transaction and only then settles the flushed counters. Unparseable counters
/// and counters of unknown products are skipped and left to expire. If the transaction fails
/// nothing is settled, so the deltas are retried on the next pass. A crash between commit and
/// settle re-applies those deltas (at-least-once).
///
/// Settling is atomic per counter: views that arrive while a pass is running stay pending for
/// the next one.
pub struct ViewReconciler {
    store: Arc<dyn CacheStore>,
    catalog: Arc<dyn CatalogStore>,
    running: AtomicBool,
}

struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// One counter as read by the pass
struct Flushed {
    key: String,
    counter: i64,
    baseline: Option<i64>,
    delta: ViewDelta,
}

impl ViewReconciler {
    pub fn new(store: Arc<dyn CacheStore>, catalog: Arc<dyn CatalogStore>) -> Self {
        Self {
            store,
            catalog,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn begin(&self) -> Result<RunGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| RunGuard(&self.running))
            .map_err(|_| Error::ReconcileInProgress)
    }

    async fn run_pass(&self) -> Result<ReconcileReport> {
        tracing::info!("Starting view reconciliation");

        let keys = self.store.scan_prefix(VIEW_PREFIX).await?;
        if keys.is_empty() {
            tracing::info!("No pending views to reconcile");
            return Ok(ReconcileReport::empty());
        }

        let mut report = ReconcileReport::empty();
        report.scanned = keys.len();

        let mut flushed = Vec::with_capacity(keys.len());
        for key in keys {
            match self.read_pending(&key).await {
                Ok(Some(pending)) => flushed.push(pending),
                Ok(None) => tracing::debug!("Counter {} expired before it was read", key),
                Err(
                    e @ (Error::InvalidKey(_) | Error::InvalidCounter { .. } | Error::WrongType(_)),
                ) => {
                    tracing::warn!("Skipping counter {}: {}", key, e);
                    report.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        let mut known = Vec::with_capacity(flushed.len());
        for pending in flushed {
            if self.catalog.product(pending.delta.product_id).await?.is_some() {
                known.push(pending);
            } else {
                tracing::warn!("Skipping counter {}: unknown product", pending.key);
                report.skipped += 1;
            }
        }

        let deltas: Vec<ViewDelta> = known
            .iter()
            .map(|pending| pending.delta)
            .filter(|delta| delta.delta != 0)
            .collect();
        self.catalog.apply_view_deltas(&deltas).await?;

        for pending in &known {
            self.settle(pending).await;
            report.applied += 1;
            report.total_delta += pending.delta.delta;
        }

        report.finished_at = Utc::now();
        tracing::info!(
            "Reconciled {} counter(s): {} view(s) added, {} skipped",
            report.applied,
            report.total_delta,
            report.skipped
        );

        Ok(report)
    }

    /// Pending delta under `key`, `None` if the counter is gone
    async fn read_pending(&self, key: &str) -> Result<Option<Flushed>> {
        let id = parse_view_key(key)?;
        let Some(raw) = self.store.get(key).await? else {
            return Ok(None);
        };

        let counter = parse_counter(key, &raw)?;
        let baseline = read_baseline(self.store.as_ref(), id).await?;
        let delta = counter - baseline.unwrap_or(0);
        if delta < 0 {
            return Err(Error::InvalidCounter {
                key: key.to_string(),
                value: counter.to_string(),
            });
        }

        Ok(Some(Flushed {
            key: key.to_string(),
            counter,
            baseline,
            delta: ViewDelta::new(id, delta),
        }))
    }

    async fn settle(&self, pending: &Flushed) {
        let baseline = baseline_key(pending.delta.product_id);
        let result = self
            .store
            .settle_counter(&pending.key, &baseline, pending.counter, pending.baseline)
            .await;

        match result {
            Ok(Settlement::Cleared) => {}
            Ok(Settlement::Rebased) => {
                tracing::debug!("Counter {} kept counting during the pass", pending.key)
            }
            Ok(Settlement::Untouched) => {
                tracing::debug!("Counter {} expired or restarted during the pass", pending.key)
            }
            Err(e) => tracing::warn!(
                "Failed to settle flushed counter {}, its views will be applied again: {}",
                pending.key,
                e
            ),
        }
    }
}

#[async_trait]
impl ReconcileOperation for ViewReconciler {
    /// Run one pass. Fails with [`Error::ReconcileInProgress`] while another pass is running.
    async fn reconcile(&self) -> Result<ReconcileReport> {
        let _guard = self.begin()?;
        self.run_pass().await
    }
}

impl std::fmt::Debug for ViewReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewReconciler")
            .field("running", &self.is_running())
            .finish()
    }
}
