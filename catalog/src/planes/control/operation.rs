use crate::domain::response::ReconcileReport;
use async_trait::async_trait;
use shared::Result;

/// Flush of pending view counters into the durable catalog, driven by the scheduler
#[async_trait]
pub trait ReconcileOperation: Send + Sync + 'static {
    async fn reconcile(&self) -> Result<ReconcileReport>;
}
