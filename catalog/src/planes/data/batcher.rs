use crate::codec::{Codec, JsonCodec};
use crate::domain::response::BatchReport;
use crate::pipeline::Pipeline;
use crate::ports::CacheStore;
use serde::Serialize;
use shared::Result;
use std::sync::Arc;

/// Shared low-level warm-up mechanism: encodes entries with the configured codec and submits
/// them as one pipeline, i.e. one round trip per batch instead of one per entry.
#[derive(Clone)]
pub struct WarmupBatcher<C: Codec = JsonCodec> {
    store: Arc<dyn CacheStore>,
    codec: C,
}

impl<C: Codec> WarmupBatcher<C> {
    pub fn new(store: Arc<dyn CacheStore>, codec: C) -> Self {
        Self { store, codec }
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        self.codec.encode(value)
    }

    /// Submit the pipeline. An empty pipeline costs no round trip.
    pub async fn submit(&self, pipeline: Pipeline) -> Result<BatchReport> {
        if pipeline.is_empty() {
            return Ok(BatchReport::default());
        }

        let submitted = pipeline.len();
        let report = BatchReport::new(self.store.execute(pipeline).await?);

        if report.is_complete() {
            tracing::debug!("Pipeline of {} command(s) completed", submitted);
        } else {
            tracing::warn!(
                "Pipeline of {} command(s) completed with {} failure(s)",
                submitted,
                report.failed()
            );
        }

        Ok(report)
    }
}

impl<C: Codec> std::fmt::Debug for WarmupBatcher<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarmupBatcher")
            .field("store", &"<dyn CacheStore>")
            .finish()
    }
}
