#![warn(clippy::unwrap_used)]

//! Metrics persistence: the store seam, an in-memory transactional engine,
//! and the fixed-delay batch retry wrapper used by the ingestion pipeline.

pub mod memory;

use chrono::{DateTime, Utc};
use pulse_core::config::StoreConfig;
use pulse_core::error::{PulseError, PulseResult};
use pulse_core::metrics::Metric;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

pub use memory::{MemoryMetricsStore, StoredMetric};

/// Narrow seam over the transactional range-query persistence engine.
#[allow(async_fn_in_trait)]
pub trait MetricsStore: Send + Sync {
    /// Validate bounds, persist one metric, return the stored row.
    async fn create(&self, campaign_id: Uuid, metric: Metric) -> PulseResult<StoredMetric>;

    /// Persist a whole batch in one transaction: full commit or full
    /// rollback, no partial persistence within the batch.
    async fn batch_insert(&self, campaign_id: Uuid, metrics: &[Metric]) -> PulseResult<usize>;

    /// Range read, sorted ascending by sample timestamp.
    async fn find_by_campaign(
        &self,
        campaign_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PulseResult<Vec<StoredMetric>>;
}

/// Retry a whole failed `batch_insert` with a fixed delay. This is a
/// storage-contention guard, independent of the exponential backoff the
/// resilient client applies to external HTTP calls. Validation failures
/// are deterministic and surface immediately.
pub async fn process_batch_with_retry<S: MetricsStore>(
    store: &S,
    config: &StoreConfig,
    campaign_id: Uuid,
    metrics: &[Metric],
) -> PulseResult<usize> {
    let mut last_error: Option<PulseError> = None;
    for attempt in 1..=config.batch_retry_attempts.max(1) {
        match store.batch_insert(campaign_id, metrics).await {
            Ok(inserted) => return Ok(inserted),
            Err(err @ PulseError::Storage(_)) => {
                warn!(
                    campaign_id = %campaign_id,
                    attempt,
                    error = %err,
                    "batch insert failed, will retry with fixed delay"
                );
                metrics::counter!("store.batch.retry").increment(1);
                last_error = Some(err);
                if attempt < config.batch_retry_attempts {
                    tokio::time::sleep(Duration::from_millis(config.batch_retry_delay_ms)).await;
                }
            }
            Err(err) => return Err(err),
        }
    }
    Err(last_error.unwrap_or_else(|| PulseError::Storage("batch insert failed".to_string())))
}
