//! In-memory metrics store standing in for the transactional persistence
//! engine. Batch inserts are atomic per campaign: every row is validated
//! and constraint-checked before anything is written, so a conflicting row
//! rolls the whole batch back.

use crate::MetricsStore;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use pulse_core::error::{PulseError, PulseResult};
use pulse_core::metrics::Metric;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// A persisted metric row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMetric {
    pub id: Uuid,
    pub campaign_id: Uuid,
    #[serde(flatten)]
    pub metric: Metric,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct MemoryMetricsStore {
    rows: DashMap<Uuid, Vec<StoredMetric>>,
}

impl MemoryMetricsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uniqueness constraint: one value per (type, timestamp) per campaign.
    fn conflicts(existing: &[StoredMetric], candidate: &Metric) -> bool {
        existing.iter().any(|row| {
            row.metric.metric_type == candidate.metric_type
                && row.metric.timestamp == candidate.timestamp
        })
    }

    pub fn row_count(&self, campaign_id: &Uuid) -> usize {
        self.rows.get(campaign_id).map(|r| r.len()).unwrap_or(0)
    }
}

impl MetricsStore for MemoryMetricsStore {
    async fn create(&self, campaign_id: Uuid, metric: Metric) -> PulseResult<StoredMetric> {
        metric.validate()?;

        // The entry guard holds the campaign's shard lock for the whole
        // check-then-write, which is the transaction boundary here.
        let mut rows = self.rows.entry(campaign_id).or_default();
        if Self::conflicts(&rows, &metric) {
            return Err(PulseError::Storage(format!(
                "duplicate {} sample at {} for campaign {campaign_id}",
                metric.metric_type, metric.timestamp
            )));
        }

        let stored = StoredMetric {
            id: Uuid::new_v4(),
            campaign_id,
            metric,
            recorded_at: Utc::now(),
        };
        rows.push(stored.clone());
        Ok(stored)
    }

    async fn batch_insert(&self, campaign_id: Uuid, metrics: &[Metric]) -> PulseResult<usize> {
        for metric in metrics {
            metric.validate()?;
        }

        let mut rows = self.rows.entry(campaign_id).or_default();

        // Conflict-check every row (against stored rows and earlier rows of
        // this batch) before the first write: full commit or full rollback.
        for (i, metric) in metrics.iter().enumerate() {
            if Self::conflicts(&rows, metric) || metrics[..i].iter().any(|m| {
                m.metric_type == metric.metric_type && m.timestamp == metric.timestamp
            }) {
                metrics::counter!("store.batch.rollback").increment(1);
                return Err(PulseError::Storage(format!(
                    "constraint violation on row {i} ({} at {}): batch rolled back",
                    metric.metric_type, metric.timestamp
                )));
            }
        }

        let recorded_at = Utc::now();
        rows.extend(metrics.iter().map(|metric| StoredMetric {
            id: Uuid::new_v4(),
            campaign_id,
            metric: metric.clone(),
            recorded_at,
        }));
        metrics::counter!("store.batch.committed").increment(1);
        debug!(campaign_id = %campaign_id, rows = metrics.len(), "metric batch committed");
        Ok(metrics.len())
    }

    async fn find_by_campaign(
        &self,
        campaign_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PulseResult<Vec<StoredMetric>> {
        let mut result: Vec<StoredMetric> = self
            .rows
            .get(&campaign_id)
            .map(|rows| {
                rows.iter()
                    .filter(|row| row.metric.timestamp >= start && row.metric.timestamp <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        result.sort_by_key(|row| row.metric.timestamp);
        Ok(result)
    }
}
