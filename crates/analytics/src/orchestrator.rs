//! Analytics orchestrator: validate → chunk → batch-insert-with-retry →
//! invalidate-cache ingestion pipeline, cached query serving, and the
//! explicitly owned cache maintenance task.

use crate::{aggregation, forecast};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use pulse_cache::MetricsCacheLayer;
use pulse_core::config::{CacheConfig, IngestConfig, StoreConfig};
use pulse_core::error::{PulseError, PulseResult};
use pulse_core::metrics::{Metric, MetricBatch};
use pulse_core::reports::{Forecast, Granularity, PerformanceReport, RealtimeSnapshot};
use pulse_store::{process_batch_with_retry, MetricsStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Outcome of a fully applied ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestSummary {
    pub campaign_id: Uuid,
    pub accepted: usize,
    pub chunks: usize,
}

struct MaintenanceHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

pub struct AnalyticsOrchestrator<S: MetricsStore> {
    store: Arc<S>,
    cache: Arc<MetricsCacheLayer>,
    ingest_config: IngestConfig,
    store_config: StoreConfig,
    cache_config: CacheConfig,
    maintenance: parking_lot::Mutex<Option<MaintenanceHandle>>,
}

impl<S: MetricsStore> AnalyticsOrchestrator<S> {
    pub fn new(
        store: Arc<S>,
        cache: Arc<MetricsCacheLayer>,
        ingest_config: IngestConfig,
        store_config: StoreConfig,
        cache_config: CacheConfig,
    ) -> Self {
        Self {
            store,
            cache,
            ingest_config,
            store_config,
            cache_config,
            maintenance: parking_lot::Mutex::new(None),
        }
    }

    /// Ingest an ordered sequence of metrics for one campaign.
    ///
    /// Validation failures abort before any persistence. Chunks commit as
    /// independent transactions: a chunk failure after earlier chunks have
    /// committed is surfaced without rolling those back (at-least-once,
    /// partially-applied), and the error names how much was applied.
    pub async fn track_metrics(
        &self,
        campaign_id: Uuid,
        metrics: Vec<Metric>,
    ) -> PulseResult<IngestSummary> {
        let batch = MetricBatch::new(campaign_id, metrics);
        batch.validate()?;

        let chunks = batch.chunks(self.ingest_config.chunk_size);
        let total_chunks = chunks.len();
        let mut committed = 0usize;

        for (index, chunk) in chunks.into_iter().enumerate() {
            match process_batch_with_retry(
                self.store.as_ref(),
                &self.store_config,
                campaign_id,
                chunk,
            )
            .await
            {
                Ok(_) => committed += 1,
                Err(err) => {
                    error!(
                        campaign_id = %campaign_id,
                        chunk = index,
                        committed,
                        error = %err,
                        "ingestion aborted mid-batch; earlier chunks remain applied"
                    );
                    // Earlier chunks changed what derived reads should see.
                    if committed > 0 {
                        self.cache.invalidate_campaign(&campaign_id);
                    }
                    return Err(match err {
                        PulseError::Storage(msg) => PulseError::Storage(format!(
                            "chunk {index} of {total_chunks} failed after {committed} committed chunks: {msg}"
                        )),
                        other => other,
                    });
                }
            }
        }

        self.cache.invalidate_campaign(&campaign_id);
        metrics::counter!("ingest.metrics_accepted").increment(batch.metrics.len() as u64);
        info!(
            campaign_id = %campaign_id,
            accepted = batch.metrics.len(),
            chunks = total_chunks,
            "metric ingestion complete"
        );

        Ok(IngestSummary {
            campaign_id,
            accepted: batch.metrics.len(),
            chunks: total_chunks,
        })
    }

    /// Serve a performance report, computing and caching on miss.
    pub async fn get_performance_report(
        &self,
        campaign_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        granularity: Granularity,
    ) -> PulseResult<PerformanceReport> {
        if let Some(report) = self.cache.get_report(&campaign_id, &start, &end, granularity) {
            return Ok(report);
        }

        // Snapshot before the store read so a fill computed against rows
        // that predate a concurrent ingestion is discarded, not cached.
        let generation = self.cache.generation(&campaign_id);
        let rows = self.store.find_by_campaign(campaign_id, start, end).await?;
        let report = aggregation::build_report(campaign_id, &rows);
        self.cache
            .put_report(generation, &start, &end, granularity, report.clone());
        debug!(campaign_id = %campaign_id, rows = rows.len(), "performance report computed");
        Ok(report)
    }

    /// Serve the realtime snapshot (most recent sample per type within the
    /// trailing hour), cached for 60 seconds.
    pub async fn get_realtime_metrics(&self, campaign_id: Uuid) -> PulseResult<RealtimeSnapshot> {
        if let Some(snapshot) = self.cache.get_realtime(&campaign_id) {
            return Ok(snapshot);
        }

        let generation = self.cache.generation(&campaign_id);
        let now = Utc::now();
        let rows = self
            .store
            .find_by_campaign(campaign_id, now - ChronoDuration::hours(1), now)
            .await?;
        let snapshot = aggregation::realtime_snapshot(campaign_id, &rows, now);
        self.cache.put_realtime(generation, snapshot.clone());
        Ok(snapshot)
    }

    /// Forecast from the trailing 30 days. Not cached: the projection is a
    /// function of the current clock.
    pub async fn get_forecast(&self, campaign_id: Uuid, horizon_days: u32) -> PulseResult<Forecast> {
        let now = Utc::now();
        let rows = self
            .store
            .find_by_campaign(campaign_id, now - ChronoDuration::days(30), now)
            .await?;
        Ok(forecast::forecast(campaign_id, &rows, horizon_days, now))
    }

    /// Start the periodic cache eviction sweep. Owned by the orchestrator
    /// with an explicit lifecycle; starting twice is a no-op.
    pub fn start_maintenance(&self) {
        let mut guard = self.maintenance.lock();
        if guard.is_some() {
            warn!("cache maintenance already running");
            return;
        }

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let cache = Arc::clone(&self.cache);
        let interval = Duration::from_secs(self.cache_config.maintenance_interval_secs.max(1));

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let evicted = cache.evict_expired();
                        if evicted > 0 {
                            debug!(evicted, "cache eviction sweep complete");
                        }
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
        });

        *guard = Some(MaintenanceHandle { shutdown, task });
        info!(interval_secs = interval.as_secs(), "cache maintenance started");
    }

    /// Stop the maintenance task and wait for it to drain.
    pub async fn shutdown(&self) {
        let handle = self.maintenance.lock().take();
        if let Some(MaintenanceHandle { shutdown, task }) = handle {
            let _ = shutdown.send(true);
            if let Err(err) = task.await {
                warn!(error = %err, "maintenance task did not stop cleanly");
            } else {
                info!("cache maintenance stopped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::metrics::MetricType;
    use pulse_store::{MemoryMetricsStore, StoredMetric};
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    fn orchestrator(
        chunk_size: usize,
    ) -> AnalyticsOrchestrator<MemoryMetricsStore> {
        AnalyticsOrchestrator::new(
            Arc::new(MemoryMetricsStore::new()),
            Arc::new(MetricsCacheLayer::new(&CacheConfig::default())),
            IngestConfig { chunk_size },
            StoreConfig::default(),
            CacheConfig::default(),
        )
    }

    fn metric_at(metric_type: MetricType, value: f64, minutes_ago: i64) -> Metric {
        Metric::new(
            metric_type,
            value,
            Utc::now() - ChronoDuration::minutes(minutes_ago),
        )
    }

    #[tokio::test]
    async fn test_validation_failure_aborts_before_persistence() {
        let orch = orchestrator(100);
        let campaign = Uuid::new_v4();
        let metrics = vec![
            metric_at(MetricType::Impressions, 1000.0, 10),
            metric_at(MetricType::Ctr, 101.0, 5),
        ];

        let err = orch.track_metrics(campaign, metrics).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(orch.store.row_count(&campaign), 0);
    }

    #[tokio::test]
    async fn test_ingest_chunks_and_commits_all() {
        let orch = orchestrator(10);
        let campaign = Uuid::new_v4();
        let metrics: Vec<Metric> = (0..25)
            .map(|i| metric_at(MetricType::Clicks, i as f64, i))
            .collect();

        let summary = orch.track_metrics(campaign, metrics).await.unwrap();
        assert_eq!(summary.accepted, 25);
        assert_eq!(summary.chunks, 3);
        assert_eq!(orch.store.row_count(&campaign), 25);
    }

    #[tokio::test]
    async fn test_ingest_then_report_is_never_stale() {
        let orch = orchestrator(100);
        let campaign = Uuid::new_v4();
        let start = Utc::now() - ChronoDuration::hours(2);
        let end = Utc::now() + ChronoDuration::minutes(1);

        orch.track_metrics(
            campaign,
            vec![metric_at(MetricType::Impressions, 1000.0, 60)],
        )
        .await
        .unwrap();
        let first = orch
            .get_performance_report(campaign, start, end, Granularity::Hourly)
            .await
            .unwrap();
        assert_eq!(first.metrics[&MetricType::Impressions], 1000.0);

        // Second ingestion must invalidate the cached report.
        orch.track_metrics(
            campaign,
            vec![metric_at(MetricType::Impressions, 1500.0, 5)],
        )
        .await
        .unwrap();
        let second = orch
            .get_performance_report(campaign, start, end, Granularity::Hourly)
            .await
            .unwrap();
        assert_eq!(second.metrics[&MetricType::Impressions], 2500.0);
        assert_eq!(second.trends[&MetricType::Impressions], 50.0);
    }

    #[tokio::test]
    async fn test_realtime_snapshot_served_and_cached() {
        let orch = orchestrator(100);
        let campaign = Uuid::new_v4();
        orch.track_metrics(campaign, vec![metric_at(MetricType::Clicks, 42.0, 5)])
            .await
            .unwrap();

        let snapshot = orch.get_realtime_metrics(campaign).await.unwrap();
        assert_eq!(snapshot.metrics[&MetricType::Clicks], 42.0);
        assert_eq!(snapshot.metrics[&MetricType::Cost], 0.0);

        // Served from cache on the second read.
        let again = orch.get_realtime_metrics(campaign).await.unwrap();
        assert_eq!(again.generated_at, snapshot.generated_at);
    }

    #[tokio::test]
    async fn test_forecast_contract() {
        let orch = orchestrator(100);
        let campaign = Uuid::new_v4();
        let metrics: Vec<Metric> = (0..14)
            .map(|d| {
                Metric::new(
                    MetricType::Impressions,
                    1000.0 + 50.0 * d as f64,
                    Utc::now() - ChronoDuration::days(13 - d),
                )
            })
            .collect();
        orch.track_metrics(campaign, metrics).await.unwrap();

        let fc = orch.get_forecast(campaign, 7).await.unwrap();
        assert_eq!(fc.campaign_id, campaign);
        assert!((0.0..=1.0).contains(&fc.confidence));
        assert!(fc.predictions.contains_key(&MetricType::Impressions));
        assert!(fc.forecast_date > Utc::now());
    }

    /// Store whose next range read parks at a gate, so a test can complete
    /// an ingestion while a report computation is mid-read.
    struct GatedStore {
        inner: MemoryMetricsStore,
        armed: AtomicBool,
        entered: tokio::sync::Notify,
        release: tokio::sync::Notify,
    }

    impl GatedStore {
        fn new() -> Self {
            Self {
                inner: MemoryMetricsStore::new(),
                armed: AtomicBool::new(false),
                entered: tokio::sync::Notify::new(),
                release: tokio::sync::Notify::new(),
            }
        }
    }

    impl MetricsStore for GatedStore {
        async fn create(&self, campaign_id: Uuid, metric: Metric) -> PulseResult<StoredMetric> {
            self.inner.create(campaign_id, metric).await
        }

        async fn batch_insert(&self, campaign_id: Uuid, metrics: &[Metric]) -> PulseResult<usize> {
            self.inner.batch_insert(campaign_id, metrics).await
        }

        async fn find_by_campaign(
            &self,
            campaign_id: Uuid,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> PulseResult<Vec<StoredMetric>> {
            let rows = self.inner.find_by_campaign(campaign_id, start, end).await;
            // Park after the read: the caller now holds a row snapshot
            // that anything ingested during the pause will not contain.
            if self.armed.swap(false, Ordering::SeqCst) {
                self.entered.notify_one();
                self.release.notified().await;
            }
            rows
        }
    }

    #[tokio::test]
    async fn test_report_racing_ingestion_is_not_cached_stale() {
        let store = Arc::new(GatedStore::new());
        let orch = Arc::new(AnalyticsOrchestrator::new(
            Arc::clone(&store),
            Arc::new(MetricsCacheLayer::new(&CacheConfig::default())),
            IngestConfig { chunk_size: 100 },
            StoreConfig::default(),
            CacheConfig::default(),
        ));
        let campaign = Uuid::new_v4();
        let start = Utc::now() - ChronoDuration::hours(2);
        let end = Utc::now() + ChronoDuration::minutes(1);

        orch.track_metrics(
            campaign,
            vec![metric_at(MetricType::Impressions, 1000.0, 60)],
        )
        .await
        .unwrap();

        // Park a report computation inside its store read.
        store.armed.store(true, Ordering::SeqCst);
        let reader = {
            let orch = Arc::clone(&orch);
            tokio::spawn(async move {
                orch.get_performance_report(campaign, start, end, Granularity::Hourly)
                    .await
            })
        };
        store.entered.notified().await;

        // A full ingestion, invalidation included, completes while the
        // reader still holds pre-ingestion rows.
        orch.track_metrics(
            campaign,
            vec![metric_at(MetricType::Impressions, 1500.0, 5)],
        )
        .await
        .unwrap();

        store.release.notify_one();
        let first = reader.await.unwrap().unwrap();
        assert_eq!(first.metrics[&MetricType::Impressions], 1000.0);

        // The racing fill was discarded, so the next read recomputes.
        let second = orch
            .get_performance_report(campaign, start, end, Granularity::Hourly)
            .await
            .unwrap();
        assert_eq!(second.metrics[&MetricType::Impressions], 2500.0);
    }

    /// Store whose batch_insert starts failing permanently after N
    /// successful chunks.
    struct PartialFailureStore {
        inner: MemoryMetricsStore,
        allow_batches: u32,
        batches: AtomicU32,
    }

    impl MetricsStore for PartialFailureStore {
        async fn create(&self, campaign_id: Uuid, metric: Metric) -> PulseResult<StoredMetric> {
            self.inner.create(campaign_id, metric).await
        }

        async fn batch_insert(&self, campaign_id: Uuid, metrics: &[Metric]) -> PulseResult<usize> {
            if self.batches.fetch_add(1, Ordering::Relaxed) >= self.allow_batches {
                return Err(PulseError::Storage("disk full".to_string()));
            }
            self.inner.batch_insert(campaign_id, metrics).await
        }

        async fn find_by_campaign(
            &self,
            campaign_id: Uuid,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> PulseResult<Vec<StoredMetric>> {
            self.inner.find_by_campaign(campaign_id, start, end).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunk_failure_keeps_earlier_chunks_applied() {
        let store = Arc::new(PartialFailureStore {
            inner: MemoryMetricsStore::new(),
            allow_batches: 2,
            batches: AtomicU32::new(0),
        });
        let orch = AnalyticsOrchestrator::new(
            Arc::clone(&store),
            Arc::new(MetricsCacheLayer::new(&CacheConfig::default())),
            IngestConfig { chunk_size: 10 },
            StoreConfig::default(),
            CacheConfig::default(),
        );
        let campaign = Uuid::new_v4();
        let metrics: Vec<Metric> = (0..30)
            .map(|i| metric_at(MetricType::Impressions, i as f64, i))
            .collect();

        let err = orch.track_metrics(campaign, metrics).await.unwrap_err();
        assert_eq!(err.code(), "STORAGE_ERROR");
        assert!(err.to_string().contains("2 committed chunks"));
        // First two chunks persisted; third never applied.
        assert_eq!(store.inner.row_count(&campaign), 20);
    }

    #[tokio::test]
    async fn test_maintenance_lifecycle() {
        let orch = orchestrator(100);
        orch.start_maintenance();
        // Second start is a no-op rather than a second task.
        orch.start_maintenance();
        orch.shutdown().await;
        assert!(orch.maintenance.lock().is_none());
    }
}
