//! Two-domain cache layer for derived analytics: reports (campaign + range
//! + granularity, 300s) and realtime snapshots (campaign only, 60s). Any
//! successful ingestion invalidates every entry for that campaign across
//! both domains; hit rate is deliberately sacrificed for correctness
//! immediately after a write.
//!
//! Fills are generation-guarded: a writer snapshots the campaign's
//! invalidation generation before computing, and a fill that raced an
//! invalidation is discarded rather than resurrecting stale data.

use crate::ttl::TtlCache;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use pulse_core::config::CacheConfig;
use pulse_core::reports::{Granularity, PerformanceReport, RealtimeSnapshot};
use tracing::debug;
use uuid::Uuid;

pub struct MetricsCacheLayer {
    reports: TtlCache<PerformanceReport>,
    realtime: TtlCache<RealtimeSnapshot>,
    generations: DashMap<Uuid, u64>,
}

impl MetricsCacheLayer {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            reports: TtlCache::new(config.report_ttl_secs),
            realtime: TtlCache::new(config.realtime_ttl_secs),
            generations: DashMap::new(),
        }
    }

    /// Current invalidation generation for a campaign. Snapshot this before
    /// reading the store; pass it back to `put_report`/`put_realtime` so a
    /// fill computed from pre-invalidation rows is never served.
    pub fn generation(&self, campaign_id: &Uuid) -> u64 {
        self.generations.get(campaign_id).map(|g| *g).unwrap_or(0)
    }

    fn report_key(
        campaign_id: &Uuid,
        start: &DateTime<Utc>,
        end: &DateTime<Utc>,
        granularity: Granularity,
    ) -> String {
        format!(
            "report:{campaign_id}:{}:{}:{}",
            start.timestamp(),
            end.timestamp(),
            granularity.as_str()
        )
    }

    pub fn get_report(
        &self,
        campaign_id: &Uuid,
        start: &DateTime<Utc>,
        end: &DateTime<Utc>,
        granularity: Granularity,
    ) -> Option<PerformanceReport> {
        let key = Self::report_key(campaign_id, start, end, granularity);
        match self.reports.get(&key) {
            Some(report) => {
                metrics::counter!("cache.report.hit").increment(1);
                Some(report)
            }
            None => {
                metrics::counter!("cache.report.miss").increment(1);
                None
            }
        }
    }

    pub fn put_report(
        &self,
        generation: u64,
        start: &DateTime<Utc>,
        end: &DateTime<Utc>,
        granularity: Granularity,
        report: PerformanceReport,
    ) {
        let campaign_id = report.campaign_id;
        let key = Self::report_key(&campaign_id, start, end, granularity);
        self.reports.put(key.clone(), campaign_id, report);
        // An invalidation landed between the writer's snapshot and this
        // fill; the value may predate the write that invalidated.
        if self.generation(&campaign_id) != generation {
            self.reports.remove(&key);
            metrics::counter!("cache.stale_fill_dropped").increment(1);
        }
    }

    pub fn get_realtime(&self, campaign_id: &Uuid) -> Option<RealtimeSnapshot> {
        match self.realtime.get(&format!("realtime:{campaign_id}")) {
            Some(snapshot) => {
                metrics::counter!("cache.realtime.hit").increment(1);
                Some(snapshot)
            }
            None => {
                metrics::counter!("cache.realtime.miss").increment(1);
                None
            }
        }
    }

    pub fn put_realtime(&self, generation: u64, snapshot: RealtimeSnapshot) {
        let campaign_id = snapshot.campaign_id;
        let key = format!("realtime:{campaign_id}");
        self.realtime.put(key.clone(), campaign_id, snapshot);
        if self.generation(&campaign_id) != generation {
            self.realtime.remove(&key);
            metrics::counter!("cache.stale_fill_dropped").increment(1);
        }
    }

    /// Drop every cached artifact for the campaign, both domains. The
    /// generation is bumped first so in-flight fills that snapshotted the
    /// old one discard themselves.
    pub fn invalidate_campaign(&self, campaign_id: &Uuid) {
        *self.generations.entry(*campaign_id).or_insert(0) += 1;
        let reports = self.reports.invalidate_campaign(campaign_id);
        let realtime = self.realtime.invalidate_campaign(campaign_id);
        if reports + realtime > 0 {
            debug!(
                campaign_id = %campaign_id,
                reports, realtime, "invalidated cached analytics after write"
            );
        }
        metrics::counter!("cache.invalidations").increment((reports + realtime) as u64);
    }

    /// Sweep both domains; returns total evicted entries.
    pub fn evict_expired(&self) -> usize {
        self.reports.evict_expired() + self.realtime.evict_expired()
    }

    pub fn len(&self) -> usize {
        self.reports.len() + self.realtime.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty() && self.realtime.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn layer() -> MetricsCacheLayer {
        MetricsCacheLayer::new(&CacheConfig::default())
    }

    fn report(campaign_id: Uuid) -> PerformanceReport {
        PerformanceReport {
            campaign_id,
            metrics: HashMap::new(),
            trends: HashMap::new(),
            recommendations: vec![],
            generated_at: Utc::now(),
        }
    }

    fn snapshot(campaign_id: Uuid) -> RealtimeSnapshot {
        RealtimeSnapshot {
            campaign_id,
            metrics: HashMap::new(),
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn test_report_key_includes_range_and_granularity() {
        let cache = layer();
        let campaign = Uuid::new_v4();
        let start = Utc::now() - chrono::Duration::days(7);
        let end = Utc::now();

        let generation = cache.generation(&campaign);
        cache.put_report(generation, &start, &end, Granularity::Daily, report(campaign));
        assert!(cache
            .get_report(&campaign, &start, &end, Granularity::Daily)
            .is_some());
        // Same window, different granularity: separate entry.
        assert!(cache
            .get_report(&campaign, &start, &end, Granularity::Hourly)
            .is_none());
    }

    #[test]
    fn test_invalidation_spans_both_domains() {
        let cache = layer();
        let campaign = Uuid::new_v4();
        let other = Uuid::new_v4();
        let start = Utc::now() - chrono::Duration::days(1);
        let end = Utc::now();

        cache.put_report(
            cache.generation(&campaign),
            &start,
            &end,
            Granularity::Hourly,
            report(campaign),
        );
        cache.put_realtime(cache.generation(&campaign), snapshot(campaign));
        cache.put_realtime(cache.generation(&other), snapshot(other));

        cache.invalidate_campaign(&campaign);
        assert!(cache
            .get_report(&campaign, &start, &end, Granularity::Hourly)
            .is_none());
        assert!(cache.get_realtime(&campaign).is_none());
        assert!(cache.get_realtime(&other).is_some());
    }

    #[test]
    fn test_fill_racing_invalidation_is_discarded() {
        let cache = layer();
        let campaign = Uuid::new_v4();
        let start = Utc::now() - chrono::Duration::days(1);
        let end = Utc::now();

        // Writer snapshots the generation, then an invalidation lands
        // before its fill: the fill must not be served.
        let generation = cache.generation(&campaign);
        cache.invalidate_campaign(&campaign);
        cache.put_report(generation, &start, &end, Granularity::Daily, report(campaign));
        assert!(cache
            .get_report(&campaign, &start, &end, Granularity::Daily)
            .is_none());

        let generation = cache.generation(&campaign);
        cache.invalidate_campaign(&campaign);
        cache.put_realtime(generation, snapshot(campaign));
        assert!(cache.get_realtime(&campaign).is_none());

        // A fill against the current generation sticks.
        cache.put_realtime(cache.generation(&campaign), snapshot(campaign));
        assert!(cache.get_realtime(&campaign).is_some());
    }
}
