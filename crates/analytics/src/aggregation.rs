//! Aggregation engine: per-type sums, trends, realtime snapshots, and
//! report recommendations computed from stored metric rows.

use chrono::{DateTime, Duration, Utc};
use pulse_core::metrics::MetricType;
use pulse_core::reports::{PerformanceReport, RealtimeSnapshot};
use pulse_store::StoredMetric;
use std::collections::HashMap;
use uuid::Uuid;

/// Build the aggregated report for one campaign's window. Aggregate per
/// type is the sum of that type's sample values; ratio types (CTR, CPC,
/// CPM, ROAS) are summed directly as well, matching the reference
/// behavior rather than re-deriving them from underlying counts.
pub fn build_report(campaign_id: Uuid, rows: &[StoredMetric]) -> PerformanceReport {
    let mut metrics: HashMap<MetricType, f64> = HashMap::new();
    for row in rows {
        *metrics.entry(row.metric.metric_type).or_insert(0.0) += row.metric.value;
    }

    let trends = compute_trends(rows);
    let recommendations = recommend(&metrics, &trends);

    PerformanceReport {
        campaign_id,
        metrics,
        trends,
        recommendations,
        generated_at: Utc::now(),
    }
}

/// Percent change between the first and last sample of each type, with the
/// samples sorted ascending by timestamp. Types with fewer than 2 samples,
/// or whose earliest sample is 0, trend at 0.
pub fn compute_trends(rows: &[StoredMetric]) -> HashMap<MetricType, f64> {
    let mut by_type: HashMap<MetricType, Vec<&StoredMetric>> = HashMap::new();
    for row in rows {
        by_type.entry(row.metric.metric_type).or_default().push(row);
    }

    let mut trends = HashMap::new();
    for (metric_type, mut samples) in by_type {
        samples.sort_by_key(|row| row.metric.timestamp);
        let trend = match (samples.first(), samples.last()) {
            (Some(first), Some(last)) if samples.len() >= 2 && first.metric.value != 0.0 => {
                (last.metric.value - first.metric.value) / first.metric.value * 100.0
            }
            _ => 0.0,
        };
        trends.insert(metric_type, trend);
    }
    trends
}

/// Most recent sample per type within the trailing hour; every type is
/// present in the result, defaulting to 0.
pub fn realtime_snapshot(
    campaign_id: Uuid,
    rows: &[StoredMetric],
    now: DateTime<Utc>,
) -> RealtimeSnapshot {
    let cutoff = now - Duration::hours(1);
    let mut latest: HashMap<MetricType, &StoredMetric> = HashMap::new();
    for row in rows {
        if row.metric.timestamp < cutoff || row.metric.timestamp > now {
            continue;
        }
        let slot = latest.entry(row.metric.metric_type).or_insert(row);
        if row.metric.timestamp > slot.metric.timestamp {
            *slot = row;
        }
    }

    let metrics = MetricType::ALL
        .iter()
        .map(|t| (*t, latest.get(t).map(|row| row.metric.value).unwrap_or(0.0)))
        .collect();

    RealtimeSnapshot {
        campaign_id,
        metrics,
        generated_at: now,
    }
}

fn recommend(
    metrics: &HashMap<MetricType, f64>,
    trends: &HashMap<MetricType, f64>,
) -> Vec<String> {
    let mut recommendations = Vec::new();

    if metrics.is_empty() {
        recommendations.push("No metric data in the selected window.".to_string());
        return recommendations;
    }

    if trends.get(&MetricType::Ctr).copied().unwrap_or(0.0) < -10.0 {
        recommendations
            .push("Click-through rate is falling; consider refreshing ad creatives.".to_string());
    }
    if trends.get(&MetricType::Cpc).copied().unwrap_or(0.0) > 10.0 {
        recommendations
            .push("Cost per click is rising; review bids and keyword targeting.".to_string());
    }
    if trends.get(&MetricType::Conversions).copied().unwrap_or(0.0) < 0.0 {
        recommendations
            .push("Conversions are trending down; check landing page performance.".to_string());
    }
    if trends.get(&MetricType::Roas).copied().unwrap_or(0.0) < -10.0 {
        recommendations.push(
            "Return on ad spend is dropping; rebalance budget toward converting ad groups."
                .to_string(),
        );
    }
    if recommendations.is_empty() {
        recommendations.push("Campaign performance is stable; no action needed.".to_string());
    }
    recommendations
}
