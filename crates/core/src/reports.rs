//! Derived analytics artifacts: performance reports, realtime snapshots,
//! and forecasts. All of these are computed by the aggregation engine and
//! cached (forecasts excepted) by the metrics cache layer.

use crate::metrics::MetricType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Time-bucket size used when a report is requested. Part of the report
/// cache key, so the same window at two granularities caches independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Hourly => "hourly",
            Granularity::Daily => "daily",
            Granularity::Weekly => "weekly",
            Granularity::Monthly => "monthly",
        }
    }
}

/// Aggregated view of one campaign's metrics over a queried window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub campaign_id: Uuid,
    /// Per-type aggregate: sum of that type's sample values in the window.
    pub metrics: HashMap<MetricType, f64>,
    /// Per-type percent change between the first and last sample.
    pub trends: HashMap<MetricType, f64>,
    pub recommendations: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

/// Most recent sample per type within the trailing hour; types with no
/// sample default to 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeSnapshot {
    pub campaign_id: Uuid,
    pub metrics: HashMap<MetricType, f64>,
    pub generated_at: DateTime<Utc>,
}

/// Per-type predictions over a horizon, with a model confidence in [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forecast {
    pub campaign_id: Uuid,
    pub predictions: HashMap<MetricType, f64>,
    pub confidence: f64,
    pub forecast_date: DateTime<Utc>,
}
