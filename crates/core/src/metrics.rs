//! Campaign performance metric model and the per-type bound table that
//! every ingestion path validates against.

use crate::error::{PulseError, PulseResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Impressions,
    Clicks,
    Ctr,
    Conversions,
    Cost,
    Cpc,
    Cpm,
    Roas,
}

impl MetricType {
    pub const ALL: [MetricType; 8] = [
        MetricType::Impressions,
        MetricType::Clicks,
        MetricType::Ctr,
        MetricType::Conversions,
        MetricType::Cost,
        MetricType::Cpc,
        MetricType::Cpm,
        MetricType::Roas,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Impressions => "impressions",
            MetricType::Clicks => "clicks",
            MetricType::Ctr => "ctr",
            MetricType::Conversions => "conversions",
            MetricType::Cost => "cost",
            MetricType::Cpc => "cpc",
            MetricType::Cpm => "cpm",
            MetricType::Roas => "roas",
        }
    }

    /// Inclusive [min, max] bound for this metric type.
    pub fn bounds(&self) -> (f64, f64) {
        match self {
            MetricType::Impressions | MetricType::Clicks | MetricType::Conversions => {
                (0.0, f64::MAX)
            }
            MetricType::Ctr => (0.0, 100.0),
            MetricType::Cost => (0.0, 1_000_000.0),
            MetricType::Cpc => (0.0, 10_000.0),
            MetricType::Cpm => (0.0, 100_000.0),
            MetricType::Roas => (0.0, 1000.0),
        }
    }

    /// Count-style metrics must be whole numbers.
    pub fn is_count(&self) -> bool {
        matches!(
            self,
            MetricType::Impressions | MetricType::Clicks | MetricType::Conversions
        )
    }
}

impl std::fmt::Display for MetricType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single metric sample. Immutable after creation; logically owned by one
/// campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub metric_type: MetricType,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

impl Metric {
    pub fn new(metric_type: MetricType, value: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            metric_type,
            value,
            timestamp,
        }
    }

    /// Validate the value against the type's bound table.
    pub fn validate(&self) -> PulseResult<()> {
        if !self.value.is_finite() {
            return Err(PulseError::Validation(format!(
                "{} value must be a finite number",
                self.metric_type
            )));
        }
        let (min, max) = self.metric_type.bounds();
        if self.value < min || self.value > max {
            return Err(PulseError::Validation(format!(
                "{} value {} outside allowed range [{}, {}]",
                self.metric_type, self.value, min, max
            )));
        }
        if self.metric_type.is_count() && self.value.fract() != 0.0 {
            return Err(PulseError::Validation(format!(
                "{} value {} must be a whole number",
                self.metric_type, self.value
            )));
        }
        Ok(())
    }
}

/// An ordered sequence of metrics for one campaign, created at ingestion
/// time and split into fixed-size chunks before persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricBatch {
    pub campaign_id: Uuid,
    pub metrics: Vec<Metric>,
}

impl MetricBatch {
    pub fn new(campaign_id: Uuid, metrics: Vec<Metric>) -> Self {
        Self {
            campaign_id,
            metrics,
        }
    }

    /// Validate every metric in submission order; the first violation fails
    /// the whole batch.
    pub fn validate(&self) -> PulseResult<()> {
        for metric in &self.metrics {
            metric.validate()?;
        }
        Ok(())
    }

    /// Split into chunks of at most `chunk_size` metrics, preserving order.
    pub fn chunks(&self, chunk_size: usize) -> Vec<&[Metric]> {
        self.metrics.chunks(chunk_size.max(1)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric(metric_type: MetricType, value: f64) -> Metric {
        Metric::new(metric_type, value, Utc::now())
    }

    #[test]
    fn test_ctr_bounds() {
        assert!(metric(MetricType::Ctr, 0.0).validate().is_ok());
        assert!(metric(MetricType::Ctr, 100.0).validate().is_ok());
        assert!(metric(MetricType::Ctr, 101.0).validate().is_err());
        assert!(metric(MetricType::Ctr, -0.1).validate().is_err());
    }

    #[test]
    fn test_counts_must_be_whole_non_negative() {
        assert!(metric(MetricType::Impressions, 1000.0).validate().is_ok());
        assert!(metric(MetricType::Impressions, 10.5).validate().is_err());
        assert!(metric(MetricType::Clicks, -1.0).validate().is_err());
        assert!(metric(MetricType::Conversions, 0.0).validate().is_ok());
    }

    #[test]
    fn test_cost_ceiling_and_roas_range() {
        assert!(metric(MetricType::Cost, 1_000_000.0).validate().is_ok());
        assert!(metric(MetricType::Cost, 1_000_000.01).validate().is_err());
        assert!(metric(MetricType::Roas, 1000.0).validate().is_ok());
        assert!(metric(MetricType::Roas, 1000.5).validate().is_err());
    }

    #[test]
    fn test_non_finite_rejected() {
        assert!(metric(MetricType::Cpc, f64::NAN).validate().is_err());
        assert!(metric(MetricType::Cpm, f64::INFINITY).validate().is_err());
    }

    #[test]
    fn test_batch_validation_and_chunking() {
        let campaign_id = Uuid::new_v4();
        let batch = MetricBatch::new(
            campaign_id,
            (0..250)
                .map(|i| metric(MetricType::Clicks, i as f64))
                .collect(),
        );
        assert!(batch.validate().is_ok());
        let chunks = batch.chunks(100);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].len(), 50);

        let bad = MetricBatch::new(campaign_id, vec![metric(MetricType::Ctr, 101.0)]);
        assert!(bad.validate().is_err());
    }
}
