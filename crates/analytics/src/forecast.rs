//! Forecasting over the trailing 30 days of metric history. Least-squares
//! linear regression per metric type over daily buckets, projected at the
//! requested horizon; confidence is the sample-weighted mean R-squared of
//! the fitted lines, clamped to [0, 1].

use chrono::{DateTime, Duration, Utc};
use pulse_core::metrics::MetricType;
use pulse_core::reports::Forecast;
use pulse_store::StoredMetric;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

const HISTORY_DAYS: i64 = 30;

/// Forecast one campaign's metrics `horizon_days` ahead of `now`, from rows
/// no older than 30 days.
pub fn forecast(
    campaign_id: Uuid,
    rows: &[StoredMetric],
    horizon_days: u32,
    now: DateTime<Utc>,
) -> Forecast {
    let cutoff = now - Duration::days(HISTORY_DAYS);
    let horizon = horizon_days.max(1) as f64;

    // Daily buckets per type: day index -> mean sample value.
    let mut buckets: HashMap<MetricType, BTreeMap<i64, (f64, u32)>> = HashMap::new();
    for row in rows {
        if row.metric.timestamp < cutoff || row.metric.timestamp > now {
            continue;
        }
        let day = (now - row.metric.timestamp).num_days();
        let day_index = HISTORY_DAYS - day;
        let slot = buckets
            .entry(row.metric.metric_type)
            .or_default()
            .entry(day_index)
            .or_insert((0.0, 0));
        slot.0 += row.metric.value;
        slot.1 += 1;
    }

    let mut predictions = HashMap::new();
    let mut weighted_r2 = 0.0;
    let mut weight = 0.0;

    for (metric_type, days) in &buckets {
        let points: Vec<(f64, f64)> = days
            .iter()
            .map(|(day, (sum, count))| (*day as f64, sum / *count as f64))
            .collect();
        let samples = points.len() as f64;

        let (predicted, r2) = match fit_line(&points) {
            Some((slope, intercept, r2)) => {
                let last_day = points.last().map(|(x, _)| *x).unwrap_or(0.0);
                (slope * (last_day + horizon) + intercept, r2)
            }
            // Under 2 daily buckets: flat carry-forward of the mean, with
            // no fit quality to report.
            None => (
                points.iter().map(|(_, y)| y).sum::<f64>() / samples.max(1.0),
                0.0,
            ),
        };

        let (min, max) = metric_type.bounds();
        predictions.insert(*metric_type, predicted.clamp(min, max));
        weighted_r2 += r2 * samples;
        weight += samples;
    }

    let confidence = if weight > 0.0 {
        (weighted_r2 / weight).clamp(0.0, 1.0)
    } else {
        0.0
    };

    Forecast {
        campaign_id,
        predictions,
        confidence,
        forecast_date: now + Duration::days(horizon_days.max(1) as i64),
    }
}

/// Ordinary least squares over (x, y) points. Returns (slope, intercept,
/// r_squared), or None with fewer than 2 points. A perfectly flat series
/// fits exactly (r_squared 1).
fn fit_line(points: &[(f64, f64)]) -> Option<(f64, f64, f64)> {
    let n = points.len() as f64;
    if points.len() < 2 {
        return None;
    }

    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let ss_xy: f64 = points
        .iter()
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum();
    let ss_xx: f64 = points.iter().map(|(x, _)| (x - mean_x).powi(2)).sum();
    let ss_yy: f64 = points.iter().map(|(_, y)| (y - mean_y).powi(2)).sum();

    if ss_xx == 0.0 {
        return None;
    }

    let slope = ss_xy / ss_xx;
    let intercept = mean_y - slope * mean_x;
    let r2 = if ss_yy == 0.0 {
        1.0
    } else {
        (ss_xy * ss_xy) / (ss_xx * ss_yy)
    };
    Some((slope, intercept, r2))
}
