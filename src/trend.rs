//! Linear trend computation over a windowed value series.
//!
//! The analyzer fits an ordinary least-squares line against
//! (elapsed-days-since-window-start, value) pairs, so the slope reads as
//! value-units per day regardless of how irregular the snapshot spacing is.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// A (timestamp, value) sample in a metric series.
pub type SeriesPoint = (DateTime<Utc>, f64);

/// Slope classification with an epsilon band around zero, so snapshot noise
/// is not flagged as a trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Flat,
}

/// Derived trend summary for one window. Computed fresh per request, never
/// persisted.
#[derive(Debug, Clone, Serialize)]
pub struct TrendResult {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    /// Fitted OLS coefficient, in value-units per day
    pub slope: f64,
    /// (last - first) / first * 100; None when the series starts at zero
    pub percent_change: Option<f64>,
    pub direction: TrendDirection,
    pub mean: Option<f64>,
    pub max: Option<f64>,
    pub min: Option<f64>,
    pub sample_count: usize,
}

#[derive(Debug, Clone)]
pub struct TrendAnalyzer {
    /// Slopes within ±epsilon of zero are reported as Flat
    epsilon: f64,
}

impl Default for TrendAnalyzer {
    fn default() -> Self {
        Self { epsilon: 1e-3 }
    }
}

impl TrendAnalyzer {
    pub fn new(epsilon: f64) -> Self {
        Self { epsilon }
    }

    /// Compute the linear trend of `series` over the last `window_days`
    /// ending at `now`.
    ///
    /// Fewer than two in-window points is a degenerate, non-error case: the
    /// slope is zero and the summary stats cover whatever points exist.
    pub fn compute(
        &self,
        series: &[SeriesPoint],
        window_days: u32,
        now: DateTime<Utc>,
    ) -> TrendResult {
        let window_start = now - Duration::days(window_days as i64);
        let points: Vec<SeriesPoint> = series
            .iter()
            .copied()
            .filter(|(timestamp, _)| *timestamp >= window_start && *timestamp <= now)
            .collect();

        let sample_count = points.len();
        let mean = if points.is_empty() {
            None
        } else {
            Some(points.iter().map(|(_, value)| value).sum::<f64>() / points.len() as f64)
        };
        let max = points
            .iter()
            .map(|(_, value)| *value)
            .fold(None, |acc: Option<f64>, value| {
                Some(acc.map_or(value, |m| m.max(value)))
            });
        let min = points
            .iter()
            .map(|(_, value)| *value)
            .fold(None, |acc: Option<f64>, value| {
                Some(acc.map_or(value, |m| m.min(value)))
            });

        if sample_count < 2 {
            return TrendResult {
                window_start,
                window_end: now,
                slope: 0.0,
                percent_change: if sample_count == 0 { None } else { Some(0.0) },
                direction: TrendDirection::Flat,
                mean,
                max,
                min,
                sample_count,
            };
        }

        let slope = ols_slope(&points, window_start);

        let (_, first_value) = points[0];
        let (_, last_value) = points[points.len() - 1];
        let percent_change = if first_value == 0.0 {
            None
        } else {
            Some((last_value - first_value) / first_value * 100.0)
        };

        let direction = if slope > self.epsilon {
            TrendDirection::Increasing
        } else if slope < -self.epsilon {
            TrendDirection::Decreasing
        } else {
            TrendDirection::Flat
        };

        TrendResult {
            window_start,
            window_end: now,
            slope,
            percent_change,
            direction,
            mean,
            max,
            min,
            sample_count,
        }
    }
}

/// Least-squares slope against elapsed days since `window_start`.
fn ols_slope(points: &[SeriesPoint], window_start: DateTime<Utc>) -> f64 {
    let n = points.len() as f64;

    let xs: Vec<f64> = points
        .iter()
        .map(|(timestamp, _)| (*timestamp - window_start).num_seconds() as f64 / 86_400.0)
        .collect();

    let sum_x: f64 = xs.iter().sum();
    let sum_y: f64 = points.iter().map(|(_, value)| value).sum();
    let sum_xy: f64 = xs
        .iter()
        .zip(points.iter())
        .map(|(x, (_, y))| x * y)
        .sum();
    let sum_xx: f64 = xs.iter().map(|x| x * x).sum();

    let denominator = n * sum_xx - sum_x * sum_x;
    if denominator == 0.0 {
        // All samples share one timestamp; no line to fit
        return 0.0;
    }

    (n * sum_xy - sum_x * sum_y) / denominator
}

/// Collapse per-organization samples into one averaged series, grouped by
/// exact timestamp. Cycles stamp every organization with one shared logical
/// time, so cross-organization buckets line up by construction. The result is
/// the input to the aggregate trend fit (average-then-fit, not fit-then-
/// average).
pub fn average_per_timestamp(points: &[SeriesPoint]) -> Vec<SeriesPoint> {
    use std::collections::BTreeMap;

    let mut buckets: BTreeMap<DateTime<Utc>, (f64, usize)> = BTreeMap::new();
    for (timestamp, value) in points {
        let entry = buckets.entry(*timestamp).or_insert((0.0, 0));
        entry.0 += value;
        entry.1 += 1;
    }

    buckets
        .into_iter()
        .map(|(timestamp, (sum, count))| (timestamp, sum / count as f64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(now: DateTime<Utc>, days_ago: i64) -> DateTime<Utc> {
        now - Duration::days(days_ago)
    }

    #[test]
    fn averages_group_by_exact_timestamp() {
        let now = Utc::now();
        let points = vec![
            (at(now, 2), 10.0),
            (at(now, 2), 20.0),
            (at(now, 1), 4.0),
        ];

        let averaged = average_per_timestamp(&points);
        assert_eq!(averaged.len(), 2);
        assert_eq!(averaged[0], (at(now, 2), 15.0));
        assert_eq!(averaged[1], (at(now, 1), 4.0));
    }

    #[test]
    fn identical_timestamps_fit_to_zero_slope() {
        let now = Utc::now();
        let analyzer = TrendAnalyzer::default();
        let series = vec![(at(now, 1), 3.0), (at(now, 1), 9.0)];

        let result = analyzer.compute(&series, 7, now);
        assert_eq!(result.slope, 0.0);
        assert_eq!(result.direction, TrendDirection::Flat);
    }
}
