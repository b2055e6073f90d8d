use crate::domain::snapshot::MetricSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Month-over-month change for one metric.
///
/// `Undefined` marks a comparison against a zero base, where a percent
/// change has no meaning. It is a sentinel, not an error; it serializes as
/// JSON null.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricDelta {
    Percent(f64),
    Undefined,
}

impl MetricDelta {
    pub fn as_percent(&self) -> Option<f64> {
        match self {
            MetricDelta::Percent(v) => Some(*v),
            MetricDelta::Undefined => None,
        }
    }
}

/// Outcome of a delta request. Fewer than two snapshots is an expected
/// steady state for new clients, signalled explicitly so consumers branch on
/// it instead of reading a fabricated zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeltaOutcome {
    InsufficientHistory,
    Computed { changes: BTreeMap<String, MetricDelta> },
}

/// `(current - previous) / previous * 100`, with the zero-base sentinel.
pub fn percent_change(current: f64, previous: f64) -> MetricDelta {
    if previous == 0.0 {
        MetricDelta::Undefined
    } else {
        MetricDelta::Percent((current - previous) / previous * 100.0)
    }
}

/// Month-over-month changes between two snapshots of the same client, keyed
/// by the persisted change-column names.
pub fn delta_between(
    current: &MetricSnapshot,
    previous: &MetricSnapshot,
) -> BTreeMap<String, MetricDelta> {
    BTreeMap::from([
        (
            "clicks_change_percent".to_string(),
            percent_change(current.clicks as f64, previous.clicks as f64),
        ),
        (
            "impressions_change_percent".to_string(),
            percent_change(current.impressions as f64, previous.impressions as f64),
        ),
        (
            "ctr_change_percent".to_string(),
            percent_change(current.ctr, previous.ctr),
        ),
        (
            "position_change_percent".to_string(),
            percent_change(current.avg_position, previous.avg_position),
        ),
        (
            "users_change_percent".to_string(),
            percent_change(current.users as f64, previous.users as f64),
        ),
    ])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Up,
    Down,
    Flat,
    InsufficientData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Volatility {
    Low,
    Medium,
    High,
    Unknown,
}

/// Overall direction of a period-ascending series, via the least-squares
/// slope. The significance threshold is 1% of the series mean, so noise
/// around a stable level reads as flat.
pub fn trend_direction(values: &[f64]) -> TrendDirection {
    if values.len() < 2 {
        return TrendDirection::InsufficientData;
    }

    let n = values.len() as f64;
    let x_mean = (n - 1.0) / 2.0;
    let y_mean = values.iter().sum::<f64>() / n;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        numerator += dx * (y - y_mean);
        denominator += dx * dx;
    }

    if denominator == 0.0 {
        return TrendDirection::Flat;
    }

    let slope = numerator / denominator;
    let threshold = if y_mean != 0.0 { 0.01 * y_mean.abs() } else { 0.01 };

    if slope > threshold {
        TrendDirection::Up
    } else if slope < -threshold {
        TrendDirection::Down
    } else {
        TrendDirection::Flat
    }
}

/// Coefficient-of-variation volatility: <10% low, <25% medium, else high.
pub fn volatility(values: &[f64]) -> Volatility {
    if values.len() < 2 {
        return Volatility::Unknown;
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean == 0.0 {
        return Volatility::Unknown;
    }

    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let cv = (variance.sqrt() / mean.abs()) * 100.0;

    if cv < 10.0 {
        Volatility::Low
    } else if cv < 25.0 {
        Volatility::Medium
    } else {
        Volatility::High
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::snapshot::{DeviceSplit, MetricSnapshot, PartialMetrics, Period};

    fn snapshot(period: &str, clicks: i64, users: i64) -> MetricSnapshot {
        let partial = PartialMetrics {
            clicks: Some(clicks),
            impressions: Some(clicks * 20),
            users: Some(users),
            ..Default::default()
        };
        let period: Period = period.parse().unwrap();
        partial.finalize(
            "acme",
            period,
            DeviceSplit {
                mobile: 55.0,
                desktop: 38.0,
                tablet: 7.0,
            },
        )
    }

    #[test]
    fn doubling_clicks_is_a_hundred_percent_change() {
        let previous = snapshot("2025-09", 50, 10);
        let current = snapshot("2025-10", 100, 10);
        let changes = delta_between(&current, &previous);
        assert_eq!(
            changes["clicks_change_percent"],
            MetricDelta::Percent(100.0)
        );
    }

    #[test]
    fn zero_base_is_undefined_not_infinite() {
        let previous = snapshot("2025-09", 50, 0);
        let current = snapshot("2025-10", 100, 25);
        let changes = delta_between(&current, &previous);
        assert_eq!(changes["users_change_percent"], MetricDelta::Undefined);
    }

    #[test]
    fn undefined_serializes_as_null() {
        let json = serde_json::to_string(&MetricDelta::Undefined).unwrap();
        assert_eq!(json, "null");
        let json = serde_json::to_string(&MetricDelta::Percent(12.5)).unwrap();
        assert_eq!(json, "12.5");
    }

    #[test]
    fn insufficient_history_outcome_is_tagged() {
        let json = serde_json::to_string(&DeltaOutcome::InsufficientHistory).unwrap();
        assert_eq!(json, "{\"status\":\"insufficient_history\"}");
    }

    #[test]
    fn rising_series_trends_up() {
        assert_eq!(
            trend_direction(&[100.0, 120.0, 150.0, 180.0]),
            TrendDirection::Up
        );
    }

    #[test]
    fn falling_series_trends_down() {
        assert_eq!(
            trend_direction(&[180.0, 150.0, 120.0, 100.0]),
            TrendDirection::Down
        );
    }

    #[test]
    fn stable_series_is_flat() {
        assert_eq!(
            trend_direction(&[100.0, 100.5, 99.8, 100.2]),
            TrendDirection::Flat
        );
    }

    #[test]
    fn short_series_has_no_direction() {
        assert_eq!(trend_direction(&[100.0]), TrendDirection::InsufficientData);
        assert_eq!(trend_direction(&[]), TrendDirection::InsufficientData);
    }

    #[test]
    fn volatility_bands() {
        assert_eq!(volatility(&[100.0, 101.0, 99.0, 100.0]), Volatility::Low);
        assert_eq!(volatility(&[100.0, 120.0, 85.0, 110.0]), Volatility::Medium);
        assert_eq!(volatility(&[100.0, 200.0, 20.0, 150.0]), Volatility::High);
        assert_eq!(volatility(&[100.0]), Volatility::Unknown);
    }
}
