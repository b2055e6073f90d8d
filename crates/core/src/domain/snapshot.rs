use anyhow::Context;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A calendar year-month, the granularity at which snapshots are captured.
///
/// Renders as `YYYY-MM`, which sorts lexicographically in chronological order
/// and is stored verbatim in the snapshot table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> anyhow::Result<Self> {
        anyhow::ensure!(
            (1..=12).contains(&month),
            "month must be 1..=12 (got {month})"
        );
        anyhow::ensure!(year >= 0, "year must be non-negative (got {year})");
        Ok(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn prev(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let (y, m) = s
            .trim()
            .split_once('-')
            .context("period must be formatted as YYYY-MM")?;
        let year: i32 = y.parse().with_context(|| format!("invalid year in period {s:?}"))?;
        let month: u32 = m
            .parse()
            .with_context(|| format!("invalid month in period {s:?}"))?;
        Period::new(year, month)
    }
}

impl Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Share of traffic per device class, in percent.
///
/// Invariant: each class is >= 0 and the three sum to 100 within a 0.1
/// rounding tolerance. Construct through `normalize::split` helpers so the
/// invariant holds even when a class is derived by subtraction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceSplit {
    pub mobile: f64,
    pub desktop: f64,
    pub tablet: f64,
}

impl DeviceSplit {
    pub fn total(&self) -> f64 {
        self.mobile + self.desktop + self.tablet
    }
}

/// One period's reconciled metrics for one client.
///
/// Immutable once captured; re-capturing the same (client, period) replaces
/// the stored row wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub client_id: String,
    pub period: Period,
    pub clicks: i64,
    pub impressions: i64,
    /// Derived click-through rate as a fraction in [0, 1]. Always recomputed
    /// from aggregate clicks/impressions, never averaged from per-row values.
    pub ctr: f64,
    pub avg_position: f64,
    pub users: i64,
    pub sessions: i64,
    pub page_views: i64,
    /// Percent, 0..=100.
    pub engagement_rate: f64,
    /// Percent, 0..=100.
    pub bounce_rate: f64,
    pub device_split: DeviceSplit,
}

/// Per-source aggregation result before merging.
///
/// `None` means the source did not populate the field at all, which is the
/// distinction the union-merge rule needs: a genuine zero from a
/// higher-priority source must not be overwritten by a lower-priority value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialMetrics {
    pub clicks: Option<i64>,
    pub impressions: Option<i64>,
    pub avg_position: Option<f64>,
    pub users: Option<i64>,
    pub sessions: Option<i64>,
    pub page_views: Option<i64>,
    pub engagement_rate: Option<f64>,
    pub bounce_rate: Option<f64>,
    pub device_split: Option<DeviceSplit>,
}

impl PartialMetrics {
    /// Fill unpopulated fields from a lower-priority source. Populated fields
    /// are never overwritten.
    pub fn fill_from(&mut self, other: &PartialMetrics) {
        if self.clicks.is_none() {
            self.clicks = other.clicks;
        }
        if self.impressions.is_none() {
            self.impressions = other.impressions;
        }
        if self.avg_position.is_none() {
            self.avg_position = other.avg_position;
        }
        if self.users.is_none() {
            self.users = other.users;
        }
        if self.sessions.is_none() {
            self.sessions = other.sessions;
        }
        if self.page_views.is_none() {
            self.page_views = other.page_views;
        }
        if self.engagement_rate.is_none() {
            self.engagement_rate = other.engagement_rate;
        }
        if self.bounce_rate.is_none() {
            self.bounce_rate = other.bounce_rate;
        }
        if self.device_split.is_none() {
            self.device_split = other.device_split;
        }
    }

    /// Resolve unpopulated fields to zero and derive `ctr` from the final
    /// aggregates. `default_mix` covers the device split when no source
    /// provided one.
    pub fn finalize(self, client_id: &str, period: Period, default_mix: DeviceSplit) -> MetricSnapshot {
        let clicks = self.clicks.unwrap_or(0);
        let impressions = self.impressions.unwrap_or(0);
        let ctr = if impressions > 0 {
            (clicks as f64 / impressions as f64).clamp(0.0, 1.0)
        } else {
            0.0
        };

        MetricSnapshot {
            client_id: client_id.to_string(),
            period,
            clicks,
            impressions,
            ctr,
            avg_position: self.avg_position.unwrap_or(0.0),
            users: self.users.unwrap_or(0),
            sessions: self.sessions.unwrap_or(0),
            page_views: self.page_views.unwrap_or(0),
            engagement_rate: self.engagement_rate.unwrap_or(0.0),
            bounce_rate: self.bounce_rate.unwrap_or(0.0),
            device_split: self.device_split.unwrap_or(default_mix),
        }
    }
}
