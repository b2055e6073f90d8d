pub mod split;

use crate::benchmark;
use crate::classify::IndustryTag;
use crate::domain::snapshot::{DeviceSplit, MetricSnapshot, PartialMetrics, Period};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One raw export row, as handed over by the external parsing layer.
pub type RawRecord = serde_json::Map<String, Value>;

/// Where a batch of rows came from. Always caller-supplied; the core never
/// sniffs formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    SearchPerformance,
    SiteAnalytics,
    ThirdPartyResearch,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::SearchPerformance => "search-performance",
            SourceKind::SiteAnalytics => "site-analytics",
            SourceKind::ThirdPartyResearch => "third-party-research",
        }
    }

    // Merge priority, best first. Search and analytics reflect measured
    // ground truth; research figures are directional estimates.
    fn priority(&self) -> u8 {
        match self {
            SourceKind::SearchPerformance => 0,
            SourceKind::SiteAnalytics => 1,
            SourceKind::ThirdPartyResearch => 2,
        }
    }

    fn numeric_keys(&self) -> &'static [&'static str] {
        match self {
            SourceKind::SearchPerformance => &["clicks", "impressions", "ctr", "position"],
            SourceKind::SiteAnalytics => &[
                "users",
                "sessions",
                "page_views",
                "engagement_rate",
                "bounce_rate",
                "mobile_pct",
                "desktop_pct",
            ],
            SourceKind::ThirdPartyResearch => &[
                "estimated_clicks",
                "estimated_impressions",
                "estimated_position",
                "estimated_traffic",
            ],
        }
    }
}

/// Converts raw per-source rows into canonical snapshots.
///
/// The industry decides the fallback device mix used when no source carries
/// an explicit device breakdown.
#[derive(Debug, Clone)]
pub struct Normalizer {
    default_mix: DeviceSplit,
}

impl Normalizer {
    pub fn for_industry(industry: IndustryTag) -> Self {
        let profile = benchmark::profile_for(industry);
        // Desktop takes the lion's share of what mobile leaves; tablet the
        // remainder. The split repair keeps the triple valid either way.
        let mobile = profile.mobile_share_pct;
        let desktop = (100.0 - mobile) * 0.8;
        let tablet = 100.0 - mobile - desktop;
        Self {
            default_mix: split::device_split(mobile, desktop, tablet),
        }
    }

    /// Aggregate one source's rows into a snapshot.
    pub fn normalize(
        &self,
        records: &[RawRecord],
        kind: SourceKind,
        client_id: &str,
        period: Period,
    ) -> MetricSnapshot {
        aggregate_rows(records, kind).finalize(client_id, period, self.default_mix)
    }

    /// Aggregate several sources covering the same client/period and merge
    /// them by union: a field populated by a higher-priority source is never
    /// overwritten by a lower-priority one.
    pub fn normalize_merged(
        &self,
        sources: &[(SourceKind, Vec<RawRecord>)],
        client_id: &str,
        period: Period,
    ) -> MetricSnapshot {
        let mut parts: Vec<(u8, PartialMetrics)> = sources
            .iter()
            .map(|(kind, rows)| (kind.priority(), aggregate_rows(rows, *kind)))
            .collect();
        parts.sort_by_key(|(priority, _)| *priority);

        let mut merged = PartialMetrics::default();
        for (_, part) in &parts {
            merged.fill_from(part);
        }
        merged.finalize(client_id, period, self.default_mix)
    }
}

/// Aggregate rows of one source kind into a partial snapshot.
///
/// Sums are additive; rates are weighted by their corresponding volume
/// (position by impressions, engagement/bounce by sessions). Rows missing
/// the weight are excluded from that average's denominator. Per-row `ctr`
/// values are ignored entirely; the final ctr is recomputed from aggregate
/// clicks/impressions.
pub fn aggregate_rows(rows: &[RawRecord], kind: SourceKind) -> PartialMetrics {
    let mut out = PartialMetrics::default();

    let mut clicks = Acc::default();
    let mut impressions = Acc::default();
    let mut users = Acc::default();
    let mut sessions = Acc::default();
    let mut page_views = Acc::default();
    let mut position = WeightedAcc::default();
    let mut engagement = WeightedAcc::default();
    let mut bounce = WeightedAcc::default();
    let mut mobile_pct = Acc::default();
    let mut desktop_pct = Acc::default();
    let mut device_rows: u32 = 0;

    for (idx, row) in rows.iter().enumerate() {
        if reject_negative(row, kind, idx) {
            continue;
        }

        match kind {
            SourceKind::SearchPerformance => {
                clicks.add(num_field(row, "clicks"));
                let imp = num_field(row, "impressions");
                impressions.add(imp);
                if let (Some(pos), Some(imp)) = (num_field(row, "position"), imp) {
                    position.add(pos, imp);
                }
            }
            SourceKind::SiteAnalytics => {
                users.add(num_field(row, "users"));
                let sess = num_field(row, "sessions");
                sessions.add(sess);
                page_views.add(num_field(row, "page_views"));
                if let (Some(rate), Some(sess)) = (num_field(row, "engagement_rate"), sess) {
                    engagement.add(rate, sess);
                }
                if let (Some(rate), Some(sess)) = (num_field(row, "bounce_rate"), sess) {
                    bounce.add(rate, sess);
                }
                let m = num_field(row, "mobile_pct");
                let d = num_field(row, "desktop_pct");
                if m.is_some() || d.is_some() {
                    device_rows += 1;
                    mobile_pct.add(m);
                    desktop_pct.add(d);
                }
            }
            SourceKind::ThirdPartyResearch => {
                clicks.add(num_field(row, "estimated_clicks"));
                let imp = num_field(row, "estimated_impressions");
                impressions.add(imp);
                if let (Some(pos), Some(imp)) = (num_field(row, "estimated_position"), imp) {
                    position.add(pos, imp);
                }
                users.add(num_field(row, "estimated_traffic"));
            }
        }
    }

    out.clicks = clicks.total_i64();
    out.impressions = impressions.total_i64();
    out.users = users.total_i64();
    out.sessions = sessions.total_i64();
    out.page_views = page_views.total_i64();
    out.avg_position = position.mean();
    out.engagement_rate = engagement.mean();
    out.bounce_rate = bounce.mean();

    if device_rows > 0 {
        // Exports carry the device breakdown as a summary row (or a few);
        // shares are averaged per row, not volume-weighted.
        let mobile = mobile_pct.sum / device_rows as f64;
        let desktop = desktop_pct.sum / device_rows as f64;
        out.device_split = Some(split::device_split_from_explicit(mobile, desktop));
    }

    out
}

/// Query-level performance label, keyed on CTR percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryPerformance {
    Excellent,
    Good,
    Improving,
}

impl QueryPerformance {
    fn from_ctr_pct(ctr_pct: f64) -> Self {
        if ctr_pct >= 6.0 {
            QueryPerformance::Excellent
        } else if ctr_pct >= 4.0 {
            QueryPerformance::Good
        } else {
            QueryPerformance::Improving
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopQuery {
    pub rank: usize,
    pub query: String,
    pub clicks: i64,
    pub impressions: i64,
    pub ctr_pct: f64,
    pub position: f64,
    pub performance: QueryPerformance,
}

/// Top `limit` search-performance rows by clicks, with per-query CTR labels.
/// Rows without a query string (or rejected for negative values) are skipped.
pub fn top_queries(rows: &[RawRecord], limit: usize) -> Vec<TopQuery> {
    let mut candidates: Vec<(String, i64, i64, f64)> = Vec::new();

    for (idx, row) in rows.iter().enumerate() {
        if reject_negative(row, SourceKind::SearchPerformance, idx) {
            continue;
        }
        let Some(query) = row.get("query").and_then(Value::as_str) else {
            continue;
        };
        let clicks = num_field(row, "clicks").unwrap_or(0.0);
        let impressions = num_field(row, "impressions").unwrap_or(0.0);
        let position = num_field(row, "position").unwrap_or(0.0);
        candidates.push((query.to_string(), clicks as i64, impressions as i64, position));
    }

    candidates.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    candidates
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, (query, clicks, impressions, position))| {
            let ctr_pct = if impressions > 0 {
                clicks as f64 / impressions as f64 * 100.0
            } else {
                0.0
            };
            TopQuery {
                rank: i + 1,
                query,
                clicks,
                impressions,
                ctr_pct,
                position,
                performance: QueryPerformance::from_ctr_pct(ctr_pct),
            }
        })
        .collect()
}

/// Lenient numeric field read: numbers pass through, numeric strings parse
/// (CSV-derived exports frequently quote numerics), anything else is absent.
fn num_field(row: &RawRecord, key: &str) -> Option<f64> {
    match row.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

// A row with any negative raw value is untrustworthy as a whole; drop it and
// say so, rather than aggregating the salvageable fields.
fn reject_negative(row: &RawRecord, kind: SourceKind, idx: usize) -> bool {
    for key in kind.numeric_keys() {
        if let Some(v) = num_field(row, key) {
            if v < 0.0 {
                tracing::warn!(
                    source = kind.as_str(),
                    row = idx,
                    field = key,
                    value = v,
                    "negative raw value; row rejected"
                );
                return true;
            }
        }
    }
    false
}

#[derive(Debug, Default)]
struct Acc {
    sum: f64,
    seen: bool,
}

impl Acc {
    fn add(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.sum += v;
            self.seen = true;
        }
    }

    fn total_i64(&self) -> Option<i64> {
        self.seen.then_some(self.sum.round() as i64)
    }
}

#[derive(Debug, Default)]
struct WeightedAcc {
    weighted: f64,
    weight: f64,
}

impl WeightedAcc {
    fn add(&mut self, value: f64, weight: f64) {
        if weight > 0.0 {
            self.weighted += value * weight;
            self.weight += weight;
        }
    }

    fn mean(&self) -> Option<f64> {
        (self.weight > 0.0).then(|| self.weighted / self.weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(v: serde_json::Value) -> RawRecord {
        v.as_object().expect("test row must be an object").clone()
    }

    fn period() -> Period {
        "2025-10".parse().unwrap()
    }

    fn normalizer() -> Normalizer {
        Normalizer::for_industry(IndustryTag::General)
    }

    #[test]
    fn position_is_impression_weighted_not_a_plain_mean() {
        let rows = vec![
            row(json!({"query": "a", "clicks": 30, "impressions": 300, "position": 4.0})),
            row(json!({"query": "b", "clicks": 5, "impressions": 100, "position": 10.0})),
        ];
        let snap = normalizer().normalize(&rows, SourceKind::SearchPerformance, "acme", period());
        // (4*300 + 10*100) / 400 = 5.5; a plain mean would say 7.0.
        assert!((snap.avg_position - 5.5).abs() < 1e-9);
    }

    #[test]
    fn ctr_is_recomputed_from_aggregates_not_averaged() {
        // Per-row ctr values are nonsense on purpose; they must be ignored.
        let rows = vec![
            row(json!({"query": "a", "clicks": 50, "impressions": 1000, "ctr": 0.9})),
            row(json!({"query": "b", "clicks": 0, "impressions": 1000, "ctr": 0.8})),
        ];
        let snap = normalizer().normalize(&rows, SourceKind::SearchPerformance, "acme", period());
        assert!((snap.ctr - 0.025).abs() < 1e-9);
    }

    #[test]
    fn malformed_fields_are_excluded_without_dropping_the_row() {
        let rows = vec![
            row(json!({"query": "a", "clicks": "not-a-number", "impressions": 500, "position": 8.0})),
            row(json!({"query": "b", "clicks": 20, "impressions": 500, "position": 4.0})),
        ];
        let snap = normalizer().normalize(&rows, SourceKind::SearchPerformance, "acme", period());
        // The malformed clicks contribute nothing; the row's impressions and
        // position still count.
        assert_eq!(snap.clicks, 20);
        assert_eq!(snap.impressions, 1000);
        assert!((snap.avg_position - 6.0).abs() < 1e-9);
    }

    #[test]
    fn numeric_strings_parse() {
        let rows = vec![row(
            json!({"query": "a", "clicks": "42", "impressions": "1000", "position": "3.5"}),
        )];
        let snap = normalizer().normalize(&rows, SourceKind::SearchPerformance, "acme", period());
        assert_eq!(snap.clicks, 42);
        assert_eq!(snap.impressions, 1000);
    }

    #[test]
    fn negative_rows_are_rejected_whole() {
        let rows = vec![
            row(json!({"query": "bad", "clicks": -5, "impressions": 900, "position": 1.0})),
            row(json!({"query": "ok", "clicks": 10, "impressions": 100, "position": 5.0})),
        ];
        let snap = normalizer().normalize(&rows, SourceKind::SearchPerformance, "acme", period());
        // Nothing from the negative row survives, not even its impressions.
        assert_eq!(snap.clicks, 10);
        assert_eq!(snap.impressions, 100);
    }

    #[test]
    fn analytics_rates_are_session_weighted() {
        let rows = vec![
            row(json!({"date": "2025-10-01", "users": 50, "sessions": 300, "page_views": 700, "engagement_rate": 60.0, "bounce_rate": 30.0})),
            row(json!({"date": "2025-10-02", "users": 10, "sessions": 100, "page_views": 150, "engagement_rate": 20.0, "bounce_rate": 70.0})),
        ];
        let snap = normalizer().normalize(&rows, SourceKind::SiteAnalytics, "acme", period());
        assert_eq!(snap.users, 60);
        assert_eq!(snap.sessions, 400);
        assert_eq!(snap.page_views, 850);
        // (60*300 + 20*100) / 400 = 50.0
        assert!((snap.engagement_rate - 50.0).abs() < 1e-9);
        assert!((snap.bounce_rate - 40.0).abs() < 1e-9);
    }

    #[test]
    fn over_committed_device_split_is_repaired() {
        let rows = vec![row(
            json!({"date": "2025-10-01", "sessions": 100, "mobile_pct": 70.3, "desktop_pct": 31.0}),
        )];
        let snap = normalizer().normalize(&rows, SourceKind::SiteAnalytics, "acme", period());
        assert_eq!(snap.device_split.tablet, 0.0);
        assert!(snap.device_split.mobile >= 0.0 && snap.device_split.desktop >= 0.0);
        assert!((snap.device_split.total() - 100.0).abs() <= 0.1);
    }

    #[test]
    fn missing_device_data_falls_back_to_the_industry_mix() {
        let rows = vec![row(json!({"query": "a", "clicks": 10, "impressions": 100}))];
        let snap = Normalizer::for_industry(IndustryTag::Automotive).normalize(
            &rows,
            SourceKind::SearchPerformance,
            "acme",
            period(),
        );
        assert!((snap.device_split.mobile - 68.0).abs() < 0.1);
        assert!((snap.device_split.total() - 100.0).abs() <= 0.1);
        assert!(snap.device_split.tablet >= 0.0);
    }

    #[test]
    fn merge_prefers_ground_truth_over_research_estimates() {
        let sources = vec![
            (
                SourceKind::ThirdPartyResearch,
                vec![row(
                    json!({"estimated_clicks": 999, "estimated_impressions": 90_000, "estimated_traffic": 1234}),
                )],
            ),
            (
                SourceKind::SearchPerformance,
                vec![row(json!({"query": "a", "clicks": 100, "impressions": 2000, "position": 7.0}))],
            ),
        ];
        let snap = normalizer().normalize_merged(&sources, "acme", period());
        // Measured clicks/impressions win; the research-only field fills in.
        assert_eq!(snap.clicks, 100);
        assert_eq!(snap.impressions, 2000);
        assert_eq!(snap.users, 1234);
        assert!((snap.ctr - 0.05).abs() < 1e-9);
    }

    #[test]
    fn merge_unions_analytics_into_search_data() {
        let sources = vec![
            (
                SourceKind::SearchPerformance,
                vec![row(json!({"query": "a", "clicks": 40, "impressions": 800, "position": 6.0}))],
            ),
            (
                SourceKind::SiteAnalytics,
                vec![row(
                    json!({"date": "2025-10-01", "users": 500, "sessions": 650, "page_views": 1400, "engagement_rate": 55.0, "bounce_rate": 35.0}),
                )],
            ),
        ];
        let snap = normalizer().normalize_merged(&sources, "acme", period());
        assert_eq!(snap.clicks, 40);
        assert_eq!(snap.users, 500);
        assert_eq!(snap.page_views, 1400);
        assert!((snap.engagement_rate - 55.0).abs() < 1e-9);
    }

    #[test]
    fn empty_input_yields_a_zeroed_snapshot_with_the_default_mix() {
        let snap = normalizer().normalize(&[], SourceKind::SearchPerformance, "acme", period());
        assert_eq!(snap.clicks, 0);
        assert_eq!(snap.impressions, 0);
        assert_eq!(snap.ctr, 0.0);
        assert!((snap.device_split.total() - 100.0).abs() <= 0.1);
    }

    #[test]
    fn top_queries_rank_by_clicks_with_ctr_labels() {
        let rows = vec![
            row(json!({"query": "emergency tyre repair", "clicks": 80, "impressions": 1000, "position": 2.1})),
            row(json!({"query": "cheap tyres", "clicks": 120, "impressions": 2500, "position": 3.4})),
            row(json!({"query": "wheel alignment", "clicks": 10, "impressions": 900, "position": 9.8})),
            row(json!({"clicks": 999, "impressions": 10})), // no query string
        ];
        let top = top_queries(&rows, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].query, "cheap tyres");
        assert_eq!(top[0].rank, 1);
        // 120/2500 = 4.8% -> Good; 80/1000 = 8% -> Excellent.
        assert_eq!(top[0].performance, QueryPerformance::Good);
        assert_eq!(top[1].performance, QueryPerformance::Excellent);
    }

    #[test]
    fn source_kind_round_trips_kebab_case() {
        let json = serde_json::to_string(&SourceKind::SearchPerformance).unwrap();
        assert_eq!(json, "\"search-performance\"");
        let back: SourceKind = serde_json::from_str("\"third-party-research\"").unwrap();
        assert_eq!(back, SourceKind::ThirdPartyResearch);
    }
}
