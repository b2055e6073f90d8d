use crate::classify::IndustryTag;
use crate::domain::snapshot::MetricSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Organic ranking band, used to pick the expected CTR for a client's
/// average position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PositionBand {
    #[serde(rename = "1-3")]
    Top3,
    #[serde(rename = "4-10")]
    Top10,
    #[serde(rename = "11-20")]
    Top20,
    #[serde(rename = "21+")]
    Beyond20,
}

impl PositionBand {
    pub fn for_position(position: f64) -> Self {
        if position <= 3.0 {
            PositionBand::Top3
        } else if position <= 10.0 {
            PositionBand::Top10
        } else if position <= 20.0 {
            PositionBand::Top20
        } else {
            PositionBand::Beyond20
        }
    }
}

/// Static industry reference values. Loaded once at process start and never
/// mutated by request handling.
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkProfile {
    pub industry: IndustryTag,
    pub avg_position: f64,
    pub avg_ctr_by_position_band: BTreeMap<PositionBand, f64>,
    pub mobile_share_pct: f64,
    pub local_intent_pct: f64,
}

/// Per-dimension outcome classification, on the direction-normalized delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionStatus {
    Excellent,
    AboveAverage,
    Average,
    BelowAverage,
}

impl DimensionStatus {
    fn from_delta(delta_pct: f64) -> Self {
        if delta_pct >= 20.0 {
            DimensionStatus::Excellent
        } else if delta_pct >= 10.0 {
            DimensionStatus::AboveAverage
        } else if delta_pct >= -10.0 {
            DimensionStatus::Average
        } else {
            DimensionStatus::BelowAverage
        }
    }
}

/// Overall rating bands over the composite score. Contiguous and exhaustive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    IndustryLeader,
    AboveAverage,
    Average,
    BelowAverage,
    NeedsImprovement,
}

impl Rating {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            Rating::IndustryLeader
        } else if score >= 70.0 {
            Rating::AboveAverage
        } else if score >= 60.0 {
            Rating::Average
        } else if score >= 50.0 {
            Rating::BelowAverage
        } else {
            Rating::NeedsImprovement
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionResult {
    pub actual: f64,
    pub benchmark: f64,
    /// Percent difference, direction-normalized: positive always means
    /// better than benchmark, also for lower-is-better dimensions.
    pub delta_pct: f64,
    pub status: DimensionStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    pub dimension: String,
    pub description: String,
    pub action: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResult {
    /// 0..=100, clamped at both ends.
    pub overall_score: f64,
    pub rating: Rating,
    pub dimension_results: BTreeMap<String, DimensionResult>,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub opportunities: Vec<Opportunity>,
}

fn profiles() -> &'static BTreeMap<IndustryTag, BenchmarkProfile> {
    static PROFILES: OnceLock<BTreeMap<IndustryTag, BenchmarkProfile>> = OnceLock::new();
    PROFILES.get_or_init(|| {
        let mut out = BTreeMap::new();
        for (industry, avg_position, bands, mobile_share_pct, local_intent_pct) in [
            (IndustryTag::Automotive, 15.2, [28.0, 12.0, 5.0, 2.0], 68.0, 72.0),
            (IndustryTag::Legal, 12.8, [32.0, 15.0, 6.0, 2.5], 35.0, 85.0),
            (IndustryTag::Healthcare, 14.5, [30.0, 13.0, 5.5, 2.2], 62.0, 78.0),
            (IndustryTag::RealEstate, 18.3, [25.0, 10.0, 4.5, 1.8], 42.0, 92.0),
            (IndustryTag::Restaurant, 10.2, [35.0, 16.0, 6.5, 2.5], 75.0, 88.0),
            (IndustryTag::Ecommerce, 20.5, [24.0, 10.0, 4.0, 1.6], 64.0, 20.0),
            (IndustryTag::Saas, 16.8, [22.0, 9.0, 3.5, 1.4], 38.0, 15.0),
            (IndustryTag::Education, 13.5, [27.0, 11.0, 4.5, 1.9], 48.0, 65.0),
            (IndustryTag::Fitness, 11.8, [30.0, 13.0, 5.5, 2.2], 70.0, 80.0),
            (IndustryTag::Beauty, 9.5, [31.0, 14.0, 6.0, 2.3], 72.0, 82.0),
            (IndustryTag::General, 16.0, [28.0, 12.0, 5.0, 2.0], 55.0, 50.0),
        ] {
            let avg_ctr_by_position_band = BTreeMap::from([
                (PositionBand::Top3, bands[0]),
                (PositionBand::Top10, bands[1]),
                (PositionBand::Top20, bands[2]),
                (PositionBand::Beyond20, bands[3]),
            ]);
            out.insert(
                industry,
                BenchmarkProfile {
                    industry,
                    avg_position,
                    avg_ctr_by_position_band,
                    mobile_share_pct,
                    local_intent_pct,
                },
            );
        }
        out
    })
}

/// Look up the profile for an industry. Every tag has one, including
/// `General`, so this cannot fail.
pub fn profile_for(industry: IndustryTag) -> &'static BenchmarkProfile {
    profiles()
        .get(&industry)
        .unwrap_or_else(|| &profiles()[&IndustryTag::General])
}

/// Compare a snapshot against a profile, producing the composite score and
/// classified dimension outcomes.
///
/// A dimension with no usable benchmark value (no CTR entry for the client's
/// band, a zero reference, or no ranking data on the client side to select a
/// band) is excluded from the composite mean entirely rather than scored as
/// zero.
pub fn compare(snapshot: &MetricSnapshot, profile: &BenchmarkProfile) -> BenchmarkResult {
    let mut dimension_results = BTreeMap::new();

    // Average position: lower is better, so the sign is inverted before
    // classification.
    if snapshot.avg_position > 0.0 && profile.avg_position > 0.0 {
        let raw = (snapshot.avg_position - profile.avg_position) / profile.avg_position * 100.0;
        let delta_pct = -raw;
        dimension_results.insert(
            "position".to_string(),
            DimensionResult {
                actual: snapshot.avg_position,
                benchmark: profile.avg_position,
                delta_pct,
                status: DimensionStatus::from_delta(delta_pct),
            },
        );
    }

    // CTR vs the expected CTR for the client's position band. A snapshot
    // without impressions has no meaningful CTR; a band missing from the
    // profile is a benchmark data gap. Either way the dimension is skipped.
    if snapshot.impressions > 0 && snapshot.avg_position > 0.0 {
        let band = PositionBand::for_position(snapshot.avg_position);
        if let Some(&expected) = profile.avg_ctr_by_position_band.get(&band) {
            if expected > 0.0 {
                let actual = snapshot.ctr * 100.0;
                let delta_pct = (actual - expected) / expected * 100.0;
                dimension_results.insert(
                    "ctr".to_string(),
                    DimensionResult {
                        actual,
                        benchmark: expected,
                        delta_pct,
                        status: DimensionStatus::from_delta(delta_pct),
                    },
                );
            }
        }
    }

    // Device mix, keyed on the mobile share.
    if profile.mobile_share_pct > 0.0 {
        let actual = snapshot.device_split.mobile;
        let delta_pct = (actual - profile.mobile_share_pct) / profile.mobile_share_pct * 100.0;
        dimension_results.insert(
            "mobile_share".to_string(),
            DimensionResult {
                actual,
                benchmark: profile.mobile_share_pct,
                delta_pct,
                status: DimensionStatus::from_delta(delta_pct),
            },
        );
    }

    let included = dimension_results.len();
    let mean_delta = if included == 0 {
        0.0
    } else {
        dimension_results.values().map(|d| d.delta_pct).sum::<f64>() / included as f64
    };

    let overall_score = (65.0 + mean_delta / 2.0).clamp(0.0, 100.0);
    let rating = Rating::from_score(overall_score);

    let mut strengths = Vec::new();
    let mut weaknesses = Vec::new();
    for (name, dim) in &dimension_results {
        match dim.status {
            DimensionStatus::Excellent | DimensionStatus::AboveAverage => {
                strengths.push(name.clone());
            }
            DimensionStatus::BelowAverage => {
                weaknesses.push(name.clone());
            }
            DimensionStatus::Average => {}
        }
    }

    let opportunities = weaknesses
        .iter()
        .filter_map(|name| opportunity_for(name, &dimension_results[name]))
        .collect();

    BenchmarkResult {
        overall_score,
        rating,
        dimension_results,
        strengths,
        weaknesses,
        opportunities,
    }
}

fn opportunity_for(dimension: &str, dim: &DimensionResult) -> Option<Opportunity> {
    let (description, action) = match dimension {
        "position" => (
            format!(
                "Average position {:.1} trails the industry reference of {:.1}",
                dim.actual, dim.benchmark
            ),
            "Focus on technical health, content depth, and link acquisition".to_string(),
        ),
        "ctr" => (
            format!(
                "CTR {:.2}% is below the {:.2}% expected for the current position band",
                dim.actual, dim.benchmark
            ),
            "Rework titles, meta descriptions, and structured-data snippets".to_string(),
        ),
        "mobile_share" => (
            format!(
                "Mobile share {:.1}% trails the industry norm of {:.1}%",
                dim.actual, dim.benchmark
            ),
            "Audit mobile page experience and mobile-specific landing content".to_string(),
        ),
        _ => return None,
    };

    Some(Opportunity {
        dimension: dimension.to_string(),
        description,
        action,
    })
}
