use serde::{Deserialize, Serialize};

/// Implementation effort, as judged by the analyst producing the draft.
///
/// A closed enumeration: the scoring tables key off these variants, so a
/// draft can never carry an unmapped effort string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffortLevel {
    Low,
    Medium,
    High,
}

/// Priority classification, least to most favorable:
/// Strategic < HighImpact < QuickWin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriorityTier {
    Strategic,
    HighImpact,
    QuickWin,
}

/// A candidate action before scoring. Impact inputs are optional; a draft
/// with neither is scored as zero impact, not rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationDraft {
    pub title: String,
    pub estimated_click_lift: Option<f64>,
    pub estimated_revenue_lift: Option<f64>,
    pub effort_level: EffortLevel,
    #[serde(default)]
    pub implementation_steps: Vec<String>,
}

/// A draft augmented with computed scores. `priority_tier` is derived from
/// the scores and is never set independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredRecommendation {
    pub title: String,
    pub estimated_click_lift: Option<f64>,
    pub estimated_revenue_lift: Option<f64>,
    pub effort_level: EffortLevel,
    pub implementation_steps: Vec<String>,
    /// 0..=10.
    pub impact_score: f64,
    /// 1..=10, from the fixed effort lookup.
    pub effort_score: f64,
    /// impact / max(effort, 1); non-negative, unbounded.
    pub roi_score: f64,
    /// 0..=1, informational.
    pub confidence: f64,
    pub timeline_weeks: u32,
    pub priority_tier: PriorityTier,
}
