use crate::domain::recommendation::{
    EffortLevel, PriorityTier, RecommendationDraft, ScoredRecommendation,
};
use serde::{Deserialize, Serialize};

// Impact scales: 50 clicks of estimated lift buy one point, $500 of revenue
// lift buy one point, each contribution capped so neither input can dominate.
const CLICKS_PER_IMPACT_POINT: f64 = 50.0;
const CLICK_IMPACT_CAP: f64 = 5.0;
const REVENUE_PER_IMPACT_POINT: f64 = 500.0;
const REVENUE_IMPACT_CAP: f64 = 5.0;

fn effort_score(level: EffortLevel) -> f64 {
    match level {
        EffortLevel::Low => 2.0,
        EffortLevel::Medium => 5.0,
        EffortLevel::High => 8.0,
    }
}

fn timeline_weeks(level: EffortLevel) -> u32 {
    match level {
        EffortLevel::Low => 2,
        EffortLevel::Medium => 4,
        EffortLevel::High => 12,
    }
}

// Confidence reflects how much of the impact estimate is backed by stated
// inputs. Informational only; roi stays impact / max(effort, 1).
fn confidence(draft: &RecommendationDraft) -> f64 {
    match (
        draft.estimated_click_lift.is_some(),
        draft.estimated_revenue_lift.is_some(),
    ) {
        (true, true) => 1.0,
        (true, false) | (false, true) => 0.8,
        (false, false) => 0.6,
    }
}

fn impact_score(draft: &RecommendationDraft) -> f64 {
    let clicks = draft
        .estimated_click_lift
        .map(|v| (v.max(0.0) / CLICKS_PER_IMPACT_POINT).min(CLICK_IMPACT_CAP))
        .unwrap_or(0.0);
    let revenue = draft
        .estimated_revenue_lift
        .map(|v| (v.max(0.0) / REVENUE_PER_IMPACT_POINT).min(REVENUE_IMPACT_CAP))
        .unwrap_or(0.0);
    (clicks + revenue).clamp(0.0, 10.0)
}

// Evaluated in declared order; first match wins. The tier is a pure function
// of the computed scores and is never assigned independently.
fn priority_tier(roi_score: f64, effort_score: f64, _timeline_weeks: u32) -> PriorityTier {
    if roi_score > 8.0 && effort_score < 3.0 {
        PriorityTier::QuickWin
    } else if roi_score > 5.0 {
        PriorityTier::HighImpact
    } else {
        PriorityTier::Strategic
    }
}

/// Score one draft. A draft missing both impact inputs scores zero impact
/// and is still tiered normally: unstated impact is treated as no impact,
/// not as unknown impact.
pub fn score(draft: RecommendationDraft) -> ScoredRecommendation {
    let impact = impact_score(&draft);
    let effort = effort_score(draft.effort_level);
    let roi = impact / effort.max(1.0);
    let confidence = confidence(&draft);
    let timeline = timeline_weeks(draft.effort_level);
    let tier = priority_tier(roi, effort, timeline);

    ScoredRecommendation {
        title: draft.title,
        estimated_click_lift: draft.estimated_click_lift,
        estimated_revenue_lift: draft.estimated_revenue_lift,
        effort_level: draft.effort_level,
        implementation_steps: draft.implementation_steps,
        impact_score: impact,
        effort_score: effort,
        roi_score: roi,
        confidence,
        timeline_weeks: timeline,
        priority_tier: tier,
    }
}

/// Score all drafts and order them by descending roi, ties broken by
/// ascending effort (prefer the cheaper win), remaining ties by input order.
pub fn prioritize(drafts: Vec<RecommendationDraft>) -> Vec<ScoredRecommendation> {
    let mut scored: Vec<ScoredRecommendation> = drafts.into_iter().map(score).collect();

    // Vec::sort_by is stable, which supplies the input-order tie-break.
    scored.sort_by(|a, b| {
        b.roi_score
            .partial_cmp(&a.roi_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                a.effort_score
                    .partial_cmp(&b.effort_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    });

    scored
}

/// Per-tier counts and score averages for the report's priority overview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrioritySummary {
    pub total: usize,
    pub quick_wins: usize,
    pub high_impact: usize,
    pub strategic: usize,
    pub avg_impact: f64,
    pub avg_effort: f64,
    pub avg_roi: f64,
}

pub fn summary(scored: &[ScoredRecommendation]) -> PrioritySummary {
    let total = scored.len();
    let count = |tier: PriorityTier| scored.iter().filter(|r| r.priority_tier == tier).count();
    let avg = |f: fn(&ScoredRecommendation) -> f64| {
        if total == 0 {
            0.0
        } else {
            scored.iter().map(f).sum::<f64>() / total as f64
        }
    };

    PrioritySummary {
        total,
        quick_wins: count(PriorityTier::QuickWin),
        high_impact: count(PriorityTier::HighImpact),
        strategic: count(PriorityTier::Strategic),
        avg_impact: avg(|r| r.impact_score),
        avg_effort: avg(|r| r.effort_score),
        avg_roi: avg(|r| r.roi_score),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(
        title: &str,
        clicks: Option<f64>,
        revenue: Option<f64>,
        effort: EffortLevel,
    ) -> RecommendationDraft {
        RecommendationDraft {
            title: title.to_string(),
            estimated_click_lift: clicks,
            estimated_revenue_lift: revenue,
            effort_level: effort,
            implementation_steps: vec!["step one".to_string()],
        }
    }

    #[test]
    fn effort_lookup_is_the_fixed_table() {
        assert_eq!(score(draft("a", None, None, EffortLevel::Low)).effort_score, 2.0);
        assert_eq!(score(draft("b", None, None, EffortLevel::Medium)).effort_score, 5.0);
        assert_eq!(score(draft("c", None, None, EffortLevel::High)).effort_score, 8.0);
    }

    #[test]
    fn impact_contributions_are_capped_and_clamped() {
        // 10_000 clicks would be 200 points uncapped; the cap holds it at 5.
        let s = score(draft("a", Some(10_000.0), Some(100_000.0), EffortLevel::Medium));
        assert_eq!(s.impact_score, 10.0);

        let s = score(draft("b", Some(100.0), None, EffortLevel::Medium));
        assert_eq!(s.impact_score, 2.0);

        let s = score(draft("c", None, Some(1_000.0), EffortLevel::Medium));
        assert_eq!(s.impact_score, 2.0);
    }

    #[test]
    fn missing_impact_inputs_score_zero_and_still_tier() {
        let s = score(draft("a", None, None, EffortLevel::Low));
        assert_eq!(s.impact_score, 0.0);
        assert_eq!(s.roi_score, 0.0);
        assert_eq!(s.priority_tier, PriorityTier::Strategic);
        assert_eq!(s.confidence, 0.6);
    }

    #[test]
    fn boundary_just_below_high_impact_falls_to_strategic() {
        // impact 9 (250 clicks -> 5 capped, $2000 -> 4), low effort -> 2,
        // roi 4.5. roi > 5 fails at 4.5, so the draft is Strategic, not
        // HighImpact.
        let s = score(draft("a", Some(250.0), Some(2_000.0), EffortLevel::Low));
        assert_eq!(s.impact_score, 9.0);
        assert_eq!(s.effort_score, 2.0);
        assert_eq!(s.roi_score, 4.5);
        assert_eq!(s.priority_tier, PriorityTier::Strategic);
    }

    #[test]
    fn lower_effort_never_yields_a_less_favorable_tier() {
        for (clicks, revenue) in [
            (None, None),
            (Some(100.0), None),
            (Some(250.0), Some(2_000.0)),
            (Some(10_000.0), Some(100_000.0)),
        ] {
            let low = score(draft("low", clicks, revenue, EffortLevel::Low));
            let high = score(draft("high", clicks, revenue, EffortLevel::High));
            assert!(
                low.priority_tier >= high.priority_tier,
                "clicks={clicks:?} revenue={revenue:?}"
            );
        }
    }

    #[test]
    fn timeline_and_confidence_follow_the_tables() {
        let s = score(draft("a", Some(100.0), None, EffortLevel::High));
        assert_eq!(s.timeline_weeks, 12);
        assert_eq!(s.confidence, 0.8);

        let s = score(draft("b", Some(100.0), Some(500.0), EffortLevel::Low));
        assert_eq!(s.timeline_weeks, 2);
        assert_eq!(s.confidence, 1.0);
    }

    #[test]
    fn prioritize_orders_by_roi_then_cheaper_effort_then_input_order() {
        let drafts = vec![
            // roi 10/8 = 1.25
            draft("big-high", Some(10_000.0), Some(100_000.0), EffortLevel::High),
            // roi 10/2 = 5.0
            draft("big-low", Some(10_000.0), Some(100_000.0), EffortLevel::Low),
            // roi 5/5 = 1.0 x2, identical; input order must hold
            draft("tie-first", Some(250.0), None, EffortLevel::Medium),
            draft("tie-second", Some(250.0), None, EffortLevel::Medium),
            // roi 10/5 = 2.0
            draft("big-medium", Some(10_000.0), Some(100_000.0), EffortLevel::Medium),
        ];
        let out = prioritize(drafts);
        let titles: Vec<&str> = out.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["big-low", "big-medium", "big-high", "tie-first", "tie-second"]
        );
    }

    #[test]
    fn summary_counts_tiers_and_averages() {
        let out = prioritize(vec![
            draft("a", Some(10_000.0), Some(100_000.0), EffortLevel::Low), // roi 5.0
            draft("b", None, None, EffortLevel::High),                     // roi 0.0
        ]);
        let s = summary(&out);
        assert_eq!(s.total, 2);
        assert_eq!(s.quick_wins, 0);
        assert_eq!(s.high_impact, 0);
        assert_eq!(s.strategic, 2);
        assert!((s.avg_impact - 5.0).abs() < 1e-9);
        assert!((s.avg_effort - 5.0).abs() < 1e-9);
        assert!((s.avg_roi - 2.5).abs() < 1e-9);
    }
}
