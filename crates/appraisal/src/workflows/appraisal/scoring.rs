//! Pure aggregation over one scoring layer: per-domain means, the weighted
//! overall score, tier banding, and completion metrics. No side effects;
//! callers persist the results when a transition finalizes scoring.

use serde::{Deserialize, Serialize};

use super::catalog::{RubricDomain, RubricTemplate};
use super::domain::{KpiScore, LayerSheet};

/// Labeled score band mapped to a bonus payout percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierLabel {
    Exemplary,
    TrailBlazer,
    RisingStar,
    SolidFoundation,
    Developing,
    NeedsImprovement,
    PerformanceManagement,
    BelowThreshold,
}

impl TierLabel {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Exemplary => "Exemplary",
            Self::TrailBlazer => "Trail Blazer",
            Self::RisingStar => "Rising Star",
            Self::SolidFoundation => "Solid Foundation",
            Self::Developing => "Developing",
            Self::NeedsImprovement => "Needs Improvement",
            Self::PerformanceManagement => "Performance Management",
            Self::BelowThreshold => "Below Threshold",
        }
    }
}

/// A resolved tier: the band label plus its payout percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    pub label: TierLabel,
    pub bonus_percent: u8,
}

/// Ordered highest-first; the first threshold at or below the score wins.
const TIER_BANDS: [(f64, TierLabel, u8); 7] = [
    (3.9, TierLabel::Exemplary, 100),
    (3.6, TierLabel::TrailBlazer, 90),
    (3.4, TierLabel::RisingStar, 80),
    (3.2, TierLabel::SolidFoundation, 65),
    (3.0, TierLabel::Developing, 50),
    (2.8, TierLabel::NeedsImprovement, 40),
    (2.6, TierLabel::PerformanceManagement, 10),
];

pub fn tier_of(score: f64) -> Tier {
    for (threshold, label, bonus_percent) in TIER_BANDS {
        if score >= threshold {
            return Tier {
                label,
                bonus_percent,
            };
        }
    }

    Tier {
        label: TierLabel::BelowThreshold,
        bonus_percent: 0,
    }
}

/// Mean of the numeric KPI scores in one domain for one layer. Excluded and
/// unset KPIs are omitted from numerator and denominator alike; `None` when
/// no KPI qualifies.
pub fn domain_score(domain: &RubricDomain, sheet: &LayerSheet) -> Option<f64> {
    let mut sum = 0u32;
    let mut count = 0u32;

    for kpi in domain.kpis() {
        if let Some(KpiScore::Rated(score)) = sheet.scores.get(&kpi.id) {
            sum += u32::from(*score);
            count += 1;
        }
    }

    (count > 0).then(|| f64::from(sum) / f64::from(count))
}

/// Weighted mean across domains, renormalized over the domains that produced
/// a score: a domain with no rated KPIs drops out of both sums instead of
/// contributing a zero. Rounded to two decimals so weights like 33.33/33.34
/// land on the band boundary they are aimed at instead of a hair under it.
pub fn overall_score(template: &RubricTemplate, sheet: &LayerSheet) -> Option<f64> {
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;

    for domain in &template.domains {
        if let Some(score) = domain_score(domain, sheet) {
            weighted_sum += score * domain.weight;
            weight_total += domain.weight;
        }
    }

    (weight_total > 0.0).then(|| (weighted_sum / weight_total * 100.0).round() / 100.0)
}

/// Completion metrics for one layer over every KPI in the bound template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub completed: usize,
    pub total: usize,
}

impl Completion {
    pub const fn is_full(self) -> bool {
        self.completed == self.total
    }
}

pub fn completion(template: &RubricTemplate, sheet: &LayerSheet) -> Completion {
    let mut completed = 0;
    let mut total = 0;

    for kpi in template.kpis() {
        total += 1;
        if sheet.kpi_complete(&kpi.id) {
            completed += 1;
        }
    }

    Completion { completed, total }
}

/// KPI ids in the template that fail the completeness rule for this layer,
/// in template order, so errors can point the user at the gaps.
pub fn incomplete_kpis(template: &RubricTemplate, sheet: &LayerSheet) -> Vec<String> {
    template
        .kpis()
        .filter(|kpi| !sheet.kpi_complete(&kpi.id))
        .map(|kpi| kpi.id.clone())
        .collect()
}
