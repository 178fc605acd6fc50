use super::common::{domain, kpi, template_draft};
use crate::workflows::appraisal::catalog::RubricTemplate;
use crate::workflows::appraisal::domain::{KpiScore, LayerSheet};
use crate::workflows::appraisal::scoring::{
    completion, domain_score, overall_score, tier_of, TierLabel,
};

fn sheet(scores: &[(&str, KpiScore)]) -> LayerSheet {
    let mut sheet = LayerSheet::default();
    for (kpi_id, score) in scores {
        sheet.scores.insert(kpi_id.to_string(), *score);
    }
    sheet
}

fn template_of(domains: Vec<crate::workflows::appraisal::catalog::RubricDomain>) -> RubricTemplate {
    RubricTemplate {
        id: crate::workflows::appraisal::catalog::TemplateId("tpl-test".to_string()),
        name: "test".to_string(),
        version: 1,
        domains,
    }
}

#[test]
fn excluded_kpis_drop_out_of_the_domain_mean() {
    let rubric = domain(
        "D",
        100.0,
        vec![kpi("a", "A"), kpi("b", "B"), kpi("c", "C")],
    );
    let sheet = sheet(&[
        ("a", KpiScore::Rated(3)),
        ("b", KpiScore::Rated(4)),
        ("c", KpiScore::Excluded),
    ]);

    assert_eq!(domain_score(&rubric, &sheet), Some(3.5));
}

#[test]
fn unscored_domain_yields_none_rather_than_zero() {
    let rubric = domain("D", 100.0, vec![kpi("a", "A")]);
    assert_eq!(domain_score(&rubric, &LayerSheet::default()), None);

    let all_excluded = sheet(&[("a", KpiScore::Excluded)]);
    assert_eq!(domain_score(&rubric, &all_excluded), None);
}

#[test]
fn overall_score_renormalizes_over_scored_domains() {
    let template = template_of(vec![
        domain("A", 50.0, vec![kpi("a", "A")]),
        domain("B", 50.0, vec![kpi("b", "B")]),
    ]);
    let sheet = sheet(&[("a", KpiScore::Rated(4))]);

    // Domain B has no rated KPI, so its weight leaves the denominator.
    assert_eq!(overall_score(&template, &sheet), Some(4.0));
}

#[test]
fn overall_score_is_none_when_nothing_is_rated() {
    let template = template_of(vec![domain("A", 100.0, vec![kpi("a", "A")])]);
    assert_eq!(overall_score(&template, &LayerSheet::default()), None);
}

#[test]
fn tier_boundaries_match_the_banding_table() {
    let exemplary = tier_of(3.9);
    assert_eq!(exemplary.label, TierLabel::Exemplary);
    assert_eq!(exemplary.bonus_percent, 100);

    let trail_blazer = tier_of(3.89);
    assert_eq!(trail_blazer.label, TierLabel::TrailBlazer);
    assert_eq!(trail_blazer.bonus_percent, 90);

    let performance_management = tier_of(2.6);
    assert_eq!(performance_management.label, TierLabel::PerformanceManagement);
    assert_eq!(performance_management.bonus_percent, 10);

    let below = tier_of(2.59);
    assert_eq!(below.label, TierLabel::BelowThreshold);
    assert_eq!(below.bonus_percent, 0);
}

#[test]
fn near_equal_weights_average_to_the_middle_tier() {
    let template = template_of(vec![
        domain("A", 33.33, vec![kpi("a1", "A1"), kpi("a2", "A2"), kpi("a3", "A3")]),
        domain("B", 33.33, vec![kpi("b1", "B1"), kpi("b2", "B2"), kpi("b3", "B3")]),
        domain("C", 33.34, vec![kpi("c1", "C1"), kpi("c2", "C2"), kpi("c3", "C3")]),
    ]);
    let sheet = sheet(&[
        ("a1", KpiScore::Rated(4)),
        ("a2", KpiScore::Rated(4)),
        ("a3", KpiScore::Rated(4)),
        ("b1", KpiScore::Rated(3)),
        ("b2", KpiScore::Rated(3)),
        ("b3", KpiScore::Rated(3)),
        ("c1", KpiScore::Rated(2)),
        ("c2", KpiScore::Rated(2)),
        ("c3", KpiScore::Rated(2)),
    ]);

    // The raw weighted mean is 2.9999; the two-decimal rounding must keep the
    // score on the 3.0 boundary instead of dropping it a band.
    let overall = overall_score(&template, &sheet).expect("all domains scored");
    assert_eq!(overall, 3.0);

    let tier = tier_of(overall);
    assert_eq!(tier.label, TierLabel::Developing);
    assert_eq!(tier.bonus_percent, 50);
}

#[test]
fn completion_requires_evidence_for_rated_kpis() {
    let draft = template_draft();
    let template = RubricTemplate {
        id: draft.id.clone(),
        name: draft.name.clone(),
        version: 1,
        domains: draft.domains.clone(),
    };

    // Rated without evidence: not complete.
    let mut sheet = LayerSheet::default();
    sheet.scores.insert("ip-1".to_string(), KpiScore::Rated(3));
    let progress = completion(&template, &sheet);
    assert_eq!(progress.completed, 0);
    assert_eq!(progress.total, 3);

    // Excluded needs no evidence; rated needs at least one real reference.
    sheet.scores.insert("ip-2".to_string(), KpiScore::Excluded);
    sheet.evidence.insert(
        "ip-1".to_string(),
        super::common::evidence("lesson-plans"),
    );
    let progress = completion(&template, &sheet);
    assert_eq!(progress.completed, 2);
    assert!(!progress.is_full());

    // A blank reference does not count as evidence.
    sheet.scores.insert("pc-1".to_string(), KpiScore::Rated(4));
    sheet.evidence.insert(
        "pc-1".to_string(),
        vec![crate::workflows::appraisal::domain::EvidenceItem {
            reference: "   ".to_string(),
            title: "placeholder".to_string(),
            notes: String::new(),
        }],
    );
    let progress = completion(&template, &sheet);
    assert_eq!(progress.completed, 2);
}
