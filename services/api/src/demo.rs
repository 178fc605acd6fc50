use crate::infra::{demo_department_id, seed_demo_org, workspace, Workspace};
use appraisal::error::AppError;
use appraisal::workflows::appraisal::{
    ActorContext, Assessment, EvidenceItem, KpiScore, LayerEdits, OpenAssessment,
    ReleaseCoordinator, Role, UserId,
};
use chrono::Local;
use clap::Args;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Appraisal period label. Defaults to the current year.
    #[arg(long)]
    pub(crate) period: Option<String>,
    /// Stop after the batch release instead of acknowledging the result.
    #[arg(long)]
    pub(crate) skip_acknowledge: bool,
}

fn demo_actor(id: &str, role: Role) -> ActorContext {
    ActorContext {
        id: UserId(id.to_string()),
        roles: vec![role],
        department_id: Some(demo_department_id()),
    }
}

fn rated(edits: &mut LayerEdits, kpi_id: &str, score: u8, evidence_title: &str) {
    edits
        .scores
        .insert(kpi_id.to_string(), KpiScore::Rated(score));
    edits.evidence.insert(
        kpi_id.to_string(),
        vec![EvidenceItem {
            reference: format!("doc://demo/{kpi_id}"),
            title: evidence_title.to_string(),
            notes: String::new(),
        }],
    );
}

fn layer_edits(scores: &[(&str, u8)]) -> LayerEdits {
    let mut edits = LayerEdits::default();
    for (kpi_id, score) in scores {
        rated(&mut edits, kpi_id, *score, "Demo evidence");
    }
    edits
}

fn print_state(heading: &str, assessment: &Assessment) {
    println!(
        "  {heading}: status={} step={}",
        assessment.status.label(),
        assessment.current_step_index
    );
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        period,
        skip_acknowledge,
    } = args;
    let period = period.unwrap_or_else(|| Local::now().format("%Y").to_string());

    println!("Staff appraisal demo ({period})");

    let ws: Workspace = workspace();
    let role_id = seed_demo_org(&ws)?;
    println!("  seeded department role {} with the standard review chain", role_id.0);

    let staff = demo_actor("u-demo-staff", Role::Staff);
    let opened = ws.service.open(
        &staff,
        OpenAssessment {
            period,
            template_id: None,
        },
    )?;
    print_state("opened", &opened);

    let mut self_edits = layer_edits(&[("cd-1", 3), ("cd-2", 4), ("pc-1", 3)]);
    self_edits
        .scores
        .insert("gr-1".to_string(), KpiScore::Excluded);
    ws.service.save_self(&opened.id, &staff, self_edits)?;
    let submitted = ws.service.submit(&opened.id, &staff)?;
    print_state("submitted", &submitted);

    let supervisor = demo_actor("u-demo-supervisor", Role::Supervisor);
    let reviewed = ws.service.advance(
        &opened.id,
        &supervisor,
        layer_edits(&[("cd-1", 3), ("cd-2", 3), ("pc-1", 4), ("gr-1", 3)]),
    )?;
    print_state("supervisor review", &reviewed);

    let manager = demo_actor("u-demo-manager", Role::Manager);
    let reviewed = ws.service.advance(
        &opened.id,
        &manager,
        layer_edits(&[("cd-1", 4), ("cd-2", 4), ("pc-1", 4), ("gr-1", 3)]),
    )?;
    print_state("manager review", &reviewed);

    let admin = demo_actor("u-demo-admin", Role::Admin);
    let gated = ws
        .service
        .advance(&opened.id, &admin, LayerEdits::default())?;
    print_state("admin approval", &gated);
    if let (Some(score), Some(grade)) = (gated.final_score, gated.final_grade) {
        println!("  final score {:.2} -> {}", score, grade.label());
    }

    let coordinator = ReleaseCoordinator::new(Arc::clone(&ws.service));
    let report = coordinator.release_all(&admin)?;
    println!("  released {} assessment(s)", report.released_count);

    if !skip_acknowledge {
        let acknowledged = ws.service.acknowledge(&opened.id, &staff)?;
        print_state("acknowledged", &acknowledged);
    }

    let progress = ws.service.progress(&opened.id)?;
    println!("  layer completion:");
    for layer in &progress.layers {
        println!(
            "    {:<12} {}/{}",
            layer.layer.label(),
            layer.completion.completed,
            layer.completion.total
        );
    }

    Ok(())
}
