//! End-to-end scenarios for the appraisal engine, driven through the public
//! service facade the way the HTTP layer consumes it: configure a department
//! workflow and rubric template, then walk an assessment through submission,
//! review, approval, release, and acknowledgment.

use std::sync::Arc;

use appraisal::workflows::appraisal::{
    standard_review_chain, ActorContext, AppraisalService, AssessmentStatus, CatalogStore,
    Department, DepartmentId, DepartmentRole, DepartmentRoleId, EvidenceItem, HierarchyLevel, Kpi,
    KpiScore, Layer, LayerEdits, MemoryAssessmentRepository, MemoryCatalogStore,
    MemoryWorkflowStore, OpenAssessment, ReleaseCoordinator, Role, RubricDomain, Standard,
    TemplateDraft, TemplateId, TierLabel, UserId, WorkflowStore,
};

type Service = AppraisalService<MemoryAssessmentRepository, MemoryWorkflowStore, MemoryCatalogStore>;

fn department() -> DepartmentId {
    DepartmentId("dept-field-ops".to_string())
}

fn actor(id: &str, role: Role) -> ActorContext {
    ActorContext {
        id: UserId(id.to_string()),
        roles: vec![role],
        department_id: Some(department()),
    }
}

fn kpi(id: &str, name: &str) -> Kpi {
    Kpi {
        id: id.to_string(),
        name: name.to_string(),
        rubric_levels: [
            "beginning".to_string(),
            "developing".to_string(),
            "proficient".to_string(),
            "distinguished".to_string(),
        ],
        evidence_guidance: Some("Attach artifacts from this period.".to_string()),
    }
}

fn rated(edits: &mut LayerEdits, kpi_id: &str, score: u8) {
    edits
        .scores
        .insert(kpi_id.to_string(), KpiScore::Rated(score));
    edits.evidence.insert(
        kpi_id.to_string(),
        vec![EvidenceItem {
            reference: format!("doc://artifacts/{kpi_id}"),
            title: format!("Artifacts for {kpi_id}"),
            notes: String::new(),
        }],
    );
}

fn build_service() -> Arc<Service> {
    let repository = Arc::new(MemoryAssessmentRepository::default());
    let workflows = Arc::new(MemoryWorkflowStore::default());
    let catalog = Arc::new(MemoryCatalogStore::default());

    workflows
        .upsert_department(Department {
            id: department(),
            name: "Field Operations".to_string(),
            parent_id: None,
            hierarchy_level: HierarchyLevel::Root,
        })
        .expect("department persists");

    catalog
        .create_template(TemplateDraft {
            id: TemplateId("tpl-field-2026".to_string()),
            name: "Field staff appraisal 2026".to_string(),
            domains: vec![
                RubricDomain {
                    name: "Craft".to_string(),
                    weight: 60.0,
                    standards: vec![Standard {
                        name: "Execution".to_string(),
                        kpis: vec![kpi("craft-1", "Work quality"), kpi("craft-2", "Safety")],
                    }],
                },
                RubricDomain {
                    name: "Teamwork".to_string(),
                    weight: 40.0,
                    standards: vec![Standard {
                        name: "Collaboration".to_string(),
                        kpis: vec![kpi("team-1", "Communication")],
                    }],
                },
            ],
        })
        .expect("template persists");

    let role = workflows
        .create_department_role(DepartmentRole {
            id: DepartmentRoleId("dr-field-staff".to_string()),
            department_id: Some(department()),
            role: Role::Staff,
            default_template_id: Some(TemplateId("tpl-field-2026".to_string())),
            name: Some("Field staff".to_string()),
        })
        .expect("role persists");
    for draft in standard_review_chain() {
        workflows.create_step(&role.id, draft).expect("step persists");
    }

    Arc::new(AppraisalService::new(repository, workflows, catalog))
}

#[test]
fn full_appraisal_cycle_reaches_acknowledgment() {
    let service = build_service();
    let worker = actor("u-worker", Role::Staff);

    let opened = service
        .open(
            &worker,
            OpenAssessment {
                period: "2026".to_string(),
                template_id: None,
            },
        )
        .expect("draft opens");
    assert_eq!(opened.status, AssessmentStatus::Draft);

    let mut self_edits = LayerEdits::default();
    rated(&mut self_edits, "craft-1", 4);
    rated(&mut self_edits, "craft-2", 3);
    self_edits
        .scores
        .insert("team-1".to_string(), KpiScore::Excluded);
    service
        .save_self(&opened.id, &worker, self_edits)
        .expect("self layer saves");

    let submitted = service.submit(&opened.id, &worker).expect("submit succeeds");
    assert_eq!(submitted.status, AssessmentStatus::SelfSubmitted);
    assert!(submitted.submitted_at.is_some());

    let mut supervisor_edits = LayerEdits::default();
    rated(&mut supervisor_edits, "craft-1", 4);
    rated(&mut supervisor_edits, "craft-2", 4);
    rated(&mut supervisor_edits, "team-1", 3);
    service
        .advance(
            &opened.id,
            &actor("u-super", Role::Supervisor),
            supervisor_edits,
        )
        .expect("supervisor review succeeds");

    let mut manager_edits = LayerEdits::default();
    rated(&mut manager_edits, "craft-1", 4);
    rated(&mut manager_edits, "craft-2", 4);
    manager_edits
        .scores
        .insert("team-1".to_string(), KpiScore::Excluded);
    let after_manager = service
        .advance(&opened.id, &actor("u-mgr", Role::Manager), manager_edits)
        .expect("manager review succeeds");
    assert_eq!(after_manager.status.label(), "2_reviewed");

    let gated = service
        .advance(&opened.id, &actor("u-admin", Role::Admin), LayerEdits::default())
        .expect("admin approval succeeds");
    assert_eq!(gated.status, AssessmentStatus::PendingRelease);
    // Teamwork is excluded in the manager layer, so Craft carries the grade.
    assert_eq!(gated.final_score, Some(4.0));
    assert_eq!(gated.final_grade, Some(TierLabel::Exemplary));

    let coordinator = ReleaseCoordinator::new(Arc::clone(&service));
    let report = coordinator
        .release_all(&actor("u-admin", Role::Admin))
        .expect("batch release succeeds");
    assert_eq!(report.released_count, 1);

    let acknowledged = service
        .acknowledge(&opened.id, &worker)
        .expect("subject acknowledges");
    assert_eq!(acknowledged.status, AssessmentStatus::Acknowledged);
    assert!(acknowledged.acknowledged_at.is_some());

    // The subject's own layer survived every hand-off.
    let stored = service.get(&opened.id).expect("assessment loads");
    let self_sheet = stored.sheet(Layer::SelfReview).expect("self layer kept");
    assert_eq!(self_sheet.scores.len(), 3);
}

#[test]
fn returned_assessments_resume_from_the_subject() {
    let service = build_service();
    let worker = actor("u-worker", Role::Staff);

    let opened = service
        .open(
            &worker,
            OpenAssessment {
                period: "2026".to_string(),
                template_id: None,
            },
        )
        .expect("draft opens");

    let mut self_edits = LayerEdits::default();
    rated(&mut self_edits, "craft-1", 3);
    rated(&mut self_edits, "craft-2", 3);
    rated(&mut self_edits, "team-1", 3);
    service
        .save_self(&opened.id, &worker, self_edits)
        .expect("self layer saves");
    service.submit(&opened.id, &worker).expect("submit succeeds");

    let mut supervisor_edits = LayerEdits::default();
    rated(&mut supervisor_edits, "craft-1", 3);
    rated(&mut supervisor_edits, "craft-2", 3);
    rated(&mut supervisor_edits, "team-1", 3);
    service
        .advance(
            &opened.id,
            &actor("u-super", Role::Supervisor),
            supervisor_edits,
        )
        .expect("supervisor review succeeds");

    let returned = service
        .reject(
            &opened.id,
            &actor("u-mgr", Role::Manager),
            "Safety evidence is from the wrong period.".to_string(),
        )
        .expect("manager sends it back");
    assert_eq!(returned.status, AssessmentStatus::Returned);
    assert_eq!(returned.current_step_index, 0);

    // The subject amends one KPI and resubmits without losing the rest.
    let mut amendment = LayerEdits::default();
    rated(&mut amendment, "craft-2", 4);
    service
        .save_self(&opened.id, &worker, amendment)
        .expect("amendment saves");

    let resubmitted = service.submit(&opened.id, &worker).expect("resubmit succeeds");
    assert_eq!(resubmitted.status, AssessmentStatus::SelfSubmitted);
    assert_eq!(resubmitted.current_step_index, 1);
    let sheet = resubmitted.sheet(Layer::SelfReview).expect("self layer kept");
    assert_eq!(sheet.scores.len(), 3);
    assert_eq!(sheet.scores.get("craft-2"), Some(&KpiScore::Rated(4)));
}
