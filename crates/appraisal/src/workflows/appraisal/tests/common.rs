use std::sync::Arc;

use crate::workflows::appraisal::blueprint::{
    standard_review_chain, DepartmentRole, DepartmentRoleId, WorkflowStore,
};
use crate::workflows::appraisal::catalog::{
    CatalogStore, Kpi, RubricDomain, Standard, TemplateDraft, TemplateId,
};
use crate::workflows::appraisal::domain::{
    ActorContext, Assessment, Department, DepartmentId, EvidenceItem, HierarchyLevel, KpiScore,
    LayerEdits, Role, UserId,
};
use crate::workflows::appraisal::memory::{
    MemoryAssessmentRepository, MemoryCatalogStore, MemoryWorkflowStore,
};
use crate::workflows::appraisal::service::{AppraisalService, OpenAssessment};

pub(super) type TestService =
    AppraisalService<MemoryAssessmentRepository, MemoryWorkflowStore, MemoryCatalogStore>;

pub(super) fn department_id() -> DepartmentId {
    DepartmentId("dept-ops".to_string())
}

pub(super) fn template_id() -> TemplateId {
    TemplateId("tpl-staff-2026".to_string())
}

pub(super) fn kpi(id: &str, name: &str) -> Kpi {
    Kpi {
        id: id.to_string(),
        name: name.to_string(),
        rubric_levels: [
            format!("{name}: beginning"),
            format!("{name}: developing"),
            format!("{name}: proficient"),
            format!("{name}: distinguished"),
        ],
        evidence_guidance: None,
    }
}

pub(super) fn domain(name: &str, weight: f64, kpis: Vec<Kpi>) -> RubricDomain {
    RubricDomain {
        name: name.to_string(),
        weight,
        standards: vec![Standard {
            name: format!("{name} standard"),
            kpis,
        }],
    }
}

/// Three KPIs across two equally weighted domains.
pub(super) fn template_draft() -> TemplateDraft {
    TemplateDraft {
        id: template_id(),
        name: "Staff appraisal 2026".to_string(),
        domains: vec![
            domain(
                "Instructional Practice",
                50.0,
                vec![kpi("ip-1", "Lesson design"), kpi("ip-2", "Feedback quality")],
            ),
            domain(
                "Professional Culture",
                50.0,
                vec![kpi("pc-1", "Collaboration")],
            ),
        ],
    }
}

pub(super) fn evidence(title: &str) -> Vec<EvidenceItem> {
    vec![EvidenceItem {
        reference: format!("doc://evidence/{title}"),
        title: title.to_string(),
        notes: String::new(),
    }]
}

/// Edits rating every template KPI with attached evidence.
pub(super) fn complete_edits(score: u8) -> LayerEdits {
    edits_for(&[
        ("ip-1", KpiScore::Rated(score)),
        ("ip-2", KpiScore::Rated(score)),
        ("pc-1", KpiScore::Rated(score)),
    ])
}

pub(super) fn edits_for(scores: &[(&str, KpiScore)]) -> LayerEdits {
    let mut edits = LayerEdits::default();
    for (kpi_id, score) in scores {
        edits.scores.insert(kpi_id.to_string(), *score);
        if matches!(score, KpiScore::Rated(_)) {
            edits
                .evidence
                .insert(kpi_id.to_string(), evidence(kpi_id));
        }
    }
    edits
}

pub(super) fn subject() -> ActorContext {
    ActorContext {
        id: UserId("u-subject".to_string()),
        roles: vec![Role::Staff],
        department_id: Some(department_id()),
    }
}

pub(super) fn reviewer(role: Role) -> ActorContext {
    ActorContext {
        id: UserId(format!("u-{}", role.label())),
        roles: vec![role],
        department_id: Some(department_id()),
    }
}

pub(super) fn admin() -> ActorContext {
    reviewer(Role::Admin)
}

/// Service over fresh in-memory stores, seeded with the ops department, the
/// staff review chain, and the two-domain template.
pub(super) fn build_service() -> (
    Arc<TestService>,
    Arc<MemoryAssessmentRepository>,
    Arc<MemoryWorkflowStore>,
    Arc<MemoryCatalogStore>,
) {
    let repository = Arc::new(MemoryAssessmentRepository::default());
    let workflows = Arc::new(MemoryWorkflowStore::default());
    let catalog = Arc::new(MemoryCatalogStore::default());

    workflows
        .upsert_department(Department {
            id: department_id(),
            name: "Operations".to_string(),
            parent_id: None,
            hierarchy_level: HierarchyLevel::Root,
        })
        .expect("department persists");

    catalog
        .create_template(template_draft())
        .expect("template persists");

    let department_role = workflows
        .create_department_role(DepartmentRole {
            id: DepartmentRoleId("dr-ops-staff".to_string()),
            department_id: Some(department_id()),
            role: Role::Staff,
            default_template_id: Some(template_id()),
            name: Some("Operations staff".to_string()),
        })
        .expect("department role persists");
    for draft in standard_review_chain() {
        workflows
            .create_step(&department_role.id, draft)
            .expect("step persists");
    }

    let service = Arc::new(AppraisalService::new(
        repository.clone(),
        workflows.clone(),
        catalog.clone(),
    ));
    (service, repository, workflows, catalog)
}

/// Open a draft for the subject, fill the self layer, and submit it.
pub(super) fn submitted_assessment(service: &TestService) -> Assessment {
    let actor = subject();
    let opened = service
        .open(
            &actor,
            OpenAssessment {
                period: "2026-H1".to_string(),
                template_id: None,
            },
        )
        .expect("draft opens");
    service
        .save_self(&opened.id, &actor, complete_edits(3))
        .expect("self layer saves");
    service.submit(&opened.id, &actor).expect("submission succeeds")
}
