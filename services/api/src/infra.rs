use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use appraisal::error::AppError;
use appraisal::workflows::appraisal::{
    standard_review_chain, AppraisalService, CatalogStore, Department, DepartmentId,
    DepartmentRole, DepartmentRoleId, EngineError, HierarchyLevel, Kpi,
    MemoryAssessmentRepository, MemoryCatalogStore, MemoryWorkflowStore, Role, RubricDomain,
    Standard, TemplateDraft, TemplateId, WorkflowStore,
};
use metrics_exporter_prometheus::PrometheusHandle;

pub(crate) type ApiService =
    AppraisalService<MemoryAssessmentRepository, MemoryWorkflowStore, MemoryCatalogStore>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// In-process wiring for the appraisal engine: the service facade plus the
/// backing stores, kept separately so configuration endpoints and seeding
/// can reach them directly.
pub(crate) struct Workspace {
    pub(crate) service: Arc<ApiService>,
    pub(crate) workflows: Arc<MemoryWorkflowStore>,
    pub(crate) catalog: Arc<MemoryCatalogStore>,
}

pub(crate) fn workspace() -> Workspace {
    let repository = Arc::new(MemoryAssessmentRepository::default());
    let workflows = Arc::new(MemoryWorkflowStore::default());
    let catalog = Arc::new(MemoryCatalogStore::default());
    let service = Arc::new(AppraisalService::new(
        repository,
        Arc::clone(&workflows),
        Arc::clone(&catalog),
    ));

    Workspace {
        service,
        workflows,
        catalog,
    }
}

pub(crate) fn demo_department_id() -> DepartmentId {
    DepartmentId("dept-operations".to_string())
}

pub(crate) fn demo_template_id() -> TemplateId {
    TemplateId("tpl-staff-standard".to_string())
}

fn kpi(id: &str, name: &str, guidance: &str) -> Kpi {
    Kpi {
        id: id.to_string(),
        name: name.to_string(),
        rubric_levels: [
            "Below expectations".to_string(),
            "Approaching expectations".to_string(),
            "Meets expectations".to_string(),
            "Exceeds expectations".to_string(),
        ],
        evidence_guidance: Some(guidance.to_string()),
    }
}

/// Seeds a department, a rubric template, and the standard four-step review
/// chain so the demo (and a freshly started server) has a working
/// configuration to exercise.
pub(crate) fn seed_demo_org(workspace: &Workspace) -> Result<DepartmentRoleId, AppError> {
    workspace
        .workflows
        .upsert_department(Department {
            id: demo_department_id(),
            name: "Operations".to_string(),
            parent_id: None,
            hierarchy_level: HierarchyLevel::Root,
        })
        .map_err(EngineError::from)?;

    workspace
        .catalog
        .create_template(TemplateDraft {
            id: demo_template_id(),
            name: "Standard staff appraisal".to_string(),
            domains: vec![
                RubricDomain {
                    name: "Core Duties".to_string(),
                    weight: 50.0,
                    standards: vec![Standard {
                        name: "Delivery".to_string(),
                        kpis: vec![
                            kpi(
                                "cd-1",
                                "Quality of work",
                                "Deliverables, review notes, and incident history for the period.",
                            ),
                            kpi(
                                "cd-2",
                                "Timeliness",
                                "Milestone and deadline tracking for assigned work.",
                            ),
                        ],
                    }],
                },
                RubricDomain {
                    name: "Professional Conduct".to_string(),
                    weight: 30.0,
                    standards: vec![Standard {
                        name: "Collaboration".to_string(),
                        kpis: vec![kpi(
                            "pc-1",
                            "Teamwork and communication",
                            "Peer feedback and cross-team project records.",
                        )],
                    }],
                },
                RubricDomain {
                    name: "Growth".to_string(),
                    weight: 20.0,
                    standards: vec![Standard {
                        name: "Development".to_string(),
                        kpis: vec![kpi(
                            "gr-1",
                            "Professional development",
                            "Training records and certifications earned this period.",
                        )],
                    }],
                },
            ],
        })
        .map_err(EngineError::from)?;

    let role = workspace
        .workflows
        .create_department_role(DepartmentRole {
            id: DepartmentRoleId("dr-operations-staff".to_string()),
            department_id: Some(demo_department_id()),
            role: Role::Staff,
            default_template_id: Some(demo_template_id()),
            name: Some("Operations staff".to_string()),
        })
        .map_err(EngineError::from)?;
    for draft in standard_review_chain() {
        workspace
            .workflows
            .create_step(&role.id, draft)
            .map_err(EngineError::from)?;
    }

    Ok(role.id)
}
