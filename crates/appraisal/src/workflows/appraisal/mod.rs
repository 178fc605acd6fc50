//! Approval workflow and weighted-rubric scoring for staff appraisals.
//!
//! The module splits along the engine's seams: the rubric `catalog`, the pure
//! `scoring` functions, the per-department-role workflow configuration in
//! `blueprint`, the transition rules in `machine`, and the `service` facade
//! that wires them to the persistence traits in `repository`.

pub mod blueprint;
pub mod catalog;
pub mod domain;
pub(crate) mod machine;
pub mod memory;
pub mod release;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;

#[cfg(test)]
mod tests;

pub use blueprint::{
    managerial_review_chain, standard_review_chain, DepartmentRole, DepartmentRoleId, StepDraft,
    StepId, StepKind, WorkflowConfigError, WorkflowStep, WorkflowStore,
};
pub use catalog::{
    CatalogError, CatalogStore, Kpi, RubricDomain, RubricTemplate, Standard, TemplateDraft,
    TemplateId,
};
pub use domain::{
    ActorContext, Assessment, AssessmentId, AssessmentStatus, Department, DepartmentId,
    EvidenceItem, HierarchyLevel, KpiScore, Layer, LayerEdits, LayerSheet, ReturnNote, Role,
    UserId,
};
pub use machine::EngineError;
pub use memory::{MemoryAssessmentRepository, MemoryCatalogStore, MemoryWorkflowStore};
pub use release::{ReleaseCoordinator, ReleaseReport};
pub use repository::{
    AssessmentFilter, AssessmentRepository, RepositoryError, TransitionGuard,
};
pub use router::appraisal_router;
pub use scoring::{
    completion, domain_score, overall_score, tier_of, Completion, Tier, TierLabel,
};
pub use service::{
    AppraisalService, AssessmentProgress, AssessmentView, LayerProgress, OpenAssessment,
};
