//! Workflow configuration: which ordered review chain applies to a given
//! (department, role) pair. Steps are owned by their department role and stay
//! contiguously numbered from 1; the store renumbers on delete.

use serde::{Deserialize, Serialize};

use super::catalog::TemplateId;
use super::domain::{DepartmentId, Role};

/// Identifier wrapper for configurable workflows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DepartmentRoleId(pub String);

/// Identifier wrapper for individual workflow steps.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StepId(pub String);

/// What a reviewer is allowed (and required) to do at a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Review,
    Approval,
    ReviewAndApproval,
    Acknowledge,
}

impl StepKind {
    /// Steps on which the approver writes their own score layer.
    pub const fn allows_edits(self) -> bool {
        matches!(self, Self::Review | Self::ReviewAndApproval)
    }

    /// Steps from which the assessment can be sent back to the subject.
    pub const fn allows_reject(self) -> bool {
        matches!(self, Self::Approval | Self::ReviewAndApproval)
    }

    /// Every kind except the terminal acknowledgment counts toward review.
    pub const fn is_evaluative(self) -> bool {
        !matches!(self, Self::Acknowledge)
    }
}

/// One gate in a configured workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: StepId,
    pub department_role_id: DepartmentRoleId,
    /// Position within the workflow, contiguous from 1.
    pub step_order: u32,
    pub approver_role: Role,
    pub kind: StepKind,
}

/// The configurable unit a workflow attaches to. `department_id = None`
/// declares an organization-wide workflow used when no department-specific
/// row matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentRole {
    pub id: DepartmentRoleId,
    pub department_id: Option<DepartmentId>,
    pub role: Role,
    #[serde(default)]
    pub default_template_id: Option<TemplateId>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Step payload for creation; the store assigns the order when `step_order`
/// is `None` (appending at the end).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDraft {
    pub approver_role: Role,
    pub kind: StepKind,
    #[serde(default)]
    pub step_order: Option<u32>,
}

/// Persistence contract for department roles, their steps, and the
/// department tree the workflow needs for resolution.
///
/// Invariants implementations must uphold:
/// - step orders stay unique and contiguous from 1..N per department role,
///   renumbering after a delete;
/// - deleting a department role deletes its steps (no orphans);
/// - department writes reject self-parenting and cycles.
pub trait WorkflowStore: Send + Sync {
    fn upsert_department(
        &self,
        department: super::domain::Department,
    ) -> Result<(), WorkflowConfigError>;

    fn create_department_role(
        &self,
        department_role: DepartmentRole,
    ) -> Result<DepartmentRole, WorkflowConfigError>;
    fn update_department_role(
        &self,
        department_role: DepartmentRole,
    ) -> Result<(), WorkflowConfigError>;
    fn delete_department_role(&self, id: &DepartmentRoleId) -> Result<(), WorkflowConfigError>;
    fn fetch_department_role(
        &self,
        id: &DepartmentRoleId,
    ) -> Result<Option<DepartmentRole>, WorkflowConfigError>;

    /// Resolve the workflow for a subject's current (department, role):
    /// the department-specific row wins over the organization-wide one.
    fn resolve(
        &self,
        department_id: Option<&DepartmentId>,
        role: Role,
    ) -> Result<Option<DepartmentRole>, WorkflowConfigError>;

    fn create_step(
        &self,
        department_role_id: &DepartmentRoleId,
        draft: StepDraft,
    ) -> Result<WorkflowStep, WorkflowConfigError>;
    fn update_step(&self, step: WorkflowStep) -> Result<(), WorkflowConfigError>;
    fn delete_step(&self, id: &StepId) -> Result<(), WorkflowConfigError>;

    /// The ordered step list for one workflow; empty when none configured.
    fn steps_for(
        &self,
        department_role_id: &DepartmentRoleId,
    ) -> Result<Vec<WorkflowStep>, WorkflowConfigError>;
}

#[derive(Debug, thiserror::Error)]
pub enum WorkflowConfigError {
    #[error("department role not found")]
    RoleNotFound,
    #[error("workflow step not found")]
    StepNotFound,
    #[error("department role already exists for this department and role")]
    Conflict,
    #[error("step order {0} is outside the workflow's 1..=N range")]
    InvalidStepOrder(u32),
    #[error(transparent)]
    DepartmentTree(#[from] super::domain::DepartmentTreeError),
    #[error("workflow store unavailable: {0}")]
    Unavailable(String),
}

/// Client convenience: the common four-gate chain for line staff.
pub fn standard_review_chain() -> Vec<StepDraft> {
    chain(&[
        (Role::Supervisor, StepKind::Review),
        (Role::Manager, StepKind::ReviewAndApproval),
        (Role::Admin, StepKind::Approval),
        (Role::Staff, StepKind::Acknowledge),
    ])
}

/// Client convenience: the shorter chain for managers reviewed by directors.
pub fn managerial_review_chain() -> Vec<StepDraft> {
    chain(&[
        (Role::Director, StepKind::ReviewAndApproval),
        (Role::Admin, StepKind::Approval),
        (Role::Staff, StepKind::Acknowledge),
    ])
}

fn chain(gates: &[(Role, StepKind)]) -> Vec<StepDraft> {
    gates
        .iter()
        .map(|(approver_role, kind)| StepDraft {
            approver_role: *approver_role,
            kind: *kind,
            step_order: None,
        })
        .collect()
}
