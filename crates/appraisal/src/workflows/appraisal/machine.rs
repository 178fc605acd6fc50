//! Transition rules for the appraisal workflow. Every function here is pure:
//! it validates the requested transition against the configured step list and
//! returns the next assessment state, leaving persistence (and the guarded
//! write that serializes concurrent transitions) to the service layer.

use chrono::{DateTime, Utc};

use super::blueprint::{StepKind, WorkflowStep};
use super::catalog::{CatalogError, RubricTemplate};
use super::domain::{
    ActorContext, Assessment, AssessmentStatus, Layer, LayerEdits, ReturnNote, Role,
};
use super::repository::RepositoryError;
use super::scoring;

/// Engine failure taxonomy. All variants except `StoreUnavailable` are
/// caller-fixable and carry enough context to point the user at the problem.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("unauthorized: {required}")]
    Unauthorized { required: String },
    #[error("assessment not found")]
    NotFound,
    #[error("invalid transition: {reason}")]
    InvalidTransition { reason: String },
    #[error("incomplete evidence on layer '{layer}': missing {}", missing.join(", "))]
    IncompleteEvidence { layer: String, missing: Vec<String> },
    #[error("no workflow configured for the subject's department and role")]
    NoWorkflowConfigured,
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl EngineError {
    fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidTransition {
            reason: reason.into(),
        }
    }
}

impl From<RepositoryError> for EngineError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Conflict => Self::invalid("assessment already exists"),
            RepositoryError::NotFound => Self::NotFound,
            RepositoryError::Superseded => {
                Self::invalid("a concurrent transition already advanced this assessment")
            }
            RepositoryError::Unavailable(detail) => Self::StoreUnavailable(detail),
        }
    }
}

impl From<CatalogError> for EngineError {
    fn from(value: CatalogError) -> Self {
        match value {
            CatalogError::NotFound => Self::NotFound,
            CatalogError::Conflict => Self::invalid("template already exists"),
            CatalogError::Invalid(detail) => Self::invalid(detail),
            CatalogError::Unavailable(detail) => Self::StoreUnavailable(detail),
        }
    }
}

impl From<super::blueprint::WorkflowConfigError> for EngineError {
    fn from(value: super::blueprint::WorkflowConfigError) -> Self {
        use super::blueprint::WorkflowConfigError as E;
        match value {
            E::RoleNotFound | E::StepNotFound => Self::NotFound,
            E::Conflict => Self::invalid("department role already exists"),
            E::InvalidStepOrder(order) => Self::invalid(format!("step order {order} out of range")),
            E::DepartmentTree(err) => Self::invalid(err.to_string()),
            E::Unavailable(detail) => Self::StoreUnavailable(detail),
        }
    }
}

fn step_at(steps: &[WorkflowStep], index: u32) -> Option<&WorkflowStep> {
    steps.iter().find(|step| step.step_order == index)
}

/// Order of the last review/approval step; acknowledgment gates sit past it.
fn last_evaluative_order(steps: &[WorkflowStep]) -> Option<u32> {
    steps
        .iter()
        .filter(|step| step.kind.is_evaluative())
        .map(|step| step.step_order)
        .max()
}

fn final_step_is_acknowledge(steps: &[WorkflowStep]) -> bool {
    steps
        .iter()
        .max_by_key(|step| step.step_order)
        .map(|step| step.kind == StepKind::Acknowledge)
        .unwrap_or(false)
}

fn require_complete(
    template: &RubricTemplate,
    assessment: &Assessment,
    layer: Layer,
) -> Result<(), EngineError> {
    let empty = super::domain::LayerSheet::default();
    let sheet = assessment.sheet(layer).unwrap_or(&empty);
    let missing = scoring::incomplete_kpis(template, sheet);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(EngineError::IncompleteEvidence {
            layer: layer.label().to_string(),
            missing,
        })
    }
}

/// The layer whose scores the final grade is computed from: the acting
/// reviewer's own layer when populated, otherwise the nearest earlier
/// populated reviewer layer, falling back to the subject's self layer.
fn grading_layer(assessment: &Assessment, steps: &[WorkflowStep], upto: u32) -> Layer {
    let mut order = upto;
    while order >= 1 {
        if let Some(step) = step_at(steps, order) {
            let layer = Layer::Review(step.approver_role);
            if assessment
                .sheet(layer)
                .map(|sheet| !sheet.scores.is_empty())
                .unwrap_or(false)
            {
                return layer;
            }
        }
        order -= 1;
    }
    Layer::SelfReview
}

/// Move a draft or returned assessment into the review chain.
pub fn submit(
    assessment: &Assessment,
    steps: &[WorkflowStep],
    template: &RubricTemplate,
    now: DateTime<Utc>,
) -> Result<Assessment, EngineError> {
    if !assessment.status.subject_editable() {
        return Err(EngineError::invalid(format!(
            "cannot submit from status '{}'",
            assessment.status
        )));
    }
    if last_evaluative_order(steps).is_none() {
        return Err(EngineError::NoWorkflowConfigured);
    }
    require_complete(template, assessment, Layer::SelfReview)?;

    let mut next = assessment.clone();
    next.status = AssessmentStatus::SelfSubmitted;
    next.current_step_index = 1;
    next.submitted_at = Some(now);
    next.return_note = None;
    Ok(next)
}

/// Apply one reviewer's step: authorization, layer edits, completeness, and
/// the step-index move. Finalizes the score/grade at the last evaluative step.
pub fn advance(
    assessment: &Assessment,
    steps: &[WorkflowStep],
    template: &RubricTemplate,
    actor: &ActorContext,
    edits: LayerEdits,
) -> Result<Assessment, EngineError> {
    if !matches!(
        assessment.status,
        AssessmentStatus::SelfSubmitted | AssessmentStatus::Reviewed(_)
    ) {
        return Err(EngineError::invalid(format!(
            "cannot advance from status '{}'",
            assessment.status
        )));
    }

    let step = step_at(steps, assessment.current_step_index).ok_or_else(|| {
        EngineError::invalid(format!(
            "no configured step at index {}",
            assessment.current_step_index
        ))
    })?;
    if step.kind == StepKind::Acknowledge {
        return Err(EngineError::invalid(
            "acknowledgment is performed by the subject, not a reviewer",
        ));
    }
    if !actor.has_role(step.approver_role) {
        return Err(EngineError::Unauthorized {
            required: format!("step {} requires role {}", step.step_order, step.approver_role),
        });
    }

    // The layer under review must still be readable; the subject's sheet is
    // the base of every chain.
    if assessment
        .sheet(Layer::SelfReview)
        .map(super::domain::LayerSheet::is_empty)
        .unwrap_or(true)
    {
        return Err(EngineError::invalid("the self layer holds no scores to review"));
    }

    let mut next = assessment.clone();
    let actor_layer = Layer::Review(step.approver_role);

    if step.kind.allows_edits() {
        next.sheet_mut(actor_layer).apply(edits);
        require_complete(template, &next, actor_layer)?;
    } else if !edits.is_empty() {
        return Err(EngineError::invalid(format!(
            "step {} is approval-only and accepts no score edits",
            step.step_order
        )));
    }

    let last_order =
        last_evaluative_order(steps).ok_or(EngineError::NoWorkflowConfigured)?;

    if step.step_order == last_order {
        let layer = grading_layer(&next, steps, step.step_order);
        let empty = super::domain::LayerSheet::default();
        let sheet = next.sheet(layer).unwrap_or(&empty);
        if let Some(score) = scoring::overall_score(template, sheet) {
            next.final_score = Some(score);
            next.final_grade = Some(scoring::tier_of(score).label);
        }
    }

    let completed = next.current_step_index;
    next.current_step_index += 1;
    next.status = if next.current_step_index > last_order {
        AssessmentStatus::PendingRelease
    } else {
        AssessmentStatus::Reviewed(completed)
    };
    Ok(next)
}

/// Send the assessment back to the subject. Only approval-capable steps can
/// reject, and previously entered scores are preserved for resubmission.
pub fn reject(
    assessment: &Assessment,
    steps: &[WorkflowStep],
    actor: &ActorContext,
    reason: String,
    now: DateTime<Utc>,
) -> Result<Assessment, EngineError> {
    if !matches!(
        assessment.status,
        AssessmentStatus::SelfSubmitted | AssessmentStatus::Reviewed(_)
    ) {
        return Err(EngineError::invalid(format!(
            "cannot reject from status '{}'",
            assessment.status
        )));
    }

    let step = step_at(steps, assessment.current_step_index).ok_or_else(|| {
        EngineError::invalid(format!(
            "no configured step at index {}",
            assessment.current_step_index
        ))
    })?;
    if !step.kind.allows_reject() {
        return Err(EngineError::invalid(format!(
            "step {} is a {} step and cannot reject",
            step.step_order,
            match step.kind {
                StepKind::Review => "review-only",
                StepKind::Acknowledge => "acknowledgment",
                _ => "non-approval",
            }
        )));
    }
    if !actor.has_role(step.approver_role) {
        return Err(EngineError::Unauthorized {
            required: format!("step {} requires role {}", step.step_order, step.approver_role),
        });
    }

    let mut next = assessment.clone();
    next.status = AssessmentStatus::Returned;
    next.current_step_index = 0;
    next.return_note = Some(ReturnNote {
        reviewer_role: step.approver_role,
        reason,
        returned_at: now,
    });
    Ok(next)
}

/// Administrative release: move one assessment out of the release gate so the
/// subject can acknowledge it.
pub fn release(
    assessment: &Assessment,
    actor: &ActorContext,
    now: DateTime<Utc>,
) -> Result<Assessment, EngineError> {
    if !actor.has_role(Role::Admin) {
        return Err(EngineError::Unauthorized {
            required: "release requires role admin".to_string(),
        });
    }
    if assessment.status != AssessmentStatus::PendingRelease {
        return Err(EngineError::invalid(format!(
            "cannot release from status '{}'",
            assessment.status
        )));
    }

    let mut next = assessment.clone();
    next.status = AssessmentStatus::Released;
    next.released_at = Some(now);
    Ok(next)
}

/// Terminal subject acknowledgment of a released assessment.
pub fn acknowledge(
    assessment: &Assessment,
    steps: &[WorkflowStep],
    actor: &ActorContext,
    now: DateTime<Utc>,
) -> Result<Assessment, EngineError> {
    if actor.id != assessment.subject_id {
        return Err(EngineError::Unauthorized {
            required: "only the assessment's subject may acknowledge it".to_string(),
        });
    }
    if assessment.status != AssessmentStatus::Released {
        return Err(EngineError::invalid(format!(
            "cannot acknowledge from status '{}'",
            assessment.status
        )));
    }
    if !final_step_is_acknowledge(steps) {
        return Err(EngineError::invalid(
            "this workflow does not end in an acknowledgment step",
        ));
    }

    let mut next = assessment.clone();
    next.status = AssessmentStatus::Acknowledged;
    next.current_step_index = steps
        .iter()
        .map(|step| step.step_order)
        .max()
        .unwrap_or(next.current_step_index);
    next.acknowledged_at = Some(now);
    Ok(next)
}
