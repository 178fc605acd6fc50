use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::blueprint::{DepartmentRole, WorkflowStep, WorkflowStore};
use super::catalog::{CatalogStore, RubricTemplate, TemplateId};
use super::domain::{
    ActorContext, Assessment, AssessmentId, Layer, LayerEdits, ReturnNote, Role,
};
use super::machine::{self, EngineError};
use super::repository::{AssessmentFilter, AssessmentRepository, TransitionGuard};
use super::scoring::{self, Completion, TierLabel};

/// Facade composing the workflow state machine, the scoring engine, and the
/// three stores. Each transition re-fetches the configured step list and
/// persists through a guarded write so concurrent calls serialize per row.
pub struct AppraisalService<R, W, C> {
    repository: Arc<R>,
    workflows: Arc<W>,
    catalog: Arc<C>,
}

static ASSESSMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_assessment_id() -> AssessmentId {
    let id = ASSESSMENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    AssessmentId(format!("asmt-{id:06}"))
}

/// Request payload for opening a period's draft assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAssessment {
    pub period: String,
    /// Overrides the department role's default rubric template.
    #[serde(default)]
    pub template_id: Option<TemplateId>,
}

/// Sanitized assessment summary for API responses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssessmentView {
    pub id: AssessmentId,
    pub subject_id: super::domain::UserId,
    pub period: String,
    pub status: String,
    pub current_step_index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_grade: Option<TierLabel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_note: Option<ReturnNote>,
}

impl AssessmentView {
    pub fn of(assessment: &Assessment) -> Self {
        Self {
            id: assessment.id.clone(),
            subject_id: assessment.subject_id.clone(),
            period: assessment.period.clone(),
            status: assessment.status.label(),
            current_step_index: assessment.current_step_index,
            final_score: assessment.final_score,
            final_grade: assessment.final_grade,
            return_note: assessment.return_note.clone(),
        }
    }
}

/// Per-layer completion snapshot for progress displays.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerProgress {
    pub layer: Layer,
    pub completion: Completion,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssessmentProgress {
    pub id: AssessmentId,
    pub status: String,
    pub current_step_index: u32,
    pub layers: Vec<LayerProgress>,
}

impl<R, W, C> AppraisalService<R, W, C>
where
    R: AssessmentRepository + 'static,
    W: WorkflowStore + 'static,
    C: CatalogStore + 'static,
{
    pub fn new(repository: Arc<R>, workflows: Arc<W>, catalog: Arc<C>) -> Self {
        Self {
            repository,
            workflows,
            catalog,
        }
    }

    pub fn workflows(&self) -> &Arc<W> {
        &self.workflows
    }

    pub fn catalog(&self) -> &Arc<C> {
        &self.catalog
    }

    /// Open a draft assessment for the acting subject and period, binding the
    /// rubric template from the resolved department role unless overridden.
    pub fn open(
        &self,
        actor: &ActorContext,
        request: OpenAssessment,
    ) -> Result<Assessment, EngineError> {
        let (department_role, subject_role) = self.resolve_for(actor)?;

        let template_id = request
            .template_id
            .or(department_role.default_template_id)
            .ok_or_else(|| EngineError::InvalidTransition {
                reason: "no rubric template bound to this workflow".to_string(),
            })?;
        if self.catalog.fetch_template(&template_id)?.is_none() {
            return Err(EngineError::NotFound);
        }

        let existing = self.repository.list(&AssessmentFilter {
            subject_id: Some(actor.id.clone()),
            period: Some(request.period.clone()),
            status: None,
        })?;
        if !existing.is_empty() {
            return Err(EngineError::InvalidTransition {
                reason: format!("an assessment for period '{}' already exists", request.period),
            });
        }

        let assessment = Assessment::open(
            next_assessment_id(),
            actor.id.clone(),
            subject_role,
            actor.department_id.clone(),
            request.period,
            template_id,
        );
        let stored = self.repository.insert(assessment)?;
        info!(assessment = %stored.id.0, subject = %stored.subject_id.0, "assessment opened");
        Ok(stored)
    }

    /// Write self-layer scores and evidence while the assessment is editable.
    pub fn save_self(
        &self,
        id: &AssessmentId,
        actor: &ActorContext,
        edits: LayerEdits,
    ) -> Result<Assessment, EngineError> {
        let assessment = self.fetch(id)?;
        if actor.id != assessment.subject_id {
            return Err(EngineError::Unauthorized {
                required: "only the subject may edit the self layer".to_string(),
            });
        }
        if !assessment.status.subject_editable() {
            return Err(EngineError::InvalidTransition {
                reason: format!("self layer is read-only in status '{}'", assessment.status),
            });
        }

        let guard = TransitionGuard::of(&assessment);
        let mut next = assessment;
        next.sheet_mut(Layer::SelfReview).apply(edits);
        self.repository.update_guarded(next.clone(), &guard)?;
        Ok(next)
    }

    /// Subject submission: resolves the workflow for the subject's current
    /// department and role, then enters the chain at step 1.
    pub fn submit(&self, id: &AssessmentId, actor: &ActorContext) -> Result<Assessment, EngineError> {
        let assessment = self.fetch(id)?;
        if actor.id != assessment.subject_id {
            return Err(EngineError::Unauthorized {
                required: "only the subject may submit this assessment".to_string(),
            });
        }

        // Submission re-reads the subject's current placement so a transfer
        // between periods picks up the new chain.
        let (_, subject_role) = self.resolve_for(actor)?;
        let mut current = assessment;
        current.subject_role = subject_role;
        current.subject_department = actor.department_id.clone();

        let steps = self.steps_for_assessment(&current)?;
        let template = self.template_for(&current)?;

        let guard = TransitionGuard::of(&current);
        let next = machine::submit(&current, &steps, &template, Utc::now())?;
        self.repository.update_guarded(next.clone(), &guard)?;
        info!(assessment = %next.id.0, status = %next.status, "assessment submitted");
        Ok(next)
    }

    /// Reviewer advancement through the current step.
    pub fn advance(
        &self,
        id: &AssessmentId,
        actor: &ActorContext,
        edits: LayerEdits,
    ) -> Result<Assessment, EngineError> {
        let assessment = self.fetch(id)?;
        let steps = self.steps_for_assessment(&assessment)?;
        let template = self.template_for(&assessment)?;

        let guard = TransitionGuard::of(&assessment);
        let next = machine::advance(&assessment, &steps, &template, actor, edits)?;
        self.repository.update_guarded(next.clone(), &guard)?;
        info!(
            assessment = %next.id.0,
            status = %next.status,
            step = next.current_step_index,
            "assessment advanced"
        );
        Ok(next)
    }

    /// Reviewer rejection back to the subject, preserving entered scores.
    pub fn reject(
        &self,
        id: &AssessmentId,
        actor: &ActorContext,
        reason: String,
    ) -> Result<Assessment, EngineError> {
        let assessment = self.fetch(id)?;
        let steps = self.steps_for_assessment(&assessment)?;

        let guard = TransitionGuard::of(&assessment);
        let next = machine::reject(&assessment, &steps, actor, reason, Utc::now())?;
        self.repository.update_guarded(next.clone(), &guard)?;
        info!(assessment = %next.id.0, "assessment returned to subject");
        Ok(next)
    }

    /// Administrative release of a single gated assessment.
    pub fn release(&self, id: &AssessmentId, actor: &ActorContext) -> Result<Assessment, EngineError> {
        let assessment = self.fetch(id)?;
        let guard = TransitionGuard::of(&assessment);
        let next = machine::release(&assessment, actor, Utc::now())?;
        self.repository.update_guarded(next.clone(), &guard)?;
        info!(assessment = %next.id.0, "assessment released");
        Ok(next)
    }

    /// Terminal subject acknowledgment.
    pub fn acknowledge(
        &self,
        id: &AssessmentId,
        actor: &ActorContext,
    ) -> Result<Assessment, EngineError> {
        let assessment = self.fetch(id)?;
        let steps = self.steps_for_assessment(&assessment)?;

        let guard = TransitionGuard::of(&assessment);
        let next = machine::acknowledge(&assessment, &steps, actor, Utc::now())?;
        self.repository.update_guarded(next.clone(), &guard)?;
        info!(assessment = %next.id.0, "assessment acknowledged");
        Ok(next)
    }

    pub fn get(&self, id: &AssessmentId) -> Result<Assessment, EngineError> {
        self.fetch(id)
    }

    pub fn list(&self, filter: &AssessmentFilter) -> Result<Vec<Assessment>, EngineError> {
        Ok(self.repository.list(filter)?)
    }

    /// Per-layer completion across the self layer and every evaluative step.
    pub fn progress(&self, id: &AssessmentId) -> Result<AssessmentProgress, EngineError> {
        let assessment = self.fetch(id)?;
        let steps = self.steps_for_assessment(&assessment).unwrap_or_default();
        let template = self.template_for(&assessment)?;

        let mut layers = vec![Layer::SelfReview];
        for step in &steps {
            if step.kind.is_evaluative() {
                let layer = Layer::Review(step.approver_role);
                if !layers.contains(&layer) {
                    layers.push(layer);
                }
            }
        }

        let empty = super::domain::LayerSheet::default();
        let layers = layers
            .into_iter()
            .map(|layer| LayerProgress {
                layer,
                completion: scoring::completion(
                    &template,
                    assessment.sheet(layer).unwrap_or(&empty),
                ),
            })
            .collect();

        Ok(AssessmentProgress {
            id: assessment.id.clone(),
            status: assessment.status.label(),
            current_step_index: assessment.current_step_index,
            layers,
        })
    }

    fn fetch(&self, id: &AssessmentId) -> Result<Assessment, EngineError> {
        Ok(self.repository.fetch(id)?.ok_or(EngineError::NotFound)?)
    }

    fn template_for(&self, assessment: &Assessment) -> Result<RubricTemplate, EngineError> {
        Ok(self
            .catalog
            .fetch_template(&assessment.template_id)?
            .ok_or(EngineError::NotFound)?)
    }

    /// The workflow steps bound to the assessment's subject placement,
    /// re-fetched on every transition rather than cached.
    fn steps_for_assessment(
        &self,
        assessment: &Assessment,
    ) -> Result<Vec<WorkflowStep>, EngineError> {
        let department_role = self
            .workflows
            .resolve(assessment.subject_department.as_ref(), assessment.subject_role)?
            .ok_or(EngineError::NoWorkflowConfigured)?;
        Ok(self.workflows.steps_for(&department_role.id)?)
    }

    /// First of the actor's roles with a configured department role wins;
    /// department-specific rows take precedence over organization-wide ones.
    fn resolve_for(
        &self,
        actor: &ActorContext,
    ) -> Result<(DepartmentRole, Role), EngineError> {
        for role in &actor.roles {
            if let Some(department_role) =
                self.workflows.resolve(actor.department_id.as_ref(), *role)?
            {
                return Ok((department_role, *role));
            }
        }
        Err(EngineError::NoWorkflowConfigured)
    }
}

impl<R, W, C> Clone for AppraisalService<R, W, C> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            workflows: Arc::clone(&self.workflows),
            catalog: Arc::clone(&self.catalog),
        }
    }
}
