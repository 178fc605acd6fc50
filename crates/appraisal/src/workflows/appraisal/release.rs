//! Batch promotion out of the release gate. The operator workflow is
//! "release everything that is ready, tell me how many": individual failures
//! downgrade to "not released" instead of aborting the batch.

use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use super::blueprint::WorkflowStore;
use super::catalog::CatalogStore;
use super::domain::{ActorContext, Assessment, AssessmentId, AssessmentStatus, Role};
use super::machine::EngineError;
use super::repository::{AssessmentFilter, AssessmentRepository};
use super::service::AppraisalService;

/// Outcome of a batch release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReleaseReport {
    pub released_count: usize,
}

pub struct ReleaseCoordinator<R, W, C> {
    service: Arc<AppraisalService<R, W, C>>,
}

impl<R, W, C> ReleaseCoordinator<R, W, C>
where
    R: AssessmentRepository + 'static,
    W: WorkflowStore + 'static,
    C: CatalogStore + 'static,
{
    pub fn new(service: Arc<AppraisalService<R, W, C>>) -> Self {
        Self { service }
    }

    pub fn release_one(
        &self,
        id: &AssessmentId,
        actor: &ActorContext,
    ) -> Result<Assessment, EngineError> {
        self.service.release(id, actor)
    }

    /// Attempt every gated assessment independently. Per-item errors are
    /// logged and counted as not released; only the admin check and the
    /// initial listing can fail the batch.
    pub fn release_all(&self, actor: &ActorContext) -> Result<ReleaseReport, EngineError> {
        if !actor.has_role(Role::Admin) {
            return Err(EngineError::Unauthorized {
                required: "release requires role admin".to_string(),
            });
        }

        let eligible = self.service.list(&AssessmentFilter {
            subject_id: None,
            period: None,
            status: Some(AssessmentStatus::PendingRelease.label()),
        })?;

        let mut released_count = 0;
        for assessment in eligible {
            match self.service.release(&assessment.id, actor) {
                Ok(_) => released_count += 1,
                Err(error) => {
                    warn!(assessment = %assessment.id.0, %error, "skipped during batch release");
                }
            }
        }

        Ok(ReleaseReport { released_count })
    }
}

impl<R, W, C> Clone for ReleaseCoordinator<R, W, C> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
        }
    }
}
