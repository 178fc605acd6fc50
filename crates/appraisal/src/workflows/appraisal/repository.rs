use serde::{Deserialize, Serialize};

use super::domain::{Assessment, AssessmentId, AssessmentStatus, UserId};

/// Expected pre-state for a guarded write. Two racing transitions cannot both
/// match: the loser observes [`RepositoryError::Superseded`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionGuard {
    pub status: AssessmentStatus,
    pub current_step_index: u32,
}

impl TransitionGuard {
    pub fn of(assessment: &Assessment) -> Self {
        Self {
            status: assessment.status,
            current_step_index: assessment.current_step_index,
        }
    }
}

/// Query filter for assessment listings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssessmentFilter {
    #[serde(default)]
    pub subject_id: Option<UserId>,
    #[serde(default)]
    pub period: Option<String>,
    /// Coarse status label, e.g. `pending_release` or `2_reviewed`.
    #[serde(default)]
    pub status: Option<String>,
}

impl AssessmentFilter {
    pub fn matches(&self, assessment: &Assessment) -> bool {
        if let Some(subject_id) = &self.subject_id {
            if assessment.subject_id != *subject_id {
                return false;
            }
        }
        if let Some(period) = &self.period {
            if assessment.period != *period {
                return false;
            }
        }
        if let Some(status) = &self.status {
            if assessment.status.label() != *status {
                return false;
            }
        }
        true
    }
}

/// Storage abstraction for assessment aggregates.
///
/// `update_guarded` is the serialization point for concurrent transitions:
/// the write must apply only while the stored row still matches the guard's
/// `(status, current_step_index)` pair, atomically with respect to other
/// writers of the same row.
pub trait AssessmentRepository: Send + Sync {
    fn insert(&self, assessment: Assessment) -> Result<Assessment, RepositoryError>;
    fn fetch(&self, id: &AssessmentId) -> Result<Option<Assessment>, RepositoryError>;
    fn update_guarded(
        &self,
        assessment: Assessment,
        guard: &TransitionGuard,
    ) -> Result<(), RepositoryError>;
    fn list(&self, filter: &AssessmentFilter) -> Result<Vec<Assessment>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("assessment already exists")]
    Conflict,
    #[error("assessment not found")]
    NotFound,
    #[error("assessment was modified by a concurrent transition")]
    Superseded,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
