use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use super::catalog::TemplateId;

/// Identifier wrapper for assessment aggregates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssessmentId(pub String);

/// Identifier wrapper for staff members (subjects and reviewers alike).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Identifier wrapper for departments in the organizational tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DepartmentId(pub String);

/// The fixed set of organizational roles the workflow engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Staff,
    Supervisor,
    Manager,
    Director,
    Admin,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Staff => "staff",
            Self::Supervisor => "supervisor",
            Self::Manager => "manager",
            Self::Director => "director",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Authenticated caller context injected by the upstream identity provider.
///
/// The engine trusts these claims only to the extent they were authenticated
/// upstream; every mutating call re-verifies them against the configured step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorContext {
    pub id: UserId,
    pub roles: Vec<Role>,
    pub department_id: Option<DepartmentId>,
}

impl ActorContext {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

/// Coarse depth marker for the three-level department tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HierarchyLevel {
    Root,
    Department,
    Subdepartment,
}

/// Node of the organizational tree. Depth is bounded by [`HierarchyLevel`]
/// rather than unbounded recursion; cycle checks happen at write time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub id: DepartmentId,
    pub name: String,
    pub parent_id: Option<DepartmentId>,
    pub hierarchy_level: HierarchyLevel,
}

/// A single KPI rating inside one scoring layer.
///
/// Serializes as the raw number for rated values and the string `"excluded"`
/// for the not-applicable marker, matching the wire format reviewers submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KpiScore {
    Rated(u8),
    Excluded,
}

impl KpiScore {
    /// The numeric value when rated, `None` when excluded.
    pub const fn value(self) -> Option<u8> {
        match self {
            Self::Rated(score) => Some(score),
            Self::Excluded => None,
        }
    }

    pub const fn is_excluded(self) -> bool {
        matches!(self, Self::Excluded)
    }
}

impl Serialize for KpiScore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Rated(score) => serializer.serialize_u8(*score),
            Self::Excluded => serializer.serialize_str("excluded"),
        }
    }
}

impl<'de> Deserialize<'de> for KpiScore {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ScoreVisitor;

        impl<'de> Visitor<'de> for ScoreVisitor {
            type Value = KpiScore;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a rubric score between 1 and 4, or the string \"excluded\"")
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<KpiScore, E> {
                if (1..=4).contains(&value) {
                    Ok(KpiScore::Rated(value as u8))
                } else {
                    Err(E::custom(format!("score {value} is outside the 1-4 rubric")))
                }
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<KpiScore, E> {
                u64::try_from(value)
                    .map_err(|_| E::custom("negative scores are not valid"))
                    .and_then(|value| self.visit_u64(value))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<KpiScore, E> {
                match value {
                    "excluded" | "X" => Ok(KpiScore::Excluded),
                    other => Err(E::custom(format!("unknown score marker '{other}'"))),
                }
            }
        }

        deserializer.deserialize_any(ScoreVisitor)
    }
}

/// Opaque pointer to supporting material for a rated KPI. The engine never
/// resolves `reference`; storage is an external collaborator's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub reference: String,
    pub title: String,
    #[serde(default)]
    pub notes: String,
}

impl EvidenceItem {
    pub fn has_reference(&self) -> bool {
        !self.reference.trim().is_empty()
    }
}

/// A scoring perspective: the subject's own ratings or one reviewer role's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Layer {
    SelfReview,
    Review(Role),
}

impl Layer {
    pub fn label(self) -> &'static str {
        match self {
            Self::SelfReview => "self",
            Self::Review(role) => role.label(),
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "self" => Some(Self::SelfReview),
            "staff" => Some(Self::Review(Role::Staff)),
            "supervisor" => Some(Self::Review(Role::Supervisor)),
            "manager" => Some(Self::Review(Role::Manager)),
            "director" => Some(Self::Review(Role::Director)),
            "admin" => Some(Self::Review(Role::Admin)),
            _ => None,
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Layer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Layer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Layer::parse(&raw).ok_or_else(|| de::Error::custom(format!("unknown layer '{raw}'")))
    }
}

/// One layer's score and evidence maps, keyed by KPI id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerSheet {
    #[serde(default)]
    pub scores: BTreeMap<String, KpiScore>,
    #[serde(default)]
    pub evidence: BTreeMap<String, Vec<EvidenceItem>>,
}

impl LayerSheet {
    /// A KPI is complete when it is excluded, or rated with at least one
    /// evidence item carrying a non-empty reference.
    pub fn kpi_complete(&self, kpi_id: &str) -> bool {
        match self.scores.get(kpi_id) {
            Some(KpiScore::Excluded) => true,
            Some(KpiScore::Rated(_)) => self
                .evidence
                .get(kpi_id)
                .map(|items| items.iter().any(EvidenceItem::has_reference))
                .unwrap_or(false),
            None => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty() && self.evidence.is_empty()
    }

    /// Overlay incoming edits onto this sheet. Explicit entries replace prior
    /// values; untouched KPIs keep their previous state.
    pub fn apply(&mut self, edits: LayerEdits) {
        for (kpi_id, score) in edits.scores {
            self.scores.insert(kpi_id, score);
        }
        for (kpi_id, items) in edits.evidence {
            self.evidence.insert(kpi_id, items);
        }
    }
}

/// Partial score/evidence update submitted by the subject or a reviewer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerEdits {
    #[serde(default)]
    pub scores: BTreeMap<String, KpiScore>,
    #[serde(default)]
    pub evidence: BTreeMap<String, Vec<EvidenceItem>>,
}

impl LayerEdits {
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty() && self.evidence.is_empty()
    }
}

/// Coarse workflow position exposed to callers.
///
/// `Reviewed(n)` reports the number of completed review/approval steps rather
/// than naming the role, so differently shaped workflows present uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssessmentStatus {
    Draft,
    Returned,
    SelfSubmitted,
    Reviewed(u32),
    PendingRelease,
    Released,
    Acknowledged,
}

impl AssessmentStatus {
    pub fn label(self) -> String {
        match self {
            Self::Draft => "draft".to_string(),
            Self::Returned => "returned".to_string(),
            Self::SelfSubmitted => "self_submitted".to_string(),
            Self::Reviewed(n) => format!("{n}_reviewed"),
            Self::PendingRelease => "pending_release".to_string(),
            Self::Released => "released".to_string(),
            Self::Acknowledged => "acknowledged".to_string(),
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "returned" => Some(Self::Returned),
            "self_submitted" => Some(Self::SelfSubmitted),
            "pending_release" => Some(Self::PendingRelease),
            "released" => Some(Self::Released),
            "acknowledged" => Some(Self::Acknowledged),
            other => other
                .strip_suffix("_reviewed")
                .and_then(|n| n.parse::<u32>().ok())
                .map(Self::Reviewed),
        }
    }

    /// The subject may edit the self layer only in these states.
    pub const fn subject_editable(self) -> bool {
        matches!(self, Self::Draft | Self::Returned)
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Acknowledged)
    }
}

impl fmt::Display for AssessmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl Serialize for AssessmentStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.label())
    }
}

impl<'de> Deserialize<'de> for AssessmentStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        AssessmentStatus::parse(&raw)
            .ok_or_else(|| de::Error::custom(format!("unknown assessment status '{raw}'")))
    }
}

/// Reason trail left for the subject after a reviewer sends the assessment back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnNote {
    pub reviewer_role: Role,
    pub reason: String,
    pub returned_at: DateTime<Utc>,
}

/// One staff member's appraisal for one period: the workflow position, the
/// self layer, and every reviewer layer accumulated so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub id: AssessmentId,
    pub subject_id: UserId,
    pub subject_role: Role,
    pub subject_department: Option<DepartmentId>,
    pub period: String,
    pub template_id: TemplateId,
    pub status: AssessmentStatus,
    pub current_step_index: u32,
    pub layers: BTreeMap<Layer, LayerSheet>,
    pub final_score: Option<f64>,
    pub final_grade: Option<super::scoring::TierLabel>,
    pub return_note: Option<ReturnNote>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub released_at: Option<DateTime<Utc>>,
    pub acknowledged_at: Option<DateTime<Utc>>,
}

impl Assessment {
    pub fn open(
        id: AssessmentId,
        subject_id: UserId,
        subject_role: Role,
        subject_department: Option<DepartmentId>,
        period: String,
        template_id: TemplateId,
    ) -> Self {
        Self {
            id,
            subject_id,
            subject_role,
            subject_department,
            period,
            template_id,
            status: AssessmentStatus::Draft,
            current_step_index: 0,
            layers: BTreeMap::new(),
            final_score: None,
            final_grade: None,
            return_note: None,
            submitted_at: None,
            released_at: None,
            acknowledged_at: None,
        }
    }

    pub fn sheet(&self, layer: Layer) -> Option<&LayerSheet> {
        self.layers.get(&layer)
    }

    pub fn sheet_mut(&mut self, layer: Layer) -> &mut LayerSheet {
        self.layers.entry(layer).or_default()
    }
}

/// Ensures a proposed department write keeps the tree acyclic. Walks the
/// parent chain from the candidate's parent; hitting the candidate id again
/// means the link would close a loop.
pub fn validate_department_link(
    candidate: &Department,
    lookup: impl Fn(&DepartmentId) -> Option<Department>,
) -> Result<(), DepartmentTreeError> {
    let Some(parent_id) = &candidate.parent_id else {
        return Ok(());
    };

    if *parent_id == candidate.id {
        return Err(DepartmentTreeError::SelfParent(candidate.id.clone()));
    }

    let mut cursor = Some(parent_id.clone());
    let mut hops = 0usize;
    while let Some(current) = cursor {
        if current == candidate.id {
            return Err(DepartmentTreeError::Cycle(candidate.id.clone()));
        }
        // The hierarchy enum caps legitimate depth at three levels.
        hops += 1;
        if hops > 8 {
            return Err(DepartmentTreeError::Cycle(candidate.id.clone()));
        }
        cursor = lookup(&current).and_then(|dept| dept.parent_id);
    }

    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum DepartmentTreeError {
    #[error("department {0:?} cannot be its own parent")]
    SelfParent(DepartmentId),
    #[error("department {0:?} would introduce a cycle in the tree")]
    Cycle(DepartmentId),
}
