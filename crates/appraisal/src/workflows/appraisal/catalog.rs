use serde::{Deserialize, Serialize};

/// Identifier wrapper for rubric templates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TemplateId(pub String);

/// Leaf-level rated item. Each KPI carries one rubric description per score
/// level so reviewers rate against concrete behavioral anchors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kpi {
    pub id: String,
    pub name: String,
    /// Descriptions for score levels 1 through 4, in order.
    pub rubric_levels: [String; 4],
    #[serde(default)]
    pub evidence_guidance: Option<String>,
}

/// Mid-level grouping of KPIs within a domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standard {
    pub name: String,
    pub kpis: Vec<Kpi>,
}

/// Top-level weighted grouping. Weights are percentages; templates are
/// expected to sum to 100 but the catalog does not enforce it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricDomain {
    pub name: String,
    pub weight: f64,
    pub standards: Vec<Standard>,
}

impl RubricDomain {
    pub fn kpis(&self) -> impl Iterator<Item = &Kpi> {
        self.standards.iter().flat_map(|standard| standard.kpis.iter())
    }
}

/// Immutable-per-version rubric hierarchy the scoring engine reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricTemplate {
    pub id: TemplateId,
    pub name: String,
    pub version: u32,
    pub domains: Vec<RubricDomain>,
}

impl RubricTemplate {
    pub fn kpis(&self) -> impl Iterator<Item = &Kpi> {
        self.domains.iter().flat_map(RubricDomain::kpis)
    }

    pub fn kpi_count(&self) -> usize {
        self.kpis().count()
    }
}

/// Full template payload for atomic creation: either the whole hierarchy is
/// persisted or none of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateDraft {
    pub id: TemplateId,
    pub name: String,
    pub domains: Vec<RubricDomain>,
}

impl TemplateDraft {
    /// Structural validation applied before any row is written.
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.domains.is_empty() {
            return Err(CatalogError::Invalid(
                "a template needs at least one domain".to_string(),
            ));
        }

        for domain in &self.domains {
            if !domain.weight.is_finite() || domain.weight < 0.0 {
                return Err(CatalogError::Invalid(format!(
                    "domain '{}' has an invalid weight",
                    domain.name
                )));
            }
            if domain.kpis().next().is_none() {
                return Err(CatalogError::Invalid(format!(
                    "domain '{}' has no KPIs",
                    domain.name
                )));
            }
        }

        let mut kpi_ids: Vec<&str> = self
            .domains
            .iter()
            .flat_map(RubricDomain::kpis)
            .map(|kpi| kpi.id.as_str())
            .collect();
        kpi_ids.sort_unstable();
        if kpi_ids.windows(2).any(|pair| pair[0] == pair[1]) {
            return Err(CatalogError::Invalid(
                "KPI ids must be unique within a template".to_string(),
            ));
        }

        Ok(())
    }
}

/// Read/write access to the rubric catalog. Creation is all-or-nothing:
/// implementations must not leave a partially written hierarchy behind.
pub trait CatalogStore: Send + Sync {
    fn create_template(&self, draft: TemplateDraft) -> Result<RubricTemplate, CatalogError>;
    fn fetch_template(&self, id: &TemplateId) -> Result<Option<RubricTemplate>, CatalogError>;
    fn list_templates(&self) -> Result<Vec<RubricTemplate>, CatalogError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("template already exists")]
    Conflict,
    #[error("template not found")]
    NotFound,
    #[error("invalid template: {0}")]
    Invalid(String),
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}
