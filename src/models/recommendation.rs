//! `Recommendation` and `ImpactEstimate`: actionable guidance derived from findings.

use super::enums::{ImplementationEffort, Priority, Product};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Purely descriptive attachment to a recommendation. The engine never does
/// arithmetic over these fields; they exist for the report to render.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImpactEstimate {
    pub performance_improvement: Option<String>,
    pub cost_impact: Option<String>,
    pub cost_savings_annual_usd: Option<f64>,
    pub time_to_value: Option<String>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RecommendationError {
    #[error("recommendation id must not be empty")]
    EmptyId,
    #[error("recommendation must derive from at least one finding")]
    NoRelatedFindings,
}

/// Actionable guidance derived from one or more findings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: String,
    #[serde(rename = "type")]
    pub recommendation_type: String,
    pub priority: Priority,
    pub title: String,
    pub description: String,
    pub rationale: String,
    pub implementation_steps: Vec<String>,
    pub impact_estimate: Option<ImpactEstimate>,
    pub implementation_effort: ImplementationEffort,
    pub before_state: Option<String>,
    pub after_state: Option<String>,
    pub product_tags: BTreeSet<Product>,
    pub related_finding_ids: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RecommendationInput {
    pub rationale: String,
    pub implementation_steps: Vec<String>,
    pub impact_estimate: Option<ImpactEstimate>,
    pub before_state: Option<String>,
    pub after_state: Option<String>,
    pub product_tags: BTreeSet<Product>,
}

impl Recommendation {
    /// Construct a recommendation. `related_finding_ids` must be non-empty;
    /// resolving those ids against the owning run is the caller's
    /// responsibility (checked by `AnalyzerResult` invariants at assembly
    /// time, not here, since a single finding/recommendation pair has no
    /// notion of "the run" yet).
    pub fn new(
        id: impl Into<String>,
        recommendation_type: impl Into<String>,
        priority: Priority,
        title: impl Into<String>,
        description: impl Into<String>,
        implementation_effort: ImplementationEffort,
        related_finding_ids: Vec<String>,
        input: RecommendationInput,
    ) -> Result<Self, RecommendationError> {
        let id = id.into();
        if id.is_empty() {
            return Err(RecommendationError::EmptyId);
        }
        if related_finding_ids.is_empty() {
            return Err(RecommendationError::NoRelatedFindings);
        }

        let mut product_tags = input.product_tags;
        if product_tags.is_empty() {
            product_tags.extend(Product::ALL);
        }

        Ok(Self {
            id,
            recommendation_type: recommendation_type.into(),
            priority,
            title: title.into(),
            description: description.into(),
            rationale: input.rationale,
            implementation_steps: input.implementation_steps,
            impact_estimate: input.impact_estimate,
            implementation_effort,
            before_state: input.before_state,
            after_state: input.after_state,
            product_tags,
            related_finding_ids,
        })
    }

    pub fn applies_to(&self, product: Product) -> bool {
        self.product_tags.is_empty() || self.product_tags.contains(&product)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_recommendation_with_no_related_findings() {
        let err = Recommendation::new(
            "r-1",
            "scaling",
            Priority::P1,
            "Add a worker",
            "desc",
            ImplementationEffort::Medium,
            vec![],
            RecommendationInput::default(),
        )
        .unwrap_err();
        assert_eq!(err, RecommendationError::NoRelatedFindings);
    }

    #[test]
    fn defaults_product_tags_to_all_four() {
        let r = Recommendation::new(
            "r-1",
            "scaling",
            Priority::P1,
            "Add a worker",
            "desc",
            ImplementationEffort::Medium,
            vec!["f-1".into()],
            RecommendationInput::default(),
        )
        .unwrap();
        assert_eq!(r.product_tags.len(), 4);
    }
}
