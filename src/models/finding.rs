//! `Finding`: an atomic observation produced by one analyzer.

use super::enums::{Confidence, Product};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Component-free findings (those not tied to a single worker/pipeline/etc.)
/// carry this instead of a real component id.
pub const OVERALL_COMPONENT: &str = "overall";

/// Maximum length, in characters, of a finding's title.
const MAX_TITLE_LEN: usize = 120;

/// An atomic observation about the deployment.
///
/// Constructed only through [`Finding::new`], which enforces the invariants
/// the rest of the engine relies on (title length, non-empty severity-bearing
/// category, at least one affected component or the `overall` sentinel).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    pub category: String,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub affected_components: Vec<String>,
    pub confidence_level: Confidence,
    pub estimated_impact: String,
    pub remediation_steps: Vec<String>,
    pub product_tags: BTreeSet<Product>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

pub use super::enums::Severity;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FindingError {
    #[error("finding title exceeds {MAX_TITLE_LEN} characters: {0} chars")]
    TitleTooLong(usize),
    #[error("finding id must not be empty")]
    EmptyId,
    #[error("finding category must not be empty")]
    EmptyCategory,
}

/// Builder-style constructor inputs for [`Finding::new`].
///
/// Grouping the optional fields here keeps the constructor call sites
/// readable without resorting to a dozen positional arguments.
#[derive(Debug, Clone, Default)]
pub struct FindingInput {
    pub affected_components: Vec<String>,
    pub confidence_level: Confidence,
    pub estimated_impact: String,
    pub remediation_steps: Vec<String>,
    pub product_tags: BTreeSet<Product>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Default for Confidence {
    fn default() -> Self {
        Confidence::Medium
    }
}

impl Finding {
    /// Construct and validate a finding. Returns a typed error rather than
    /// panicking so analyzers can surface malformed data as a `data_quality`
    /// finding instead of aborting.
    pub fn new(
        id: impl Into<String>,
        category: impl Into<String>,
        severity: Severity,
        title: impl Into<String>,
        description: impl Into<String>,
        input: FindingInput,
    ) -> Result<Self, FindingError> {
        let id = id.into();
        let category = category.into();
        let title = title.into();

        if id.is_empty() {
            return Err(FindingError::EmptyId);
        }
        if category.is_empty() {
            return Err(FindingError::EmptyCategory);
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(FindingError::TitleTooLong(title.chars().count()));
        }

        let mut product_tags = input.product_tags;
        if product_tags.is_empty() {
            product_tags.extend(Product::ALL);
        }

        Ok(Self {
            id,
            category,
            severity,
            title,
            description: description.into(),
            affected_components: input.affected_components,
            confidence_level: input.confidence_level,
            estimated_impact: input.estimated_impact,
            remediation_steps: input.remediation_steps,
            product_tags,
            metadata: input.metadata,
        })
    }

    /// A finding not tied to any specific component (worker, pipeline, etc.).
    pub fn is_overall(&self) -> bool {
        self.affected_components.is_empty()
            || self.affected_components.iter().any(|c| c == OVERALL_COMPONENT)
    }

    /// True if this finding applies to `product`, treating an (impossible,
    /// post-construction) empty tag set as universal for defense in depth.
    pub fn applies_to(&self, product: Product) -> bool {
        self.product_tags.is_empty() || self.product_tags.contains(&product)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Finding {
        Finding::new(
            "f-1",
            "health",
            Severity::High,
            "Node disconnected",
            "worker-3 has been unreachable for 5 minutes",
            FindingInput {
                affected_components: vec!["worker-3".into()],
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn defaults_product_tags_to_all_four() {
        let f = sample();
        assert_eq!(f.product_tags.len(), 4);
    }

    #[test]
    fn rejects_title_over_120_chars() {
        let title = "x".repeat(121);
        let err = Finding::new(
            "f-1",
            "health",
            Severity::Low,
            title,
            "desc",
            FindingInput::default(),
        )
        .unwrap_err();
        assert_eq!(err, FindingError::TitleTooLong(121));
    }

    #[test]
    fn empty_affected_components_counts_as_overall() {
        let f = Finding::new(
            "f-1",
            "config",
            Severity::Info,
            "Clean configuration",
            "no issues found",
            FindingInput::default(),
        )
        .unwrap();
        assert!(f.is_overall());
    }

    #[test]
    fn applies_to_respects_product_tags() {
        let mut input = FindingInput::default();
        input.product_tags.insert(Product::Stream);
        let f = Finding::new("f-1", "health", Severity::Low, "t", "d", input).unwrap();
        assert!(f.applies_to(Product::Stream));
        assert!(!f.applies_to(Product::Edge));
    }
}
