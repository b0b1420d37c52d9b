//! `AnalyzerResult`: the per-analyzer output the orchestrator aggregates.

use super::enums::Product;
use super::finding::Finding;
use super::recommendation::Recommendation;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Output of one analyzer's `analyze()` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerResult {
    pub objective_name: String,
    pub success: bool,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
    pub api_calls_used: u32,
    pub findings: Vec<Finding>,
    pub recommendations: Vec<Recommendation>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u128(d.as_millis())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let ms = u64::deserialize(d)?;
        Ok(Duration::from_millis(ms))
    }
}

impl AnalyzerResult {
    pub fn success(
        objective_name: impl Into<String>,
        duration: Duration,
        api_calls_used: u32,
        findings: Vec<Finding>,
        recommendations: Vec<Recommendation>,
    ) -> Self {
        Self {
            objective_name: objective_name.into(),
            success: true,
            duration,
            api_calls_used,
            findings,
            recommendations,
            metadata: serde_json::Map::new(),
        }
    }

    /// A failed analyzer invocation: no findings, but `metadata.error` records why.
    pub fn failure(
        objective_name: impl Into<String>,
        duration: Duration,
        api_calls_used: u32,
        error: impl Into<String>,
    ) -> Self {
        let mut metadata = serde_json::Map::new();
        metadata.insert("error".to_string(), serde_json::Value::String(error.into()));
        Self {
            objective_name: objective_name.into(),
            success: false,
            duration,
            api_calls_used,
            findings: Vec::new(),
            recommendations: Vec::new(),
            metadata,
        }
    }

    /// Sort findings critical-first. Stable: equal-severity findings keep
    /// their relative input order. Idempotent by construction (a stable sort
    /// applied to an already-sorted sequence is a no-op).
    pub fn sort_findings_by_severity(&mut self) {
        self.findings.sort_by(|a, b| b.severity.cmp(&a.severity));
    }

    /// Sort recommendations p0-first, stable.
    pub fn sort_recommendations_by_priority(&mut self) {
        self.recommendations.sort_by(|a, b| b.priority.cmp(&a.priority));
    }

    /// Returns a new result retaining only findings/recommendations tagged
    /// for `product` (an empty tag set is treated as universal). Idempotent:
    /// filtering an already-filtered result by the same product is a no-op.
    pub fn filter_by_product(&self, product: Product) -> Self {
        Self {
            objective_name: self.objective_name.clone(),
            success: self.success,
            duration: self.duration,
            api_calls_used: self.api_calls_used,
            findings: self.findings.iter().filter(|f| f.applies_to(product)).cloned().collect(),
            recommendations: self
                .recommendations
                .iter()
                .filter(|r| r.applies_to(product))
                .cloned()
                .collect(),
            metadata: self.metadata.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::{Confidence, ImplementationEffort, Priority, Severity};
    use crate::models::finding::FindingInput;
    use crate::models::recommendation::RecommendationInput;

    fn finding(id: &str, severity: Severity) -> Finding {
        Finding::new(id, "health", severity, "t", "d", FindingInput {
            confidence_level: Confidence::Medium,
            ..Default::default()
        })
        .unwrap()
    }

    fn recommendation(id: &str, priority: Priority) -> Recommendation {
        Recommendation::new(
            id,
            "scaling",
            priority,
            "t",
            "d",
            ImplementationEffort::Low,
            vec!["f-1".into()],
            RecommendationInput::default(),
        )
        .unwrap()
    }

    #[test]
    fn sort_findings_by_severity_is_idempotent() {
        let mut r = AnalyzerResult::success(
            "health",
            Duration::from_secs(1),
            1,
            vec![
                finding("a", Severity::Low),
                finding("b", Severity::Critical),
                finding("c", Severity::High),
            ],
            vec![],
        );
        r.sort_findings_by_severity();
        let once: Vec<_> = r.findings.iter().map(|f| f.id.clone()).collect();
        r.sort_findings_by_severity();
        let twice: Vec<_> = r.findings.iter().map(|f| f.id.clone()).collect();
        assert_eq!(once, twice);
        assert_eq!(once, vec!["b", "c", "a"]);
    }

    #[test]
    fn sort_findings_by_severity_is_stable_for_ties() {
        let mut r = AnalyzerResult::success(
            "health",
            Duration::from_secs(1),
            1,
            vec![finding("a", Severity::High), finding("b", Severity::High)],
            vec![],
        );
        r.sort_findings_by_severity();
        let order: Vec<_> = r.findings.iter().map(|f| f.id.clone()).collect();
        assert_eq!(order, vec!["a", "b"]);
    }

    #[test]
    fn sort_recommendations_by_priority_p0_first() {
        let mut r = AnalyzerResult::success(
            "cost",
            Duration::from_secs(1),
            1,
            vec![],
            vec![recommendation("r1", Priority::P3), recommendation("r2", Priority::P0)],
        );
        r.sort_recommendations_by_priority();
        assert_eq!(r.recommendations[0].id, "r2");
    }

    #[test]
    fn filter_by_product_is_idempotent() {
        let mut input = FindingInput::default();
        input.product_tags.insert(Product::Stream);
        let f = Finding::new("f-1", "health", Severity::Low, "t", "d", input).unwrap();
        let r = AnalyzerResult::success("health", Duration::from_secs(1), 1, vec![f], vec![]);

        let once = r.filter_by_product(Product::Stream);
        let twice = once.filter_by_product(Product::Stream);
        assert_eq!(once.findings.len(), twice.findings.len());
        assert_eq!(r.filter_by_product(Product::Edge).findings.len(), 0);
    }

    #[test]
    fn filter_then_sort_equals_sort_then_filter() {
        let mut input_a = FindingInput { confidence_level: Confidence::Medium, ..Default::default() };
        input_a.product_tags.insert(Product::Stream);
        let a = Finding::new("a", "health", Severity::Low, "t", "d", input_a).unwrap();
        let mut input_b = FindingInput { confidence_level: Confidence::Medium, ..Default::default() };
        input_b.product_tags.insert(Product::Stream);
        let b = Finding::new("b", "health", Severity::Critical, "t", "d", input_b).unwrap();

        let base =
            AnalyzerResult::success("health", Duration::from_secs(1), 1, vec![a, b], vec![]);

        let mut filter_then_sort = base.filter_by_product(Product::Stream);
        filter_then_sort.sort_findings_by_severity();

        let mut sort_then_filter = base.clone();
        sort_then_filter.sort_findings_by_severity();
        let sort_then_filter = sort_then_filter.filter_by_product(Product::Stream);

        let ids_a: Vec<_> = filter_then_sort.findings.iter().map(|f| f.id.clone()).collect();
        let ids_b: Vec<_> = sort_then_filter.findings.iter().map(|f| f.id.clone()).collect();
        assert_eq!(ids_a, ids_b);
    }

    mod props {
        use super::*;
        use crate::models::enums::Severity;
        use proptest::prelude::*;

        fn arb_severity() -> impl Strategy<Value = Severity> {
            prop_oneof![
                Just(Severity::Info),
                Just(Severity::Low),
                Just(Severity::Medium),
                Just(Severity::High),
                Just(Severity::Critical),
            ]
        }

        fn arb_product() -> impl Strategy<Value = Product> {
            prop_oneof![
                Just(Product::Stream),
                Just(Product::Edge),
                Just(Product::Lake),
                Just(Product::Search),
            ]
        }

        /// A finding tagged with a single product, so filtering has a chance
        /// to actually drop something rather than every input being universal.
        fn arb_finding() -> impl Strategy<Value = Finding> {
            (0usize..100_000, arb_severity(), arb_product()).prop_map(|(n, severity, product)| {
                let mut input = FindingInput { confidence_level: Confidence::Medium, ..Default::default() };
                input.product_tags.insert(product);
                Finding::new(format!("f-{n}"), "health", severity, "t", "d", input).unwrap()
            })
        }

        fn result_of(findings: Vec<Finding>) -> AnalyzerResult {
            AnalyzerResult::success("health", Duration::from_secs(1), 1, findings, vec![])
        }

        proptest! {
            #[test]
            fn sort_findings_by_severity_is_idempotent_for_any_input(findings in prop::collection::vec(arb_finding(), 0..20)) {
                let mut r = result_of(findings);
                r.sort_findings_by_severity();
                let once: Vec<_> = r.findings.iter().map(|f| f.id.clone()).collect();
                r.sort_findings_by_severity();
                let twice: Vec<_> = r.findings.iter().map(|f| f.id.clone()).collect();
                prop_assert_eq!(once, twice);
            }

            #[test]
            fn filter_by_product_is_idempotent_for_any_input(
                findings in prop::collection::vec(arb_finding(), 0..20),
                product in arb_product(),
            ) {
                let r = result_of(findings);
                let once = r.filter_by_product(product);
                let twice = once.filter_by_product(product);
                let ids_once: Vec<_> = once.findings.iter().map(|f| f.id.clone()).collect();
                let ids_twice: Vec<_> = twice.findings.iter().map(|f| f.id.clone()).collect();
                prop_assert_eq!(ids_once, ids_twice);
            }

            #[test]
            fn filter_then_sort_commutes_with_sort_then_filter(
                findings in prop::collection::vec(arb_finding(), 0..20),
                product in arb_product(),
            ) {
                let base = result_of(findings);

                let mut filter_then_sort = base.filter_by_product(product);
                filter_then_sort.sort_findings_by_severity();

                let mut sort_then_filter = base.clone();
                sort_then_filter.sort_findings_by_severity();
                let sort_then_filter = sort_then_filter.filter_by_product(product);

                let ids_a: Vec<_> = filter_then_sort.findings.iter().map(|f| f.id.clone()).collect();
                let ids_b: Vec<_> = sort_then_filter.findings.iter().map(|f| f.id.clone()).collect();
                prop_assert_eq!(ids_a, ids_b);
            }
        }
    }
}
