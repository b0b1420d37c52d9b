//! `AnalysisRun`: the top-level artifact assembled by the orchestrator.

use super::analyzer_result::AnalyzerResult;
use super::enums::{Product, RunStatus};
use super::finding::Finding;
use super::recommendation::Recommendation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One end-to-end analysis: a single deployment, a set of objectives, shared
/// budgets. Exclusively owns its [`AnalyzerResult`]s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRun {
    pub run_id: uuid::Uuid,
    pub deployment_id: String,
    pub product_type: Product,
    pub product_version: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub objectives_requested: Vec<String>,
    pub objectives_completed: Vec<String>,
    pub objectives_failed: Vec<String>,
    pub results: BTreeMap<String, AnalyzerResult>,
    pub health_score: u32,
    pub api_calls_used: u32,
    pub api_calls_budget: u32,
    pub duration_seconds: f64,
}

impl AnalysisRun {
    /// All findings across all objective results, in `results`-map (alphabetical
    /// objective) order. Computed on demand rather than stored, since it is a
    /// pure function of `results`.
    pub fn findings_flat(&self) -> Vec<&Finding> {
        self.results.values().flat_map(|r| r.findings.iter()).collect()
    }

    pub fn recommendations_flat(&self) -> Vec<&Recommendation> {
        self.results.values().flat_map(|r| r.recommendations.iter()).collect()
    }

    /// True if any objective failed.
    pub fn partial(&self) -> bool {
        !self.objectives_failed.is_empty()
    }

    /// Check the structural invariants documented in the data model. Intended
    /// for tests and for the orchestrator to assert against itself before
    /// handing a run to the report assembler; not re-run on every accessor.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.api_calls_used > self.api_calls_budget {
            return Err(format!(
                "api_calls_used ({}) exceeds api_calls_budget ({})",
                self.api_calls_used, self.api_calls_budget
            ));
        }
        match self.status {
            RunStatus::Completed => {
                if !self.objectives_failed.is_empty() {
                    return Err("status=completed but objectives_failed is non-empty".into());
                }
                for obj in &self.objectives_requested {
                    if !self.objectives_completed.contains(obj) {
                        return Err(format!("status=completed but {obj} was not completed"));
                    }
                }
            },
            RunStatus::Partial => {
                if self.objectives_completed.is_empty() || self.objectives_failed.is_empty() {
                    return Err(
                        "status=partial requires both non-empty objectives_completed and objectives_failed"
                            .into(),
                    );
                }
            },
            RunStatus::Failed => {
                if !self.objectives_completed.is_empty() {
                    return Err("status=failed but objectives_completed is non-empty".into());
                }
            },
            RunStatus::Pending | RunStatus::Running => {},
        }

        let mut seen_ids = std::collections::HashSet::new();
        for finding in self.findings_flat() {
            if !seen_ids.insert(&finding.id) {
                return Err(format!("duplicate finding id within run: {}", finding.id));
            }
        }

        let finding_ids: std::collections::HashSet<&str> =
            self.findings_flat().iter().map(|f| f.id.as_str()).collect();
        for rec in self.recommendations_flat() {
            for related in &rec.related_finding_ids {
                if !finding_ids.contains(related.as_str()) {
                    return Err(format!(
                        "recommendation {} references unknown finding {}",
                        rec.id, related
                    ));
                }
            }
        }

        Ok(())
    }

    /// A run whose findings/recommendations are restricted to `product`.
    /// Every per-objective result is filtered in place; objective bookkeeping
    /// (requested/completed/failed, budgets, score) is unchanged, since those
    /// describe the run itself, not its findings.
    pub fn filter_by_product(&self, product: Product) -> Self {
        let mut filtered = self.clone();
        filtered.results =
            self.results.iter().map(|(k, v)| (k.clone(), v.filter_by_product(product))).collect();
        filtered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::{Confidence, Severity};
    use crate::models::finding::FindingInput;
    use std::time::Duration;

    fn base_run() -> AnalysisRun {
        AnalysisRun {
            run_id: uuid::Uuid::nil(),
            deployment_id: "dep-1".into(),
            product_type: Product::Stream,
            product_version: Some("4.15.0".into()),
            started_at: Utc::now(),
            completed_at: Some(Utc::now()),
            status: RunStatus::Completed,
            objectives_requested: vec!["health".into()],
            objectives_completed: vec!["health".into()],
            objectives_failed: vec![],
            results: BTreeMap::new(),
            health_score: 100,
            api_calls_used: 1,
            api_calls_budget: 100,
            duration_seconds: 1.0,
        }
    }

    #[test]
    fn completed_run_with_empty_failed_passes_invariants() {
        base_run().check_invariants().unwrap();
    }

    #[test]
    fn completed_run_with_nonempty_failed_is_rejected() {
        let mut run = base_run();
        run.objectives_failed.push("security".into());
        assert!(run.check_invariants().is_err());
    }

    #[test]
    fn api_calls_used_over_budget_is_rejected() {
        let mut run = base_run();
        run.api_calls_used = 200;
        assert!(run.check_invariants().is_err());
    }

    #[test]
    fn partial_requires_both_completed_and_failed_nonempty() {
        let mut run = base_run();
        run.status = RunStatus::Partial;
        run.objectives_failed.push("security".into());
        run.check_invariants().unwrap();

        run.objectives_completed.clear();
        assert!(run.check_invariants().is_err());
    }

    #[test]
    fn duplicate_finding_ids_are_rejected() {
        let mut run = base_run();
        let f = Finding::new("dup", "health", Severity::Low, "t", "d", FindingInput {
            confidence_level: Confidence::Medium,
            ..Default::default()
        })
        .unwrap();
        run.results.insert(
            "health".into(),
            AnalyzerResult::success("health", Duration::from_secs(1), 1, vec![f.clone()], vec![]),
        );
        run.results.insert(
            "config".into(),
            AnalyzerResult::success("config", Duration::from_secs(1), 1, vec![f], vec![]),
        );
        assert!(run.check_invariants().is_err());
    }

    #[test]
    fn filter_by_product_restricts_every_result() {
        let mut input = FindingInput { confidence_level: Confidence::Medium, ..Default::default() };
        input.product_tags.insert(Product::Edge);
        let f = Finding::new("f-1", "health", Severity::Low, "t", "d", input).unwrap();
        let mut run = base_run();
        run.results.insert(
            "health".into(),
            AnalyzerResult::success("health", Duration::from_secs(1), 1, vec![f], vec![]),
        );

        let filtered = run.filter_by_product(Product::Stream);
        for result in filtered.results.values() {
            for finding in &result.findings {
                assert!(finding.applies_to(Product::Stream));
            }
        }
    }
}
