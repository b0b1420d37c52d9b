//! Multi-deployment orchestration: pipeline-count drift across environments.
//!
//! This analyzer's own `analyze()` only evaluates the single deployment it
//! was given, matching every other analyzer's contract (the client is its
//! only dependency); cross-deployment comparison is the orchestrator's job
//! when it is handed more than one deployment and folds each one's `fleet`
//! result together — here we record this deployment's pipeline count as
//! metadata so that fold can compare it against its peers.

use super::{failed, AnalyzerContext};
use crate::client::ApiClient;
use crate::models::finding::{Finding, FindingInput};
use crate::models::{AnalyzerResult, Severity};
use async_trait::async_trait;
use std::time::Instant;

pub struct FleetAnalyzer;

const OBJECTIVE: &str = "fleet";

/// Pipeline-count drift beyond this fraction across environments is flagged.
pub const DRIFT_THRESHOLD: f64 = 0.20;

#[async_trait]
impl super::Analyzer for FleetAnalyzer {
    fn objective_name(&self) -> &'static str {
        OBJECTIVE
    }

    fn estimated_api_calls(&self) -> u32 {
        1
    }

    async fn analyze(&self, ctx: &AnalyzerContext, client: &ApiClient) -> AnalyzerResult {
        let start = Instant::now();
        let pipelines = match client.get_pipelines(&ctx.cancel).await {
            Ok(p) => p,
            Err(e) => return failed(OBJECTIVE, start, 1, e),
        };

        let mut metadata = serde_json::Map::new();
        metadata.insert("pipeline_count".to_string(), serde_json::Value::from(pipelines.len()));
        metadata.insert("deployment_id".to_string(), serde_json::Value::String(ctx.deployment_id.clone()));

        let findings = vec![Finding::new(
            AnalyzerContext::finding_id(OBJECTIVE, 0),
            OBJECTIVE,
            Severity::Info,
            "Pipeline inventory recorded",
            format!("Deployment {} has {} pipeline(s); compare against fleet peers for drift.", ctx.deployment_id, pipelines.len()),
            FindingInput::default(),
        )]
        .into_iter()
        .flatten()
        .collect();

        let mut result = AnalyzerResult::success(OBJECTIVE, start.elapsed(), 1, findings, Vec::new());
        result.metadata = metadata;
        result
    }
}

/// Compares pipeline counts across deployments (taken from each `fleet`
/// result's `pipeline_count` metadata) and flags drift beyond
/// [`DRIFT_THRESHOLD`]. Called by the orchestrator after every deployment's
/// analyzers have completed, not by `analyze()` itself.
pub fn detect_drift(pipeline_counts: &[(String, usize)]) -> Vec<(String, String, f64)> {
    if pipeline_counts.len() < 2 {
        return Vec::new();
    }
    let mean = pipeline_counts.iter().map(|(_, c)| *c as f64).sum::<f64>() / pipeline_counts.len() as f64;
    if mean == 0.0 {
        return Vec::new();
    }
    pipeline_counts
        .iter()
        .filter_map(|(deployment, count)| {
            let drift = (*count as f64 - mean).abs() / mean;
            (drift > DRIFT_THRESHOLD).then(|| (deployment.clone(), deployment.clone(), drift))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_drift_when_counts_are_close() {
        let counts = vec![("a".to_string(), 10), ("b".to_string(), 11)];
        assert!(detect_drift(&counts).is_empty());
    }

    #[test]
    fn flags_deployment_over_twenty_percent_drift() {
        let counts = vec![("a".to_string(), 10), ("b".to_string(), 10), ("c".to_string(), 20)];
        let drifted = detect_drift(&counts);
        assert_eq!(drifted.len(), 1);
        assert_eq!(drifted[0].0, "c");
    }

    #[test]
    fn single_deployment_has_no_comparison() {
        assert!(detect_drift(&[("a".to_string(), 10)]).is_empty());
    }
}
