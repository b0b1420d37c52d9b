//! Per-pipeline event-rate outliers against the fleet's own baseline.

use super::{failed, AnalyzerContext};
use crate::client::ApiClient;
use crate::models::finding::{Finding, FindingInput};
use crate::models::{AnalyzerResult, Confidence, Severity};
use crate::predictive::{zscore_anomalies, DEFAULT_ZSCORE_THRESHOLD};
use async_trait::async_trait;
use std::time::Instant;

pub struct PipelinePerformanceAnalyzer;

const OBJECTIVE: &str = "pipeline_performance";

/// Minimum pipeline count for a z-score comparison to be meaningful.
const MIN_SAMPLE_SIZE: usize = 3;

#[async_trait]
impl super::Analyzer for PipelinePerformanceAnalyzer {
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

        let mut findings = Vec::new();
        let mut n = 0usize;

        let rates: Vec<Option<f64>> =
            pipelines.iter().map(|p| p.raw.get("eventsPerSecond").and_then(|v| v.as_f64())).collect();
        let sampled: Vec<f64> = rates.iter().filter_map(|r| *r).collect();

        if sampled.len() >= MIN_SAMPLE_SIZE {
            let indices_with_rate: Vec<usize> =
                rates.iter().enumerate().filter_map(|(i, r)| r.map(|_| i)).collect();
            for outlier_idx in zscore_anomalies(&sampled, DEFAULT_ZSCORE_THRESHOLD) {
                let Some(&pipeline_idx) = indices_with_rate.get(outlier_idx) else { continue };
                let Some(pipeline) = pipelines.get(pipeline_idx) else { continue };
                n += 1;
                if let Ok(f) = Finding::new(
                    AnalyzerContext::finding_id(OBJECTIVE, n),
                    OBJECTIVE,
                    Severity::Medium,
                    "Pipeline event rate outlier",
                    format!(
                        "Pipeline {} deviates more than {DEFAULT_ZSCORE_THRESHOLD} standard deviations from the fleet's event-rate baseline.",
                        pipeline.id
                    ),
                    FindingInput {
                        affected_components: vec![pipeline.id.clone()],
                        confidence_level: Confidence::Medium,
                        ..Default::default()
                    },
                ) {
                    findings.push(f);
                }
            }
        }

        let mut result = AnalyzerResult::success(OBJECTIVE, start.elapsed(), 1, findings, Vec::new());
        result.sort_findings_by_severity();
        result
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn minimum_sample_size_is_three() {
        assert_eq!(super::MIN_SAMPLE_SIZE, 3);
    }
}
