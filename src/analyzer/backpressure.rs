//! Persistent-queue depth and blocked-output detection from runtime metrics.

use super::{failed, AnalyzerContext};
use crate::client::ApiClient;
use crate::models::finding::{Finding, FindingInput};
use crate::models::{AnalyzerResult, Severity};
use async_trait::async_trait;
use std::time::Instant;

pub struct BackpressureAnalyzer;

const OBJECTIVE: &str = "backpressure";

/// Queue fill fraction (`pq.queue.size / pq.queue.capacity`) above this is flagged.
const QUEUE_FILL_THRESHOLD: f64 = 0.80;

#[async_trait]
impl super::Analyzer for BackpressureAnalyzer {
    fn objective_name(&self) -> &'static str {
        OBJECTIVE
    }

    fn estimated_api_calls(&self) -> u32 {
        2
    }

    async fn analyze(&self, ctx: &AnalyzerContext, client: &ApiClient) -> AnalyzerResult {
        let start = Instant::now();
        let metrics = match client.get_metrics(&ctx.cancel).await {
            Ok(m) => m,
            Err(e) => return failed(OBJECTIVE, start, 1, e),
        };

        let Some(metrics) = metrics else {
            let mut result = AnalyzerResult::success(OBJECTIVE, start.elapsed(), 1, Vec::new(), Vec::new());
            result.metadata.insert("data_unavailable".to_string(), serde_json::Value::Bool(true));
            return result;
        };

        let mut findings = Vec::new();
        let mut n = 0usize;

        let blocked_outputs: Vec<&str> = metrics
            .raw
            .get("blockedOutputs")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default();
        for output_id in &blocked_outputs {
            n += 1;
            if let Ok(f) = Finding::new(
                AnalyzerContext::finding_id(OBJECTIVE, n),
                OBJECTIVE,
                Severity::High,
                "Output is blocked",
                format!("Output {output_id} is reporting backpressure from downstream."),
                FindingInput { affected_components: vec![output_id.to_string()], ..Default::default() },
            ) {
                findings.push(f);
            }
        }

        if let (Some(&size), Some(&capacity)) =
            (metrics.values.get("pq.queue.size"), metrics.values.get("pq.queue.capacity"))
        {
            if capacity > 0.0 {
                let fill = size / capacity;
                if fill >= QUEUE_FILL_THRESHOLD {
                    n += 1;
                    if let Ok(f) = Finding::new(
                        AnalyzerContext::finding_id(OBJECTIVE, n),
                        OBJECTIVE,
                        Severity::High,
                        "Persistent queue nearing capacity",
                        format!("Persistent queue is at {:.0}% of capacity.", fill * 100.0),
                        FindingInput::default(),
                    ) {
                        findings.push(f);
                    }
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
    fn queue_fill_threshold_matches_spec() {
        assert_eq!(super::QUEUE_FILL_THRESHOLD, 0.80);
    }
}
