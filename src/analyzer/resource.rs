//! CPU/memory/disk utilization thresholds across workers/nodes.

use super::{failed, AnalyzerContext};
use crate::client::ApiClient;
use crate::models::finding::{Finding, FindingInput};
use crate::models::{AnalyzerResult, Product, Severity};
use async_trait::async_trait;
use std::time::Instant;

pub struct ResourceAnalyzer;

const OBJECTIVE: &str = "resource";
const HIGH_THRESHOLD: f64 = 80.0;
const CRITICAL_THRESHOLD: f64 = 90.0;

#[async_trait]
impl super::Analyzer for ResourceAnalyzer {
    fn objective_name(&self) -> &'static str {
        OBJECTIVE
    }

    fn estimated_api_calls(&self) -> u32 {
        1
    }

    async fn analyze(&self, ctx: &AnalyzerContext, client: &ApiClient) -> AnalyzerResult {
        let start = Instant::now();
        let nodes = match client.get_nodes(&ctx.cancel).await {
            Ok(n) => n,
            Err(e) => return failed(OBJECTIVE, start, 1, e),
        };

        let mut findings = Vec::new();
        let mut n = 0usize;
        let skip_disk = ctx.product == Product::Stream;

        for worker in &nodes {
            for (label, value) in [
                ("CPU", worker.cpu_percent),
                ("memory", worker.memory_percent),
                ("disk", if skip_disk { None } else { worker.disk_percent }),
            ] {
                let Some(value) = value else { continue };
                let severity = if value >= CRITICAL_THRESHOLD {
                    Some(Severity::Critical)
                } else if value >= HIGH_THRESHOLD {
                    Some(Severity::High)
                } else {
                    None
                };
                let Some(severity) = severity else { continue };
                n += 1;
                if let Ok(f) = Finding::new(
                    AnalyzerContext::finding_id(OBJECTIVE, n),
                    OBJECTIVE,
                    severity,
                    format!("{label} utilization {severity}", severity = if severity == Severity::Critical { "critical" } else { "high" }),
                    format!("Worker {} is at {:.0}% {label} utilization.", worker.id, value),
                    FindingInput { affected_components: vec![worker.id.clone()], ..Default::default() },
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
    fn thresholds_match_spec() {
        assert_eq!(super::HIGH_THRESHOLD, 80.0);
        assert_eq!(super::CRITICAL_THRESHOLD, 90.0);
    }
}
