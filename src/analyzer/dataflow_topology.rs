//! Orphaned pipelines and unreachable outputs in the routing graph.

use super::{failed, AnalyzerContext};
use crate::client::ApiClient;
use crate::models::finding::{Finding, FindingInput};
use crate::models::{AnalyzerResult, Severity};
use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Instant;

pub struct DataflowTopologyAnalyzer;

const OBJECTIVE: &str = "dataflow_topology";

#[async_trait]
impl super::Analyzer for DataflowTopologyAnalyzer {
    fn objective_name(&self) -> &'static str {
        OBJECTIVE
    }

    fn estimated_api_calls(&self) -> u32 {
        3
    }

    async fn analyze(&self, ctx: &AnalyzerContext, client: &ApiClient) -> AnalyzerResult {
        let start = Instant::now();
        let routes = match client.get_routes(&ctx.cancel).await {
            Ok(r) => r,
            Err(e) => return failed(OBJECTIVE, start, 1, e),
        };
        let pipelines = match client.get_pipelines(&ctx.cancel).await {
            Ok(p) => p,
            Err(e) => return failed(OBJECTIVE, start, 2, e),
        };
        let outputs = match client.get_outputs(&ctx.cancel).await {
            Ok(o) => o,
            Err(e) => return failed(OBJECTIVE, start, 3, e),
        };

        let mut findings = Vec::new();
        let mut n = 0usize;

        let routed_pipelines: HashSet<&str> =
            routes.iter().filter_map(|r| r.raw.get("pipeline").and_then(|v| v.as_str())).collect();
        for pipeline in &pipelines {
            if !routed_pipelines.contains(pipeline.id.as_str()) {
                n += 1;
                if let Ok(f) = Finding::new(
                    AnalyzerContext::finding_id(OBJECTIVE, n),
                    OBJECTIVE,
                    Severity::Low,
                    "Pipeline is not referenced by any route",
                    format!("Pipeline {} has no route sending events to it.", pipeline.id),
                    FindingInput { affected_components: vec![pipeline.id.clone()], ..Default::default() },
                ) {
                    findings.push(f);
                }
            }
        }

        let referenced_outputs: HashSet<String> = pipelines
            .iter()
            .filter_map(|p| {
                p.raw
                    .get("conf")
                    .and_then(|c| c.get("output"))
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            })
            .chain(routes.iter().filter_map(|r| r.raw.get("output").and_then(|v| v.as_str()).map(str::to_string)))
            .collect();
        for output in &outputs {
            if !referenced_outputs.contains(&output.id) {
                n += 1;
                if let Ok(f) = Finding::new(
                    AnalyzerContext::finding_id(OBJECTIVE, n),
                    OBJECTIVE,
                    Severity::Low,
                    "Output is unreachable",
                    format!("Output {} is not referenced by any pipeline or route.", output.id),
                    FindingInput { affected_components: vec![output.id.clone()], ..Default::default() },
                ) {
                    findings.push(f);
                }
            }
        }

        let mut result = AnalyzerResult::success(OBJECTIVE, start.elapsed(), 3, findings, Vec::new());
        result.sort_findings_by_severity();
        result
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn objective_name_is_stable() {
        assert_eq!(super::OBJECTIVE, "dataflow_topology");
    }
}
