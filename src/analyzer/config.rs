//! Pipeline/route/output/input configuration hygiene: orphans, route-missing-
//! output, unused pipelines, filter-early best practice.

use super::{failed, AnalyzerContext};
use crate::client::ApiClient;
use crate::models::finding::{Finding, FindingInput};
use crate::models::{AnalyzerResult, Severity};
use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Instant;

pub struct ConfigAnalyzer;

const OBJECTIVE: &str = "config";

#[async_trait]
impl super::Analyzer for ConfigAnalyzer {
    fn objective_name(&self) -> &'static str {
        OBJECTIVE
    }

    fn estimated_api_calls(&self) -> u32 {
        4
    }

    async fn analyze(&self, ctx: &AnalyzerContext, client: &ApiClient) -> AnalyzerResult {
        let start = Instant::now();
        let mut api_calls = 0u32;

        let pipelines = match client.get_pipelines(&ctx.cancel).await {
            Ok(p) => {
                api_calls += 1;
                p
            },
            Err(e) => return failed(OBJECTIVE, start, api_calls, e),
        };
        let routes = match client.get_routes(&ctx.cancel).await {
            Ok(r) => {
                api_calls += 1;
                r
            },
            Err(e) => return failed(OBJECTIVE, start, api_calls, e),
        };
        let outputs = match client.get_outputs(&ctx.cancel).await {
            Ok(o) => {
                api_calls += 1;
                o
            },
            Err(e) => return failed(OBJECTIVE, start, api_calls, e),
        };
        let inputs = match client.get_inputs(&ctx.cancel).await {
            Ok(i) => {
                api_calls += 1;
                i
            },
            Err(e) => return failed(OBJECTIVE, start, api_calls, e),
        };

        let mut findings = Vec::new();
        let mut n = 0usize;

        let output_ids: HashSet<&str> = outputs.iter().map(|o| o.id.as_str()).collect();
        for route in &routes {
            let output_id = route.raw.get("output").and_then(|v| v.as_str());
            if let Some(output_id) = output_id {
                if !output_ids.contains(output_id) {
                    n += 1;
                    if let Ok(f) = Finding::new(
                        AnalyzerContext::finding_id(OBJECTIVE, n),
                        OBJECTIVE,
                        Severity::High,
                        "Route references a missing output",
                        format!("Route {} references output '{}' which does not exist.", route.id, output_id),
                        FindingInput { affected_components: vec![route.id.clone()], ..Default::default() },
                    ) {
                        findings.push(f);
                    }
                }
            }
        }

        let referenced_pipelines: HashSet<String> = routes
            .iter()
            .filter_map(|r| r.raw.get("pipeline").and_then(|v| v.as_str()).map(str::to_string))
            .collect();
        for pipeline in &pipelines {
            if !referenced_pipelines.contains(&pipeline.id) {
                n += 1;
                if let Ok(f) = Finding::new(
                    AnalyzerContext::finding_id(OBJECTIVE, n),
                    OBJECTIVE,
                    Severity::Low,
                    "Unused pipeline",
                    format!("Pipeline {} is not referenced by any route.", pipeline.id),
                    FindingInput { affected_components: vec![pipeline.id.clone()], ..Default::default() },
                ) {
                    findings.push(f);
                }
            }

            let has_early_filter = pipeline
                .raw
                .get("conf")
                .and_then(|c| c.get("functions"))
                .and_then(|f| f.as_array())
                .map(|funcs| funcs.iter().take(2).any(|f| f.get("id").and_then(|v| v.as_str()) == Some("eval_filter")))
                .unwrap_or(true);
            if !has_early_filter {
                n += 1;
                if let Ok(f) = Finding::new(
                    AnalyzerContext::finding_id(OBJECTIVE, n),
                    OBJECTIVE,
                    Severity::Low,
                    "Filtering not applied early in pipeline",
                    format!(
                        "Pipeline {} does not filter events within its first two functions, so downstream functions process events that could have been dropped earlier.",
                        pipeline.id
                    ),
                    FindingInput {
                        affected_components: vec![pipeline.id.clone()],
                        remediation_steps: vec!["Move a Filter/Drop function earlier in the pipeline".to_string()],
                        ..Default::default()
                    },
                ) {
                    findings.push(f);
                }
            }
        }

        let input_ids: HashSet<&str> = inputs.iter().map(|i| i.id.as_str()).collect();
        for route in &routes {
            if let Some(input_id) = route.raw.get("input").and_then(|v| v.as_str()) {
                if input_id != "*" && !input_ids.contains(input_id) {
                    n += 1;
                    if let Ok(f) = Finding::new(
                        AnalyzerContext::finding_id(OBJECTIVE, n),
                        OBJECTIVE,
                        Severity::Medium,
                        "Route references a missing input",
                        format!("Route {} references input '{}' which does not exist.", route.id, input_id),
                        FindingInput { affected_components: vec![route.id.clone()], ..Default::default() },
                    ) {
                        findings.push(f);
                    }
                }
            }
        }

        let non_empty = !pipelines.is_empty() || !routes.is_empty();
        let no_high_or_critical =
            findings.iter().all(|f| f.severity < Severity::High);
        if non_empty && no_high_or_critical {
            if let Ok(f) = Finding::new(
                AnalyzerContext::finding_id(OBJECTIVE, 0),
                OBJECTIVE,
                Severity::Info,
                "Clean Configuration Detected",
                "No high or critical configuration findings were detected across pipelines, routes, inputs and outputs.",
                FindingInput::default(),
            ) {
                findings.push(f);
            }
        }

        let mut result = AnalyzerResult::success(OBJECTIVE, start.elapsed(), api_calls, findings, Vec::new());
        result.sort_findings_by_severity();
        result
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn objective_name_is_config() {
        use super::super::Analyzer;
        assert_eq!(super::ConfigAnalyzer.objective_name(), "config");
    }
}
