//! Lookup file staleness, missing lookups referenced by pipelines, and
//! oversized lookup files.

use super::{failed, AnalyzerContext};
use crate::client::ApiClient;
use crate::models::finding::{Finding, FindingInput};
use crate::models::{AnalyzerResult, Severity};
use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Instant;

pub struct LookupHealthAnalyzer;

const OBJECTIVE: &str = "lookup_health";

/// A lookup untouched for longer than this is considered stale.
const STALE_LOOKUP_DAYS: i64 = 90;

/// A lookup file larger than this is flagged as oversized.
const OVERSIZED_LOOKUP_MB: f64 = 100.0;

#[async_trait]
impl super::Analyzer for LookupHealthAnalyzer {
    fn objective_name(&self) -> &'static str {
        OBJECTIVE
    }

    fn estimated_api_calls(&self) -> u32 {
        2
    }

    async fn analyze(&self, ctx: &AnalyzerContext, client: &ApiClient) -> AnalyzerResult {
        let start = Instant::now();
        let lookups = match client.get_lookups(&ctx.cancel).await {
            Ok(l) => {
                l
            },
            Err(e) => return failed(OBJECTIVE, start, 1, e),
        };
        let pipelines = match client.get_pipelines(&ctx.cancel).await {
            Ok(p) => p,
            Err(e) => return failed(OBJECTIVE, start, 2, e),
        };

        let mut findings = Vec::new();
        let mut n = 0usize;
        let now = chrono::Utc::now();

        let known_lookups: HashSet<&str> = lookups.iter().map(|l| l.id.as_str()).collect();

        for lookup in &lookups {
            if let Some(modified) = lookup.raw.get("mtime").and_then(|v| v.as_i64()) {
                if let Some(modified) = chrono::DateTime::from_timestamp_millis(modified) {
                    let age_days = (now - modified).num_days();
                    if age_days > STALE_LOOKUP_DAYS {
                        n += 1;
                        if let Ok(f) = Finding::new(
                            AnalyzerContext::finding_id(OBJECTIVE, n),
                            OBJECTIVE,
                            Severity::Low,
                            "Lookup file is stale",
                            format!("Lookup {} has not been modified in {age_days} days.", lookup.id),
                            FindingInput { affected_components: vec![lookup.id.clone()], ..Default::default() },
                        ) {
                            findings.push(f);
                        }
                    }
                }
            }
            if let Some(size_bytes) = lookup.raw.get("sizeBytes").and_then(|v| v.as_f64()) {
                let size_mb = size_bytes / (1024.0 * 1024.0);
                if size_mb > OVERSIZED_LOOKUP_MB {
                    n += 1;
                    if let Ok(f) = Finding::new(
                        AnalyzerContext::finding_id(OBJECTIVE, n),
                        OBJECTIVE,
                        Severity::Medium,
                        "Lookup file is oversized",
                        format!("Lookup {} is {size_mb:.0} MB, which may slow pipeline reloads.", lookup.id),
                        FindingInput { affected_components: vec![lookup.id.clone()], ..Default::default() },
                    ) {
                        findings.push(f);
                    }
                }
            }
        }

        let mut missing: HashSet<String> = HashSet::new();
        for pipeline in &pipelines {
            let referenced = pipeline
                .raw
                .get("conf")
                .and_then(|c| c.get("functions"))
                .and_then(|f| f.as_array())
                .map(|functions| {
                    functions
                        .iter()
                        .filter(|f| f.get("id").and_then(|v| v.as_str()) == Some("lookup"))
                        .filter_map(|f| f.get("conf").and_then(|c| c.get("filename")).and_then(|v| v.as_str()))
                        .map(str::to_string)
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            for lookup_name in referenced {
                if !known_lookups.contains(lookup_name.as_str()) && missing.insert(lookup_name.clone()) {
                    n += 1;
                    if let Ok(f) = Finding::new(
                        AnalyzerContext::finding_id(OBJECTIVE, n),
                        OBJECTIVE,
                        Severity::High,
                        "Pipeline references a missing lookup",
                        format!("Pipeline {} references lookup \"{lookup_name}\", which does not exist.", pipeline.id),
                        FindingInput { affected_components: vec![pipeline.id.clone()], ..Default::default() },
                    ) {
                        findings.push(f);
                    }
                }
            }
        }

        let mut result = AnalyzerResult::success(OBJECTIVE, start.elapsed(), 2, findings, Vec::new());
        result.sort_findings_by_severity();
        result
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn thresholds_match_spec() {
        assert_eq!(super::STALE_LOOKUP_DAYS, 90);
        assert_eq!(super::OVERSIZED_LOOKUP_MB, 100.0);
    }
}
