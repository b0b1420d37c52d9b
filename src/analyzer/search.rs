//! Dashboard/saved-search/job inventory sanity: stalled jobs, dashboards
//! with no saved searches, and an elevated job failure rate.

use super::{failed, AnalyzerContext};
use crate::client::ApiClient;
use crate::models::finding::{Finding, FindingInput};
use crate::models::{AnalyzerResult, Product, Severity};
use async_trait::async_trait;
use std::time::Instant;

pub struct SearchAnalyzer;

const OBJECTIVE: &str = "search";
const DEFAULT_WORKSPACE: &str = "default";

/// A `running` job older than this is considered stalled.
const STALLED_JOB_MINUTES: i64 = 60;

/// Failure rate above this fraction of recent jobs is flagged.
const FAILURE_RATE_THRESHOLD: f64 = 0.25;

#[async_trait]
impl super::Analyzer for SearchAnalyzer {
    fn objective_name(&self) -> &'static str {
        OBJECTIVE
    }

    fn supported_products(&self) -> &'static [Product] {
        &[Product::Search]
    }

    fn estimated_api_calls(&self) -> u32 {
        4
    }

    async fn analyze(&self, ctx: &AnalyzerContext, client: &ApiClient) -> AnalyzerResult {
        let start = Instant::now();
        let mut api_calls = 0u32;

        let jobs = match client.get_search_jobs(DEFAULT_WORKSPACE, &ctx.cancel).await {
            Ok(j) => {
                api_calls += 1;
                j
            },
            Err(e) => return failed(OBJECTIVE, start, api_calls, e),
        };
        let dashboards = match client.get_dashboards(DEFAULT_WORKSPACE, &ctx.cancel).await {
            Ok(d) => {
                api_calls += 1;
                d
            },
            Err(e) => return failed(OBJECTIVE, start, api_calls, e),
        };
        let saved_searches = match client.get_saved_searches(DEFAULT_WORKSPACE, &ctx.cancel).await {
            Ok(s) => {
                api_calls += 1;
                s
            },
            Err(e) => return failed(OBJECTIVE, start, api_calls, e),
        };

        let mut findings = Vec::new();
        let mut n = 0usize;
        let now = chrono::Utc::now();

        for job in &jobs {
            let status = job.raw.get("status").and_then(|v| v.as_str()).unwrap_or("");
            if status != "running" {
                continue;
            }
            let Some(started) = job.raw.get("startTime").and_then(|v| v.as_i64()) else {
                continue;
            };
            let Some(started) = chrono::DateTime::from_timestamp_millis(started) else {
                continue;
            };
            let age_minutes = (now - started).num_minutes();
            if age_minutes > STALLED_JOB_MINUTES {
                n += 1;
                if let Ok(f) = Finding::new(
                    AnalyzerContext::finding_id(OBJECTIVE, n),
                    OBJECTIVE,
                    Severity::Medium,
                    "Stalled search job",
                    format!("Job {} has been running for {age_minutes} minutes.", job.id),
                    FindingInput { affected_components: vec![job.id.clone()], ..Default::default() },
                ) {
                    findings.push(f);
                }
            }
        }

        if !jobs.is_empty() {
            let failed_count = jobs
                .iter()
                .filter(|j| j.raw.get("status").and_then(|v| v.as_str()) == Some("failed"))
                .count();
            let rate = failed_count as f64 / jobs.len() as f64;
            if rate > FAILURE_RATE_THRESHOLD {
                n += 1;
                if let Ok(f) = Finding::new(
                    AnalyzerContext::finding_id(OBJECTIVE, n),
                    OBJECTIVE,
                    Severity::High,
                    "Elevated search job failure rate",
                    format!("{failed_count} of {} recent jobs failed ({:.0}%).", jobs.len(), rate * 100.0),
                    FindingInput::default(),
                ) {
                    findings.push(f);
                }
            }
        }

        let dashboards_with_searches: std::collections::HashSet<String> = saved_searches
            .iter()
            .filter_map(|s| s.raw.get("dashboardId").and_then(|v| v.as_str()).map(str::to_string))
            .collect();
        for dashboard in &dashboards {
            if !dashboards_with_searches.contains(&dashboard.id) {
                n += 1;
                if let Ok(f) = Finding::new(
                    AnalyzerContext::finding_id(OBJECTIVE, n),
                    OBJECTIVE,
                    Severity::Low,
                    "Dashboard has no saved searches",
                    format!("Dashboard {} has no associated saved searches.", dashboard.id),
                    FindingInput { affected_components: vec![dashboard.id.clone()], ..Default::default() },
                ) {
                    findings.push(f);
                }
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
    fn thresholds_match_spec() {
        assert_eq!(super::STALLED_JOB_MINUTES, 60);
        assert_eq!(super::FAILURE_RATE_THRESHOLD, 0.25);
    }
}
