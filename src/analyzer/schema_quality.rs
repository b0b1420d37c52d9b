//! Parser field-extraction coverage and error rate.

use super::{failed, AnalyzerContext};
use crate::client::ApiClient;
use crate::models::finding::{Finding, FindingInput};
use crate::models::{AnalyzerResult, Severity};
use async_trait::async_trait;
use std::time::Instant;

pub struct SchemaQualityAnalyzer;

const OBJECTIVE: &str = "schema_quality";

/// A parser erroring on more than this fraction of events is flagged.
const ERROR_RATE_THRESHOLD: f64 = 0.05;

/// A parser extracting fields from fewer than this fraction of events is
/// flagged as low coverage.
const LOW_COVERAGE_THRESHOLD: f64 = 0.50;

#[async_trait]
impl super::Analyzer for SchemaQualityAnalyzer {
    fn objective_name(&self) -> &'static str {
        OBJECTIVE
    }

    fn estimated_api_calls(&self) -> u32 {
        1
    }

    async fn analyze(&self, ctx: &AnalyzerContext, client: &ApiClient) -> AnalyzerResult {
        let start = Instant::now();
        let parsers = match client.get_parsers(&ctx.cancel).await {
            Ok(p) => p,
            Err(e) => return failed(OBJECTIVE, start, 1, e),
        };

        let mut findings = Vec::new();
        let mut n = 0usize;

        for parser in &parsers {
            let events_total = parser.raw.get("eventsTotal").and_then(|v| v.as_f64());
            let events_errored = parser.raw.get("eventsErrored").and_then(|v| v.as_f64());
            let fields_extracted = parser.raw.get("eventsWithFields").and_then(|v| v.as_f64());

            let Some(total) = events_total.filter(|t| *t > 0.0) else { continue };

            if let Some(errored) = events_errored {
                let error_rate = errored / total;
                if error_rate > ERROR_RATE_THRESHOLD {
                    n += 1;
                    if let Ok(f) = Finding::new(
                        AnalyzerContext::finding_id(OBJECTIVE, n),
                        OBJECTIVE,
                        Severity::High,
                        "Parser has an elevated error rate",
                        format!("Parser {} fails on {:.0}% of events.", parser.id, error_rate * 100.0),
                        FindingInput { affected_components: vec![parser.id.clone()], ..Default::default() },
                    ) {
                        findings.push(f);
                    }
                }
            }

            if let Some(with_fields) = fields_extracted {
                let coverage = with_fields / total;
                if coverage < LOW_COVERAGE_THRESHOLD {
                    n += 1;
                    if let Ok(f) = Finding::new(
                        AnalyzerContext::finding_id(OBJECTIVE, n),
                        OBJECTIVE,
                        Severity::Medium,
                        "Parser has low field-extraction coverage",
                        format!("Parser {} extracts fields from only {:.0}% of events.", parser.id, coverage * 100.0),
                        FindingInput { affected_components: vec![parser.id.clone()], ..Default::default() },
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
    fn thresholds_match_spec() {
        assert_eq!(super::ERROR_RATE_THRESHOLD, 0.05);
        assert_eq!(super::LOW_COVERAGE_THRESHOLD, 0.50);
    }
}
