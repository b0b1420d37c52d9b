//! Lake dataset/lakehouse inventory sanity.

use super::{failed, AnalyzerContext};
use crate::client::ApiClient;
use crate::models::finding::{Finding, FindingInput};
use crate::models::{AnalyzerResult, Confidence, Product, Severity};
use async_trait::async_trait;
use std::time::Instant;

pub struct LakeAnalyzer;

const OBJECTIVE: &str = "lake";
const DEFAULT_LAKE: &str = "default";
const STALE_WRITE_DAYS: i64 = 30;

/// Upper bound on per-dataset stats calls so a large lake can't blow the
/// analyzer's declared API budget.
const MAX_DATASETS_CHECKED: usize = 20;

#[async_trait]
impl super::Analyzer for LakeAnalyzer {
    fn objective_name(&self) -> &'static str {
        OBJECTIVE
    }

    fn supported_products(&self) -> &'static [Product] {
        &[Product::Lake]
    }

    /// 2 inventory calls plus up to [`MAX_DATASETS_CHECKED`] per-dataset
    /// stats calls.
    fn estimated_api_calls(&self) -> u32 {
        2 + MAX_DATASETS_CHECKED as u32
    }

    async fn analyze(&self, ctx: &AnalyzerContext, client: &ApiClient) -> AnalyzerResult {
        let start = Instant::now();
        let mut api_calls = 0u32;

        let datasets = match client.get_lake_datasets(DEFAULT_LAKE, &ctx.cancel).await {
            Ok(d) => {
                api_calls += 1;
                d
            },
            Err(e) => return failed(OBJECTIVE, start, api_calls, e),
        };
        let lakehouses = match client.get_lakehouses(DEFAULT_LAKE, &ctx.cancel).await {
            Ok(l) => {
                api_calls += 1;
                l
            },
            Err(e) => return failed(OBJECTIVE, start, api_calls, e),
        };

        let mut findings = Vec::new();
        let mut n = 0usize;

        for lakehouse in &lakehouses {
            let dataset_count =
                lakehouse.raw.get("datasetCount").and_then(|v| v.as_u64()).unwrap_or(0);
            if dataset_count == 0 {
                n += 1;
                if let Ok(f) = Finding::new(
                    AnalyzerContext::finding_id(OBJECTIVE, n),
                    OBJECTIVE,
                    Severity::Low,
                    "Empty lakehouse",
                    format!("Lakehouse {} has no datasets.", lakehouse.id),
                    FindingInput { affected_components: vec![lakehouse.id.clone()], ..Default::default() },
                ) {
                    findings.push(f);
                }
            }
        }

        if datasets.len() > MAX_DATASETS_CHECKED {
            tracing::debug!(
                total = datasets.len(),
                checked = MAX_DATASETS_CHECKED,
                "lake: skipping stats for datasets beyond the per-run cap"
            );
        }

        let now = chrono::Utc::now();
        for dataset in datasets.iter().take(MAX_DATASETS_CHECKED) {
            api_calls += 1;
            match client.get_dataset_stats(DEFAULT_LAKE, &dataset.id, &ctx.cancel).await {
                Ok(Some(stats)) => {
                    if let Some(last_write) = stats.last_write_millis {
                        let last_write = chrono::DateTime::from_timestamp_millis(last_write).unwrap_or(now);
                        let age_days = (now - last_write).num_days();
                        if age_days > STALE_WRITE_DAYS {
                            n += 1;
                            if let Ok(f) = Finding::new(
                                AnalyzerContext::finding_id(OBJECTIVE, n),
                                OBJECTIVE,
                                Severity::Low,
                                "Dataset has no recent writes",
                                format!("Dataset {} has not been written to in {age_days} days.", dataset.id),
                                FindingInput { affected_components: vec![dataset.id.clone()], ..Default::default() },
                            ) {
                                findings.push(f);
                            }
                        }
                    }
                },
                Ok(None) => {
                    n += 1;
                    if let Ok(f) = Finding::new(
                        AnalyzerContext::finding_id(OBJECTIVE, n),
                        OBJECTIVE,
                        Severity::Low,
                        "Dataset statistics unavailable",
                        format!("Statistics for dataset {} are not available from this deployment.", dataset.id),
                        FindingInput {
                            affected_components: vec![dataset.id.clone()],
                            confidence_level: Confidence::Low,
                            ..Default::default()
                        },
                    ) {
                        findings.push(f);
                    }
                },
                Err(_) => {},
            }
        }

        let mut result = AnalyzerResult::success(OBJECTIVE, start.elapsed(), api_calls, findings, Vec::new());
        result.sort_findings_by_severity();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::super::Analyzer;
    use super::*;

    #[test]
    fn stale_write_threshold_matches_spec() {
        assert_eq!(STALE_WRITE_DAYS, 30);
    }

    #[test]
    fn dataset_cap_bounds_api_calls() {
        assert!(MAX_DATASETS_CHECKED > 0);
        assert_eq!(MAX_DATASETS_CHECKED as u32 + 2, LakeAnalyzer.estimated_api_calls());
    }
}
