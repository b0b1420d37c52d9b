//! Per-destination storage volume: sampling/filtering/aggregation
//! opportunities sized against a configurable pricing table.

use super::{failed, AnalyzerContext};
use crate::client::ApiClient;
use crate::models::finding::{Finding, FindingInput};
use crate::models::recommendation::{Recommendation, RecommendationInput};
use crate::models::{AnalyzerResult, ImpactEstimate, ImplementationEffort, Priority, Severity};
use async_trait::async_trait;
use std::time::Instant;

pub struct StorageAnalyzer;

const OBJECTIVE: &str = "storage";

const SAMPLING_THRESHOLD_GB: f64 = 500.0;
const FILTERING_THRESHOLD_GB: f64 = 300.0;
const AGGREGATION_THRESHOLD_GB: f64 = 10.0;

/// USD per GB/month, used only to turn a volume estimate into a descriptive
/// `ImpactEstimate`; the engine never treats this as authoritative billing.
const PRICE_PER_GB_USD: f64 = 0.023;

#[async_trait]
impl super::Analyzer for StorageAnalyzer {
    fn objective_name(&self) -> &'static str {
        OBJECTIVE
    }

    fn estimated_api_calls(&self) -> u32 {
        1
    }

    async fn analyze(&self, ctx: &AnalyzerContext, client: &ApiClient) -> AnalyzerResult {
        let start = Instant::now();
        let outputs = match client.get_outputs(&ctx.cancel).await {
            Ok(o) => o,
            Err(e) => return failed(OBJECTIVE, start, 1, e),
        };

        let mut findings = Vec::new();
        let mut recommendations = Vec::new();
        let mut n = 0usize;

        for output in &outputs {
            let Some(volume_gb) = output.raw.get("monthlyVolumeGb").and_then(|v| v.as_f64()) else {
                continue;
            };

            let opportunity = if volume_gb >= SAMPLING_THRESHOLD_GB {
                Some(("sampling", "Apply statistical sampling to reduce ingested volume"))
            } else if volume_gb >= FILTERING_THRESHOLD_GB {
                Some(("filtering", "Filter out low-value events before this destination"))
            } else if volume_gb >= AGGREGATION_THRESHOLD_GB {
                Some(("aggregation", "Aggregate repetitive metrics before forwarding"))
            } else {
                None
            };

            let Some((kind, action)) = opportunity else { continue };
            n += 1;
            if let Ok(f) = Finding::new(
                AnalyzerContext::finding_id(OBJECTIVE, n),
                OBJECTIVE,
                Severity::Medium,
                "Storage reduction opportunity",
                format!("Output {} forwards an estimated {volume_gb:.0} GB/month, a candidate for {kind}.", output.id),
                FindingInput { affected_components: vec![output.id.clone()], ..Default::default() },
            ) {
                let finding_id = f.id.clone();
                findings.push(f);

                let estimated_reduction_gb = match kind {
                    "sampling" => volume_gb * 0.5,
                    "filtering" => volume_gb * 0.3,
                    _ => volume_gb * 0.1,
                };
                let annual_savings = estimated_reduction_gb * 12.0 * PRICE_PER_GB_USD;
                if let Ok(rec) = Recommendation::new(
                    format!("{OBJECTIVE}-rec-{n}"),
                    "cost",
                    Priority::P2,
                    format!("{action} for {}", output.id),
                    format!("{action} on output {} to reduce forwarded volume.", output.id),
                    ImplementationEffort::Medium,
                    vec![finding_id],
                    RecommendationInput {
                        impact_estimate: Some(ImpactEstimate {
                            cost_savings_annual_usd: Some(annual_savings),
                            cost_impact: Some(format!("~{estimated_reduction_gb:.0} GB/month reduction")),
                            ..Default::default()
                        }),
                        ..Default::default()
                    },
                ) {
                    recommendations.push(rec);
                }
            }
        }

        let mut result = AnalyzerResult::success(OBJECTIVE, start.elapsed(), 1, findings, recommendations);
        result.sort_findings_by_severity();
        result.sort_recommendations_by_priority();
        result
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn thresholds_match_spec() {
        assert_eq!(super::SAMPLING_THRESHOLD_GB, 500.0);
        assert_eq!(super::FILTERING_THRESHOLD_GB, 300.0);
        assert_eq!(super::AGGREGATION_THRESHOLD_GB, 10.0);
    }
}
