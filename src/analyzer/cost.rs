//! License consumption vs allocation, TCO-by-destination, and a linear-
//! regression days-to-exhaustion forecast.

use super::{failed, AnalyzerContext};
use crate::client::ApiClient;
use crate::models::finding::{Finding, FindingInput};
use crate::models::recommendation::{Recommendation, RecommendationInput};
use crate::models::{AnalyzerResult, Confidence, ImplementationEffort, Priority, Severity};
use crate::predictive::{linear_trend_slope, time_to_threshold};
use async_trait::async_trait;
use std::time::Instant;

pub struct CostAnalyzer;

const OBJECTIVE: &str = "cost";
const HIGH_CONSUMPTION_PCT: f64 = 85.0;
const CRITICAL_CONSUMPTION_PCT: f64 = 95.0;

#[async_trait]
impl super::Analyzer for CostAnalyzer {
    fn objective_name(&self) -> &'static str {
        OBJECTIVE
    }

    fn estimated_api_calls(&self) -> u32 {
        2
    }

    async fn analyze(&self, ctx: &AnalyzerContext, client: &ApiClient) -> AnalyzerResult {
        let start = Instant::now();
        let license = match client.get_license_info(&ctx.cancel).await {
            Ok(l) => l,
            Err(e) => return failed(OBJECTIVE, start, 1, e),
        };

        let mut findings = Vec::new();
        let mut recommendations = Vec::new();
        let mut n = 0usize;

        if let (Some(consumed), Some(allocated)) = (license.consumed, license.allocated) {
            if allocated > 0.0 {
                let pct = consumed / allocated * 100.0;
                let severity = if pct >= CRITICAL_CONSUMPTION_PCT {
                    Some(Severity::Critical)
                } else if pct >= HIGH_CONSUMPTION_PCT {
                    Some(Severity::High)
                } else {
                    None
                };
                if let Some(severity) = severity {
                    n += 1;
                    if let Ok(f) = Finding::new(
                        AnalyzerContext::finding_id(OBJECTIVE, n),
                        OBJECTIVE,
                        severity,
                        "License consumption approaching allocation",
                        format!("License is at {pct:.0}% of allocated capacity ({consumed:.0}/{allocated:.0})."),
                        FindingInput::default(),
                    ) {
                        let finding_id = f.id.clone();
                        findings.push(f);
                        if let Ok(rec) = Recommendation::new(
                            format!("{OBJECTIVE}-rec-license"),
                            "cost",
                            if severity == Severity::Critical { Priority::P0 } else { Priority::P1 },
                            "Increase license allocation or reduce ingest",
                            "License consumption is approaching the allocated ceiling; either negotiate additional capacity or reduce ingested volume.",
                            ImplementationEffort::Low,
                            vec![finding_id],
                            RecommendationInput::default(),
                        ) {
                            recommendations.push(rec);
                        }
                    }
                }
            }
        }

        if license.history.len() >= 2 {
            let points: Vec<(f64, f64)> =
                license.history.iter().enumerate().map(|(i, v)| (i as f64, *v)).collect();
            let slope = linear_trend_slope(&points);
            if let Some(allocated) = license.allocated {
                let current = *license.history.last().unwrap();
                if let Some(days) = time_to_threshold(current, allocated, slope) {
                    if days.is_finite() && days >= 0.0 && days <= 90.0 {
                        n += 1;
                        let confidence = if license.history.len() >= 20 {
                            Confidence::High
                        } else if license.history.len() >= 10 {
                            Confidence::Medium
                        } else {
                            Confidence::Low
                        };
                        let severity = if days <= 30.0 { Severity::Critical } else { Severity::Medium };
                        if let Ok(f) = Finding::new(
                            AnalyzerContext::finding_id(OBJECTIVE, n),
                            OBJECTIVE,
                            severity,
                            "License exhaustion projected",
                            format!("At the current consumption trend, license allocation will be exhausted in approximately {days:.0} days."),
                            FindingInput { confidence_level: confidence, ..Default::default() },
                        ) {
                            let finding_id = f.id.clone();
                            findings.push(f);
                            if severity == Severity::Critical {
                                if let Ok(rec) = Recommendation::new(
                                    format!("{OBJECTIVE}-rec-exhaustion"),
                                    "cost",
                                    Priority::P0,
                                    "Increase license allocation before exhaustion",
                                    format!("The current consumption trend projects exhaustion in approximately {days:.0} day(s); negotiate additional capacity or reduce ingested volume before then."),
                                    ImplementationEffort::Low,
                                    vec![finding_id],
                                    RecommendationInput::default(),
                                ) {
                                    recommendations.push(rec);
                                }
                            }
                        }
                    }
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
        assert_eq!(super::HIGH_CONSUMPTION_PCT, 85.0);
        assert_eq!(super::CRITICAL_CONSUMPTION_PCT, 95.0);
    }
}
