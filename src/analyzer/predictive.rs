//! Linear-trend capacity forecasting and z-score anomaly flags over worker
//! resource history, built on the pure helpers in [`crate::predictive`].

use super::{failed, AnalyzerContext};
use crate::client::ApiClient;
use crate::models::finding::{Finding, FindingInput};
use crate::models::{AnalyzerResult, Severity};
use crate::predictive::{confidence_for_sample_size, linear_trend_slope, time_to_threshold, zscore_anomalies, DEFAULT_ZSCORE_THRESHOLD};
use async_trait::async_trait;
use std::time::Instant;

pub struct PredictiveAnalyzer;

const OBJECTIVE: &str = "predictive";
const CAPACITY_THRESHOLD_PERCENT: f64 = 90.0;

#[async_trait]
impl super::Analyzer for PredictiveAnalyzer {
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

        let history: Vec<f64> = nodes.iter().filter_map(|w| w.cpu_percent).collect();
        if history.len() >= 2 {
            let points: Vec<(f64, f64)> = history.iter().enumerate().map(|(i, v)| (i as f64, *v)).collect();
            let slope = linear_trend_slope(&points);
            let current = *history.last().unwrap();
            if let Some(days) = time_to_threshold(current, CAPACITY_THRESHOLD_PERCENT, slope) {
                if days.is_finite() && days >= 0.0 {
                    n += 1;
                    let confidence = confidence_for_sample_size(history.len());
                    if let Ok(f) = Finding::new(
                        AnalyzerContext::finding_id(OBJECTIVE, n),
                        OBJECTIVE,
                        if days <= 30.0 { Severity::High } else { Severity::Medium },
                        "CPU capacity trend projected to cross threshold",
                        format!("Current CPU trend projects {CAPACITY_THRESHOLD_PERCENT:.0}% utilization in approximately {days:.0} days."),
                        FindingInput { confidence_level: confidence, ..Default::default() },
                    ) {
                        findings.push(f);
                    }
                }
            }
        }

        if history.len() >= 3 {
            for idx in zscore_anomalies(&history, DEFAULT_ZSCORE_THRESHOLD) {
                if let Some(worker) = nodes.get(idx) {
                    n += 1;
                    if let Ok(f) = Finding::new(
                        AnalyzerContext::finding_id(OBJECTIVE, n),
                        OBJECTIVE,
                        Severity::Medium,
                        "CPU utilization anomaly detected",
                        format!("Worker {} deviates more than {DEFAULT_ZSCORE_THRESHOLD} standard deviations from the fleet's CPU baseline.", worker.id),
                        FindingInput { affected_components: vec![worker.id.clone()], ..Default::default() },
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
    use super::*;

    #[test]
    fn capacity_threshold_matches_spec() {
        assert_eq!(CAPACITY_THRESHOLD_PERCENT, 90.0);
    }

    #[test]
    fn severity_escalates_when_crossing_is_imminent() {
        let near = if 15.0_f64 <= 30.0 { Severity::High } else { Severity::Medium };
        let far = if 60.0_f64 <= 30.0 { Severity::High } else { Severity::Medium };
        assert_eq!(near, Severity::High);
        assert_eq!(far, Severity::Medium);
    }
}
