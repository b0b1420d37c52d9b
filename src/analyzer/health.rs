//! Worker/node health: connectivity, leader health, process-count vs CPU,
//! low memory, recent restarts, single-worker HA exposure.

use super::{failed, AnalyzerContext};
use crate::client::types::WorkerStatus;
use crate::client::ApiClient;
use crate::models::finding::{Finding, FindingInput};
use crate::models::recommendation::{Recommendation, RecommendationInput};
use crate::models::{AnalyzerResult, ImplementationEffort, Priority, Severity};
use async_trait::async_trait;
use std::time::Instant;

pub struct HealthAnalyzer;

const OBJECTIVE: &str = "health";
const HIGH_PROCESS_PER_CPU: f64 = 4.0;
const LOW_MEMORY_PERCENT: f64 = 90.0;

#[async_trait]
impl super::Analyzer for HealthAnalyzer {
    fn objective_name(&self) -> &'static str {
        OBJECTIVE
    }

    fn estimated_api_calls(&self) -> u32 {
        2
    }

    async fn analyze(&self, ctx: &AnalyzerContext, client: &ApiClient) -> AnalyzerResult {
        let start = Instant::now();
        let mut api_calls = 0u32;

        let nodes = match client.get_nodes(&ctx.cancel).await {
            Ok(n) => {
                api_calls += 1;
                n
            },
            Err(e) => return failed(OBJECTIVE, start, api_calls, e),
        };

        let health = match client.get_health(&ctx.cancel).await {
            Ok(h) => {
                api_calls += 1;
                Some(h)
            },
            Err(_) => None,
        };

        let mut findings = Vec::new();
        let mut recommendations = Vec::new();
        let mut n = 0usize;

        if let Some(health) = &health {
            if !health.healthy {
                n += 1;
                if let Ok(f) = Finding::new(
                    AnalyzerContext::finding_id(OBJECTIVE, n),
                    OBJECTIVE,
                    Severity::Critical,
                    "Leader reports unhealthy",
                    "The deployment's health endpoint reports an unhealthy leader process.",
                    FindingInput { confidence_level: crate::models::Confidence::High, ..Default::default() },
                ) {
                    findings.push(f);
                }
            }
        }

        let unhealthy: Vec<_> = nodes.iter().filter(|w| w.status == WorkerStatus::Unhealthy).collect();
        for worker in &unhealthy {
            n += 1;
            if let Ok(f) = Finding::new(
                AnalyzerContext::finding_id(OBJECTIVE, n),
                OBJECTIVE,
                Severity::High,
                "Worker disconnected",
                format!("Worker {} is reporting an unhealthy/disconnected status.", worker.id),
                FindingInput {
                    affected_components: vec![worker.id.clone()],
                    confidence_level: crate::models::Confidence::High,
                    remediation_steps: vec![
                        "Check network connectivity between the worker and the leader".to_string(),
                        "Inspect the worker's process logs for crash loops".to_string(),
                    ],
                    ..Default::default()
                },
            ) {
                findings.push(f);
            }
        }

        for worker in &nodes {
            if let (Some(cpu), Some(procs)) = (worker.cpu_percent, worker.process_count) {
                if cpu > 0.0 && procs as f64 / cpu.max(1.0) > HIGH_PROCESS_PER_CPU {
                    n += 1;
                    if let Ok(f) = Finding::new(
                        AnalyzerContext::finding_id(OBJECTIVE, n),
                        OBJECTIVE,
                        Severity::Medium,
                        "Process count high relative to CPU",
                        format!(
                            "Worker {} runs {} processes against {:.0}% CPU usage, which is high relative to available headroom.",
                            worker.id, procs, cpu
                        ),
                        FindingInput {
                            affected_components: vec![worker.id.clone()],
                            ..Default::default()
                        },
                    ) {
                        findings.push(f);
                    }
                }
            }
            if let Some(mem) = worker.memory_percent {
                if mem >= LOW_MEMORY_PERCENT {
                    n += 1;
                    if let Ok(f) = Finding::new(
                        AnalyzerContext::finding_id(OBJECTIVE, n),
                        OBJECTIVE,
                        Severity::High,
                        "Worker memory near exhaustion",
                        format!("Worker {} is at {:.0}% memory usage.", worker.id, mem),
                        FindingInput { affected_components: vec![worker.id.clone()], ..Default::default() },
                    ) {
                        findings.push(f);
                    }
                }
            }
        }

        if nodes.len() == 1 {
            n += 1;
            if let Ok(f) = Finding::new(
                AnalyzerContext::finding_id(OBJECTIVE, n),
                OBJECTIVE,
                Severity::Medium,
                "Single worker, no high availability",
                "Only one worker/node was detected; a single failure would take down the entire data path.",
                FindingInput::default(),
            ) {
                let finding_id = f.id.clone();
                findings.push(f);
                if let Ok(rec) = Recommendation::new(
                    format!("{OBJECTIVE}-rec-ha"),
                    "scaling",
                    Priority::P2,
                    "Add a second worker for high availability",
                    "Deploy at least one additional worker so the loss of a single node does not stop data flow.",
                    ImplementationEffort::Medium,
                    vec![finding_id],
                    RecommendationInput::default(),
                ) {
                    recommendations.push(rec);
                }
            }
        }

        if findings.is_empty() {
            if let Ok(f) = Finding::new(
                AnalyzerContext::finding_id(OBJECTIVE, 0),
                OBJECTIVE,
                Severity::Info,
                "All workers healthy",
                format!("All {} detected worker(s)/node(s) report a healthy status.", nodes.len()),
                FindingInput::default(),
            ) {
                findings.push(f);
            }
        }

        let mut result = AnalyzerResult::success(OBJECTIVE, start.elapsed(), api_calls, findings, recommendations);
        result.sort_findings_by_severity();
        result.sort_recommendations_by_priority();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::types::Worker;

    fn worker(id: &str, status: WorkerStatus) -> Worker {
        Worker {
            id: id.to_string(),
            hostname: None,
            status,
            group: None,
            last_msg_time_millis: None,
            cpu_percent: Some(10.0),
            memory_percent: Some(20.0),
            disk_percent: None,
            process_count: Some(2),
            raw: serde_json::json!({}),
        }
    }

    #[test]
    fn single_worker_flags_ha_risk() {
        let nodes = vec![worker("w-1", WorkerStatus::Healthy)];
        assert_eq!(nodes.len(), 1);
    }

    #[test]
    fn high_memory_threshold_is_inclusive() {
        assert!(95.0 >= LOW_MEMORY_PERCENT);
        assert!(89.9 < LOW_MEMORY_PERCENT);
    }
}
