//! Scheduling, budget enforcement, cancellation, and partial-failure
//! aggregation of analyzer runs into a single [`AnalysisRun`].
//!
//! Tracing spans wrap each spawned task and cooperative shutdown runs through
//! a cancellation token, the same idiom as a periodic task runner. Fanning
//! work out to more than one concurrent task needs more than that idiom
//! alone provides, so scheduling itself is a semaphore-bounded pool feeding
//! a bounded `mpsc` channel, with a `JoinSet` collecting results as analyzers
//! complete.

use crate::analyzer::{self, AnalyzerContext};
use crate::client::auth::AuthMethod;
use crate::client::ApiClient;
use crate::config::Config;
use crate::error::OrchestratorError;
use crate::models::{AnalysisRun, AnalyzerResult, Product, RunStatus};
use crate::ratelimit::RateLimiter;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// One step of a run's progress, for an optional observer (TUI/WebSocket
/// surfaces outside this core).
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    AnalyzerStarted { objective: String },
    AnalyzerCompleted { objective: String, success: bool },
    FindingEmitted { objective: String, severity: crate::models::Severity, title: String },
    RunCompleted { run_id: uuid::Uuid },
    RunFailed { run_id: uuid::Uuid, reason: String },
}

/// What to run: a deployment endpoint, how to authenticate to it, and which
/// objectives to evaluate (empty means every registered objective).
pub struct RunRequest {
    pub deployment_id: String,
    pub base_url: String,
    pub auth: AuthMethod,
    pub objectives: Vec<String>,
}

/// Schedules the requested analyzers against one deployment and assembles
/// the resulting [`AnalysisRun`]. Never returns `Err`: fatal failures are
/// folded into a `failed` run per the external contract (`run_analysis`
/// returns an artifact, not a `Result`) — `Err` is reserved for failures a
/// caller might want to branch on before accounting ever starts.
pub async fn run(
    request: RunRequest,
    config: &Config,
    progress: Option<mpsc::Sender<ProgressEvent>>,
) -> AnalysisRun {
    run_cancellable(request, config, progress, CancellationToken::new()).await
}

pub async fn run_cancellable(
    request: RunRequest,
    config: &Config,
    progress: Option<mpsc::Sender<ProgressEvent>>,
    cancel: CancellationToken,
) -> AnalysisRun {
    let run_id = uuid::Uuid::new_v4();
    let started_at = chrono::Utc::now();
    let run_start = Instant::now();

    let objectives_requested = if request.objectives.is_empty() {
        analyzer::list_objectives().into_iter().map(str::to_string).collect()
    } else {
        request.objectives.clone()
    };

    let analyzers: Vec<(String, Box<dyn analyzer::Analyzer>)> = match resolve_analyzers(&objectives_requested) {
        Ok(a) => a,
        Err(e) => {
            tracing::error!(run_id = %run_id, error = %e, "orchestrator: objective resolution failed");
            emit(&progress, ProgressEvent::RunFailed { run_id, reason: e.to_string() }).await;
            return failed_run(run_id, request.deployment_id, started_at, objectives_requested, config, 0);
        },
    };

    let estimated_total: u32 = analyzers.iter().map(|(_, a)| a.estimated_api_calls()).sum();
    let admissible_budget = config.budget.api_calls_budget.saturating_sub(1);
    if estimated_total > admissible_budget {
        let e = OrchestratorError::BudgetAdmissionFailed { requested: estimated_total, budget: admissible_budget };
        tracing::error!(run_id = %run_id, error = %e, "orchestrator: admission check failed");
        emit(&progress, ProgressEvent::RunFailed { run_id, reason: e.to_string() }).await;
        return failed_run(run_id, request.deployment_id, started_at, objectives_requested, config, 0);
    }

    let rate_limiter = Arc::new(RateLimiter::new(&config.rate_limit, config.budget.api_calls_budget));
    let client = match ApiClient::new(request.base_url.clone(), request.auth, rate_limiter.clone(), config.timeouts.clone()) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(run_id = %run_id, error = %e, "orchestrator: client construction failed");
            emit(&progress, ProgressEvent::RunFailed { run_id, reason: e.to_string() }).await;
            return failed_run(run_id, request.deployment_id, started_at, objectives_requested, config, 0);
        },
    };

    let product_version = match client.test_connection(&cancel).await {
        Ok(c) => Some(c.version),
        Err(e) if e.is_fatal_for_run() => {
            tracing::error!(run_id = %run_id, error = %e, "orchestrator: initial connection failed");
            emit(&progress, ProgressEvent::RunFailed { run_id, reason: e.to_string() }).await;
            let used = rate_limiter.used();
            return failed_run(run_id, request.deployment_id, started_at, objectives_requested, config, used);
        },
        Err(e) => {
            tracing::warn!(run_id = %run_id, error = %e, "orchestrator: test_connection degraded, proceeding");
            None
        },
    };
    let product = client.product_type().unwrap_or(Product::Stream);

    let run_cancel = cancel.child_token();
    let wall_clock_timeout = config.budget.wall_clock_budget();
    let analyzer_timeout = config.timeouts.analyzer_timeout();
    let semaphore = Arc::new(Semaphore::new(config.budget.max_parallel_analyzers.max(1)));
    let (tx, mut rx) = mpsc::channel::<(String, AnalyzerResult)>(analyzers.len().max(1));

    let mut join_set: JoinSet<()> = JoinSet::new();
    for (objective, analyzer) in analyzers {
        let ctx = AnalyzerContext { cancel: run_cancel.clone(), deployment_id: request.deployment_id.clone(), product };
        let client = client.clone();
        let permit = semaphore.clone();
        let tx = tx.clone();
        let progress = progress.clone();
        let rate_limiter = rate_limiter.clone();
        join_set.spawn(async move {
            let _permit = match permit.acquire_owned().await {
                Ok(p) => p,
                Err(_) => return,
            };
            // The budget may have been fully spent by sibling analyzers
            // while this one waited for a semaphore slot; in that case it
            // never gets to attempt a single call, which is distinct from
            // running out partway through (see `ClientError::BudgetExhausted`).
            if rate_limiter.remaining() == 0 {
                let result = AnalyzerResult::failure(objective.clone(), Duration::ZERO, 0, "budget_exhausted_pre_run");
                emit(&progress, ProgressEvent::AnalyzerCompleted { objective: objective.clone(), success: false }).await;
                let _ = tx.send((objective, result)).await;
                return;
            }
            emit(&progress, ProgressEvent::AnalyzerStarted { objective: objective.clone() }).await;
            let start = Instant::now();
            let result = tokio::select! {
                r = tokio::time::timeout(analyzer_timeout, analyzer.analyze(&ctx, &client)) => {
                    match r {
                        Ok(result) => result,
                        Err(_) => AnalyzerResult::failure(objective.clone(), start.elapsed(), 0, "analyzer timed out"),
                    }
                }
                _ = ctx.cancel.cancelled() => {
                    AnalyzerResult::failure(objective.clone(), start.elapsed(), 0, "run cancelled")
                }
            };
            for finding in &result.findings {
                emit(
                    &progress,
                    ProgressEvent::FindingEmitted {
                        objective: objective.clone(),
                        severity: finding.severity,
                        title: finding.title.clone(),
                    },
                )
                .await;
            }
            emit(&progress, ProgressEvent::AnalyzerCompleted { objective: objective.clone(), success: result.success })
                .await;
            let _ = tx.send((objective, result)).await;
        });
    }
    drop(tx);

    let deadline = tokio::time::Instant::now() + wall_clock_timeout;
    let mut results: BTreeMap<String, AnalyzerResult> = BTreeMap::new();
    loop {
        tokio::select! {
            received = rx.recv() => {
                match received {
                    Some((objective, result)) => { results.insert(objective, result); },
                    None => break,
                }
            },
            _ = tokio::time::sleep_until(deadline) => {
                tracing::warn!(run_id = %run_id, "orchestrator: wall-clock budget exhausted, cancelling remaining analyzers");
                run_cancel.cancel();
                break;
            },
        }
    }

    run_cancel.cancel();
    let grace = std::time::Duration::from_secs(2);
    let _ = tokio::time::timeout(grace, async {
        while join_set.join_next().await.is_some() {}
    })
    .await;
    join_set.abort_all();

    let objectives_completed: Vec<String> =
        objectives_requested.iter().filter(|o| results.get(*o).map(|r| r.success).unwrap_or(false)).cloned().collect();
    let objectives_failed: Vec<String> =
        objectives_requested.iter().filter(|o| !objectives_completed.contains(o)).cloned().collect();

    let status = if objectives_failed.is_empty() && !objectives_completed.is_empty() {
        RunStatus::Completed
    } else if !objectives_completed.is_empty() {
        RunStatus::Partial
    } else {
        RunStatus::Failed
    };

    let api_calls_used: u32 = results.values().map(|r| r.api_calls_used).sum::<u32>() + 1;

    let mut run = AnalysisRun {
        run_id,
        deployment_id: request.deployment_id,
        product_type: product,
        product_version,
        started_at,
        completed_at: Some(chrono::Utc::now()),
        status,
        objectives_requested,
        objectives_completed,
        objectives_failed,
        results,
        health_score: 0,
        api_calls_used: api_calls_used.min(config.budget.api_calls_budget),
        api_calls_budget: config.budget.api_calls_budget,
        duration_seconds: run_start.elapsed().as_secs_f64(),
    };
    run.health_score = crate::scoring::score(&run);

    match status {
        RunStatus::Failed => emit(&progress, ProgressEvent::RunFailed { run_id, reason: "no objective completed".into() }).await,
        _ => emit(&progress, ProgressEvent::RunCompleted { run_id }).await,
    }

    run
}

fn resolve_analyzers(objectives: &[String]) -> Result<Vec<(String, Box<dyn analyzer::Analyzer>)>, OrchestratorError> {
    objectives
        .iter()
        .map(|name| {
            analyzer::create(name)
                .map(|a| (name.clone(), a))
                .ok_or_else(|| OrchestratorError::UnknownObjective(name.clone()))
        })
        .collect()
}

fn failed_run(
    run_id: uuid::Uuid,
    deployment_id: String,
    started_at: chrono::DateTime<chrono::Utc>,
    objectives_requested: Vec<String>,
    config: &Config,
    api_calls_used: u32,
) -> AnalysisRun {
    AnalysisRun {
        run_id,
        deployment_id,
        product_type: Product::Stream,
        product_version: None,
        started_at,
        completed_at: Some(chrono::Utc::now()),
        status: RunStatus::Failed,
        objectives_requested,
        objectives_completed: Vec::new(),
        objectives_failed: Vec::new(),
        results: BTreeMap::new(),
        health_score: 0,
        api_calls_used: api_calls_used.min(config.budget.api_calls_budget),
        api_calls_budget: config.budget.api_calls_budget,
        duration_seconds: 0.0,
    }
}

async fn emit(sender: &Option<mpsc::Sender<ProgressEvent>>, event: ProgressEvent) {
    if let Some(sender) = sender {
        let _ = sender.send(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_objective_is_rejected() {
        analyzer::register_default_analyzers();
        let err = match resolve_analyzers(&["no-such-objective".to_string()]) {
            Ok(_) => panic!("expected an error"),
            Err(err) => err,
        };
        assert!(matches!(err, OrchestratorError::UnknownObjective(_)));
    }

    #[test]
    fn known_objectives_resolve() {
        analyzer::register_default_analyzers();
        let resolved = resolve_analyzers(&["health".to_string(), "security".to_string()]).unwrap();
        assert_eq!(resolved.len(), 2);
    }

    #[tokio::test]
    async fn admission_failure_produces_a_failed_run_without_network_access() {
        analyzer::register_default_analyzers();
        let mut config = Config::default();
        config.budget.api_calls_budget = 1;
        let request = RunRequest {
            deployment_id: "dep-1".into(),
            base_url: "https://example.invalid".into(),
            auth: AuthMethod::Bearer("test-token".into()),
            objectives: vec!["health".into(), "config".into(), "resource".into()],
        };
        let run = run(request, &config, None).await;
        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.results.is_empty());
    }
}
