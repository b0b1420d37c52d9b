//! Read-only health-assessment engine for Cribl Stream/Edge/Lake/Search
//! deployments: a rate-limited API client, a pluggable analyzer framework,
//! an orchestrator that schedules analyzers under shared budgets, a
//! deterministic health scorer, and JSON/Markdown report emitters.

pub mod analyzer;
pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod predictive;
pub mod ratelimit;
pub mod report;
pub mod scoring;

pub use client::auth::AuthMethod;
pub use config::Config;
pub use models::{AnalysisRun, AnalyzerResult, Finding, Recommendation};
pub use orchestrator::{ProgressEvent, RunRequest};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Registers the engine's fifteen built-in analyzers. Safe to call more than
/// once (registration is idempotent); every consumer of this crate must call
/// it before its first run, since the registry starts empty.
pub fn register_default_analyzers() {
    analyzer::register_default_analyzers();
}

/// Runs every requested objective against one deployment and returns the
/// finished artifact. Never panics or propagates a transport error: fatal
/// failures are folded into a `failed` `AnalysisRun` per the engine's
/// external contract.
pub async fn run_analysis(request: RunRequest, config: &Config) -> AnalysisRun {
    orchestrator::run(request, config, None).await
}

/// Like [`run_analysis`], but also streams [`ProgressEvent`]s to the
/// returned receiver as analyzers start and finish, for a TUI/WebSocket
/// surface outside this core to render.
pub async fn run_analysis_stream(
    request: RunRequest,
    config: &Config,
) -> (mpsc::Receiver<ProgressEvent>, tokio::task::JoinHandle<AnalysisRun>) {
    let (tx, rx) = mpsc::channel(32);
    let config = config.clone();
    let handle = tokio::spawn(async move { orchestrator::run(request, &config, Some(tx)).await });
    (rx, handle)
}

/// Like [`run_analysis`], but cancellable from outside — dropping or
/// cancelling `cancel` unwinds every in-flight analyzer within the run's
/// cooperative cancellation grace period.
pub async fn run_analysis_cancellable(
    request: RunRequest,
    config: &Config,
    cancel: CancellationToken,
) -> AnalysisRun {
    orchestrator::run_cancellable(request, config, None, cancel).await
}
