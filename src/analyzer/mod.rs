//! The pluggable analyzer contract and its process-wide registry.
//!
//! A `#[async_trait]` interface implemented by one type per concern, looked
//! up by name from a single process-wide table rather than switched on an
//! enum, so adding an objective never touches the orchestrator.

pub mod backpressure;
pub mod config;
pub mod cost;
pub mod dataflow_topology;
pub mod fleet;
pub mod health;
pub mod lake;
pub mod lookup_health;
pub mod pipeline_performance;
pub mod predictive;
pub mod resource;
pub mod schema_quality;
pub mod search;
pub mod security;
pub mod storage;

use crate::client::ApiClient;
use crate::models::{AnalyzerResult, Product};
use async_trait::async_trait;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use tokio_util::sync::CancellationToken;

/// Per-run, per-analyzer execution context. Cheap to clone; every field is
/// either an `Arc` or `Copy`.
#[derive(Clone)]
pub struct AnalyzerContext {
    pub cancel: CancellationToken,
    pub deployment_id: String,
    pub product: Product,
}

impl AnalyzerContext {
    /// A `{objective}-{n}` id, stable within a single `analyze()` call
    /// because callers pass a monotonically increasing `n`.
    pub fn finding_id(objective: &str, n: usize) -> String {
        format!("{objective}-{n}")
    }
}

/// A failed analyzer invocation, timed from `start`. Shared by every
/// analyzer's error path so the `metadata.error` shape is consistent.
pub fn failed(
    objective: &str,
    start: std::time::Instant,
    api_calls_used: u32,
    error: impl std::fmt::Display,
) -> AnalyzerResult {
    AnalyzerResult::failure(objective, start.elapsed(), api_calls_used, error.to_string())
}

/// One pluggable health-assessment objective.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Unique, lowercase objective name, e.g. `"health"` or `"security"`.
    fn objective_name(&self) -> &'static str;

    /// Products this analyzer applies to; empty means all four.
    fn supported_products(&self) -> &'static [Product] {
        &[]
    }

    /// Upper bound on API calls this analyzer will make, used by the
    /// orchestrator's admission check.
    fn estimated_api_calls(&self) -> u32;

    /// Opaque, informational scope strings (not enforced by this core).
    fn required_permissions(&self) -> &'static [&'static str] {
        &[]
    }

    /// Runs the check. Must honor `ctx.cancel` between API calls and at each
    /// major step; must never propagate a panic (the orchestrator wraps this
    /// in `JoinHandle::await` but an analyzer author shouldn't rely on that
    /// as its only safety net). Errors are folded into the returned result's
    /// `success=false` + `metadata.error` rather than returned directly, so
    /// the trait's return type carries no `Result`.
    async fn analyze(&self, ctx: &AnalyzerContext, client: &ApiClient) -> AnalyzerResult;
}

type Factory = Box<dyn Fn() -> Box<dyn Analyzer> + Send + Sync>;

static REGISTRY: Lazy<DashMap<&'static str, Factory>> = Lazy::new(DashMap::new);

/// Registers every analyzer this core ships. Idempotent: re-registering the
/// same name overwrites the previous factory rather than erroring, so tests
/// can call this freely.
pub fn register_default_analyzers() {
    register("health", || Box::new(health::HealthAnalyzer));
    register("config", || Box::new(config::ConfigAnalyzer));
    register("resource", || Box::new(resource::ResourceAnalyzer));
    register("storage", || Box::new(storage::StorageAnalyzer));
    register("security", || Box::new(security::SecurityAnalyzer));
    register("cost", || Box::new(cost::CostAnalyzer));
    register("fleet", || Box::new(fleet::FleetAnalyzer));
    register("predictive", || Box::new(predictive::PredictiveAnalyzer));
    register("lake", || Box::new(lake::LakeAnalyzer));
    register("search", || Box::new(search::SearchAnalyzer));
    register("backpressure", || Box::new(backpressure::BackpressureAnalyzer));
    register("pipeline_performance", || Box::new(pipeline_performance::PipelinePerformanceAnalyzer));
    register("lookup_health", || Box::new(lookup_health::LookupHealthAnalyzer));
    register("schema_quality", || Box::new(schema_quality::SchemaQualityAnalyzer));
    register("dataflow_topology", || Box::new(dataflow_topology::DataflowTopologyAnalyzer));
}

fn register(name: &'static str, factory: impl Fn() -> Box<dyn Analyzer> + Send + Sync + 'static) {
    REGISTRY.insert(name, Box::new(factory));
}

/// Deterministic, alphabetically-sorted view of every registered objective.
pub fn list_objectives() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = REGISTRY.iter().map(|entry| *entry.key()).collect();
    names.sort_unstable();
    names
}

/// Looks up an objective by name. Unknown names fail loudly, per the
/// registry contract — callers are expected to validate against
/// [`list_objectives`] before requesting a run.
pub fn create(objective: &str) -> Option<Box<dyn Analyzer>> {
    REGISTRY.get(objective).map(|factory| factory())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registration_lists_all_fifteen_alphabetically() {
        register_default_analyzers();
        let objectives = list_objectives();
        assert_eq!(objectives.len(), 15);
        let mut sorted = objectives.clone();
        sorted.sort_unstable();
        assert_eq!(objectives, sorted);
    }

    #[test]
    fn unknown_objective_returns_none() {
        register_default_analyzers();
        assert!(create("no-such-objective").is_none());
    }

    #[test]
    fn known_objective_constructs_an_analyzer() {
        register_default_analyzers();
        let analyzer = create("health").unwrap();
        assert_eq!(analyzer.objective_name(), "health");
    }
}
