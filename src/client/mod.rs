//! Typed, product-aware, read-only HTTP client for the Cribl REST API.
//!
//! A thin `reqwest::Client` wrapper: every accessor is GET-only, routes
//! through the shared [`crate::ratelimit::RateLimiter`], and is product-aware
//! rather than cluster-topology-aware.

pub mod auth;
pub mod types;

use crate::config::TimeoutConfig;
use crate::error::ClientError;
use crate::logging::redact;
use crate::models::Product;
use crate::ratelimit::RateLimiter;
use auth::{AuthMethod, Authenticator};
use once_cell::sync::OnceCell;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use types::*;

const MAX_RETRIES: u32 = 3;

/// Shared, read-only handle every analyzer in a run holds a clone of. Cheap
/// to clone: everything mutable lives behind the `Arc`s.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

struct Inner {
    http: reqwest::Client,
    base_url: String,
    group: String,
    authenticator: Authenticator,
    rate_limiter: Arc<RateLimiter>,
    timeouts: TimeoutConfig,
    detected_product: OnceCell<(Product, Option<String>)>,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        auth: AuthMethod,
        rate_limiter: Arc<RateLimiter>,
        timeouts: TimeoutConfig,
    ) -> Result<Self, ClientError> {
        Self::with_group(base_url, "default", auth, rate_limiter, timeouts)
    }

    /// `group` is the worker group (Stream) or workspace (Search) scoping
    /// `/api/v1/m/{group}/...` calls; Cribl's default group is `"default"`.
    pub fn with_group(
        base_url: impl Into<String>,
        group: impl Into<String>,
        auth: AuthMethod,
        rate_limiter: Arc<RateLimiter>,
        timeouts: TimeoutConfig,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeouts.http_call_timeout())
            .build()
            .map_err(|e| ClientError::TlsError(redact(&e.to_string())))?;
        let authenticator = Authenticator::new(auth, http.clone());
        Ok(Self {
            inner: Arc::new(Inner {
                http,
                base_url: base_url.into().trim_end_matches('/').to_string(),
                group: group.into(),
                authenticator,
                rate_limiter,
                timeouts,
                detected_product: OnceCell::new(),
            }),
        })
    }

    pub fn is_edge(&self) -> bool {
        matches!(self.inner.detected_product.get(), Some((Product::Edge, _)))
    }

    pub fn product_type(&self) -> Option<Product> {
        self.inner.detected_product.get().map(|(p, _)| *p)
    }

    pub fn http_call_timeout(&self) -> Duration {
        self.inner.timeouts.http_call_timeout()
    }

    /// Connects, detects the product, and caches it for the client's
    /// lifetime. Required before any other call; the orchestrator calls this
    /// once at the start of a run.
    pub async fn test_connection(&self, cancel: &CancellationToken) -> Result<ConnectionInfo, ClientError> {
        let start = Instant::now();

        #[derive(serde::Deserialize)]
        struct VersionResponse {
            version: String,
            #[serde(default)]
            product: Option<String>,
        }

        let version: VersionResponse = self.get_required("/api/v1/version", cancel).await?;
        let product = match version.product.as_deref() {
            Some(p) => p.parse::<Product>().unwrap_or(Product::Stream),
            None => self.probe_product(cancel).await,
        };
        let _ = self.inner.detected_product.set((product, Some(version.version.clone())));

        Ok(ConnectionInfo {
            version: version.version,
            product: Some(product.as_str().to_string()),
            response_time: start.elapsed(),
        })
    }

    async fn probe_product(&self, cancel: &CancellationToken) -> Product {
        if self.get_optional::<serde_json::Value>("/api/v1/edge/fleets", cancel).await.ok().flatten().is_some()
        {
            return Product::Edge;
        }
        if self
            .get_optional::<serde_json::Value>("/api/v1/products/lake/lakes", cancel)
            .await
            .ok()
            .flatten()
            .is_some()
        {
            return Product::Lake;
        }
        Product::Stream
    }

    pub async fn get_workers(&self, cancel: &CancellationToken) -> Result<Vec<Worker>, ClientError> {
        let raw: Vec<serde_json::Value> = self.get_required("/api/v1/master/workers", cancel).await?;
        Ok(raw.into_iter().map(normalize_stream_worker).collect())
    }

    pub async fn get_edge_nodes(&self, cancel: &CancellationToken) -> Result<Vec<Worker>, ClientError> {
        let raw: Vec<serde_json::Value> = self.get_required("/api/v1/edge/nodes", cancel).await?;
        Ok(raw.into_iter().map(normalize_edge_node).collect())
    }

    /// Routes to [`ApiClient::get_edge_nodes`] or [`ApiClient::get_workers`]
    /// by detected product. Panics if called before [`ApiClient::test_connection`]
    /// — a programmer error, not a runtime condition.
    pub async fn get_nodes(&self, cancel: &CancellationToken) -> Result<Vec<Worker>, ClientError> {
        match self.product_type().expect("test_connection must run before get_nodes") {
            Product::Edge => self.get_edge_nodes(cancel).await,
            _ => self.get_workers(cancel).await,
        }
    }

    fn group_scope(&self) -> &str {
        &self.inner.group
    }

    pub async fn get_pipelines(&self, cancel: &CancellationToken) -> Result<Vec<Pipeline>, ClientError> {
        self.get_group_entities("pipelines", cancel).await
    }
    pub async fn get_routes(&self, cancel: &CancellationToken) -> Result<Vec<Route>, ClientError> {
        self.get_group_entities("routes", cancel).await
    }
    pub async fn get_inputs(&self, cancel: &CancellationToken) -> Result<Vec<Input>, ClientError> {
        self.get_group_entities("inputs", cancel).await
    }
    pub async fn get_outputs(&self, cancel: &CancellationToken) -> Result<Vec<Output>, ClientError> {
        self.get_group_entities("outputs", cancel).await
    }
    pub async fn get_lookups(&self, cancel: &CancellationToken) -> Result<Vec<Lookup>, ClientError> {
        self.get_group_entities("lookups", cancel).await
    }
    pub async fn get_parsers(&self, cancel: &CancellationToken) -> Result<Vec<Parser>, ClientError> {
        self.get_group_entities("parsers", cancel).await
    }

    async fn get_group_entities<T: DeserializeOwned>(
        &self,
        kind: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<T>, ClientError> {
        let path = format!("/api/v1/m/{}/{}", self.group_scope(), kind);
        self.get_required(&path, cancel).await
    }

    pub async fn get_system_status(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<SystemStatus>, ClientError> {
        self.get_optional("/api/v1/system/status", cancel).await
    }

    pub async fn get_health(&self, cancel: &CancellationToken) -> Result<HealthStatus, ClientError> {
        self.get_required("/api/v1/health", cancel).await
    }

    pub async fn get_metrics(&self, cancel: &CancellationToken) -> Result<Option<Metrics>, ClientError> {
        self.get_optional("/api/v1/metrics", cancel).await
    }

    pub async fn get_license_info(&self, cancel: &CancellationToken) -> Result<LicenseInfo, ClientError> {
        self.get_required("/api/v1/system/limits", cancel).await
    }

    pub async fn get_lake_datasets(
        &self,
        lake: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<LakeDataset>, ClientError> {
        let path = format!("/api/v1/products/lake/lakes/{}/datasets", urlencoding::encode(lake));
        self.get_required(&path, cancel).await
    }

    pub async fn get_lakehouses(
        &self,
        lake: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Lakehouse>, ClientError> {
        let path = format!("/api/v1/products/lake/lakes/{}/lakehouses", urlencoding::encode(lake));
        self.get_required(&path, cancel).await
    }

    pub async fn get_dataset_stats(
        &self,
        lake: &str,
        dataset_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<DatasetStats>, ClientError> {
        let path = format!(
            "/api/v1/products/lake/lakes/{}/datasets/{}/stats",
            urlencoding::encode(lake),
            urlencoding::encode(dataset_id)
        );
        self.get_optional(&path, cancel).await
    }

    pub async fn get_search_jobs(
        &self,
        workspace: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchJob>, ClientError> {
        self.get_search_entities(workspace, "jobs", cancel).await
    }
    pub async fn get_search_datasets(
        &self,
        workspace: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchDataset>, ClientError> {
        self.get_search_entities(workspace, "datasets", cancel).await
    }
    pub async fn get_dashboards(
        &self,
        workspace: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Dashboard>, ClientError> {
        self.get_search_entities(workspace, "dashboards", cancel).await
    }
    pub async fn get_saved_searches(
        &self,
        workspace: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<SavedSearch>, ClientError> {
        self.get_search_entities(workspace, "saved-searches", cancel).await
    }

    async fn get_search_entities<T: DeserializeOwned>(
        &self,
        workspace: &str,
        kind: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<T>, ClientError> {
        let path = format!("/api/v1/m/{}/search/{}", urlencoding::encode(workspace), kind);
        self.get_required(&path, cancel).await
    }

    /// A required endpoint: a 404 is an `EndpointMissing` error, not a
    /// sentinel — callers expect this data to exist.
    async fn get_required<T: DeserializeOwned>(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> Result<T, ClientError> {
        match self.get_raw(path, cancel).await {
            Err(RawError::NotFound) => Err(ClientError::EndpointMissing(path.to_string())),
            other => other.map_err(Into::into).and_then(|body| parse(path, &body)),
        }
    }

    /// An optional endpoint: a 404 resolves to `Ok(None)`, matching the
    /// `NotAvailable` sentinel — the caller continues rather than fails.
    async fn get_optional<T: DeserializeOwned>(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<T>, ClientError> {
        match self.get_raw(path, cancel).await {
            // `None` here is the `NotAvailable` sentinel of §4.2: a 404 on an
            // endpoint the caller already expects might not exist.
            Err(RawError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
            Ok(body) => parse(path, &body).map(Some),
        }
    }

    async fn get_raw(&self, path: &str, cancel: &CancellationToken) -> Result<String, RawError> {
        let url = format!("{}{}", self.inner.base_url, path);

        for attempt in 0..=MAX_RETRIES {
            self.inner.rate_limiter.acquire(cancel).await.map_err(|_| ClientError::BudgetExhausted)?;

            let token = self.inner.authenticator.bearer_token().await?;
            let request = self.inner.http.get(&url).bearer_auth(token);

            let response = tokio::select! {
                result = request.send() => result,
                _ = cancel.cancelled() => return Err(RawError::Client(ClientError::Timeout(path.to_string()))),
            };

            match response {
                Ok(resp) if resp.status() == reqwest::StatusCode::NOT_FOUND => return Err(RawError::NotFound),
                Ok(resp) if resp.status() == reqwest::StatusCode::UNAUTHORIZED
                    || resp.status() == reqwest::StatusCode::FORBIDDEN =>
                {
                    return Err(RawError::Client(ClientError::AuthError));
                },
                Ok(resp) if resp.status().is_client_error() => {
                    return Err(RawError::Client(ClientError::MalformedResponse {
                        endpoint: path.to_string(),
                        cause: format!("status {}", resp.status()),
                    }));
                },
                Ok(resp) if resp.status().is_server_error() || resp.status().as_u16() == 429 => {
                    if attempt == MAX_RETRIES {
                        return Err(RawError::Client(ClientError::RetryExhausted {
                            endpoint: path.to_string(),
                            cause: format!("status {}", resp.status()),
                        }));
                    }
                    self.sleep_backoff(attempt, cancel).await?;
                    continue;
                },
                Ok(resp) => {
                    return resp
                        .text()
                        .await
                        .map_err(|e| RawError::Client(ClientError::MalformedResponse {
                            endpoint: path.to_string(),
                            cause: redact(&e.to_string()),
                        }));
                },
                Err(e) if e.is_timeout() => {
                    if attempt == MAX_RETRIES {
                        return Err(RawError::Client(ClientError::Timeout(path.to_string())));
                    }
                    self.sleep_backoff(attempt, cancel).await?;
                    continue;
                },
                Err(e) if e.is_connect() => return Err(RawError::Client(ClientError::Unreachable(redact(&e.to_string())))),
                Err(e) => {
                    if attempt == MAX_RETRIES {
                        return Err(RawError::Client(ClientError::RetryExhausted {
                            endpoint: path.to_string(),
                            cause: redact(&e.to_string()),
                        }));
                    }
                    self.sleep_backoff(attempt, cancel).await?;
                },
            }
        }
        unreachable!("loop always returns by the final retry attempt")
    }

    async fn sleep_backoff(&self, attempt: u32, cancel: &CancellationToken) -> Result<(), RawError> {
        let duration = self.inner.rate_limiter.backoff(attempt);
        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = cancel.cancelled() => Err(RawError::Client(ClientError::Timeout("cancelled during backoff".to_string()))),
        }
    }
}

enum RawError {
    NotFound,
    Client(ClientError),
}

impl From<ClientError> for RawError {
    fn from(e: ClientError) -> Self {
        RawError::Client(e)
    }
}

impl From<RawError> for ClientError {
    fn from(e: RawError) -> Self {
        match e {
            RawError::NotFound => ClientError::EndpointMissing("unexpected 404".to_string()),
            RawError::Client(c) => c,
        }
    }
}

fn parse<T: DeserializeOwned>(path: &str, body: &str) -> Result<T, ClientError> {
    serde_json::from_str(body).map_err(|e| ClientError::MalformedResponse {
        endpoint: path.to_string(),
        cause: e.to_string(),
    })
}

fn normalize_stream_worker(value: serde_json::Value) -> Worker {
    let status = match value.get("status").and_then(|s| s.as_str()) {
        Some("healthy") => WorkerStatus::Healthy,
        Some("unhealthy") => WorkerStatus::Unhealthy,
        _ => WorkerStatus::Unknown,
    };
    Worker {
        id: field_str(&value, "id").unwrap_or_default(),
        hostname: field_str(&value, "hostname"),
        status,
        group: field_str(&value, "group"),
        last_msg_time_millis: value.get("lastMsgTime").and_then(|v| v.as_i64()),
        cpu_percent: field_f64(&value, "cpuPercent"),
        memory_percent: field_f64(&value, "memoryPercent"),
        disk_percent: field_f64(&value, "diskPercent"),
        process_count: value.get("processCount").and_then(|v| v.as_u64()).map(|n| n as u32),
        raw: value,
    }
}

/// `status: connected → healthy, disconnected → unhealthy`; `fleet → group`;
/// `lastSeen` ISO-8601 → `lastMsgTime` milliseconds since epoch.
fn normalize_edge_node(value: serde_json::Value) -> Worker {
    let status = match value.get("status").and_then(|s| s.as_str()) {
        Some("connected") => WorkerStatus::Healthy,
        Some("disconnected") => WorkerStatus::Unhealthy,
        _ => WorkerStatus::Unknown,
    };
    let last_msg_time_millis = field_str(&value, "lastSeen")
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.timestamp_millis());

    Worker {
        id: field_str(&value, "id").unwrap_or_default(),
        hostname: field_str(&value, "hostname"),
        status,
        group: field_str(&value, "fleet"),
        last_msg_time_millis,
        cpu_percent: field_f64(&value, "cpuPercent"),
        memory_percent: field_f64(&value, "memoryPercent"),
        disk_percent: field_f64(&value, "diskPercent"),
        process_count: value.get("processCount").and_then(|v| v.as_u64()).map(|n| n as u32),
        raw: value,
    }
}

fn field_str(value: &serde_json::Value, key: &str) -> Option<String> {
    value.get(key).and_then(|v| v.as_str()).map(str::to_string)
}
fn field_f64(value: &serde_json::Value, key: &str) -> Option<f64> {
    value.get(key).and_then(|v| v.as_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_node_normalizes_connected_and_fleet() {
        let raw = serde_json::json!({
            "id": "node-1",
            "status": "connected",
            "fleet": "us-east",
            "lastSeen": "2026-01-01T00:00:00Z",
        });
        let worker = normalize_edge_node(raw);
        assert_eq!(worker.status, WorkerStatus::Healthy);
        assert_eq!(worker.group.as_deref(), Some("us-east"));
        assert!(worker.last_msg_time_millis.is_some());
    }

    #[test]
    fn edge_node_normalizes_disconnected() {
        let raw = serde_json::json!({"id": "node-2", "status": "disconnected"});
        assert_eq!(normalize_edge_node(raw).status, WorkerStatus::Unhealthy);
    }

    #[test]
    fn duration_is_never_zero_negative() {
        let start = Instant::now();
        assert!(start.elapsed() >= Duration::ZERO);
    }
}
