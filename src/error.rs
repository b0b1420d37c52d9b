//! Typed error taxonomy, one `thiserror` enum per subsystem boundary, per
//! the kinds enumerated in the error-handling design rather than exposing
//! exceptions across analyzer boundaries.

use thiserror::Error;

/// Errors surfaced by the API client. These map 1:1 onto the failure model:
/// transport/DNS/TLS are recoverable at the call site but fatal at initial
/// connect; auth and budget errors are always fatal for the run.
#[derive(Debug, Error, Clone)]
pub enum ClientError {
    #[error("unreachable: {0}")]
    Unreachable(String),
    #[error("tls error: {0}")]
    TlsError(String),
    #[error("authentication failed")]
    AuthError,
    #[error("required endpoint missing: {0}")]
    EndpointMissing(String),
    #[error("retries exhausted calling {endpoint}: {cause}")]
    RetryExhausted { endpoint: String, cause: String },
    #[error("malformed response from {endpoint}: {cause}")]
    MalformedResponse { endpoint: String, cause: String },
    /// Display is the exact machine-readable string the engine's external
    /// contract requires in `AnalyzerResult.metadata.error` for a mid-run
    /// exhaustion, not a human-readable sentence; see
    /// `"budget_exhausted_pre_run"` in the orchestrator for the sibling case
    /// where the analyzer never got to attempt a call at all.
    #[error("budget_exhausted")]
    BudgetExhausted,
    #[error("request timed out calling {0}")]
    Timeout(String),
}

impl ClientError {
    /// True for errors that should abort the whole run rather than just the
    /// calling analyzer (see orchestrator fatal-vs-recoverable policy).
    pub fn is_fatal_for_run(&self) -> bool {
        matches!(self, ClientError::AuthError | ClientError::Unreachable(_))
    }
}

/// Sentinel, not an error: a 404 on an endpoint the analyzer treats as
/// optional (e.g. `/api/v1/metrics` on Cribl Cloud). Callers match this
/// explicitly rather than propagating it through `?`.
#[derive(Debug, Clone)]
pub struct NotAvailable(pub String);

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("no credential profile named {0}")]
    NotFound(String),
    #[error("credential store is corrupt: {0}")]
    Corrupt(String),
    #[error("failed to read credential store: {0}")]
    Io(#[from] std::io::Error),
    #[error("encryption failure: {0}")]
    Crypto(String),
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("admission check failed: requested {requested} calls exceeds budget of {budget} (reserving 1 for test_connection)")]
    BudgetAdmissionFailed { requested: u32, budget: u32 },
    #[error("unknown objective: {0}")]
    UnknownObjective(String),
    #[error("initial connection failed: {0}")]
    ConnectFailed(#[from] ClientError),
}
