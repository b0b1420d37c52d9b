//! Bearer header construction, including lazy OAuth token acquisition and
//! expiry-aware caching.

use crate::error::ClientError;
use crate::logging::{redact, redact_secret};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// How a client authenticates to the deployment.
#[derive(Debug, Clone)]
pub enum AuthMethod {
    Bearer(String),
    OAuth { client_id: String, client_secret: String, token_url: String },
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Refresh this long before actual expiry so a call never races a token that
/// dies mid-flight.
const REFRESH_SKEW: Duration = Duration::from_secs(30);

pub struct Authenticator {
    method: AuthMethod,
    cached: Mutex<Option<CachedToken>>,
    http: reqwest::Client,
}

impl Authenticator {
    pub fn new(method: AuthMethod, http: reqwest::Client) -> Self {
        Self { method, cached: Mutex::new(None), http }
    }

    /// Returns the current bearer token, obtaining or refreshing an OAuth
    /// token if necessary. Never logs the returned value directly.
    pub async fn bearer_token(&self) -> Result<String, ClientError> {
        match &self.method {
            AuthMethod::Bearer(token) => Ok(token.clone()),
            AuthMethod::OAuth { client_id, client_secret, token_url } => {
                if let Some(token) = self.cached_if_fresh() {
                    return Ok(token);
                }
                self.refresh(client_id, client_secret, token_url).await
            },
        }
    }

    fn cached_if_fresh(&self) -> Option<String> {
        let guard = self.cached.lock().expect("authenticator cache lock poisoned");
        guard.as_ref().filter(|c| c.expires_at > Instant::now() + REFRESH_SKEW).map(|c| c.token.clone())
    }

    async fn refresh(
        &self,
        client_id: &str,
        client_secret: &str,
        token_url: &str,
    ) -> Result<String, ClientError> {
        #[derive(serde::Deserialize)]
        struct TokenResponse {
            access_token: String,
            #[serde(default = "default_expires_in")]
            expires_in: u64,
        }
        fn default_expires_in() -> u64 {
            3600
        }

        tracing::debug!(token_url = %token_url, "authenticator: refreshing OAuth access token");

        let response = self
            .http
            .post(token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", client_id),
                ("client_secret", client_secret),
            ])
            .send()
            .await
            .map_err(|e| redact_secret(&redact(&e.to_string()), client_secret))
            .map_err(|cause| {
                tracing::warn!(token_url = %token_url, error = %cause, "authenticator: token endpoint unreachable");
                ClientError::Unreachable(cause)
            })?;

        if !response.status().is_success() {
            tracing::warn!(token_url = %token_url, status = %response.status(), "authenticator: token endpoint rejected credentials");
            return Err(ClientError::AuthError);
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| redact_secret(&redact(&e.to_string()), client_secret))
            .map_err(|cause| {
                tracing::warn!(token_url = %token_url, error = %cause, "authenticator: token response was malformed");
                ClientError::MalformedResponse { endpoint: token_url.to_string(), cause }
            })?;

        let mut guard = self.cached.lock().expect("authenticator cache lock poisoned");
        *guard = Some(CachedToken {
            token: parsed.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(parsed.expires_in),
        });
        tracing::debug!(token_url = %token_url, "authenticator: OAuth token refreshed");
        Ok(parsed.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_bearer_returns_itself() {
        let auth = Authenticator::new(AuthMethod::Bearer("tkn-abc".to_string()), reqwest::Client::new());
        assert_eq!(auth.bearer_token().await.unwrap(), "tkn-abc");
    }
}
