//! HTTP client for the token refresh endpoint.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::tokens::{claims, TokenBundle};

/// Refresh failures are cloned into every caller attached to the shared
/// in-flight operation, so the error carries strings rather than the
/// non-cloneable transport error.
#[derive(Debug, Clone, Error)]
pub enum RefreshError {
    #[error("Refresh endpoint returned status {status}")]
    Status { status: u16 },
    #[error("Refresh transport error: {0}")]
    Transport(String),
    #[error("Refresh response contained no usable access token")]
    MissingToken,
    #[error("New access token could not be decoded: {0}")]
    Decode(#[from] claims::DecodeError),
    #[error("Session ended while the refresh was in flight")]
    Superseded,
}

/// What a successful refresh produced.
#[derive(Debug, Clone)]
pub struct RefreshGrant {
    pub access_token: String,
    /// Explicit expiry from the response body, when the endpoint sent one
    pub expires_at: Option<DateTime<Utc>>,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<&'a str>,
}

/// Client for the refresh endpoint.
///
/// No request timeout beyond the transport default: a hung refresh call
/// simply means its callers do not resolve until it settles.
#[derive(Clone)]
pub struct RefreshClient {
    http: reqwest::Client,
    refresh_url: String,
}

impl RefreshClient {
    pub fn new(refresh_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            refresh_url: refresh_url.into(),
        }
    }

    /// Exchange the refresh token (when present) for a new grant.
    pub async fn refresh(&self, refresh_token: Option<&str>) -> Result<RefreshGrant, RefreshError> {
        tracing::debug!(url = %self.refresh_url, "Calling refresh endpoint");

        let response = self
            .http
            .post(&self.refresh_url)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = %status, "Refresh endpoint rejected the request");
            return Err(RefreshError::Status {
                status: status.as_u16(),
            });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;

        let bundle = TokenBundle::from_value(&payload).ok_or(RefreshError::MissingToken)?;
        let expires_at = explicit_expiry(&payload);

        Ok(RefreshGrant {
            access_token: bundle.access_token,
            expires_at,
            refresh_token: bundle.refresh_token,
        })
    }
}

/// Explicit expiry carried in a refresh response: `expires_at` in
/// milliseconds since epoch, or `expires_in` in seconds from now.
fn explicit_expiry(payload: &Value) -> Option<DateTime<Utc>> {
    if let Some(ms) = payload.get("expires_at").and_then(Value::as_i64) {
        return DateTime::from_timestamp_millis(ms);
    }
    payload
        .get("expires_in")
        .and_then(Value::as_i64)
        .map(|secs| Utc::now() + ChronoDuration::seconds(secs))
}

/// Resolve the expiry of a fresh grant: explicit instant from the
/// response, then the token's own `exp` claim, then `default_ttl`.
pub fn resolve_expiry(
    grant: &RefreshGrant,
    token_claims: &claims::Claims,
    default_ttl: std::time::Duration,
) -> DateTime<Utc> {
    grant
        .expires_at
        .or_else(|| token_claims.expires_at())
        .unwrap_or_else(|| {
            Utc::now() + ChronoDuration::from_std(default_ttl).unwrap_or(ChronoDuration::zero())
        })
}
