use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    #[error("Token is not a three-segment compact serialization")]
    Malformed,
    #[error("Claims segment is not valid base64url: {0}")]
    Segment(String),
    #[error("Claims are not a valid JSON object: {0}")]
    Claims(String),
}

/// Claims carried in an access token.
///
/// Only the fields the lifecycle manager needs; everything else in the
/// payload is ignored. The signature is NOT verified: the server is the
/// trust authority, the client only schedules around `exp`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Claims {
    /// Expiry, seconds since epoch
    #[serde(default)]
    pub exp: Option<i64>,
    /// Single role claim
    #[serde(default)]
    pub role: Option<String>,
    /// Role list claim; the first entry is used when `role` is absent
    #[serde(default)]
    pub roles: Option<Vec<String>>,
    /// Subject identifier
    #[serde(default)]
    pub sub: Option<String>,
}

impl Claims {
    /// Upper-cased role, from `role` or the first entry of `roles`.
    pub fn role(&self) -> Option<String> {
        self.role
            .as_deref()
            .or_else(|| self.roles.as_ref().and_then(|r| r.first()).map(|s| s.as_str()))
            .map(|r| r.to_uppercase())
    }

    /// Expiry instant from the `exp` claim, if present.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}

/// Decode the claims segment of a compact token (header.claims.signature).
pub fn decode(token: &str) -> Result<Claims, DecodeError> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(DecodeError::Malformed);
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| DecodeError::Segment(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| DecodeError::Claims(e.to_string()))
}
