/// Snapshot of the four persisted session keys.
///
/// Every field is optional: a missing or unparseable value reads back as
/// `None` rather than an error, so a half-written or corrupt store can
/// never crash a restore.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredSession {
    /// The current bearer credential
    pub access_token: Option<String>,
    /// Milliseconds since epoch after which `access_token` must not be used
    pub expires_at: Option<i64>,
    /// Milliseconds since epoch of the last establish/refresh
    pub last_activity: Option<i64>,
    /// Credential exchanged for a new access token
    pub refresh_token: Option<String>,
}

impl StoredSession {
    /// True when nothing usable is persisted (no token or no expiry).
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() || self.expires_at.is_none()
    }
}
