/// Access token: the current bearer credential (opaque string)
pub const ACCESS_TOKEN: &str = "session.access_token";

/// Refresh token: exchanged for a new access token; may be absent
pub const REFRESH_TOKEN: &str = "session.refresh_token";

/// Expiry instant: milliseconds since epoch, decimal string
pub const EXPIRES_AT: &str = "session.expires_at";

/// Last-activity marker: milliseconds since epoch, written on
/// establish/refresh only (change detection, never expiry math)
pub const LAST_ACTIVITY: &str = "session.last_activity";

/// All persisted keys, in write order
pub const ALL_KEYS: [&str; 4] = [ACCESS_TOKEN, REFRESH_TOKEN, EXPIRES_AT, LAST_ACTIVITY];
