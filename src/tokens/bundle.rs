use serde_json::Value;

/// Access-token field names accepted from issuing endpoints, checked in
/// order; the first non-empty match wins.
pub const ACCESS_TOKEN_ALIASES: [&str; 5] =
    ["access_token", "accessToken", "token", "jwt", "id_token"];

/// Refresh-token field names accepted from issuing endpoints.
pub const REFRESH_TOKEN_ALIASES: [&str; 2] = ["refresh_token", "refreshToken"];

/// Canonical token bundle handed to `login`.
///
/// Login endpoints disagree on field naming; [`TokenBundle::from_value`]
/// normalizes any of the recognized shapes into this one.
#[derive(Debug, Clone)]
pub struct TokenBundle {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl TokenBundle {
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
        }
    }

    /// Normalize a raw endpoint payload. Returns `None` when no recognized
    /// access-token field is present (or it is empty).
    pub fn from_value(payload: &Value) -> Option<Self> {
        let access_token = first_string(payload, &ACCESS_TOKEN_ALIASES)?;
        let refresh_token = first_string(payload, &REFRESH_TOKEN_ALIASES);
        Some(Self {
            access_token,
            refresh_token,
        })
    }
}

fn first_string(payload: &Value, aliases: &[&str]) -> Option<String> {
    aliases
        .iter()
        .filter_map(|key| payload.get(*key))
        .filter_map(Value::as_str)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}
