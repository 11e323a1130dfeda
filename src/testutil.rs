//! Shared test helpers — available to all `#[cfg(test)]` modules in the crate.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::config::Config;
use crate::storage::{MemoryStore, SharedStore};

/// Forge an unsigned compact token with the given `exp` (seconds since
/// epoch) and optional `role` claim. The signature segment is filler;
/// the manager never verifies it.
pub fn forge_token(exp: i64, role: Option<&str>) -> String {
    let mut payload = serde_json::json!({ "exp": exp, "sub": "user-1" });
    if let Some(role) = role {
        payload["role"] = serde_json::Value::String(role.to_string());
    }
    forge_token_with_payload(&payload)
}

/// Forge an unsigned compact token around an arbitrary claims payload.
pub fn forge_token_with_payload(payload: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let claims = URL_SAFE_NO_PAD.encode(payload.to_string().as_bytes());
    format!("{header}.{claims}.sig")
}

/// A fresh in-memory shared store.
pub fn memory_store() -> SharedStore {
    SharedStore::new(Arc::new(MemoryStore::new()))
}

/// A minimal `Config` pointing at a refresh endpoint that is never
/// reachable, suitable for tests that must not hit the network.
pub fn test_config() -> Config {
    Config::new("http://127.0.0.1:9/refresh")
}
