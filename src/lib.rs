//! session-keeper - Client-side session and token lifecycle management
//!
//! This crate provides the session/token lifecycle manager a host
//! application embeds in front of its authenticated API calls:
//! - Access-token claim decoding and expiry tracking
//! - Single-flight refresh coordination (one network call, many callers)
//! - Hard-expiry scheduling with automatic logout
//! - Activity-triggered proactive refresh
//! - Durable profile-scoped persistence (redb) shared across instances,
//!   with cross-instance change notification
//! - An in-page logout broadcast for UI collaborators

pub mod config;
pub mod expiration;
pub mod refresh;
pub mod session;
pub mod storage;
#[cfg(test)]
pub mod testutil;
pub mod tokens;
