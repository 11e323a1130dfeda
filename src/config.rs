use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub endpoint: EndpointConfig,
    pub timing: TimingConfig,
}

#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// URL of the token refresh endpoint
    pub refresh_url: String,
}

/// Lifecycle thresholds. These are tunables, not load-bearing constants:
/// the defaults match the behavior most hosts want, but every one of them
/// may be adjusted per deployment.
#[derive(Debug, Clone)]
pub struct TimingConfig {
    /// How close to expiry user activity triggers a background refresh
    pub activity_window: Duration,
    /// Expiry horizon used when neither the refresh response nor the new
    /// token carries one
    pub default_ttl: Duration,
    /// How close to expiry `ensure_valid_access` refreshes instead of
    /// returning the cached token
    pub refresh_margin: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            activity_window: Duration::from_secs(120),
            default_ttl: Duration::from_secs(300), // 5 minutes
            refresh_margin: Duration::from_secs(30),
        }
    }
}

impl Config {
    pub fn new(refresh_url: impl Into<String>) -> Self {
        Self {
            endpoint: EndpointConfig {
                refresh_url: refresh_url.into(),
            },
            timing: TimingConfig::default(),
        }
    }

    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let refresh_url = std::env::var("SESSION_REFRESH_URL").unwrap_or_default();

        let timing = TimingConfig {
            activity_window: env_seconds("SESSION_ACTIVITY_WINDOW_SECS", 120),
            default_ttl: env_seconds("SESSION_DEFAULT_TTL_SECS", 300),
            refresh_margin: env_seconds("SESSION_REFRESH_MARGIN_SECS", 30),
        };

        let config = Config {
            endpoint: EndpointConfig { refresh_url },
            timing,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.refresh_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "SESSION_REFRESH_URL cannot be empty".to_string(),
            ));
        }

        if self.timing.activity_window < self.timing.refresh_margin {
            tracing::warn!(
                "Activity window ({:?}) is shorter than the refresh margin ({:?}). \
                 Activity-triggered refreshes will rarely run before on-demand ones.",
                self.timing.activity_window,
                self.timing.refresh_margin
            );
        }

        Ok(())
    }
}

fn env_seconds(name: &str, default: u64) -> Duration {
    let secs = std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default);
    Duration::from_secs(secs)
}
