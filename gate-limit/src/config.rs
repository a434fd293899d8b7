use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

/// Errors raised while building or loading a [`LimiterConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `windowMs` was zero.
    #[error("windowMs must be a positive number of milliseconds")]
    ZeroWindow,

    /// `maxRequests` was zero.
    #[error("maxRequests must be a positive number of requests")]
    ZeroMaxRequests,

    /// A route pattern is not a valid glob.
    #[error("invalid route pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        source: glob::PatternError,
    },

    /// The configuration document could not be parsed.
    #[error("invalid limiter configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Limiter configuration.
///
/// Fixed for the lifetime of the [`Gate`](crate::Gate) it is handed to.
/// Option names follow the JSON form (`windowMs`, `maxRequests`,
/// `whiteListedRoutes`, `blackListedRoutes`); missing options take their
/// defaults.
///
/// Requests whose client identity cannot be determined are not failed. They
/// are all counted against a single shared [`ClientId::Unknown`] bucket.
///
/// [`ClientId::Unknown`]: crate::ClientId::Unknown
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LimiterConfig {
    /// Window duration in milliseconds.
    pub window_ms: u64,

    /// Ceiling of requests per client within one window.
    pub max_requests: u32,

    /// Route patterns exempt from limiting. Wins over `deny_list`.
    #[serde(rename = "whiteListedRoutes")]
    pub allow_list: Vec<String>,

    /// Route patterns subject to limiting.
    #[serde(rename = "blackListedRoutes")]
    pub deny_list: Vec<String>,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            window_ms: 60_000,
            max_requests: 5,
            allow_list: Vec::new(),
            deny_list: Vec::new(),
        }
    }
}

impl LimiterConfig {
    /// Parse a JSON document and validate the result.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the window duration. Sub-millisecond precision is dropped.
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window_ms = window.as_millis() as u64;
        self
    }

    /// Set the per-window ceiling.
    pub fn with_max_requests(mut self, max_requests: u32) -> Self {
        self.max_requests = max_requests;
        self
    }

    /// Append a pattern to the allow list.
    pub fn allow(mut self, pattern: impl Into<String>) -> Self {
        self.allow_list.push(pattern.into());
        self
    }

    /// Append a pattern to the deny list.
    pub fn deny(mut self, pattern: impl Into<String>) -> Self {
        self.deny_list.push(pattern.into());
        self
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Reject settings that would make the limiter meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_ms == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        if self.max_requests == 0 {
            return Err(ConfigError::ZeroMaxRequests);
        }
        Ok(())
    }
}
