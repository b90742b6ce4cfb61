//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` or `request_timeout_ms` is below 100ms or above 5 minutes
    /// - `user_agent`, `cache_prefix` or `cache_version` is empty
    /// - `origin` is not an absolute http(s) URL
    /// - a runtime pattern fails to compile
    /// - `max_concurrency` or `inbox_capacity` is out of range
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
        }

        for (field, value) in [("timeout_ms", self.timeout_ms), ("request_timeout_ms", self.request_timeout_ms)] {
            if value < 100 {
                return Err(ConfigError::Invalid { field: field.into(), reason: "must be at least 100ms".into() });
            }
            if value > 300_000 {
                return Err(ConfigError::Invalid {
                    field: field.into(),
                    reason: "must not exceed 5 minutes (300000ms)".into(),
                });
            }
        }

        for (field, value) in [
            ("user_agent", &self.user_agent),
            ("cache_prefix", &self.cache_prefix),
            ("cache_version", &self.cache_version),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid { field: field.into(), reason: "must not be empty".into() });
            }
        }

        match url::Url::parse(&self.origin) {
            Ok(origin) if matches!(origin.scheme(), "http" | "https") && origin.host_str().is_some() => {}
            Ok(_) => {
                return Err(ConfigError::Invalid {
                    field: "origin".into(),
                    reason: "must be an http(s) URL with a host".into(),
                });
            }
            Err(e) => return Err(ConfigError::Invalid { field: "origin".into(), reason: e.to_string() }),
        }

        for pattern in &self.runtime_patterns {
            if let Err(e) = regex::Regex::new(pattern) {
                return Err(ConfigError::Invalid { field: "runtime_patterns".into(), reason: e.to_string() });
            }
        }

        if self.max_concurrency == 0 || self.max_concurrency > 64 {
            return Err(ConfigError::Invalid { field: "max_concurrency".into(), reason: "must be 1-64".into() });
        }

        if self.inbox_capacity == 0 {
            return Err(ConfigError::Invalid { field: "inbox_capacity".into(), reason: "must be greater than 0".into() });
        }

        if self.runtime_patterns.is_empty() && self.policy == crate::policy::PolicyKind::Pattern {
            tracing::warn!("pattern policy configured with no runtime_patterns; only same-origin reads are served");
        }

        Ok(())
    }
}
