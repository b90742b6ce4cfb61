//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (PJHQ_CACHE_*)
//! 2. TOML config file (if PJHQ_CACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::policy::{DEFAULT_RUNTIME_PATTERNS, PolicyKind};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (PJHQ_CACHE_*)
/// 2. TOML config file (if PJHQ_CACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite cache database.
    ///
    /// Set via PJHQ_CACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// The controller's own origin; root-relative manifest entries resolve against it.
    ///
    /// Set via PJHQ_CACHE_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Prefix of every cache generation name.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Version tag of the current generation. Changing it invalidates all prior content.
    ///
    /// Set via PJHQ_CACHE_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Eligibility policy: `pattern` or `exact_match`.
    #[serde(default)]
    pub policy: PolicyKind,

    /// Regexes consulted by the pattern policy.
    #[serde(default = "default_runtime_patterns")]
    pub runtime_patterns: Vec<String>,

    /// Manifest entries containing any of these substrings are skipped at install.
    #[serde(default = "default_install_exclude")]
    pub install_exclude: Vec<String>,

    /// Optional TOML manifest replacing the built-in one.
    #[serde(default)]
    pub manifest_path: Option<PathBuf>,

    /// Named page sections used by page preloading (everything else is `home`).
    #[serde(default = "default_preload_sections")]
    pub preload_sections: Vec<String>,

    /// Delay before a page preloads its sibling page, in milliseconds.
    #[serde(default = "default_preload_delay_ms")]
    pub preload_delay_ms: u64,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via PJHQ_CACHE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via PJHQ_CACHE_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via PJHQ_CACHE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Page-to-controller reply timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Maximum concurrent fetches in one batch population.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Capacity of the controller message inbox.
    #[serde(default = "default_inbox_capacity")]
    pub inbox_capacity: usize,

    /// Whether a finished install activates without waiting for older pages.
    #[serde(default = "default_true")]
    pub skip_waiting: bool,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./pjhq-cache.sqlite")
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_cache_prefix() -> String {
    "pjhq-cache".into()
}

fn default_cache_version() -> String {
    "v3".into()
}

fn default_runtime_patterns() -> Vec<String> {
    DEFAULT_RUNTIME_PATTERNS.iter().map(|p| p.to_string()).collect()
}

fn default_install_exclude() -> Vec<String> {
    vec!["cache-messaging.js".into()]
}

fn default_preload_sections() -> Vec<String> {
    vec!["about".into()]
}

fn default_preload_delay_ms() -> u64 {
    2_000
}

fn default_user_agent() -> String {
    "pjhq-cache/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_max_concurrency() -> usize {
    8
}

fn default_inbox_capacity() -> usize {
    64
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            origin: default_origin(),
            cache_prefix: default_cache_prefix(),
            cache_version: default_cache_version(),
            policy: PolicyKind::default(),
            runtime_patterns: default_runtime_patterns(),
            install_exclude: default_install_exclude(),
            manifest_path: None,
            preload_sections: default_preload_sections(),
            preload_delay_ms: default_preload_delay_ms(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            max_concurrency: default_max_concurrency(),
            inbox_capacity: default_inbox_capacity(),
            skip_waiting: true,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Reply timeout applied to every page-to-controller call.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Preload delay as Duration.
    pub fn preload_delay(&self) -> Duration {
        Duration::from_millis(self.preload_delay_ms)
    }

    /// Name of the current cache generation, e.g. `pjhq-cache-v3`.
    pub fn cache_name(&self) -> String {
        format!("{}-{}", self.cache_prefix, self.cache_version)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `PJHQ_CACHE_`
    /// 2. TOML file from `PJHQ_CACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("PJHQ_CACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("PJHQ_CACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./pjhq-cache.sqlite"));
        assert_eq!(config.origin, "http://localhost:8080");
        assert_eq!(config.user_agent, "pjhq-cache/0.1");
        assert_eq!(config.max_bytes, 5_242_880);
        assert_eq!(config.timeout_ms, 20_000);
        assert_eq!(config.policy, PolicyKind::ExactMatch);
        assert_eq!(config.install_exclude, vec!["cache-messaging.js".to_string()]);
        assert!(config.manifest_path.is_none());
        assert!(config.skip_waiting);
    }

    #[test]
    fn test_cache_name() {
        let config = AppConfig::default();
        assert_eq!(config.cache_name(), "pjhq-cache-v3");
    }

    #[test]
    fn test_durations() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
        assert_eq!(config.request_timeout(), Duration::from_millis(30_000));
        assert_eq!(config.preload_delay(), Duration::from_secs(2));
    }

    #[test]
    fn test_load_layers_file_and_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "cache.toml",
                r#"
                cache_version = "v9"
                policy = "pattern"
                origin = "https://pjhq.example"
                "#,
            )?;
            jail.set_env("PJHQ_CACHE_CONFIG_FILE", "cache.toml");
            jail.set_env("PJHQ_CACHE_MAX_CONCURRENCY", "3");

            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.cache_name(), "pjhq-cache-v9");
            assert_eq!(config.policy, PolicyKind::Pattern);
            assert_eq!(config.origin, "https://pjhq.example");
            assert_eq!(config.max_concurrency, 3);
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_invalid_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("PJHQ_CACHE_MAX_CONCURRENCY", "0");
            let result = AppConfig::load();
            assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "max_concurrency"));
            Ok(())
        });
    }
}
