//! Controller-to-page broadcast events.

use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Event pushed from the controller to every controlled page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ControllerEvent {
    SwLog { message: String, timestamp: i64 },
    SwReady { version: String },
    CacheUpdated { url: String },
    CacheError(CacheErrorRecord),
}

impl ControllerEvent {
    pub fn log(message: impl Into<String>) -> Self {
        Self::SwLog { message: message.into(), timestamp: now_millis() }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::SwLog { .. } => EventKind::SwLog,
            Self::SwReady { .. } => EventKind::SwReady,
            Self::CacheUpdated { .. } => EventKind::CacheUpdated,
            Self::CacheError(_) => EventKind::CacheError,
        }
    }
}

/// Event type tag, used as the subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    SwLog,
    SwReady,
    CacheUpdated,
    CacheError,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SwLog => "sw-log",
            Self::SwReady => "sw-ready",
            Self::CacheUpdated => "cache-updated",
            Self::CacheError => "cache-error",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a per-URL cache failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheErrorKind {
    /// The server answered with a status other than 200.
    #[serde(rename = "non-200-response")]
    Non200Response,
    /// The fetch failed outright.
    #[serde(rename = "network-error")]
    NetworkError,
    /// The fetch succeeded but storing the copy failed.
    #[serde(rename = "cache-write-error")]
    CacheWriteError,
}

impl CacheErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Non200Response => "non-200-response",
            Self::NetworkError => "network-error",
            Self::CacheWriteError => "cache-write-error",
        }
    }
}

/// Structured record of one failed URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheErrorRecord {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: CacheErrorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: i64,
}

impl CacheErrorRecord {
    pub fn non_200(url: impl Into<String>, status: u16, status_text: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: CacheErrorKind::Non200Response,
            status: Some(status),
            status_text: Some(status_text.into()),
            error: None,
            timestamp: now_millis(),
        }
    }

    pub fn network(url: impl Into<String>, error: impl ToString) -> Self {
        Self::failure(url, CacheErrorKind::NetworkError, error)
    }

    pub fn cache_write(url: impl Into<String>, error: impl ToString) -> Self {
        Self::failure(url, CacheErrorKind::CacheWriteError, error)
    }

    fn failure(url: impl Into<String>, kind: CacheErrorKind, error: impl ToString) -> Self {
        Self {
            url: url.into(),
            kind,
            status: None,
            status_text: None,
            error: Some(error.to_string()),
            timestamp: now_millis(),
        }
    }

    /// Human-readable log line.
    pub fn message(&self) -> String {
        match self.kind {
            CacheErrorKind::Non200Response => format!(
                "Failed to cache: {} - HTTP {} {}",
                self.url,
                self.status.unwrap_or_default(),
                self.status_text.as_deref().unwrap_or("")
            ),
            CacheErrorKind::NetworkError | CacheErrorKind::CacheWriteError => {
                format!("Failed to cache: {} - {}", self.url, self.error.as_deref().unwrap_or("unknown error"))
            }
        }
    }
}
