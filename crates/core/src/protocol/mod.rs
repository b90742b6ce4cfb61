//! Page-to-controller message protocol.
//!
//! On the wire every message is `{ "type": ..., "data": {...} }`. Inbound
//! payloads are validated once at the boundary ([`ControllerMessage::from_raw`])
//! and handled as a closed enum from then on.

pub mod events;
pub mod replies;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::Error;

pub use events::{CacheErrorKind, CacheErrorRecord, ControllerEvent, EventKind};
pub use replies::{
    CachePathCoverage, CachePathsReply, CacheResourcesReply, CacheStats, CheckCacheReply, Reply, TypeBreakdown,
};

/// Untyped message as it arrives from a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Deserialize)]
struct CacheResourcesData {
    urls: Vec<String>,
    #[serde(default = "default_reason")]
    reason: String,
}

#[derive(Debug, Deserialize)]
struct CheckCacheData {
    url: String,
}

fn default_reason() -> String {
    "manual".into()
}

/// Every message a page can send to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerMessage {
    /// Fetch and store a set of URLs.
    CacheResources { urls: Vec<String>, reason: String },
    /// Ask whether a URL has an entry in the current generation.
    CheckCache { url: String },
    /// Aggregate statistics over the current generation.
    GetStats,
    /// Leave the install-pending state now. Never answered.
    SkipWaiting,
    /// The flattened manifest.
    ListCachePaths,
}

impl ControllerMessage {
    pub const CACHE_RESOURCES: &'static str = "CACHE_RESOURCES";
    pub const CHECK_CACHE: &'static str = "CHECK_CACHE";
    pub const GET_STATS: &'static str = "GET_STATS";
    pub const SKIP_WAITING: &'static str = "SKIP_WAITING";
    pub const LIST_CACHE_PATHS: &'static str = "LIST_CACHE_PATHS";

    /// Validate an untyped message.
    ///
    /// Returns `Ok(None)` for unknown types, which are ignored rather than
    /// rejected, and `Err(InvalidMessage)` when a known type carries bad data.
    pub fn from_raw(raw: RawMessage) -> Result<Option<Self>, Error> {
        let message = match raw.kind.as_str() {
            Self::CACHE_RESOURCES => {
                let data: CacheResourcesData = decode(&raw.kind, raw.data)?;
                Self::CacheResources { urls: data.urls, reason: data.reason }
            }
            Self::CHECK_CACHE => {
                let data: CheckCacheData = decode(&raw.kind, raw.data)?;
                Self::CheckCache { url: data.url }
            }
            Self::GET_STATS => Self::GetStats,
            Self::SKIP_WAITING => Self::SkipWaiting,
            Self::LIST_CACHE_PATHS => Self::ListCachePaths,
            other => {
                tracing::debug!(kind = %other, "ignoring unrecognized message type");
                return Ok(None);
            }
        };
        Ok(Some(message))
    }

    /// Parse and validate a JSON message.
    pub fn from_json(input: &str) -> Result<Option<Self>, Error> {
        let raw: RawMessage = serde_json::from_str(input).map_err(|e| Error::InvalidMessage(e.to_string()))?;
        Self::from_raw(raw)
    }

    /// Wire type tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CacheResources { .. } => Self::CACHE_RESOURCES,
            Self::CheckCache { .. } => Self::CHECK_CACHE,
            Self::GetStats => Self::GET_STATS,
            Self::SkipWaiting => Self::SKIP_WAITING,
            Self::ListCachePaths => Self::LIST_CACHE_PATHS,
        }
    }

    /// Whether the controller answers this message on a reply channel.
    pub fn expects_reply(&self) -> bool {
        !matches!(self, Self::SkipWaiting)
    }

    pub fn to_raw(&self) -> RawMessage {
        let data = match self {
            Self::CacheResources { urls, reason } => json!({ "urls": urls, "reason": reason }),
            Self::CheckCache { url } => json!({ "url": url }),
            Self::GetStats | Self::SkipWaiting | Self::ListCachePaths => json!({}),
        };
        RawMessage { kind: self.kind().to_string(), data }
    }
}

fn decode<T: serde::de::DeserializeOwned>(kind: &str, data: Value) -> Result<T, Error> {
    serde_json::from_value(data).map_err(|e| Error::InvalidMessage(format!("{kind}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cache_resources() {
        let message = ControllerMessage::from_json(
            r#"{"type":"CACHE_RESOURCES","data":{"urls":["/a.css","/b.js"],"reason":"preload_about"}}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(
            message,
            ControllerMessage::CacheResources {
                urls: vec!["/a.css".into(), "/b.js".into()],
                reason: "preload_about".into()
            }
        );
    }

    #[test]
    fn test_reason_defaults_to_manual() {
        let message = ControllerMessage::from_json(r#"{"type":"CACHE_RESOURCES","data":{"urls":[]}}"#)
            .unwrap()
            .unwrap();
        assert!(matches!(message, ControllerMessage::CacheResources { reason, .. } if reason == "manual"));
    }

    #[test]
    fn test_data_optional_for_unit_messages() {
        let message = ControllerMessage::from_json(r#"{"type":"GET_STATS"}"#).unwrap();
        assert_eq!(message, Some(ControllerMessage::GetStats));
    }

    #[test]
    fn test_unknown_type_ignored() {
        let message = ControllerMessage::from_json(r#"{"type":"CACHE_RESOURCE","data":{}}"#).unwrap();
        assert!(message.is_none());
    }

    #[test]
    fn test_missing_field_rejected() {
        let result = ControllerMessage::from_json(r#"{"type":"CHECK_CACHE","data":{}}"#);
        assert!(matches!(result, Err(Error::InvalidMessage(msg)) if msg.starts_with("CHECK_CACHE")));
    }

    #[test]
    fn test_not_json_rejected() {
        assert!(matches!(ControllerMessage::from_json("nope"), Err(Error::InvalidMessage(_))));
    }

    #[test]
    fn test_raw_roundtrip_keeps_kind() {
        let message = ControllerMessage::CheckCache { url: "/a.css".into() };
        let raw = message.to_raw();
        assert_eq!(raw.kind, "CHECK_CACHE");
        assert_eq!(ControllerMessage::from_raw(raw).unwrap(), Some(message));
        assert!(!ControllerMessage::SkipWaiting.expects_reply());
    }
}
