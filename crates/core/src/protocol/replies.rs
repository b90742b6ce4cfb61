//! Reply payloads sent back over a call's one-shot reply channel.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Result of a `CACHE_RESOURCES` batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CacheResourcesReply {
    /// Always true once the batch settles, even if every URL failed.
    pub success: bool,
    pub cached: usize,
    pub failed: usize,
    /// URLs dropped before fetching because they are not manifest entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filtered: Option<usize>,
    /// URLs attempted; `cached + failed == total`.
    pub total: usize,
}

/// Result of a `CHECK_CACHE` lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckCacheReply {
    pub url: String,
    pub cached: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_cache_paths: Option<bool>,
}

/// Entry counts grouped by file extension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TypeBreakdown {
    pub html: usize,
    pub css: usize,
    pub js: usize,
    pub images: usize,
    pub other: usize,
}

impl TypeBreakdown {
    /// Count one cached URL. Matches on the end of the full URL, query included.
    pub fn record(&mut self, url: &str) {
        let lower = url.to_ascii_lowercase();
        if lower.ends_with(".html") {
            self.html += 1;
        } else if lower.ends_with(".css") {
            self.css += 1;
        } else if lower.ends_with(".js") {
            self.js += 1;
        } else if [".png", ".jpg", ".jpeg", ".gif", ".svg"].iter().any(|ext| lower.ends_with(ext)) {
            self.images += 1;
        } else {
            self.other += 1;
        }
    }

    pub fn sum(&self) -> usize {
        self.html + self.css + self.js + self.images + self.other
    }
}

/// Manifest coverage, reported under the exact-match policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CachePathCoverage {
    pub defined: usize,
    pub cached: usize,
}

/// Result of `GET_STATS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub total: usize,
    pub by_type: TypeBreakdown,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_paths: Option<CachePathCoverage>,
    pub sample_urls: Vec<String>,
}

/// Result of `LIST_CACHE_PATHS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CachePathsReply {
    pub paths: Vec<String>,
    pub count: usize,
}

/// Any reply the controller can send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    CacheResources(CacheResourcesReply),
    CheckCache(CheckCacheReply),
    Stats(CacheStats),
    CachePaths(CachePathsReply),
    Error { error: String },
}

impl Reply {
    pub fn error(err: &Error) -> Self {
        Self::Error { error: err.to_string() }
    }

    /// Turn a controller-reported error into `Err`, pass anything else through.
    pub fn into_result(self) -> Result<Self, Error> {
        match self {
            Self::Error { error } => Err(Error::Controller(error)),
            reply => Ok(reply),
        }
    }

    pub fn into_cache_resources(self) -> Result<CacheResourcesReply, Error> {
        match self.into_result()? {
            Self::CacheResources(reply) => Ok(reply),
            _ => Err(Error::UnexpectedReply { expected: "CACHE_RESOURCES" }),
        }
    }

    pub fn into_check_cache(self) -> Result<CheckCacheReply, Error> {
        match self.into_result()? {
            Self::CheckCache(reply) => Ok(reply),
            _ => Err(Error::UnexpectedReply { expected: "CHECK_CACHE" }),
        }
    }

    pub fn into_stats(self) -> Result<CacheStats, Error> {
        match self.into_result()? {
            Self::Stats(reply) => Ok(reply),
            _ => Err(Error::UnexpectedReply { expected: "GET_STATS" }),
        }
    }

    pub fn into_cache_paths(self) -> Result<CachePathsReply, Error> {
        match self.into_result()? {
            Self::CachePaths(reply) => Ok(reply),
            _ => Err(Error::UnexpectedReply { expected: "LIST_CACHE_PATHS" }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_breakdown_sums_to_total() {
        let urls = [
            "https://pjhq.example/",
            "https://pjhq.example/index.html",
            "https://pjhq.example/style.css",
            "https://pjhq.example/src/js/script.js",
            "https://pjhq.example/assets/images/pj_logo.PNG",
            "https://fonts.googleapis.com/css2?family=Inter&display=swap",
        ];
        let mut breakdown = TypeBreakdown::default();
        urls.iter().for_each(|u| breakdown.record(u));

        assert_eq!(breakdown, TypeBreakdown { html: 1, css: 1, js: 1, images: 1, other: 2 });
        assert_eq!(breakdown.sum(), urls.len());
    }

    #[test]
    fn test_check_cache_omits_manifest_flag() {
        let reply = CheckCacheReply { url: "/x".into(), cached: false, in_cache_paths: None };
        assert_eq!(serde_json::to_value(&reply).unwrap(), json!({"url": "/x", "cached": false}));
    }

    #[test]
    fn test_stats_camel_case() {
        let stats = CacheStats {
            total: 0,
            by_type: TypeBreakdown::default(),
            cache_paths: Some(CachePathCoverage { defined: 3, cached: 0 }),
            sample_urls: vec![],
        };
        let value = serde_json::to_value(&stats).unwrap();
        assert!(value.get("byType").is_some());
        assert!(value.get("sampleUrls").is_some());
        assert_eq!(value["cachePaths"]["defined"], 3);
    }

    #[test]
    fn test_error_reply_rejects() {
        let reply = Reply::Error { error: "boom".into() };
        assert!(matches!(reply.into_stats(), Err(Error::Controller(msg)) if msg == "boom"));

        let reply = Reply::CachePaths(CachePathsReply { paths: vec![], count: 0 });
        assert!(matches!(reply.into_stats(), Err(Error::UnexpectedReply { .. })));
    }
}
