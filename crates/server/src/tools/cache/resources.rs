//! cache_resources tool implementation.
//!
//! Asks the controller to fetch and store a batch of URLs.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use pjhq_client::CacheMessenger;
use pjhq_core::Error;

use crate::tools::json_result;

/// Parameters for the cache_resources tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheResourcesParams {
    /// Absolute or root-relative URLs to cache.
    pub urls: Vec<String>,

    /// Free-form label recorded in the controller log (default: "manual").
    #[serde(default = "default_reason")]
    pub reason: String,
}

fn default_reason() -> String {
    "manual".into()
}

/// Implementation of the cache_resources tool.
pub async fn resources_impl(messenger: &CacheMessenger, params: CacheResourcesParams) -> Result<CallToolResult, McpError> {
    if params.urls.is_empty() {
        return Err(Error::InvalidInput("urls cannot be empty".into()).into());
    }

    let reply = messenger.cache_resources(params.urls, &params.reason).await?;
    json_result(&reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;
    use crate::tools::result_json;

    #[tokio::test]
    async fn test_resources_empty_urls() {
        let harness = Harness::builder().build().await;
        let messenger = harness.page("/").await;
        let params = CacheResourcesParams { urls: vec![], reason: default_reason() };

        let result = resources_impl(&messenger, params).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_resources_reports_counts() {
        let harness = Harness::builder()
            .styles(&["/a.css"])
            .scripts(&["/b.js"])
            .respond("/a.css", 200, "body{}")
            .respond("/b.js", 404, "")
            .build()
            .await;
        harness.controller.activate().await.unwrap();
        let messenger = harness.page("/").await;

        let params = CacheResourcesParams { urls: vec!["/a.css".into(), "/b.js".into()], reason: default_reason() };
        let result = resources_impl(&messenger, params).await.unwrap();
        let json = result_json(&result);

        assert_eq!(json["cached"], 1);
        assert_eq!(json["failed"], 1);
        assert_eq!(json["total"], 2);
        assert_eq!(json["filtered"], 0);
    }

    #[tokio::test]
    async fn test_resources_before_activation_is_not_ready() {
        let harness = Harness::builder().build().await;
        let messenger = harness.page("/").await;
        let params = CacheResourcesParams { urls: vec!["/a.css".into()], reason: default_reason() };

        let err = resources_impl(&messenger, params).await.unwrap_err();
        assert_eq!(err.code.0, -32020);
    }
}
