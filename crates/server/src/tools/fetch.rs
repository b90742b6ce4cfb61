//! fetch tool implementation.
//!
//! Runs a request through the controller's interceptor and reports where the
//! response came from.

use chrono::Utc;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use pjhq_core::{Error, Network, Request};

use crate::controller::{CacheController, Interception};
use crate::tools::json_result;

/// Input parameters for the fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FetchParams {
    /// Absolute or root-relative URL.
    pub url: String,

    /// HTTP method (default: "GET"). Only GET is ever intercepted.
    #[serde(default = "default_method")]
    pub method: String,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for the fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FetchOutput {
    /// The URL requested.
    pub url: String,
    /// `cache`, `network` or `passthrough`.
    pub source: String,
    pub status: u16,
    pub status_text: String,
    /// Content-Type header.
    pub content_type: Option<String>,
    /// Body length in bytes.
    pub bytes: usize,
    /// ISO8601 timestamp of when the response was produced.
    pub fetched_at: String,
}

/// Implementation of the fetch tool.
pub async fn fetch_impl(
    controller: &CacheController, network: &dyn Network, params: FetchParams,
) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()).into());
    }

    let request = Request::new(params.method, params.url.clone());
    let interception = controller.handle_fetch(&request).await;
    let source = interception.source();

    let response = match interception {
        Interception::Cached(response) => response,
        Interception::Network(result) => result?,
        Interception::Passthrough => {
            if !request.is_get() {
                return Err(Error::InvalidInput(format!("{} requests are not supported", request.method)).into());
            }
            network.fetch(&controller.resolve(&request.url)?).await?
        }
    };

    let output = FetchOutput {
        url: params.url,
        source: source.to_string(),
        status: response.status,
        status_text: response.status_text.clone(),
        content_type: response.header("content-type").map(str::to_string),
        bytes: response.body.len(),
        fetched_at: Utc::now().to_rfc3339(),
    };
    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;
    use crate::tools::result_json;

    fn params(url: &str) -> FetchParams {
        FetchParams { url: url.into(), method: default_method() }
    }

    #[tokio::test]
    async fn test_fetch_reports_source() {
        let harness = Harness::builder()
            .styles(&["/a.css"])
            .respond("/a.css", 200, "body{}")
            .respond("/elsewhere.html", 200, "<html></html>")
            .build()
            .await;
        harness.controller.activate().await.unwrap();
        let network = harness.network.as_ref();

        let first = result_json(&fetch_impl(&harness.controller, network, params("/a.css")).await.unwrap());
        assert_eq!(first["source"], "network");
        assert_eq!(first["status"], 200);

        let second = result_json(&fetch_impl(&harness.controller, network, params("/a.css")).await.unwrap());
        assert_eq!(second["source"], "cache");
        assert_eq!(second["bytes"], 6);

        let other = result_json(&fetch_impl(&harness.controller, network, params("/elsewhere.html")).await.unwrap());
        assert_eq!(other["source"], "passthrough");
    }

    #[tokio::test]
    async fn test_fetch_network_error() {
        let harness = Harness::builder().styles(&["/a.css"]).build().await;
        harness.controller.activate().await.unwrap();

        let err = fetch_impl(&harness.controller, harness.network.as_ref(), params("/a.css"))
            .await
            .unwrap_err();
        assert_eq!(err.code.0, -32008);
    }

    #[tokio::test]
    async fn test_fetch_rejects_passthrough_post() {
        let harness = Harness::builder().build().await;
        let params = FetchParams { url: "/form".into(), method: "POST".into() };
        assert!(fetch_impl(&harness.controller, harness.network.as_ref(), params).await.is_err());
    }
}
