//! check_cache, cache_stats and list_cache_paths tool implementations.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use pjhq_client::CacheMessenger;
use pjhq_core::Error;

use crate::tools::json_result;

/// Parameters for the check_cache tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CheckCacheParams {
    /// The URL to look up in the current generation.
    pub url: String,
}

/// Implementation of the check_cache tool.
pub async fn check_impl(messenger: &CacheMessenger, params: CheckCacheParams) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()).into());
    }
    let reply = messenger.check_cache_status(&params.url).await?;
    json_result(&reply)
}

/// Implementation of the cache_stats tool.
pub async fn stats_impl(messenger: &CacheMessenger) -> Result<CallToolResult, McpError> {
    let stats = messenger.get_cache_stats().await?;
    json_result(&stats)
}

/// Implementation of the list_cache_paths tool.
pub async fn paths_impl(messenger: &CacheMessenger) -> Result<CallToolResult, McpError> {
    let paths = messenger.list_cache_paths().await?;
    json_result(&paths)
}
