//! preload_page and skip_waiting tool implementations.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use pjhq_client::CacheMessenger;
use pjhq_core::Error;

use crate::tools::json_result;

/// Parameters for the preload_page tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PreloadPageParams {
    /// `home`, or the name of a site section such as `about`.
    pub page: String,
}

/// Output from the skip_waiting tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SkipWaitingOutput {
    /// Whether the instruction was delivered. It is never answered.
    pub delivered: bool,
}

/// Implementation of the preload_page tool.
pub async fn preload_impl(messenger: &CacheMessenger, params: PreloadPageParams) -> Result<CallToolResult, McpError> {
    let page = params.page.trim();
    if page.is_empty() {
        return Err(Error::InvalidInput("page cannot be empty".into()).into());
    }
    let reply = messenger.preload_page(page).await?;
    json_result(&reply)
}

/// Implementation of the skip_waiting tool.
pub async fn skip_waiting_impl(messenger: &CacheMessenger) -> Result<CallToolResult, McpError> {
    messenger.skip_waiting().await?;
    json_result(&SkipWaitingOutput { delivered: true })
}
