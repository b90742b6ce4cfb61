//! MCP tool implementations.
//!
//! Every cache tool goes through the page-side messenger, the same path a
//! page would take; `fetch` drives the controller's interceptor directly.

pub mod cache;
pub mod fetch;
pub mod pages;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

use pjhq_core::Error;

pub use cache::{CacheResourcesParams, CheckCacheParams};
pub use fetch::{FetchOutput, FetchParams};
pub use pages::PreloadPageParams;

/// Pretty-printed JSON as a successful tool result.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
pub(crate) fn result_json(result: &CallToolResult) -> serde_json::Value {
    let text = &result.content.first().and_then(|c| c.as_text()).unwrap().text;
    serde_json::from_str(text).unwrap()
}
