//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::controller::CacheController;
use crate::tools::cache::{CacheResourcesParams, CheckCacheParams, check_impl, paths_impl, resources_impl, stats_impl};
use crate::tools::fetch::{FetchParams, fetch_impl};
use crate::tools::pages::{PreloadPageParams, preload_impl, skip_waiting_impl};

use pjhq_client::CacheMessenger;
use pjhq_core::Network;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for pjhq-cache.
///
/// Holds the controller (for `fetch`) and a page-side messenger through which
/// every other tool is routed.
#[derive(Clone)]
pub struct CacheServer {
    controller: CacheController,
    messenger: CacheMessenger,
    network: Arc<dyn Network>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl CacheServer {
    /// Create a new server handler.
    pub fn new(controller: CacheController, messenger: CacheMessenger, network: Arc<dyn Network>) -> Self {
        Self { controller, messenger, network, tool_router: Self::tool_router() }
    }

    /// Cache a batch of resources.
    ///
    /// Under the exact-match policy URLs outside the manifest are filtered out before fetching.
    #[tool(
        description = "Fetch and cache a list of URLs in the current cache generation. Returns cached, failed, filtered and total counts."
    )]
    async fn cache_resources(&self, params: Parameters<CacheResourcesParams>) -> Result<CallToolResult, McpError> {
        resources_impl(&self.messenger, params.0).await
    }

    #[tool(description = "Check whether a URL is stored in the current cache generation.")]
    async fn check_cache(&self, params: Parameters<CheckCacheParams>) -> Result<CallToolResult, McpError> {
        check_impl(&self.messenger, params.0).await
    }

    #[tool(description = "Entry counts of the current cache generation grouped by type, with a sample of cached URLs.")]
    async fn cache_stats(&self) -> Result<CallToolResult, McpError> {
        stats_impl(&self.messenger).await
    }

    #[tool(description = "List every path in the cache manifest.")]
    async fn list_cache_paths(&self) -> Result<CallToolResult, McpError> {
        paths_impl(&self.messenger).await
    }

    /// Preload the resources of a named page (`home` or a site section).
    #[tool(description = "Cache every manifest resource of a page: 'home' or a section name such as 'about'.")]
    async fn preload_page(&self, params: Parameters<PreloadPageParams>) -> Result<CallToolResult, McpError> {
        preload_impl(&self.messenger, params.0).await
    }

    /// Tell a waiting controller to activate now.
    #[tool(description = "Instruct a waiting controller to take over immediately. No reply is expected.")]
    async fn skip_waiting(&self) -> Result<CallToolResult, McpError> {
        skip_waiting_impl(&self.messenger).await
    }

    /// Fetch a URL through the interceptor.
    ///
    /// Reports whether the response came from the cache, the network or bypassed the controller.
    #[tool(description = "Fetch a URL through the cache controller. Reports the response source: cache, network or passthrough.")]
    async fn fetch(&self, params: Parameters<FetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.controller, self.network.as_ref(), params.0).await
    }
}

impl ServerHandler for CacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "pjhq-cache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(format!("Resource cache controller {}", self.controller.cache_name())),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
