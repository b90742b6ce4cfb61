//! pjhq-cache server entry point.
//!
//! Boots the cache controller, connects one page-side messenger to it and
//! serves the MCP tools on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

use pjhq_client::{CacheMessenger, FetchConfig, HttpFetcher, MessengerConfig};
use pjhq_core::{AppConfig, CacheDb, CacheStorage, Network, PathRegistry, ServiceHost};
use pjhq_server::{CacheController, CacheServer};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let registry = match &config.manifest_path {
        Some(path) => PathRegistry::load(path)?,
        None => PathRegistry::default(),
    };

    tracing::info!(
        cache = %config.cache_name(),
        origin = %config.origin,
        policy = ?config.policy,
        paths = registry.len(),
        "Starting pjhq-cache server on stdio transport"
    );

    let storage: Arc<dyn CacheStorage> = Arc::new(CacheDb::open(&config.db_path).await?);
    let network: Arc<dyn Network> = Arc::new(HttpFetcher::new(FetchConfig::from(&config))?);
    let host = ServiceHost::new();

    let (controller, inbox) =
        CacheController::new(&config, registry.clone(), storage, Arc::clone(&network), host.clone())?;
    controller.serve(inbox);

    let lifecycle = controller.clone();
    tokio::spawn(async move {
        match lifecycle.start().await {
            Ok(report) => tracing::info!(succeeded = report.succeeded, failed = report.failed, "controller started"),
            Err(e) => tracing::error!(error = %e, "controller failed to start"),
        }
    });

    let messenger = CacheMessenger::new(Some(host), registry, MessengerConfig::from(&config));
    messenger.init(&config.origin).await;

    let handler = CacheServer::new(controller, messenger, network);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
