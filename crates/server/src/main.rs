//! labelgate server entry point.
//!
//! This is the main binary that boots the MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use labelgate_core::{AppConfig, CacheDb, Metrics};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

use crate::handler::{AppState, LabelgateServer};

mod handler;
mod tools;

/// Periodically run the same sweep as the cache_cleanup tool.
fn spawn_sweeper(state: Arc<AppState>) -> Option<JoinHandle<()>> {
    let interval = state.config.cleanup_interval()?;
    tracing::info!(interval_secs = interval.as_secs(), "cache sweeper started");

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let swept =
                tools::cache::cleanup::sweep(&state.results, &state.snapshots, state.config.cache_ttl_days, true).await;
            tracing::debug!(
                results_deleted = swept.results_deleted,
                snapshots_deleted = swept.snapshots_deleted,
                "cache sweep finished"
            );
        }
    }))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(db_path = %config.db_path.display(), "Starting labelgate server on stdio transport");

    let db = CacheDb::open(&config.db_path).await?;
    let metrics = Metrics::new();
    metrics.start_flusher(config.metrics_flush_interval());

    let state = Arc::new(AppState::new(config, db, metrics.clone()));
    let sweeper = spawn_sweeper(state.clone());

    let handler = LabelgateServer::new(state);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    let outcome = server.waiting().await;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    metrics.stop_flusher();
    metrics.flush();

    outcome?;
    Ok(())
}
