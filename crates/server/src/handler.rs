//! MCP server handler implementation.
//!
//! This module defines the shared server state and the handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::tools::{
    cache::{CacheCleanupParams, CacheGetParams, SnapshotGetParams, cleanup_impl, get_impl, snapshot_get_impl},
    metrics::snapshot_impl,
    quality::{LabelEvaluateParams, evaluate_impl},
    search::{LabelSearchParams, SearchScoreParams, label_search_impl, score_impl},
    tokens::{TokensCanonicalizeParams, canonicalize_impl},
};

use labelgate_client::{BraveClient, BraveConfig, LabelSearch};
use labelgate_core::{AppConfig, CacheDb, Metrics, ResultCache, SnapshotCache};
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

/// Everything the tools share for the lifetime of the process.
pub struct AppState {
    pub config: AppConfig,
    pub results: ResultCache,
    pub snapshots: SnapshotCache,
    pub metrics: Arc<Metrics>,
    /// `None` when no Brave API key is configured.
    pub search: Option<LabelSearch<BraveClient>>,
}

impl AppState {
    /// Wire the caches and search pipeline around one store and one metrics registry.
    pub fn new(config: AppConfig, db: CacheDb, metrics: Arc<Metrics>) -> Self {
        let policy = config.retry_policy();
        let results = ResultCache::new(db.clone(), policy, metrics.clone());
        let snapshots = SnapshotCache::new(db, policy, metrics.clone());

        let search = match BraveConfig::from_app_config(&config).and_then(BraveClient::new) {
            Ok(client) => Some(
                LabelSearch::new(client, policy, metrics.clone()).with_min_score(config.search_min_score),
            ),
            Err(e) => {
                tracing::warn!(error = %e, "label_search disabled");
                None
            }
        };

        Self { config, results, snapshots, metrics, search }
    }
}

/// The main MCP server handler for labelgate.
#[derive(Clone)]
pub struct LabelgateServer {
    tool_router: ToolRouter<Self>,
    state: Arc<AppState>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl LabelgateServer {
    /// Create a new server handler.
    pub fn new(state: Arc<AppState>) -> Self {
        Self { tool_router: Self::tool_router(), state }
    }

    /// Decide whether a label draft is good enough to skip the fallback path.
    ///
    /// Pure: no cache or network access.
    #[tool(
        description = "Evaluate a supplement-label extraction draft. Returns completeness, whether to use the fallback path, and the reasons."
    )]
    async fn label_evaluate(&self, params: Parameters<LabelEvaluateParams>) -> Result<CallToolResult, McpError> {
        evaluate_impl(params.0)
    }

    #[tool(description = "Canonicalize ingredient-name and dosage-form tokens. Returns deduplicated canonical tokens.")]
    async fn tokens_canonicalize(
        &self, params: Parameters<TokensCanonicalizeParams>,
    ) -> Result<CallToolResult, McpError> {
        canonicalize_impl(params.0)
    }

    #[tool(
        description = "Score search results for label relevance (0-100) and build a fallback re-query from the top title."
    )]
    async fn search_score(&self, params: Parameters<SearchScoreParams>) -> Result<CallToolResult, McpError> {
        score_impl(params.0)
    }

    /// Search for a product's label, re-querying once when the results look weak.
    #[tool(
        description = "Search the web for a supplement label. Re-queries with a cleaned title when results score low. Requires LABELGATE_BRAVE_API_KEY."
    )]
    async fn label_search(&self, params: Parameters<LabelSearchParams>) -> Result<CallToolResult, McpError> {
        label_search_impl(self.state.search.as_ref(), params.0).await
    }

    #[tool(description = "Get a cached label extraction by image hash (SHA-256 hex).")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.state.results, params.0).await
    }

    #[tool(description = "Delete cached results older than the TTL and purge expired snapshots.")]
    async fn cache_cleanup(&self, params: Parameters<CacheCleanupParams>) -> Result<CallToolResult, McpError> {
        cleanup_impl(
            &self.state.results,
            &self.state.snapshots,
            self.state.config.cache_ttl_days,
            params.0,
        )
        .await
    }

    #[tool(description = "Get the most recent unexpired product snapshot for a key and source.")]
    async fn snapshot_get(&self, params: Parameters<SnapshotGetParams>) -> Result<CallToolResult, McpError> {
        snapshot_get_impl(&self.state.snapshots, params.0).await
    }

    #[tool(description = "Read cache, retry and search counters for the current window and since startup.")]
    async fn metrics_snapshot(&self) -> Result<CallToolResult, McpError> {
        snapshot_impl(&self.state.metrics)
    }
}

impl ServerHandler for LabelgateServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "labelgate".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
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

#[cfg(test)]
mod tests {
    use super::*;

    async fn server(config: AppConfig) -> LabelgateServer {
        let db = CacheDb::open_in_memory().await.unwrap();
        LabelgateServer::new(Arc::new(AppState::new(config, db, Metrics::new())))
    }

    #[tokio::test]
    async fn test_all_tools_listed() {
        let server = server(AppConfig::default()).await;
        let mut names: Vec<String> = server
            .tool_router
            .list_all()
            .into_iter()
            .map(|t| t.name.to_string())
            .collect();
        names.sort();

        assert_eq!(
            names,
            vec![
                "cache_cleanup",
                "cache_get",
                "label_evaluate",
                "label_search",
                "metrics_snapshot",
                "search_score",
                "snapshot_get",
                "tokens_canonicalize",
            ]
        );
    }

    #[tokio::test]
    async fn test_search_disabled_without_key() {
        let server = server(AppConfig { brave_api_key: None, ..Default::default() }).await;
        assert!(server.state.search.is_none());
    }

    #[tokio::test]
    async fn test_search_enabled_with_key() {
        let config = AppConfig { brave_api_key: Some("test-key".into()), ..Default::default() };
        let server = server(config).await;
        assert!(server.state.search.is_some());
    }

    #[tokio::test]
    async fn test_server_info() {
        let info = server(AppConfig::default()).await.get_info();
        assert_eq!(info.server_info.name, "labelgate");
        assert!(info.capabilities.tools.is_some());
    }
}
