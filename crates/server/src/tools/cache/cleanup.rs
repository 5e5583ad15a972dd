//! cache_cleanup tool implementation.
//!
//! Runs the same sweep as the background sweeper on demand.

use labelgate_core::{Error, ResultCache, SnapshotCache};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Parameters for the cache_cleanup tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheCleanupParams {
    /// Delete results first written more than this many days ago.
    /// Defaults to the configured TTL.
    #[serde(default)]
    pub ttl_days: Option<u32>,

    /// Also delete expired snapshots.
    #[serde(default = "default_true")]
    pub purge_snapshots: bool,
}

fn default_true() -> bool {
    true
}

/// Output from the cache_cleanup tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheCleanupOutput {
    pub ttl_days: u32,
    pub results_deleted: u64,
    pub snapshots_deleted: u64,
}

/// Sweep both caches. Failures are logged by the caches and count as 0 deleted.
pub async fn sweep(results: &ResultCache, snapshots: &SnapshotCache, ttl_days: u32, purge_snapshots: bool) -> CacheCleanupOutput {
    let results_deleted = results.cleanup_expired(ttl_days).await;
    let snapshots_deleted = if purge_snapshots { snapshots.purge_expired().await } else { 0 };
    CacheCleanupOutput { ttl_days, results_deleted, snapshots_deleted }
}

/// Implementation of the cache_cleanup tool.
pub async fn cleanup_impl(
    results: &ResultCache, snapshots: &SnapshotCache, default_ttl_days: u32, params: CacheCleanupParams,
) -> Result<CallToolResult, McpError> {
    let ttl_days = params.ttl_days.unwrap_or(default_ttl_days);
    if ttl_days == 0 {
        return Err(Error::InvalidInput("ttl_days must be greater than 0".to_string()).into());
    }

    let output = sweep(results, snapshots, ttl_days, params.purge_snapshots).await;
    json_result(&output)
}
