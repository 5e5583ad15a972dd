//! snapshot_get tool implementation.

use labelgate_core::payload::SnapshotSource;
use labelgate_core::{Error, SnapshotCache};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Parameters for the snapshot_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SnapshotGetParams {
    /// Barcode or normalized product key.
    pub key: String,
    /// Extraction path that produced the snapshot.
    pub source: SnapshotSource,
}

/// Most recent unexpired snapshot for `(key, source)`, or a cache miss.
pub async fn snapshot_get_impl(cache: &SnapshotCache, params: SnapshotGetParams) -> Result<CallToolResult, McpError> {
    let key = params.key.trim();
    if key.is_empty() {
        return Err(Error::InvalidInput("key must not be empty".to_string()).into());
    }

    let record = cache
        .get(key, params.source)
        .await
        .ok_or_else(|| Error::CacheMiss(format!("{}:{key}", params.source)))?;
    json_result(&record)
}
