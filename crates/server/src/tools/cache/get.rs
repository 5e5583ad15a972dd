//! cache_get tool implementation.
//!
//! Retrieves a cached extraction result by image hash.

use labelgate_core::cache::hash::is_valid_hash;
use labelgate_core::cache::{has_completed_analysis, has_draft_only};
use labelgate_core::{CachedResult, Error, ResultCache};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// SHA-256 hex fingerprint of the label image.
    pub image_hash: String,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub result: CachedResult,
    /// A successful analysis is stored.
    pub analysis_complete: bool,
    /// A draft is stored but analysis has not been attached yet.
    pub draft_only: bool,
}

/// Implementation of the cache_get tool.
///
/// Store failures read as a miss, the same as for any other cache consumer.
pub async fn get_impl(cache: &ResultCache, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    let hash = params.image_hash.trim().to_ascii_lowercase();
    if !is_valid_hash(&hash) {
        return Err(Error::InvalidHash.into());
    }

    let result = cache.get(&hash).await.ok_or_else(|| Error::CacheMiss(hash.clone()))?;

    let output = CacheGetOutput {
        analysis_complete: has_completed_analysis(&result),
        draft_only: has_draft_only(&result),
        result,
    };
    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::parse_output;
    use labelgate_core::cache::{CacheWrite, compute_image_hash};
    use labelgate_core::quality::LabelDraft;
    use labelgate_core::{CacheDb, Metrics, RetryPolicy};

    async fn cache() -> ResultCache {
        let db = CacheDb::open_in_memory().await.unwrap();
        ResultCache::new(db, RetryPolicy::none(), Metrics::new())
    }

    #[tokio::test]
    async fn test_get_impl_missing() {
        let cache = cache().await;
        let params = CacheGetParams { image_hash: compute_image_hash(b"never stored") };

        let err = get_impl(&cache, params).await.unwrap_err();
        assert_eq!(err.code.0, -32001);
    }

    #[tokio::test]
    async fn test_get_impl_rejects_bad_hash() {
        let cache = cache().await;
        let err = get_impl(&cache, CacheGetParams { image_hash: "abc".into() }).await.unwrap_err();
        assert_eq!(err.code.0, -32002);
    }

    #[tokio::test]
    async fn test_get_impl_found() {
        let cache = cache().await;
        let hash = compute_image_hash(b"label");
        let write = CacheWrite {
            vision_raw: None,
            parsed_ingredients: Some(LabelDraft { confidence: 0.9, coverage: 0.9, ..Default::default() }),
            analysis: None,
            confidence: 0.9,
        };
        assert!(cache.set(&hash, &write).await);

        let params = CacheGetParams { image_hash: hash.to_uppercase() };
        let output: CacheGetOutput = parse_output(&get_impl(&cache, params).await.unwrap());
        assert_eq!(output.result.image_hash, hash);
        assert!(output.draft_only);
        assert!(!output.analysis_complete);
    }
}
