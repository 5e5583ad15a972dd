//! search_score and label_search tool implementations.
//!
//! `search_score` is pure: it scores caller-supplied candidates. `label_search`
//! runs the Brave-backed label search pipeline and needs an API key.

use labelgate_client::{BraveClient, LabelSearch, SearchCandidate, build_fallback_query, score_candidate, score_results};
use labelgate_core::Error;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Parameters for the search_score tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchScoreParams {
    /// Candidates in rank order.
    pub candidates: Vec<SearchCandidate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchScoreOutput {
    /// Best candidate score in [0, 100].
    pub score: u8,
    /// Per-candidate scores, in input order.
    pub candidate_scores: Vec<u8>,
    /// Re-query built from the first candidate's title, if one can be built.
    pub fallback_query: Option<String>,
}

pub fn score_impl(params: SearchScoreParams) -> Result<CallToolResult, McpError> {
    let output = SearchScoreOutput {
        score: score_results(&params.candidates),
        candidate_scores: params.candidates.iter().map(score_candidate).collect(),
        fallback_query: build_fallback_query(&params.candidates),
    };
    json_result(&output)
}

/// Parameters for the label_search tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LabelSearchParams {
    /// Product query, e.g. brand and product name.
    pub query: String,
}

pub async fn label_search_impl(
    search: Option<&LabelSearch<BraveClient>>, params: LabelSearchParams,
) -> Result<CallToolResult, McpError> {
    let search = search.ok_or_else(|| {
        Error::SearchAuthError("label search is disabled: LABELGATE_BRAVE_API_KEY not set".to_string())
    })?;

    let outcome = search.run(&params.query).await?;
    json_result(&outcome)
}
