//! Brave Search API response types and normalization.

use serde::{Deserialize, Serialize};

use crate::search::SearchCandidate;

/// Raw response from Brave Web Search API.
#[derive(Debug, Deserialize)]
pub struct BraveApiResponse {
    pub query: QueryInfo,
    #[serde(default)]
    pub web: Option<WebResults>,
}

/// Query metadata from Brave response.
#[derive(Debug, Deserialize)]
pub struct QueryInfo {
    pub original: String,
    #[serde(default)]
    #[serde(alias = "moreResultsAvailable")]
    pub more_results_available: bool,
}

/// Web search results container.
#[derive(Debug, Deserialize)]
pub struct WebResults {
    pub results: Vec<WebResult>,
}

/// Individual web search result from Brave.
#[derive(Debug, Deserialize)]
pub struct WebResult {
    pub title: String,
    #[serde(alias = "url")]
    pub source_url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub extra_snippets: Vec<String>,
}

/// Normalized search response.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub query: QueryMeta,
    /// Value of the `x-request-id` response header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Normalized search result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub description: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra_snippets: Vec<String>,
    pub rank: usize,
}

/// Normalized query metadata.
#[derive(Debug, Clone, Serialize)]
pub struct QueryMeta {
    pub original: String,
    pub more_results_available: bool,
}

impl From<BraveApiResponse> for SearchResponse {
    fn from(raw: BraveApiResponse) -> Self {
        let results = raw
            .web
            .map(|w| {
                w.results
                    .into_iter()
                    .enumerate()
                    .map(|(idx, r)| SearchResult {
                        title: r.title,
                        url: r.source_url,
                        description: r.description,
                        extra_snippets: r.extra_snippets,
                        rank: idx + 1,
                    })
                    .collect()
            })
            .unwrap_or_default();

        SearchResponse {
            results,
            query: QueryMeta { original: raw.query.original, more_results_available: raw.query.more_results_available },
            request_id: None,
        }
    }
}

impl From<SearchResult> for SearchCandidate {
    /// Extra snippets are folded into the snippet so the scorer sees all returned text.
    fn from(result: SearchResult) -> Self {
        let mut snippet = result.description;
        for extra in result.extra_snippets {
            if !snippet.is_empty() {
                snippet.push(' ');
            }
            snippet.push_str(&extra);
        }
        SearchCandidate { title: result.title, snippet, link: result.url }
    }
}

impl SearchResponse {
    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }

    /// Candidates in rank order, in the shape the scorer consumes.
    pub fn into_candidates(self) -> Vec<SearchCandidate> {
        self.results.into_iter().map(SearchCandidate::from).collect()
    }
}
