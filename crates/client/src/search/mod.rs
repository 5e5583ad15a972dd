//! Label search: scoring web results for supplement-facts content.
//!
//! - [`scoring`] rates candidates on keywords, dosage text and domain.
//! - [`fallback`] derives a cleaner re-query from a poor first result.
//! - [`pipeline`] runs a provider through the retry executor and applies both.

pub mod fallback;
pub mod pipeline;
pub mod scoring;

use async_trait::async_trait;
use labelgate_core::{Error, RetryableError};
use serde::{Deserialize, Serialize};

pub use fallback::build_fallback_query;
pub use pipeline::{LabelSearch, LabelSearchOutcome};
pub use scoring::{score_candidate, score_results};

/// A web search result as the scorer sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SearchCandidate {
    pub title: String,
    #[serde(default)]
    pub snippet: String,
    pub link: String,
}

/// A web search backend.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    type Error: RetryableError + Into<Error> + Send;

    /// Short provider name for logs.
    fn name(&self) -> &'static str;

    /// Run a query and return candidates in rank order.
    async fn search(&self, query: &str) -> Result<Vec<SearchCandidate>, Self::Error>;
}
