//! Label search pipeline.
//!
//! Runs a query through a [`SearchProvider`] under the retry executor and
//! scores the results. If the best score is below `min_score`, a fallback
//! query built from the first result's title is tried once and whichever
//! result set scores higher is kept.

use std::sync::Arc;

use labelgate_core::metrics::{Counter, Metrics};
use labelgate_core::retry::RetryStop;
use labelgate_core::{Error, RetryPolicy, with_retry};
use serde::Serialize;

use super::{SearchCandidate, SearchProvider, build_fallback_query, score_results};

/// Best score below which the fallback query runs.
pub const DEFAULT_MIN_SCORE: u8 = 60;

/// Result of a label search.
#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct LabelSearchOutcome {
    /// The query whose results are returned.
    pub query_used: String,
    pub score: u8,
    pub candidates: Vec<SearchCandidate>,
    /// Whether a fallback search was issued, whether or not its results were kept.
    pub fallback_ran: bool,
}

/// Search, score, and re-query once on a poor result.
#[derive(Debug)]
pub struct LabelSearch<P> {
    provider: P,
    policy: RetryPolicy,
    metrics: Arc<Metrics>,
    min_score: u8,
}

impl<P: SearchProvider> LabelSearch<P> {
    pub fn new(provider: P, policy: RetryPolicy, metrics: Arc<Metrics>) -> Self {
        Self { provider, policy, metrics, min_score: DEFAULT_MIN_SCORE }
    }

    pub fn with_min_score(mut self, min_score: u8) -> Self {
        self.min_score = min_score;
        self
    }

    async fn search_once(&self, query: &str) -> Result<Vec<SearchCandidate>, Error> {
        self.metrics.incr(Counter::SearchRequest);
        let outcome = with_retry(&self.policy, || self.provider.search(query)).await;
        self.metrics.add(Counter::RetryAttempt, u64::from(outcome.retries()));
        if outcome.stop == RetryStop::Exhausted {
            self.metrics.incr(Counter::RetryExhausted);
        }

        match outcome.result {
            Ok(candidates) => Ok(candidates),
            Err(e) => {
                self.metrics.incr(Counter::SearchError);
                tracing::warn!(
                    provider = self.provider.name(),
                    query,
                    attempts = outcome.attempts,
                    status = ?outcome.status,
                    trace_id = outcome.trace_id.as_deref().unwrap_or("-"),
                    error = %e,
                    "search failed"
                );
                Err(e.into())
            }
        }
    }

    /// Run `query`, falling back to a cleaned re-query when no result qualifies.
    ///
    /// A failed primary search is returned as an error. A failed fallback
    /// search keeps the primary results.
    pub async fn run(&self, query: &str) -> Result<LabelSearchOutcome, Error> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::InvalidInput("search query cannot be empty".to_string()));
        }

        let candidates = self.search_once(query).await?;
        let score = score_results(&candidates);
        let mut outcome =
            LabelSearchOutcome { query_used: query.to_string(), score, candidates, fallback_ran: false };

        if score >= self.min_score {
            return Ok(outcome);
        }

        let Some(fallback) = build_fallback_query(&outcome.candidates) else {
            return Ok(outcome);
        };
        if fallback.eq_ignore_ascii_case(query) {
            return Ok(outcome);
        }

        self.metrics.incr(Counter::SearchFallback);
        outcome.fallback_ran = true;
        tracing::debug!(query, fallback = %fallback, score, "low search score; trying fallback query");

        match self.search_once(&fallback).await {
            Ok(candidates) => {
                let fallback_score = score_results(&candidates);
                if fallback_score > outcome.score {
                    outcome.query_used = fallback;
                    outcome.score = fallback_score;
                    outcome.candidates = candidates;
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "fallback search failed; keeping primary results");
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use labelgate_core::RetryableError;
    use std::collections::HashMap;
    use std::fmt;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug, Clone)]
    struct MockError(u16);

    impl fmt::Display for MockError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "status {}", self.0)
        }
    }

    impl RetryableError for MockError {
        fn status(&self) -> Option<u16> {
            Some(self.0)
        }
    }

    impl From<MockError> for Error {
        fn from(err: MockError) -> Self {
            Error::HttpError { status: Some(err.0), message: err.to_string(), trace_id: None }
        }
    }

    /// Scripted provider: each query pops its next response; unknown queries return no results.
    #[derive(Default)]
    struct MockProvider {
        responses: Mutex<HashMap<String, Vec<Result<Vec<SearchCandidate>, MockError>>>>,
        queries: Mutex<Vec<String>>,
    }

    impl MockProvider {
        fn respond(self, query: &str, response: Result<Vec<SearchCandidate>, MockError>) -> Self {
            self.responses.lock().unwrap().entry(query.to_string()).or_default().push(response);
            self
        }

        fn queries(&self) -> Vec<String> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SearchProvider for MockProvider {
        type Error = MockError;

        fn name(&self) -> &'static str {
            "mock"
        }

        async fn search(&self, query: &str) -> Result<Vec<SearchCandidate>, MockError> {
            self.queries.lock().unwrap().push(query.to_string());
            let mut responses = self.responses.lock().unwrap();
            match responses.get_mut(query) {
                Some(queue) if !queue.is_empty() => queue.remove(0),
                _ => Ok(Vec::new()),
            }
        }
    }

    fn candidate(title: &str, snippet: &str, link: &str) -> SearchCandidate {
        SearchCandidate { title: title.to_string(), snippet: snippet.to_string(), link: link.to_string() }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy { max_attempts: 3, base_delay: Duration::from_millis(1), max_delay: Duration::from_millis(2) }
    }

    const FALLBACK: &str = "BrandX Vitamin D3 5000 supplement facts ingredients";

    fn poor_result() -> Vec<SearchCandidate> {
        vec![candidate("Amazon.com: BrandX Vitamin D3 5000 IU, 120 Capsules", "", "https://forum.example.com/t/1")]
    }

    fn good_result() -> Vec<SearchCandidate> {
        vec![candidate("BrandX D3", "Supplement Facts: Vitamin D3 125 mcg", "https://www.iherb.com/pr/brandx")]
    }

    #[tokio::test]
    async fn test_good_result_skips_fallback() {
        let provider = MockProvider::default().respond("brandx d3", Ok(good_result()));
        let metrics = Metrics::new();
        let search = LabelSearch::new(provider, fast_policy(), metrics.clone());

        let outcome = search.run("brandx d3").await.unwrap();
        assert_eq!(outcome.score, 100);
        assert!(!outcome.fallback_ran);
        assert_eq!(outcome.query_used, "brandx d3");
        assert_eq!(search.provider.queries(), vec!["brandx d3"]);
        assert_eq!(metrics.snapshot().total(Counter::SearchFallback), 0);
    }

    #[tokio::test]
    async fn test_fallback_result_kept_when_better() {
        let provider = MockProvider::default()
            .respond("brandx d3", Ok(poor_result()))
            .respond(FALLBACK, Ok(good_result()));
        let metrics = Metrics::new();
        let search = LabelSearch::new(provider, fast_policy(), metrics.clone());

        let outcome = search.run("brandx d3").await.unwrap();
        assert!(outcome.fallback_ran);
        assert_eq!(outcome.query_used, FALLBACK);
        assert_eq!(outcome.score, 100);
        assert_eq!(outcome.candidates, good_result());

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total(Counter::SearchFallback), 1);
        assert_eq!(snapshot.total(Counter::SearchRequest), 2);
    }

    #[tokio::test]
    async fn test_primary_kept_when_fallback_is_worse() {
        let provider = MockProvider::default().respond("brandx d3", Ok(poor_result()));
        let search = LabelSearch::new(provider, fast_policy(), Metrics::new());

        let outcome = search.run("brandx d3").await.unwrap();
        assert!(outcome.fallback_ran);
        assert_eq!(outcome.query_used, "brandx d3");
        assert_eq!(outcome.candidates, poor_result());
    }

    #[tokio::test]
    async fn test_fallback_failure_keeps_primary() {
        let provider = MockProvider::default()
            .respond("brandx d3", Ok(poor_result()))
            .respond(FALLBACK, Err(MockError(401)));
        let metrics = Metrics::new();
        let search = LabelSearch::new(provider, fast_policy(), metrics.clone());

        let outcome = search.run("brandx d3").await.unwrap();
        assert!(outcome.fallback_ran);
        assert_eq!(outcome.query_used, "brandx d3");
        assert_eq!(metrics.snapshot().total(Counter::SearchError), 1);
    }

    #[tokio::test]
    async fn test_transient_primary_failure_is_retried() {
        let provider = MockProvider::default()
            .respond("brandx d3", Err(MockError(503)))
            .respond("brandx d3", Ok(good_result()));
        let metrics = Metrics::new();
        let search = LabelSearch::new(provider, fast_policy(), metrics.clone());

        let outcome = search.run("brandx d3").await.unwrap();
        assert_eq!(outcome.score, 100);
        assert_eq!(metrics.snapshot().total(Counter::RetryAttempt), 1);
    }

    #[tokio::test]
    async fn test_permanent_primary_failure_is_returned() {
        let provider = MockProvider::default().respond("brandx d3", Err(MockError(400)));
        let search = LabelSearch::new(provider, fast_policy(), Metrics::new());

        let err = search.run("brandx d3").await.unwrap_err();
        assert!(matches!(err, Error::HttpError { status: Some(400), .. }));
        assert_eq!(search.provider.queries().len(), 1);
    }

    #[tokio::test]
    async fn test_min_score_threshold() {
        let provider = MockProvider::default().respond("brandx d3", Ok(poor_result()));
        let search = LabelSearch::new(provider, fast_policy(), Metrics::new()).with_min_score(0);

        let outcome = search.run("brandx d3").await.unwrap();
        assert!(!outcome.fallback_ran);
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let search = LabelSearch::new(MockProvider::default(), fast_policy(), Metrics::new());
        assert!(matches!(search.run("  ").await, Err(Error::InvalidInput(_))));
    }
}
