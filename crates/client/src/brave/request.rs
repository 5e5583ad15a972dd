//! Brave Search API request types and validation.

use serde::{Deserialize, Serialize};

use super::BraveError;

/// Results requested per label search; the scorer only needs the top page.
pub const LABEL_SEARCH_COUNT: u8 = 10;

const MAX_QUERY_CHARS: usize = 400;
const MAX_QUERY_WORDS: usize = 50;

/// Search request parameters for Brave Web Search API.
#[derive(Debug, Clone, Serialize, Default)]
pub struct SearchRequest {
    /// Search query (required, max 400 chars / 50 words).
    pub q: String,

    /// Number of results (1-20, default 20).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u8>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub safesearch: Option<SafeSearch>,

    /// Content language (ISO 639-1, e.g., "en").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_lang: Option<String>,
}

/// Safe search filtering levels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SafeSearch {
    Off,
    Moderate,
    Strict,
}

impl SearchRequest {
    /// Request used by the label search pipeline: English results, strict safe search.
    pub fn for_label(query: impl Into<String>) -> Self {
        Self {
            q: query.into(),
            count: Some(LABEL_SEARCH_COUNT),
            safesearch: Some(SafeSearch::Strict),
            search_lang: Some("en".to_string()),
            ..Default::default()
        }
    }

    /// Validate the search request parameters.
    ///
    /// Returns an error if any parameters are out of range or malformed.
    pub fn validate(&self) -> Result<(), BraveError> {
        let query = self.q.trim();
        if query.is_empty() {
            return Err(BraveError::InvalidQuery("query cannot be empty".to_string()));
        }

        let chars = query.chars().count();
        if chars > MAX_QUERY_CHARS {
            return Err(BraveError::InvalidQuery(format!("query too long: {chars} chars (max {MAX_QUERY_CHARS})")));
        }

        let words = query.split_whitespace().count();
        if words > MAX_QUERY_WORDS {
            return Err(BraveError::InvalidQuery(format!("query too long: {words} words (max {MAX_QUERY_WORDS})")));
        }

        if let Some(count) = self.count
            && !(1..=20).contains(&count)
        {
            return Err(BraveError::InvalidCount);
        }

        Ok(())
    }

    /// Get the effective count (default 20).
    pub fn get_count(&self) -> u8 {
        self.count.unwrap_or(20)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_request_is_valid() {
        let req = SearchRequest::for_label("Thorne Magnesium Bisglycinate supplement facts");
        assert!(req.validate().is_ok());
        assert_eq!(req.get_count(), LABEL_SEARCH_COUNT);
        assert_eq!(req.safesearch, Some(SafeSearch::Strict));
    }

    #[test]
    fn test_blank_query() {
        let req = SearchRequest { q: "   ".to_string(), ..Default::default() };
        assert!(matches!(req.validate(), Err(BraveError::InvalidQuery(_))));
    }

    #[test]
    fn test_query_too_long() {
        let req = SearchRequest { q: "a".repeat(401), ..Default::default() };
        assert!(req.validate().is_err());

        let req = SearchRequest { q: "word ".repeat(51), ..Default::default() };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_count_bounds() {
        let req = SearchRequest { q: "test".to_string(), count: Some(25), ..Default::default() };
        assert!(matches!(req.validate(), Err(BraveError::InvalidCount)));

        let req = SearchRequest { q: "test".to_string(), count: Some(0), ..Default::default() };
        assert!(matches!(req.validate(), Err(BraveError::InvalidCount)));
    }

    #[test]
    fn test_defaults() {
        let req = SearchRequest { q: "test".to_string(), ..Default::default() };
        assert_eq!(req.get_count(), 20);
        assert!(req.validate().is_ok());
    }
}
