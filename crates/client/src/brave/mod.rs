//! Brave Search API client.
//!
//! Provides a client for the Brave Web Search API with rate limiting,
//! request validation, and response normalization.
//!
//! ### Behavior
//!
//! - **Endpoint**: `https://api.search.brave.com/res/v1/web/search`
//! - **Authentication**: Uses `X-Subscription-Token` header.
//! - **Rate Limiting**: at most one request per second (free tier).
//! - **Errors**: 401/403 map to `AuthError`, 429 to `RateLimited`, any other
//!   4xx/5xx to `HttpError`. The `x-request-id` header is kept as a trace id.
//!   Retrying is left to the caller's retry executor.
//! - **Normalization**: Converts Brave's response into a stable `SearchResponse`.

pub mod error;
pub mod request;
pub mod response;

pub use error::BraveError;
pub use request::{SafeSearch, SearchRequest};
pub use response::{QueryMeta, SearchResponse, SearchResult};

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use labelgate_core::AppConfig;
use reqwest::header;
use tokio::sync::Mutex;

use crate::search::{SearchCandidate, SearchProvider};

/// Default base URL for Brave Search API.
const DEFAULT_BASE_URL: &str = "https://api.search.brave.com/res/v1";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_USER_AGENT: &str = "labelgate/0.1";

/// Minimum interval between requests for rate limiting (1 second for free tier).
const MIN_REQUEST_INTERVAL: Duration = Duration::from_secs(1);

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Brave API client configuration.
#[derive(Debug, Clone)]
pub struct BraveConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for BraveConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl BraveConfig {
    /// Build from application configuration.
    ///
    /// Fails with `MissingApiKey` when no key is configured.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, BraveError> {
        let api_key = config.require_brave_api_key().map_err(|_| BraveError::MissingApiKey)?;
        Ok(Self {
            api_key: api_key.to_string(),
            timeout: config.timeout(),
            user_agent: config.user_agent.clone(),
            ..Default::default()
        })
    }
}

/// Rate limiter to enforce request intervals.
#[derive(Debug)]
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval: Duration) -> Self {
        Self { last_request: Mutex::new(None), min_interval }
    }

    /// Wait until at least `min_interval` has passed since the previous request.
    async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Brave Search API client.
#[derive(Debug, Clone)]
pub struct BraveClient {
    http: reqwest::Client,
    config: BraveConfig,
    rate_limiter: Arc<RateLimiter>,
}

impl BraveClient {
    pub fn new(config: BraveConfig) -> Result<Self, BraveError> {
        if config.api_key.is_empty() {
            return Err(BraveError::MissingApiKey);
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BraveError::Network(Arc::new(e)))?;

        Ok(Self { http, config, rate_limiter: Arc::new(RateLimiter::new(MIN_REQUEST_INTERVAL)) })
    }

    /// Execute a web search query.
    ///
    /// This method handles rate limiting, request validation, and response normalization.
    pub async fn search(&self, req: &SearchRequest) -> Result<SearchResponse, BraveError> {
        req.validate()?;

        self.rate_limiter.acquire().await;

        let start = Instant::now();
        let url = format!("{}/web/search", self.config.base_url);

        tracing::debug!(query = %req.q, "searching Brave API");

        let http_response = self
            .http
            .get(&url)
            .header("X-Subscription-Token", &self.config.api_key)
            .header(header::ACCEPT, "application/json")
            .header(header::USER_AGENT, &self.config.user_agent)
            .query(req)
            .send()
            .await?;

        let status = http_response.status();
        let request_id = http_response
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        tracing::debug!(%status, request_id = request_id.as_deref().unwrap_or("-"), "Brave API response");

        if status == 401 || status == 403 {
            return Err(BraveError::AuthError);
        }

        if status == 429 {
            return Err(BraveError::RateLimited { request_id });
        }

        if status.is_client_error() || status.is_server_error() {
            return Err(BraveError::HttpError { status: status.as_u16(), request_id });
        }

        let bytes = http_response.bytes().await?;
        let api_response: response::BraveApiResponse =
            serde_json::from_slice(&bytes).map_err(|e| BraveError::Parse(e.to_string()))?;

        let response = SearchResponse::from(api_response).with_request_id(request_id);
        tracing::debug!(elapsed_ms = start.elapsed().as_millis() as u64, results = response.results.len(), "search completed");

        Ok(response)
    }
}

#[async_trait]
impl SearchProvider for BraveClient {
    type Error = BraveError;

    fn name(&self) -> &'static str {
        "brave"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchCandidate>, BraveError> {
        let response = BraveClient::search(self, &SearchRequest::for_label(query)).await?;
        Ok(response.into_candidates())
    }
}
