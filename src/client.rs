use crate::config::SearchConfig;
use crate::types::*;
use reqwest::StatusCode;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Per-call options for a search request.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub timeout: Duration,
    pub cancel: CancellationToken,
}

/// Result of a search call. Cancellation is its own outcome, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Success(SearchResponse),
    Failure(ApiError),
    Cancelled,
}

/// Anything that can answer a paginated product search.
pub trait SearchBackend: Send + Sync + 'static {
    fn search(
        &self,
        query: &str,
        page: u32,
        options: FetchOptions,
    ) -> impl Future<Output = SearchOutcome> + Send;
}

/// Talks to `GET {base}/api/search` over HTTP.
#[derive(Clone, Debug)]
pub struct HttpSearchClient {
    base_url: String,
    http_client: reqwest::Client,
    results_per_page: u32,
}

impl HttpSearchClient {
    pub fn new(base_url: impl Into<String>, http_client: reqwest::Client, results_per_page: u32) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
            results_per_page,
        }
    }

    pub fn from_config(config: &SearchConfig) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent("product-search/0.1")
            .build()?;
        Ok(Self::new(config.api_base_url.clone(), http_client, config.results_per_page))
    }

    fn search_url(&self, query: &str, page: u32) -> String {
        let params = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("q", query)
            .append_pair("page", &page.to_string())
            .append_pair("limit", &self.results_per_page.to_string())
            .finish();
        format!("{}/api/search?{}", self.base_url, params)
    }

    async fn fetch(&self, request_id: Uuid, query: &str, page: u32, timeout: Duration) -> SearchOutcome {
        let search_url = self.search_url(query, page);
        debug!("Search URL: {}", search_url);

        let resp = match self
            .http_client
            .get(&search_url)
            .header("Accept", "application/json")
            .header("x-request-id", request_id.to_string())
            .timeout(timeout)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => return SearchOutcome::Failure(classify_transport_error(&e)),
        };

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let err = match serde_json::from_str::<ErrorResponse>(&body) {
                Ok(envelope) => envelope.error,
                Err(_) => status_error(status),
            };
            return SearchOutcome::Failure(err);
        }

        match resp.json::<SearchResponse>().await {
            Ok(parsed) => SearchOutcome::Success(parsed),
            Err(e) if e.is_timeout() => SearchOutcome::Failure(ApiError::timeout()),
            Err(e) => {
                warn!("Failed to parse search response: {}", e);
                SearchOutcome::Failure(ApiError::unknown())
            }
        }
    }
}

impl SearchBackend for HttpSearchClient {
    async fn search(&self, query: &str, page: u32, options: FetchOptions) -> SearchOutcome {
        let request_id = Uuid::new_v4();
        info!(%request_id, "Searching for {:?} page {}", query, page);

        let outcome = tokio::select! {
            biased;
            _ = options.cancel.cancelled() => SearchOutcome::Cancelled,
            outcome = self.fetch(request_id, query, page, options.timeout) => outcome,
        };

        match &outcome {
            SearchOutcome::Success(resp) => {
                info!(%request_id, "Search returned {} of {} results", resp.results.len(), resp.total)
            }
            SearchOutcome::Failure(err) => warn!(%request_id, "Search failed: {}", err),
            SearchOutcome::Cancelled => debug!(%request_id, "Search cancelled"),
        }
        outcome
    }
}

/// Error for a non-2xx response whose body carried no structured error.
pub fn status_error(status: StatusCode) -> ApiError {
    let code = match status {
        StatusCode::SERVICE_UNAVAILABLE => ErrorCode::ServiceUnavailable,
        StatusCode::NOT_FOUND => ErrorCode::NotFound,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ErrorCode::Timeout,
        _ => ErrorCode::RequestFailed,
    };
    ApiError::new(code, status.as_u16(), "Request failed")
}

fn classify_transport_error(err: &reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::timeout()
    } else if err.is_connect() || err.is_request() {
        ApiError::network()
    } else {
        ApiError::new(
            ErrorCode::NetworkError,
            0,
            "Something went wrong while searching. Please try again.",
        )
    }
}
