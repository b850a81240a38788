use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub category: String,
    pub image: String,
    pub rating: f64,
    pub in_stock: bool,
}

/// One page of results as returned by the search endpoint.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<Product>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub has_more: bool,
}

/// Raw query parameters of `GET /api/search`. Numbers stay strings so that
/// garbage is reported as `INVALID_PARAMS` instead of a rejection.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default)]
    pub limit: Option<String>,
}

/// A completed, non-error result for one (query, page) pair.
///
/// Snapshots are what the cache stores; once built they are never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSnapshot {
    pub query: String,
    pub results: Vec<Product>,
    pub page: u32,
    pub total: u64,
    pub has_more: bool,
}

impl SearchSnapshot {
    pub fn from_response(query: &str, response: &SearchResponse) -> Self {
        Self {
            query: query.to_string(),
            results: response.results.clone(),
            page: response.page,
            total: response.total,
            has_more: response.has_more,
        }
    }
}

/// Error codes the search endpoint and client produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ErrorCode {
    MissingQuery,
    InvalidParams,
    NotFound,
    Timeout,
    NetworkError,
    ServiceUnavailable,
    ServerError,
    RequestFailed,
    UnknownError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::MissingQuery => "MISSING_QUERY",
            ErrorCode::InvalidParams => "INVALID_PARAMS",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ErrorCode::ServerError => "SERVER_ERROR",
            ErrorCode::RequestFailed => "REQUEST_FAILED",
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
        }
    }

    /// Validation and not-found errors will fail again with the same input.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ErrorCode::MissingQuery | ErrorCode::InvalidParams | ErrorCode::NotFound
        )
    }

    pub fn presentation(&self) -> ErrorPresentation {
        let (title, suggestion) = match self {
            ErrorCode::ServiceUnavailable => (
                "Service Temporarily Unavailable",
                "Our servers are experiencing high traffic. This usually resolves within a few minutes.",
            ),
            ErrorCode::Timeout => (
                "Search Timed Out",
                "Try using fewer or more specific search terms.",
            ),
            ErrorCode::NetworkError => (
                "Connection Problem",
                "Please check your internet connection and try again.",
            ),
            ErrorCode::NotFound => (
                "Not Found",
                "The item you're looking for doesn't exist or has been removed.",
            ),
            ErrorCode::InvalidParams | ErrorCode::MissingQuery => {
                ("Invalid Search", "Please enter a valid search term.")
            }
            ErrorCode::ServerError | ErrorCode::RequestFailed | ErrorCode::UnknownError => (
                "Something Went Wrong",
                "An unexpected error occurred. Please try again.",
            ),
        };
        ErrorPresentation { title, suggestion }
    }
}

impl From<String> for ErrorCode {
    fn from(code: String) -> Self {
        match code.as_str() {
            "MISSING_QUERY" => ErrorCode::MissingQuery,
            "INVALID_PARAMS" => ErrorCode::InvalidParams,
            "NOT_FOUND" => ErrorCode::NotFound,
            "TIMEOUT" => ErrorCode::Timeout,
            "NETWORK_ERROR" => ErrorCode::NetworkError,
            "SERVICE_UNAVAILABLE" => ErrorCode::ServiceUnavailable,
            "SERVER_ERROR" => ErrorCode::ServerError,
            "REQUEST_FAILED" => ErrorCode::RequestFailed,
            _ => ErrorCode::UnknownError,
        }
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> Self {
        code.as_str().to_string()
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Title and hint shown next to an error with a retry button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorPresentation {
    pub title: &'static str,
    pub suggestion: &'static str,
}

/// Structured search failure, `{message, code, status}` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{message} ({code}, status {status})")]
pub struct ApiError {
    pub message: String,
    pub code: ErrorCode,
    pub status: u16,
}

impl ApiError {
    pub fn new(code: ErrorCode, status: u16, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code,
            status,
        }
    }

    pub fn missing_query() -> Self {
        Self::new(ErrorCode::MissingQuery, 400, "Query parameter is required")
    }

    pub fn invalid_params() -> Self {
        Self::new(ErrorCode::InvalidParams, 400, "Invalid pagination parameters")
    }

    pub fn timeout() -> Self {
        Self::new(
            ErrorCode::Timeout,
            408,
            "The search request took too long. Please try again or use a simpler search term.",
        )
    }

    pub fn network() -> Self {
        Self::new(
            ErrorCode::NetworkError,
            0,
            "Unable to connect to the server. Please check your internet connection.",
        )
    }

    pub fn unknown() -> Self {
        Self::new(
            ErrorCode::UnknownError,
            0,
            "An unexpected error occurred. Please try again.",
        )
    }

    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    pub fn presentation(&self) -> ErrorPresentation {
        self.code.presentation()
    }
}

/// Error body of a failed `/api/search` call.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ApiError,
}
