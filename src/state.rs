//! Search state and its transition function.
//!
//! [`SearchState::apply`] is a pure function of the current state and a
//! [`SearchAction`]; the session is the only caller that feeds it actions.

use crate::types::{ApiError, Product, SearchResponse, SearchSnapshot};

/// Coarse phase derived from the state flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    Idle,
    Searching,
    LoadingMore,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchState {
    pub query: String,
    pub results: Vec<Product>,
    pub page: u32,
    pub total: u64,
    pub has_more: bool,
    pub is_loading: bool,
    pub is_loading_more: bool,
    pub error: Option<ApiError>,
}

impl Default for SearchState {
    fn default() -> Self {
        Self {
            query: String::new(),
            results: Vec::new(),
            page: 1,
            total: 0,
            has_more: false,
            is_loading: false,
            is_loading_more: false,
            error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchAction {
    SearchStart { query: String },
    SearchSuccess(SearchResponse),
    SearchError(ApiError),
    LoadMoreStart,
    LoadMoreSuccess(SearchResponse),
    LoadMoreError(ApiError),
    ClearSearch,
    RestoreFromCache(SearchSnapshot),
}

impl SearchState {
    pub fn apply(self, action: SearchAction) -> SearchState {
        match action {
            // Results stay visible until the new page arrives.
            SearchAction::SearchStart { query } => SearchState {
                query,
                page: 1,
                has_more: false,
                is_loading: true,
                is_loading_more: false,
                error: None,
                ..self
            },
            SearchAction::SearchSuccess(payload) => SearchState {
                results: payload.results,
                page: payload.page,
                total: payload.total,
                has_more: payload.has_more,
                is_loading: false,
                error: None,
                ..self
            },
            SearchAction::SearchError(error) => SearchState {
                is_loading: false,
                error: Some(error),
                ..self
            },
            // Starting a next page supersedes any first-page request.
            SearchAction::LoadMoreStart => SearchState {
                is_loading: false,
                is_loading_more: true,
                error: None,
                ..self
            },
            SearchAction::LoadMoreSuccess(payload) => {
                let mut results = self.results;
                results.extend(payload.results);
                SearchState {
                    results,
                    page: payload.page,
                    total: payload.total,
                    has_more: payload.has_more,
                    is_loading_more: false,
                    error: None,
                    ..self
                }
            }
            SearchAction::LoadMoreError(error) => SearchState {
                is_loading_more: false,
                error: Some(error),
                ..self
            },
            SearchAction::ClearSearch => SearchState::default(),
            SearchAction::RestoreFromCache(snapshot) => SearchState {
                query: snapshot.query,
                results: snapshot.results,
                page: snapshot.page,
                total: snapshot.total,
                has_more: snapshot.has_more,
                is_loading: false,
                is_loading_more: false,
                error: None,
            },
        }
    }

    pub fn phase(&self) -> SearchPhase {
        if self.is_loading {
            SearchPhase::Searching
        } else if self.is_loading_more {
            SearchPhase::LoadingMore
        } else if self.error.is_some() {
            SearchPhase::Error
        } else if self.query.is_empty() {
            SearchPhase::Idle
        } else {
            SearchPhase::Success
        }
    }

    /// A finished search with nothing to show.
    pub fn is_empty_result(&self) -> bool {
        self.phase() == SearchPhase::Success && self.results.is_empty()
    }
}
