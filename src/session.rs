//! One search box: its state, its in-flight request and the cache lookups
//! in between.
//!
//! A session keeps at most one request outstanding. Issuing a new search
//! cancels the previous token first, and every completion re-checks its
//! generation under the session lock before touching state, so a superseded
//! response can never overwrite a newer one even if it wins the race against
//! its own cancellation.

use crate::cache::SearchCache;
use crate::client::{FetchOptions, SearchBackend, SearchOutcome};
use crate::config::SearchConfig;
use crate::debounce::debounced;
use crate::location::{parse_location, LocationSync, NoLocation};
use crate::state::{SearchAction, SearchState};
use crate::types::{ApiError, SearchSnapshot};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Parameters of a single `perform_search` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCall {
    pub query: String,
    pub page: u32,
    pub append: bool,
}

struct InFlight {
    generation: u64,
    cancel: CancellationToken,
}

#[derive(Default)]
struct SessionInner {
    last_searched: String,
    in_flight: Option<InFlight>,
    next_generation: u64,
    last_failed: Option<SearchCall>,
}

impl SessionInner {
    fn cancel_in_flight(&mut self) {
        if let Some(previous) = self.in_flight.take() {
            debug!("cancelling search request #{}", previous.generation);
            previous.cancel.cancel();
        }
    }
}

pub struct SearchSession<B, L = NoLocation> {
    backend: Arc<B>,
    cache: Arc<SearchCache>,
    location: L,
    config: SearchConfig,
    input: watch::Sender<String>,
    state: watch::Sender<SearchState>,
    inner: Mutex<SessionInner>,
}

impl<B: SearchBackend, L: LocationSync> SearchSession<B, L> {
    pub fn new(backend: Arc<B>, cache: Arc<SearchCache>, location: L, config: SearchConfig) -> Self {
        let (input, _) = watch::channel(String::new());
        let (state, _) = watch::channel(SearchState::default());
        Self {
            backend,
            cache,
            location,
            config,
            input,
            state,
            inner: Mutex::new(SessionInner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch(&self, action: SearchAction) {
        self.state.send_modify(|state| {
            *state = std::mem::take(state).apply(action);
        });
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<SearchCache> {
        &self.cache
    }

    pub fn location(&self) -> &L {
        &self.location
    }

    pub fn state(&self) -> SearchState {
        self.state.borrow().clone()
    }

    /// Follow state changes, e.g. to re-render.
    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.state.subscribe()
    }

    pub fn input_value(&self) -> String {
        self.input.borrow().clone()
    }

    /// Record what is typed in the search box. Searches only start once the
    /// debounced value settles, see [`spawn_search_loop`].
    pub fn set_input(&self, value: impl Into<String>) {
        self.input.send_replace(value.into());
    }

    pub fn total_pages(&self) -> u64 {
        self.config.total_pages(self.state.borrow().total)
    }

    pub fn is_in_flight(&self) -> bool {
        self.lock().in_flight.is_some()
    }

    /// Search for `query` at `page`, or fetch the next page when `append`.
    ///
    /// Non-append calls are served from the cache when possible and are the
    /// only responses written back to it. Cancelled and superseded requests
    /// leave state and cache untouched.
    pub async fn perform_search(&self, query: &str, page: u32, append: bool) {
        let call = SearchCall {
            query: query.to_string(),
            page,
            append,
        };

        let (generation, cancel) = {
            let mut inner = self.lock();
            if append && self.state.borrow().query != query {
                debug!("ignoring next page of {:?}, session moved on", query);
                return;
            }
            inner.cancel_in_flight();
            // A failure only stays retryable until something else is issued.
            inner.last_failed = None;

            if !append {
                if let Some(snapshot) = self.cache.get(query, i64::from(page)) {
                    info!("Restoring {:?} page {} from cache", query, page);
                    self.dispatch(SearchAction::RestoreFromCache(SearchSnapshot::clone(&snapshot)));
                    drop(inner);
                    self.location.replace(query, page);
                    return;
                }
            }

            inner.next_generation += 1;
            let generation = inner.next_generation;
            let cancel = CancellationToken::new();
            inner.in_flight = Some(InFlight {
                generation,
                cancel: cancel.clone(),
            });
            self.dispatch(if append {
                SearchAction::LoadMoreStart
            } else {
                SearchAction::SearchStart {
                    query: query.to_string(),
                }
            });
            (generation, cancel)
        };

        debug!("search request #{} for {:?} page {} (append: {})", generation, query, page, append);
        let outcome = self.fetch(&call, cancel.clone()).await;
        self.complete(generation, &cancel, call, outcome);
    }

    async fn fetch(&self, call: &SearchCall, cancel: CancellationToken) -> SearchOutcome {
        let timeout = self.config.request_timeout;
        let options = FetchOptions {
            timeout,
            cancel: cancel.clone(),
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => SearchOutcome::Cancelled,
            result = tokio::time::timeout(timeout, self.backend.search(&call.query, call.page, options)) => {
                match result {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        warn!("search for {:?} timed out after {:?}", call.query, timeout);
                        SearchOutcome::Failure(ApiError::timeout())
                    }
                }
            }
        }
    }

    fn complete(&self, generation: u64, cancel: &CancellationToken, call: SearchCall, outcome: SearchOutcome) {
        let mut inner = self.lock();
        let is_current = inner
            .in_flight
            .as_ref()
            .is_some_and(|f| f.generation == generation);
        if !is_current || cancel.is_cancelled() {
            debug!("discarding superseded search request #{}", generation);
            return;
        }
        inner.in_flight = None;

        // Our own token is not cancelled, so the backend gave up on its own.
        let outcome = match outcome {
            SearchOutcome::Cancelled => {
                warn!("search request #{} abandoned by backend", generation);
                SearchOutcome::Failure(ApiError::unknown())
            }
            other => other,
        };

        match outcome {
            SearchOutcome::Cancelled => {}
            SearchOutcome::Success(response) => {
                inner.last_failed = None;
                if call.append {
                    self.dispatch(SearchAction::LoadMoreSuccess(response));
                } else {
                    self.cache.set(
                        &call.query,
                        i64::from(call.page),
                        SearchSnapshot::from_response(&call.query, &response),
                    );
                    self.dispatch(SearchAction::SearchSuccess(response));
                    drop(inner);
                    self.location.replace(&call.query, call.page);
                }
            }
            SearchOutcome::Failure(error) => {
                warn!("search for {:?} page {} failed: {}", call.query, call.page, error);
                let action = if call.append {
                    SearchAction::LoadMoreError(error)
                } else {
                    SearchAction::SearchError(error)
                };
                inner.last_failed = Some(call);
                self.dispatch(action);
            }
        }
    }

    /// React to a settled input value. Repeats are ignored; a blank query
    /// clears the session; anything else searches from page 1.
    pub async fn on_settled_query(&self, query: &str) {
        {
            let mut inner = self.lock();
            if inner.last_searched == query {
                return;
            }
            inner.last_searched = if query.trim().is_empty() {
                String::new()
            } else {
                query.to_string()
            };
        }

        if query.trim().is_empty() {
            self.reset();
            return;
        }
        self.perform_search(query, 1, false).await;
    }

    /// Fetch and append the next page. Returns false when there is nothing
    /// more to load or a request is already running.
    pub async fn load_more(&self) -> bool {
        let (query, next_page) = {
            let state = self.state.borrow();
            if !state.has_more || state.is_loading || state.is_loading_more || state.query.is_empty() {
                return false;
            }
            (state.query.clone(), state.page + 1)
        };
        self.perform_search(&query, next_page, true).await;
        true
    }

    /// Replace results with another page of the current query.
    pub async fn go_to_page(&self, page: u32) -> bool {
        let query = {
            let state = self.state.borrow();
            let total_pages = self.config.total_pages(state.total);
            if page < 1 || u64::from(page) > total_pages || state.is_loading || state.query.is_empty() {
                return false;
            }
            state.query.clone()
        };
        self.perform_search(&query, page, false).await;
        true
    }

    /// Replay the last failed request, or re-run the current page when
    /// nothing has failed.
    /// Refused while a request is running.
    pub async fn retry(&self) -> bool {
        {
            let state = self.state.borrow();
            if state.is_loading || state.is_loading_more {
                return false;
            }
        }
        let failed = self.lock().last_failed.clone();
        let call = match failed {
            Some(call) => call,
            None => {
                let state = self.state.borrow();
                if state.query.is_empty() {
                    return false;
                }
                SearchCall {
                    query: state.query.clone(),
                    page: state.page,
                    append: false,
                }
            }
        };
        self.perform_search(&call.query, call.page, call.append).await;
        true
    }

    /// Empty the search box and return to the idle state.
    pub fn clear(&self) {
        self.input.send_replace(String::new());
        self.lock().last_searched.clear();
        self.reset();
    }

    fn reset(&self) {
        {
            let mut inner = self.lock();
            inner.cancel_in_flight();
            inner.last_failed = None;
            self.dispatch(SearchAction::ClearSearch);
        }
        self.location.replace("", 1);
    }

    /// Initialise from an addressable location such as `/search?q=mouse&page=2`.
    pub async fn restore_from_location(&self, location: &str) {
        let (query, page) = parse_location(location);
        if query.is_empty() {
            return;
        }
        self.input.send_replace(query.clone());
        self.lock().last_searched = query.clone();
        self.perform_search(&query, page, false).await;
    }
}

impl<B, L> Drop for SearchSession<B, L> {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(in_flight) = inner.in_flight.take() {
            in_flight.cancel.cancel();
        }
    }
}

/// Debounce the session's input and search on every settled value.
///
/// Each settled query runs on its own task so that a newer query can
/// supersede one still in flight. The loop holds only a weak reference and
/// stops once the session is dropped.
pub fn spawn_search_loop<B, L>(session: &Arc<SearchSession<B, L>>) -> JoinHandle<()>
where
    B: SearchBackend,
    L: LocationSync,
{
    let mut settled = debounced(session.input.subscribe(), session.config.debounce_delay);
    let weak: Weak<SearchSession<B, L>> = Arc::downgrade(session);

    tokio::spawn(async move {
        while settled.changed().await.is_ok() {
            let query = settled.borrow_and_update().clone();
            let Some(session) = weak.upgrade() else {
                break;
            };
            tokio::spawn(async move {
                session.on_settled_query(&query).await;
            });
        }
        debug!("search loop finished");
    })
}
