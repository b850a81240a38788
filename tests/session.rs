use product_search::cache::SearchCache;
use product_search::client::{FetchOptions, SearchBackend, SearchOutcome};
use product_search::config::SearchConfig;
use product_search::location::{LocationSync, MemoryHistory};
use product_search::session::{spawn_search_loop, SearchSession};
use product_search::state::{SearchPhase, SearchState};
use product_search::types::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::Duration;
use tokio::time::{sleep, Instant};

#[derive(Clone)]
struct Step {
    delay: Duration,
    outcome: SearchOutcome,
}

/// Backend answering from a script keyed by (query, page).
#[derive(Default)]
struct ScriptedBackend {
    steps: Mutex<HashMap<(String, u32), Step>>,
    calls: Mutex<Vec<(String, u32)>>,
}

impl ScriptedBackend {
    fn script(&self, query: &str, page: u32, delay_ms: u64, outcome: SearchOutcome) {
        self.steps.lock().unwrap().insert(
            (query.to_string(), page),
            Step {
                delay: Duration::from_millis(delay_ms),
                outcome,
            },
        );
    }

    fn calls(&self) -> Vec<(String, u32)> {
        self.calls.lock().unwrap().clone()
    }
}

impl SearchBackend for ScriptedBackend {
    async fn search(&self, query: &str, page: u32, options: FetchOptions) -> SearchOutcome {
        self.calls.lock().unwrap().push((query.to_string(), page));
        let step = self
            .steps
            .lock()
            .unwrap()
            .get(&(query.to_string(), page))
            .cloned()
            .unwrap_or_else(|| {
                let id = format!("{}-{}", query, page);
                Step {
                    delay: Duration::from_millis(100),
                    outcome: found(&[id.as_str()], page, 1, false),
                }
            });
        tokio::select! {
            _ = options.cancel.cancelled() => SearchOutcome::Cancelled,
            _ = sleep(step.delay) => step.outcome,
        }
    }
}

fn product(id: &str) -> Product {
    Product {
        id: id.to_string(),
        name: format!("Product {}", id),
        description: String::new(),
        price: 49.99,
        category: "Electronics".to_string(),
        image: String::new(),
        rating: 4.0,
        in_stock: true,
    }
}

fn found(ids: &[&str], page: u32, total: u64, has_more: bool) -> SearchOutcome {
    SearchOutcome::Success(SearchResponse {
        results: ids.iter().map(|id| product(id)).collect(),
        total,
        page,
        limit: 10,
        has_more,
    })
}

fn failed(code: ErrorCode, status: u16) -> SearchOutcome {
    SearchOutcome::Failure(ApiError::new(code, status, "Internal server error"))
}

fn ids(state: &SearchState) -> Vec<String> {
    state.results.iter().map(|p| p.id.clone()).collect()
}

type Session = SearchSession<ScriptedBackend, MemoryHistory>;

fn session_with(backend: &Arc<ScriptedBackend>, cache: &Arc<SearchCache>) -> Arc<Session> {
    Arc::new(SearchSession::new(
        backend.clone(),
        cache.clone(),
        MemoryHistory::new("/search"),
        SearchConfig::default(),
    ))
}

fn setup() -> (Arc<ScriptedBackend>, Arc<SearchCache>, Arc<Session>) {
    let backend = Arc::new(ScriptedBackend::default());
    let cache = Arc::new(SearchCache::default());
    let session = session_with(&backend, &cache);
    (backend, cache, session)
}

#[tokio::test(start_paused = true)]
async fn test_success_populates_cache_and_location() {
    let (backend, cache, session) = setup();
    backend.script("laptop", 1, 100, found(&["l1", "l2"], 1, 12, true));

    session.perform_search("laptop", 1, false).await;

    let state = session.state();
    assert_eq!(state.phase(), SearchPhase::Success);
    assert_eq!(ids(&state), ["l1", "l2"]);
    assert_eq!(state.total, 12);
    assert!(state.has_more);
    assert_eq!(session.total_pages(), 2);
    assert_eq!(cache.get("LAPTOP", 1).unwrap().results.len(), 2);
    assert_eq!(session.location().current(), "/search?q=laptop");
}

#[tokio::test(start_paused = true)]
async fn test_cache_hit_skips_network() {
    let (backend, cache, session) = setup();
    backend.script("laptop", 1, 100, found(&["l1"], 1, 1, false));

    session.perform_search("laptop", 1, false).await;
    session.clear();
    assert_eq!(session.state(), SearchState::default());

    let other = session_with(&backend, &cache);
    let mut updates = other.subscribe();
    updates.borrow_and_update();
    other.perform_search("Laptop", 1, false).await;

    assert_eq!(backend.calls().len(), 1);
    let state = other.state();
    assert_eq!(ids(&state), ["l1"]);
    assert!(!state.is_loading);
    // Restored in one step, never passing through a loading state.
    assert!(updates.has_changed().unwrap());
    assert_eq!(updates.borrow_and_update().phase(), SearchPhase::Success);
    assert_eq!(other.location().current(), "/search?q=Laptop");
}

#[tokio::test(start_paused = true)]
async fn test_superseded_request_never_overwrites_newer_one() {
    let (backend, cache, session) = setup();
    backend.script("alpha", 1, 300, found(&["a1"], 1, 1, false));
    backend.script("beta", 1, 50, found(&["b1"], 1, 1, false));

    let first = session.clone();
    let pending = tokio::spawn(async move { first.perform_search("alpha", 1, false).await });
    sleep(Duration::from_millis(10)).await;
    assert!(session.is_in_flight());

    session.perform_search("beta", 1, false).await;
    pending.await.unwrap();
    sleep(Duration::from_millis(500)).await;

    let state = session.state();
    assert_eq!(state.query, "beta");
    assert_eq!(ids(&state), ["b1"]);
    assert!(state.error.is_none());
    assert!(cache.get("alpha", 1).is_none());
    assert!(cache.get("beta", 1).is_some());
    assert_eq!(
        backend.calls(),
        [("alpha".to_string(), 1), ("beta".to_string(), 1)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_slow_failure_is_discarded_after_supersede() {
    let (backend, _cache, session) = setup();
    backend.script("alpha", 1, 300, failed(ErrorCode::ServerError, 500));
    backend.script("beta", 1, 50, found(&["b1"], 1, 1, false));

    let first = session.clone();
    let pending = tokio::spawn(async move { first.perform_search("alpha", 1, false).await });
    sleep(Duration::from_millis(10)).await;
    session.perform_search("beta", 1, false).await;
    pending.await.unwrap();
    sleep(Duration::from_millis(500)).await;

    assert_eq!(session.state().phase(), SearchPhase::Success);
    assert_eq!(ids(&session.state()), ["b1"]);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_request_leaves_state_and_cache_alone() {
    let (backend, cache, session) = setup();
    backend.script("alpha", 1, 300, found(&["a1"], 1, 1, false));

    let first = session.clone();
    let pending = tokio::spawn(async move { first.perform_search("alpha", 1, false).await });
    sleep(Duration::from_millis(10)).await;
    assert!(session.state().is_loading);

    let mut updates = session.subscribe();
    updates.borrow_and_update();
    session.clear();
    assert!(updates.has_changed().unwrap());
    updates.borrow_and_update();

    pending.await.unwrap();
    sleep(Duration::from_secs(1)).await;

    assert!(!updates.has_changed().unwrap());
    assert_eq!(session.state(), SearchState::default());
    assert!(cache.is_empty());
    assert!(!session.is_in_flight());
}

#[tokio::test(start_paused = true)]
async fn test_load_more_appends_without_caching() {
    let (backend, cache, session) = setup();
    backend.script("mouse", 1, 100, found(&["m1", "m2"], 1, 4, true));
    backend.script("mouse", 2, 100, found(&["m3", "m4"], 2, 4, false));

    session.perform_search("mouse", 1, false).await;
    assert!(session.load_more().await);

    let state = session.state();
    assert_eq!(ids(&state), ["m1", "m2", "m3", "m4"]);
    assert_eq!(state.page, 2);
    assert!(!state.has_more);
    assert!(!state.is_loading_more);

    assert!(cache.get("mouse", 2).is_none());
    assert_eq!(cache.get("mouse", 1).unwrap().results.len(), 2);
    assert_eq!(cache.len(), 1);

    // Nothing left to load.
    assert!(!session.load_more().await);
    assert_eq!(backend.calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_load_more_bypasses_cache() {
    let (backend, cache, session) = setup();
    backend.script("mouse", 1, 100, found(&["m1"], 1, 2, true));
    backend.script("mouse", 2, 100, found(&["m2"], 2, 2, false));
    cache.set(
        "mouse",
        2,
        SearchSnapshot {
            query: "mouse".into(),
            results: vec![product("stale")],
            page: 2,
            total: 2,
            has_more: false,
        },
    );

    session.perform_search("mouse", 1, false).await;
    session.load_more().await;

    assert_eq!(ids(&session.state()), ["m1", "m2"]);
    assert_eq!(backend.calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_error_keeps_results_and_is_not_cached() {
    let (backend, cache, session) = setup();
    backend.script("mouse", 1, 100, found(&["m1"], 1, 1, false));
    backend.script("broken", 1, 100, failed(ErrorCode::ServerError, 500));

    session.perform_search("mouse", 1, false).await;
    session.perform_search("broken", 1, false).await;

    let state = session.state();
    assert_eq!(state.phase(), SearchPhase::Error);
    assert_eq!(state.error.as_ref().unwrap().code, ErrorCode::ServerError);
    assert_eq!(ids(&state), ["m1"]);
    assert!(cache.get("broken", 1).is_none());
    // Earlier results stay cached.
    assert!(cache.get("mouse", 1).is_some());

    backend.script("broken", 1, 100, found(&["b1"], 1, 1, false));
    assert!(session.retry().await);
    let state = session.state();
    assert_eq!(state.phase(), SearchPhase::Success);
    assert_eq!(ids(&state), ["b1"]);
}

#[tokio::test(start_paused = true)]
async fn test_retry_replays_failed_load_more() {
    let (backend, _cache, session) = setup();
    backend.script("mouse", 1, 100, found(&["m1"], 1, 2, true));
    backend.script("mouse", 2, 100, failed(ErrorCode::NetworkError, 0));

    session.perform_search("mouse", 1, false).await;
    session.load_more().await;
    let state = session.state();
    assert_eq!(state.phase(), SearchPhase::Error);
    assert_eq!(ids(&state), ["m1"]);

    backend.script("mouse", 2, 100, found(&["m2"], 2, 2, false));
    session.retry().await;
    assert_eq!(ids(&session.state()), ["m1", "m2"]);
}

#[tokio::test(start_paused = true)]
async fn test_stale_load_more_failure_is_not_retried_over_new_query() {
    let (backend, _cache, session) = setup();
    backend.script("mouse", 1, 100, found(&["m1"], 1, 2, true));
    backend.script("mouse", 2, 100, failed(ErrorCode::NetworkError, 0));
    backend.script("desk", 1, 300, found(&["d1"], 1, 1, false));

    session.perform_search("mouse", 1, false).await;
    assert!(session.load_more().await);
    assert_eq!(session.state().phase(), SearchPhase::Error);

    let searching = session.clone();
    let pending = tokio::spawn(async move { searching.perform_search("desk", 1, false).await });
    sleep(Duration::from_millis(10)).await;
    assert!(!session.retry().await);
    // A next page for a query the session has left is ignored.
    session.perform_search("mouse", 2, true).await;
    pending.await.unwrap();

    let state = session.state();
    assert_eq!(state.query, "desk");
    assert_eq!(ids(&state), ["d1"]);
    assert_eq!(state.page, 1);
    assert_eq!(state.phase(), SearchPhase::Success);

    // The mouse failure is gone; retry re-runs desk from the cache.
    assert!(session.retry().await);
    assert_eq!(ids(&session.state()), ["d1"]);
    assert_eq!(
        backend.calls(),
        [
            ("mouse".to_string(), 1),
            ("mouse".to_string(), 2),
            ("desk".to_string(), 1)
        ]
    );
}

/// Location sink that asks the session about itself on every update.
#[derive(Default)]
struct ObservingLocation {
    session: OnceLock<Weak<SearchSession<ScriptedBackend, ObservingLocation>>>,
    seen: Mutex<Vec<(String, bool)>>,
}

impl LocationSync for ObservingLocation {
    fn replace(&self, query: &str, _page: u32) {
        let in_flight = self
            .session
            .get()
            .and_then(Weak::upgrade)
            .map(|session| session.is_in_flight())
            .unwrap_or(false);
        self.seen.lock().unwrap().push((query.to_string(), in_flight));
    }
}

#[tokio::test(start_paused = true)]
async fn test_location_sync_may_call_back_into_session() {
    let backend = Arc::new(ScriptedBackend::default());
    backend.script("lamp", 1, 100, found(&["l1"], 1, 1, false));
    let session = Arc::new(SearchSession::new(
        backend,
        Arc::new(SearchCache::default()),
        ObservingLocation::default(),
        SearchConfig::default(),
    ));
    session
        .location()
        .session
        .set(Arc::downgrade(&session))
        .unwrap();

    session.perform_search("lamp", 1, false).await;
    session.perform_search("lamp", 1, false).await;
    session.clear();

    assert_eq!(
        *session.location().seen.lock().unwrap(),
        [
            ("lamp".to_string(), false),
            ("lamp".to_string(), false),
            (String::new(), false)
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_request_timeout() {
    let (backend, cache, session) = setup();
    backend.script("slow", 1, 60_000, found(&["s1"], 1, 1, false));

    let start = Instant::now();
    session.perform_search("slow", 1, false).await;

    assert_eq!(start.elapsed(), Duration::from_millis(10_000));
    let state = session.state();
    assert_eq!(state.error.as_ref().unwrap().code, ErrorCode::Timeout);
    assert_eq!(state.error.as_ref().unwrap().status, 408);
    assert!(!state.is_loading);
    assert!(cache.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_go_to_page_bounds() {
    let (backend, cache, session) = setup();
    backend.script("hub", 1, 100, found(&["h1"], 1, 25, true));
    backend.script("hub", 3, 100, found(&["h21"], 3, 25, false));

    assert!(!session.go_to_page(1).await);
    session.perform_search("hub", 1, false).await;

    assert!(!session.go_to_page(0).await);
    assert!(!session.go_to_page(4).await);
    assert!(session.go_to_page(3).await);

    assert_eq!(ids(&session.state()), ["h21"]);
    assert_eq!(session.state().page, 3);
    assert!(cache.get("hub", 3).is_some());
    assert_eq!(session.location().current(), "/search?q=hub&page=3");
}

#[tokio::test(start_paused = true)]
async fn test_settled_query_handling() {
    let (backend, _cache, session) = setup();

    session.on_settled_query("desk").await;
    session.on_settled_query("desk").await;
    assert_eq!(backend.calls().len(), 1);

    session.on_settled_query("   ").await;
    assert_eq!(session.state(), SearchState::default());
    assert_eq!(session.location().current(), "/search");

    session.on_settled_query("desk").await;
    assert_eq!(session.state().query, "desk");
}

#[tokio::test(start_paused = true)]
async fn test_restore_from_location() {
    let (backend, _cache, session) = setup();
    backend.script("usb hub", 2, 100, found(&["u11"], 2, 11, false));

    session.restore_from_location("/search?q=usb+hub&page=2").await;

    assert_eq!(session.input_value(), "usb hub");
    let state = session.state();
    assert_eq!(state.page, 2);
    assert_eq!(ids(&state), ["u11"]);
    assert_eq!(session.location().current(), "/search?q=usb+hub&page=2");

    // A debounced echo of the restored query does not search again.
    session.on_settled_query("usb hub").await;
    assert_eq!(backend.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_typing_is_debounced_into_one_search() {
    let (backend, _cache, session) = setup();
    let _search_loop = spawn_search_loop(&session);
    let mut updates = session.subscribe();

    for text in ["k", "ke", "key", "keyb"] {
        session.set_input(text);
        sleep(Duration::from_millis(200)).await;
    }
    assert!(backend.calls().is_empty());

    // Last keystroke at 600ms: search starts at 1100ms, result 100ms later.
    sleep(Duration::from_millis(600)).await;
    assert_eq!(backend.calls(), [("keyb".to_string(), 1)]);
    loop {
        if !updates.borrow_and_update().is_loading && session.state().query == "keyb" {
            break;
        }
        updates.changed().await.unwrap();
    }
    assert_eq!(ids(&session.state()), ["keyb-1"]);
}

#[tokio::test(start_paused = true)]
async fn test_new_query_while_loading_supersedes_through_loop() {
    let (backend, cache, session) = setup();
    backend.script("monitor", 1, 2_000, found(&["slow"], 1, 1, false));
    backend.script("mouse", 1, 100, found(&["fast"], 1, 1, false));
    let _search_loop = spawn_search_loop(&session);

    session.set_input("monitor");
    sleep(Duration::from_millis(700)).await;
    assert!(session.state().is_loading);

    session.set_input("mouse");
    sleep(Duration::from_secs(3)).await;

    assert_eq!(ids(&session.state()), ["fast"]);
    assert!(cache.get("monitor", 1).is_none());
}
