//! Mirroring the active query and page into an addressable location.

use std::sync::Mutex;
use url::Url;

/// Receives the (query, page) the session currently shows.
pub trait LocationSync: Send + Sync + 'static {
    fn replace(&self, query: &str, page: u32);
}

/// Query string for a location: empty for no query, no `page` for page 1.
pub fn location_query(query: &str, page: u32) -> String {
    if query.is_empty() {
        return String::new();
    }
    let mut params = url::form_urlencoded::Serializer::new(String::new());
    params.append_pair("q", query);
    if page > 1 {
        params.append_pair("page", &page.to_string());
    }
    params.finish()
}

/// `path` with the location query appended, if there is one.
pub fn location_for(path: &str, query: &str, page: u32) -> String {
    let params = location_query(query, page);
    if params.is_empty() {
        path.to_string()
    } else {
        format!("{}?{}", path, params)
    }
}

/// Read `q` and `page` back out of a location. A missing or invalid page is 1.
pub fn parse_location(location: &str) -> (String, u32) {
    let query_string = match Url::parse(location) {
        Ok(url) => url.query().unwrap_or_default().to_string(),
        Err(_) => location
            .split_once('?')
            .map(|(_, qs)| qs.to_string())
            .unwrap_or_default(),
    };

    let mut query = String::new();
    let mut page = 1;
    for (key, value) in url::form_urlencoded::parse(query_string.as_bytes()) {
        match key.as_ref() {
            "q" => query = value.into_owned(),
            "page" => page = value.parse::<u32>().ok().filter(|p| *p >= 1).unwrap_or(1),
            _ => {}
        }
    }
    (query, page)
}

/// Keeps the current location in memory.
#[derive(Debug)]
pub struct MemoryHistory {
    path: String,
    current: Mutex<String>,
}

impl MemoryHistory {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            current: Mutex::new(path.clone()),
            path,
        }
    }

    pub fn current(&self) -> String {
        self.current
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl LocationSync for MemoryHistory {
    fn replace(&self, query: &str, page: u32) {
        let next = location_for(&self.path, query, page);
        *self
            .current
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = next;
    }
}

/// Discards location updates.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLocation;

impl LocationSync for NoLocation {
    fn replace(&self, _query: &str, _page: u32) {}
}
