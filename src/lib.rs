pub mod cache;
pub mod catalog;
pub mod client;
pub mod config;
pub mod debounce;
pub mod location;
pub mod navigation;
pub mod server;
pub mod session;
pub mod state;
pub mod types;

use std::sync::Arc;

use cache::SearchCache;
use client::{HttpSearchClient, SearchBackend};
use config::SearchConfig;
use location::LocationSync;
use session::SearchSession;

// Re-export the wire types for easy access
pub use types::*;

/// Process-wide pieces shared by every search session: one cache and one
/// backend, built once at startup.
#[derive(Clone)]
pub struct AppState<B = HttpSearchClient> {
    pub config: SearchConfig,
    pub backend: Arc<B>,
    pub search_cache: Arc<SearchCache>,
}

impl AppState<HttpSearchClient> {
    pub fn from_config(config: SearchConfig) -> anyhow::Result<Self> {
        let backend = HttpSearchClient::from_config(&config)?;
        Ok(Self::new(config, backend))
    }
}

impl<B: SearchBackend> AppState<B> {
    pub fn new(config: SearchConfig, backend: B) -> Self {
        Self {
            search_cache: Arc::new(SearchCache::from_config(&config)),
            backend: Arc::new(backend),
            config,
        }
    }

    pub fn new_session<L: LocationSync>(&self, location: L) -> SearchSession<B, L> {
        SearchSession::new(
            self.backend.clone(),
            self.search_cache.clone(),
            location,
            self.config.clone(),
        )
    }
}
