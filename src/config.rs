use std::env;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:3000";
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;
pub const DEFAULT_RESULTS_PER_PAGE: u32 = 10;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_CACHE_TTL_MS: u64 = 5 * 60 * 1000;
pub const DEFAULT_MAX_CACHE_SIZE: usize = 50;
/// LRU bookkeeping is linear in the number of entries.
pub const MAX_CACHE_SIZE_LIMIT: usize = 1_000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be a non-negative integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },
    #[error("{var} must be greater than 0")]
    Zero { var: &'static str },
    #[error("{var} must be at most {max}, got {value}")]
    TooLarge { var: &'static str, value: u64, max: u64 },
}

/// Tunables for a search client process.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub api_base_url: String,
    pub debounce_delay: Duration,
    pub results_per_page: u32,
    pub request_timeout: Duration,
    pub cache_ttl: Duration,
    pub max_cache_size: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            debounce_delay: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            results_per_page: DEFAULT_RESULTS_PER_PAGE,
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            cache_ttl: Duration::from_millis(DEFAULT_CACHE_TTL_MS),
            max_cache_size: DEFAULT_MAX_CACHE_SIZE,
        }
    }
}

impl SearchConfig {
    /// Build from `SEARCH_*` environment variables, defaulting anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let millis = |var: &'static str, default: Duration| -> Result<Duration, ConfigError> {
            Ok(parse_number(&lookup, var)?
                .map(Duration::from_millis)
                .unwrap_or(default))
        };

        let results_per_page = match parse_number(&lookup, "SEARCH_RESULTS_PER_PAGE")? {
            Some(0) => return Err(ConfigError::Zero { var: "SEARCH_RESULTS_PER_PAGE" }),
            Some(n) => u32::try_from(n).map_err(|_| ConfigError::InvalidNumber {
                var: "SEARCH_RESULTS_PER_PAGE",
                value: n.to_string(),
            })?,
            None => defaults.results_per_page,
        };
        let max_cache_size = match parse_number(&lookup, "SEARCH_MAX_CACHE_SIZE")? {
            Some(0) => return Err(ConfigError::Zero { var: "SEARCH_MAX_CACHE_SIZE" }),
            Some(n) if n > MAX_CACHE_SIZE_LIMIT as u64 => {
                return Err(ConfigError::TooLarge {
                    var: "SEARCH_MAX_CACHE_SIZE",
                    value: n,
                    max: MAX_CACHE_SIZE_LIMIT as u64,
                })
            }
            Some(n) => n as usize,
            None => defaults.max_cache_size,
        };

        Ok(Self {
            api_base_url: lookup("SEARCH_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base_url),
            debounce_delay: millis("SEARCH_DEBOUNCE_MS", defaults.debounce_delay)?,
            results_per_page,
            request_timeout: millis("SEARCH_REQUEST_TIMEOUT_MS", defaults.request_timeout)?,
            cache_ttl: millis("SEARCH_CACHE_TTL_MS", defaults.cache_ttl)?,
            max_cache_size,
        })
    }

    /// Number of pages needed to show `total` results.
    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(u64::from(self.results_per_page))
    }
}

fn parse_number(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<u64>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { var, value }),
    }
}
