//! Deterministic in-memory product catalog standing in for a real search
//! service. Matching is a plain case-insensitive substring test.

use crate::client::{FetchOptions, SearchBackend, SearchOutcome};
use crate::config::DEFAULT_RESULTS_PER_PAGE;
use crate::types::*;
use tracing::debug;

pub const MAX_LIMIT: u32 = 100;

const CATALOG: &[(&str, &[&str])] = &[
    (
        "Electronics",
        &[
            "Wireless Bluetooth Headphones",
            "USB-C Hub Adapter",
            "Mechanical Keyboard",
            "Portable SSD 1TB",
            "4K Webcam",
            "Smart LED Monitor",
            "Wireless Mouse",
            "Laptop Stand",
            "Power Bank 20000mAh",
            "Wireless Keyboard",
        ],
    ),
    (
        "Accessories",
        &[
            "Phone Case Premium",
            "Screen Protector Pack",
            "Charging Cable Braided",
            "Laptop Sleeve",
            "Keyboard Wrist Rest",
            "Monitor Light Bar",
            "Desk Mat XL",
            "Laptop Cooling Pad",
        ],
    ),
    (
        "Audio",
        &[
            "True Wireless Earbuds",
            "Noise Cancelling Headphones",
            "Bluetooth Speaker",
            "Studio Headphones",
            "Podcast Microphone Kit",
            "Audio Interface USB",
        ],
    ),
    (
        "Wearables",
        &[
            "Smartwatch Pro",
            "Fitness Tracker Band",
            "Smart Ring",
            "GPS Running Watch",
            "Sleep Tracker",
        ],
    ),
    (
        "Gaming",
        &[
            "Gaming Mouse RGB",
            "Controller Wireless",
            "Gaming Headset 7.1",
            "Gaming Keyboard TKL",
            "Mouse Pad XXL",
            "Gaming Monitor 144Hz",
        ],
    ),
    (
        "Home & Office",
        &[
            "Smart Plug WiFi",
            "LED Desk Lamp",
            "Standing Desk Converter",
            "Document Scanner",
            "USB Desk Fan",
        ],
    ),
];

#[derive(Debug, Clone)]
pub struct StubCatalog {
    products: Vec<Product>,
    page_size: u32,
}

impl Default for StubCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl StubCatalog {
    pub fn new() -> Self {
        let products = CATALOG
            .iter()
            .enumerate()
            .flat_map(|(c, (category, names))| {
                names.iter().enumerate().map(move |(i, name)| {
                    let n = (c * 100 + i) as f64;
                    Product {
                        id: format!("product-{}-{}", slug(category), i),
                        name: name.to_string(),
                        description: format!(
                            "High-quality {} with premium features. Perfect for {} enthusiasts.",
                            name.to_lowercase(),
                            category.to_lowercase()
                        ),
                        price: ((19.99 + (n * 37.0) % 480.0) * 100.0).round() / 100.0,
                        category: category.to_string(),
                        image: format!("/images/{}.jpg", slug(name)),
                        rating: 3.0 + ((n * 7.0) % 20.0) / 10.0,
                        in_stock: i % 5 != 4,
                    }
                })
            })
            .collect();
        Self {
            products,
            page_size: DEFAULT_RESULTS_PER_PAGE,
        }
    }

    /// Page size used when searched through [`SearchBackend`].
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    fn matches(product: &Product, query: &str) -> bool {
        query.chars().count() <= 2
            || product.name.to_lowercase().contains(query)
            || product.category.to_lowercase().contains(query)
    }

    /// One page of products matching `query`.
    pub fn find(&self, query: &str, page: u32, limit: u32) -> Result<SearchResponse, ApiError> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Err(ApiError::missing_query());
        }
        if page < 1 || limit < 1 || limit > MAX_LIMIT {
            return Err(ApiError::invalid_params());
        }

        let matching: Vec<&Product> = self
            .products
            .iter()
            .filter(|p| Self::matches(p, &query))
            .collect();
        let total = matching.len() as u64;
        let max_page = total.div_ceil(u64::from(limit));
        let start = (page as usize - 1).saturating_mul(limit as usize);

        let results = matching
            .into_iter()
            .skip(start)
            .take(limit as usize)
            .cloned()
            .collect();
        debug!("catalog matched {} products for {:?}", total, query);

        Ok(SearchResponse {
            results,
            total,
            page,
            limit,
            has_more: u64::from(page) < max_page,
        })
    }

    /// Validate raw query parameters and search.
    pub fn handle(&self, request: &SearchRequest) -> Result<SearchResponse, ApiError> {
        let query = request.q.as_deref().unwrap_or_default();
        if query.trim().is_empty() {
            return Err(ApiError::missing_query());
        }
        let page = parse_param(request.page.as_deref(), 1)?;
        let limit = parse_param(request.limit.as_deref(), DEFAULT_RESULTS_PER_PAGE)?;
        self.find(query, page, limit)
    }
}

impl SearchBackend for StubCatalog {
    async fn search(&self, query: &str, page: u32, options: FetchOptions) -> SearchOutcome {
        if options.cancel.is_cancelled() {
            return SearchOutcome::Cancelled;
        }
        match self.find(query, page, self.page_size) {
            Ok(response) => SearchOutcome::Success(response),
            Err(err) => SearchOutcome::Failure(err),
        }
    }
}

fn parse_param(raw: Option<&str>, default: u32) -> Result<u32, ApiError> {
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse::<u32>().map_err(|_| ApiError::invalid_params()),
    }
}

fn slug(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_matches_name_and_category() {
        let catalog = StubCatalog::new();
        let response = catalog.find("Keyboard", 1, 10).unwrap();
        assert_eq!(response.total, 4);
        assert!(response.results.iter().all(|p| p.name.contains("Keyboard")));

        let response = catalog.find("audio", 1, 10).unwrap();
        assert!(response.results.iter().any(|p| p.name == "Studio Headphones"));
    }

    #[test]
    fn test_pagination() {
        let catalog = StubCatalog::new();
        let total = catalog.len() as u64;

        // Short queries match everything.
        let first = catalog.find("ab", 1, 10).unwrap();
        assert_eq!(first.total, total);
        assert_eq!(first.results.len(), 10);
        assert!(first.has_more);

        let last_page = total.div_ceil(10) as u32;
        let last = catalog.find("ab", last_page, 10).unwrap();
        assert!(!last.has_more);
        assert!(catalog.find("ab", last_page + 1, 10).unwrap().results.is_empty());
    }

    #[test]
    fn test_validation() {
        let catalog = StubCatalog::new();
        let err = catalog.handle(&SearchRequest::default()).unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingQuery);

        let request = SearchRequest {
            q: Some("mouse".into()),
            page: Some("0".into()),
            limit: None,
        };
        assert_eq!(catalog.handle(&request).unwrap_err().code, ErrorCode::InvalidParams);

        let request = SearchRequest {
            q: Some("mouse".into()),
            page: Some("1".into()),
            limit: Some("101".into()),
        };
        assert_eq!(catalog.handle(&request).unwrap_err().status, 400);

        let request = SearchRequest {
            q: Some("mouse".into()),
            page: Some("two".into()),
            limit: None,
        };
        assert_eq!(catalog.handle(&request).unwrap_err().code, ErrorCode::InvalidParams);
    }

    #[test]
    fn test_products_are_stable() {
        let a = StubCatalog::new().find("smart", 1, 5).unwrap();
        let b = StubCatalog::new().find("smart", 1, 5).unwrap();
        assert_eq!(a, b);
        assert_eq!(slug("Home & Office"), "home-office");
    }
}
