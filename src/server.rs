//! HTTP surface of the stub catalog: `GET /api/search?q=&page=&limit=`.

use crate::catalog::StubCatalog;
use crate::types::*;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub fn router(catalog: Arc<StubCatalog>) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .route("/api/search", get(search_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(catalog)
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "product-search",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn search_handler(
    State(catalog): State<Arc<StubCatalog>>,
    Query(request): Query<SearchRequest>,
) -> Result<Json<SearchResponse>, (StatusCode, Json<ErrorResponse>)> {
    match catalog.handle(&request) {
        Ok(response) => {
            info!(
                "Search {:?} page {} -> {} of {} results",
                request.q.as_deref().unwrap_or_default(),
                response.page,
                response.results.len(),
                response.total
            );
            Ok(Json(response))
        }
        Err(error) => {
            warn!("Search rejected: {}", error);
            let status = StatusCode::from_u16(error.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            Err((status, Json(ErrorResponse { error })))
        }
    }
}
