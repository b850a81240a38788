use std::env;
use std::sync::Arc;
use tracing::info;

use product_search::{catalog::StubCatalog, server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let bind_addr = env::var("SEARCH_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

    let catalog = Arc::new(StubCatalog::new());
    info!("Starting product search server with {} products", catalog.len());

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Product search server listening on http://{}", bind_addr);

    axum::serve(listener, server::router(catalog)).await?;

    Ok(())
}
