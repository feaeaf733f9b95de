use std::sync::Arc;

use resonance_mock::MockRegistry;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let mocks = std::env::var("MOCKS_DIR").unwrap_or_else(|_| "Mocks".to_string());
    let registry = Arc::new(MockRegistry::load(&mocks)?);

    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, fixtures = registry.len(), "listening");
    resonance_mock::run(listener, registry).await?;
    Ok(())
}
