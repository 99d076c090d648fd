//! Review service HTTP server.
//!
//! ```bash
//! docker compose up -d postgres
//! cargo run --bin server
//! ```

use product_reviews_runtime::metrics::MetricsServer;
use product_reviews_server::bootstrap::{self, Resources};
use product_reviews_server::{AppState, Config, build_router};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    bootstrap::init_tracing("info,product_reviews=debug,tower_http=info,sqlx=warn");

    let config = Config::from_env();
    config.log_warnings();
    tracing::info!(bind = %config.server.bind_address(), media = ?config.media.disk, "Configuration loaded");

    let resources = Resources::from_config(&config).await?;
    let mut state = AppState::new(resources.deps.clone());

    if let Some(addr) = config.metrics.addr {
        let mut metrics = MetricsServer::new(addr);
        metrics.start()?;
        state = state.with_metrics(Arc::new(metrics));
    }

    let listener = tokio::net::TcpListener::bind(config.server.bind_address()).await?;
    tracing::info!(addr = %listener.local_addr()?, "Review service listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down gracefully...");
        })
        .await?;

    Ok(())
}
