//! Queue workers for recomputes and CDN invalidation.
//!
//! Runs `QUEUE_CONCURRENCY` workers on each queue until Ctrl+C, then
//! broadcasts shutdown and waits for in-flight jobs to finish.

use product_reviews_runtime::metrics::MetricsServer;
use product_reviews_runtime::retry::RetryPolicy;
use product_reviews_runtime::{JobHandler, QueueWorker};
use product_reviews_server::Config;
use product_reviews_server::bootstrap::{self, Resources};
use product_reviews_statistics::{InvalidationHandler, RecomputeHandler};
use axum::{Router, routing::get};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    bootstrap::init_tracing("info,product_reviews=debug,sqlx=warn");

    let config = Config::from_env();
    config.log_warnings();

    if let Some(addr) = config.metrics.addr {
        let mut metrics = MetricsServer::new(addr);
        metrics.start()?;
        serve_metrics(Arc::new(metrics)).await?;
    }

    let resources = Resources::from_config(&config).await?;
    let deps = &resources.deps;

    let recompute: Arc<dyn JobHandler> = Arc::new(RecomputeHandler::new(Arc::new(deps.aggregator())));
    let invalidate: Arc<dyn JobHandler> = Arc::new(InvalidationHandler::new(deps.dispatcher()));

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let visibility = Duration::from_secs(config.queue.visibility_timeout_secs);
    let poll = Duration::from_millis(config.queue.poll_interval_ms);
    let concurrency = config.queue.concurrency.max(1);

    let queues = [
        (&config.queue.statistics_queue, recompute, RetryPolicy::recompute()),
        (&config.queue.invalidation_queue, invalidate, RetryPolicy::invalidation()),
    ];

    let mut handles = Vec::new();
    for (queue_name, handler, policy) in queues {
        for n in 0..concurrency {
            let worker = QueueWorker::new(
                format!("{queue_name}-{n}"),
                queue_name.clone(),
                deps.queue.clone(),
                handler.clone(),
                shutdown_tx.subscribe(),
            )
            .with_policy(policy.clone())
            .with_visibility_timeout(visibility)
            .with_poll_interval(poll);
            handles.push(worker.spawn());
        }
    }

    tracing::info!(workers = handles.len(), concurrency, "Queue workers running, press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down workers...");
    let _ = shutdown_tx.send(());

    for handle in handles {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Worker task panicked");
        }
    }

    tracing::info!("All workers stopped");
    Ok(())
}

async fn serve_metrics(metrics: Arc<MetricsServer>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(metrics.addr()).await?;
    tracing::info!(addr = %metrics.addr(), "Serving worker metrics");

    let app = Router::new().route(
        "/metrics",
        get(move || {
            let metrics = metrics.clone();
            async move { metrics.render().unwrap_or_default() }
        }),
    );
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "Metrics endpoint stopped");
        }
    });
    Ok(())
}
