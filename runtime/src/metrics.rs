//! Prometheus metrics for the review pipeline.
//!
//! This module provides metric collection for:
//! - Statistics recomputes (count, duration, pages scanned)
//! - Queue traffic (enqueued, completed, retried, dead-lettered)
//! - CDN invalidations
//! - Translation provider calls
//!
//! # Example
//!
//! ```rust,no_run
//! use product_reviews_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Serve `server.render()` from a `/metrics` route
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other crates
pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics recorder with a render handle.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server for the given scrape address.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Scrape address this server was configured with.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Register descriptions and install the global recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// A recorder can only be installed once per process. A second call
    /// logs a warning and succeeds without a render handle.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Render current metrics in Prometheus text format.
    ///
    /// Returns `None` if this instance did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn register_metrics() {
    describe_counter!(
        "reviews_statistics_recomputed_total",
        "Total number of completed product statistics recomputes"
    );
    describe_counter!(
        "reviews_statistics_failed_total",
        "Total number of failed recomputes, labelled by error kind"
    );
    describe_histogram!(
        "reviews_statistics_recompute_duration_seconds",
        "Time taken to scan and persist one product's statistics"
    );
    describe_histogram!(
        "reviews_statistics_pages_scanned",
        "Review-store pages read per recompute"
    );

    describe_counter!("reviews_queue_enqueued_total", "Jobs enqueued, by queue");
    describe_counter!("reviews_queue_enqueue_failed_total", "Failed enqueue attempts, by queue");
    describe_counter!("reviews_queue_completed_total", "Jobs completed, by queue");
    describe_counter!("reviews_queue_retried_total", "Jobs released for retry, by queue");
    describe_counter!("reviews_queue_dead_lettered_total", "Jobs moved to the dead-letter table, by queue");

    describe_counter!("reviews_cdn_invalidations_total", "CDN invalidation batches submitted");
    describe_counter!("reviews_cdn_paths_total", "Paths included in CDN invalidations");

    describe_counter!("reviews_translation_calls_total", "Calls to the translation provider");
    describe_counter!("reviews_translation_failures_total", "Failed translation provider calls");
}

/// Statistics recompute metrics recorder.
pub struct StatisticsMetrics;

impl StatisticsMetrics {
    /// Record a completed recompute.
    pub fn record_recompute(duration: Duration, pages: usize) {
        counter!("reviews_statistics_recomputed_total").increment(1);
        histogram!("reviews_statistics_recompute_duration_seconds").record(duration.as_secs_f64());
        #[allow(clippy::cast_precision_loss)] // page counts are bounded by the iteration cap
        let pages = pages as f64;
        histogram!("reviews_statistics_pages_scanned").record(pages);
    }

    /// Record a failed recompute.
    pub fn record_failure(kind: &'static str) {
        counter!("reviews_statistics_failed_total", "kind" => kind).increment(1);
    }
}

/// Queue metrics recorder.
pub struct QueueMetrics;

impl QueueMetrics {
    /// Record a successful enqueue.
    pub fn record_enqueued(queue: &str) {
        counter!("reviews_queue_enqueued_total", "queue" => queue.to_string()).increment(1);
    }

    /// Record a failed enqueue.
    pub fn record_enqueue_failed(queue: &str) {
        counter!("reviews_queue_enqueue_failed_total", "queue" => queue.to_string()).increment(1);
    }

    /// Record a completed job.
    pub fn record_completed(queue: String) {
        counter!("reviews_queue_completed_total", "queue" => queue).increment(1);
    }

    /// Record a job released for retry.
    pub fn record_retried(queue: String) {
        counter!("reviews_queue_retried_total", "queue" => queue).increment(1);
    }

    /// Record a dead-lettered job.
    pub fn record_dead_lettered(queue: String) {
        counter!("reviews_queue_dead_lettered_total", "queue" => queue).increment(1);
    }
}

/// External service metrics recorder.
pub struct ExternalMetrics;

impl ExternalMetrics {
    /// Record a CDN invalidation batch.
    pub fn record_invalidation(paths: usize) {
        counter!("reviews_cdn_invalidations_total").increment(1);
        counter!("reviews_cdn_paths_total").increment(paths as u64);
    }

    /// Record a translation provider call.
    pub fn record_translation(success: bool) {
        counter!("reviews_translation_calls_total").increment(1);
        if !success {
            counter!("reviews_translation_failures_total").increment(1);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_server_creation() {
        let addr = "127.0.0.1:0".parse().unwrap();
        let server = MetricsServer::new(addr);
        assert!(server.render().is_none());
        assert_eq!(server.addr(), addr);
    }

    #[test]
    fn test_metrics_server_render() {
        let mut server = MetricsServer::new("127.0.0.1:0".parse().unwrap());
        server.start().unwrap();

        StatisticsMetrics::record_recompute(Duration::from_millis(120), 3);
        QueueMetrics::record_enqueued("statistics");
        ExternalMetrics::record_invalidation(4);

        // If another test installed the recorder first, this instance has no handle.
        if let Some(rendered) = server.render() {
            assert!(rendered.contains("reviews_statistics_recomputed_total"));
            assert!(rendered.contains("reviews_queue_enqueued_total"));
            assert!(rendered.contains("reviews_cdn_paths_total"));
        }
    }
}
