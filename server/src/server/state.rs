//! State shared by every handler.

use crate::app::{Deps, ReviewService};
use product_reviews_core::environment::Clock;
use product_reviews_runtime::metrics::MetricsServer;
use std::sync::Arc;

/// Application state, cloned per request.
#[derive(Clone)]
pub struct AppState {
    /// Review and rating operations
    pub reviews: ReviewService,
    /// Time source for response timestamps
    pub clock: Arc<dyn Clock>,
    /// Prometheus recorder, when metrics are enabled
    pub metrics: Option<Arc<MetricsServer>>,
}

impl AppState {
    /// Build the state from the dependency bundle.
    #[must_use]
    pub fn new(deps: Deps) -> Self {
        Self {
            clock: deps.clock.clone(),
            reviews: ReviewService::new(deps),
            metrics: None,
        }
    }

    /// Expose `/metrics` from this recorder.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<MetricsServer>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}
