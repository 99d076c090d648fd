//! Queue job handlers for the two background queues.

use crate::aggregator::Aggregator;
use crate::invalidator::CdnDispatcher;
use async_trait::async_trait;
use product_reviews_core::error::ReviewError;
use product_reviews_core::queue::JobPayload;
use product_reviews_runtime::JobHandler;
use std::sync::Arc;

/// Consumes recompute events by running the aggregator.
#[derive(Clone)]
pub struct RecomputeHandler {
    aggregator: Arc<Aggregator>,
}

impl RecomputeHandler {
    /// Create a handler around `aggregator`.
    #[must_use]
    pub const fn new(aggregator: Arc<Aggregator>) -> Self {
        Self { aggregator }
    }
}

#[async_trait]
impl JobHandler for RecomputeHandler {
    async fn handle(&self, payload: &JobPayload) -> Result<(), ReviewError> {
        let JobPayload::Recompute(event) = payload else {
            return Err(ReviewError::Validation(format!(
                "Recompute handler cannot process a {} job",
                payload.kind()
            )));
        };

        tracing::debug!(
            product_id = %event.product_id,
            enqueued_at = %event.enqueued_at,
            "Handling recompute event"
        );
        self.aggregator.recompute(&event.product_id).await.map(|_| ())
    }
}

/// Consumes invalidation batches by submitting them to the CDN.
#[derive(Clone)]
pub struct InvalidationHandler {
    dispatcher: CdnDispatcher,
}

impl InvalidationHandler {
    /// Create a handler around `dispatcher`.
    #[must_use]
    pub const fn new(dispatcher: CdnDispatcher) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl JobHandler for InvalidationHandler {
    async fn handle(&self, payload: &JobPayload) -> Result<(), ReviewError> {
        let JobPayload::Invalidate(batch) = payload else {
            return Err(ReviewError::Validation(format!(
                "Invalidation handler cannot process a {} job",
                payload.kind()
            )));
        };

        self.dispatcher.dispatch(&batch.paths).await.map(|_| ())
    }
}
