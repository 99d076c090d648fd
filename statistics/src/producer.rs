//! Recompute events from review transitions.
//!
//! | Transition | Event |
//! |---|---|
//! | created (pending) | none |
//! | publication status changed | always |
//! | deleted | iff the review was published |
//!
//! Emission is best-effort from the caller's side: an enqueue failure is
//! logged and the write that triggered it still succeeds. Backfill repairs
//! any product whose statistics drift as a result.

use product_reviews_core::environment::Clock;
use product_reviews_core::error::ReviewError;
use product_reviews_core::queue::{JobId, JobPayload, JobQueue, RecomputeEvent, STATISTICS_QUEUE};
use product_reviews_core::review::{PublicationStatus, Review};
use product_reviews_runtime::metrics::QueueMetrics;
use std::sync::Arc;
use std::time::Duration;

/// Enqueues [`RecomputeEvent`]s on the statistics queue.
#[derive(Clone)]
pub struct RecomputeProducer {
    queue: Arc<dyn JobQueue>,
    queue_name: String,
    clock: Arc<dyn Clock>,
}

impl RecomputeProducer {
    /// Create a producer writing to [`STATISTICS_QUEUE`] on `queue`.
    #[must_use]
    pub fn new(queue: Arc<dyn JobQueue>, clock: Arc<dyn Clock>) -> Self {
        Self {
            queue,
            queue_name: STATISTICS_QUEUE.to_string(),
            clock,
        }
    }

    /// Write to a different queue name.
    #[must_use]
    pub fn with_queue(mut self, name: impl Into<String>) -> Self {
        self.queue_name = name.into();
        self
    }

    /// Queue events are written to.
    #[must_use]
    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Enqueue a recompute of `product_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Queue`] if the event could not be enqueued.
    pub async fn schedule(&self, product_id: &str) -> Result<JobId, ReviewError> {
        let payload = JobPayload::Recompute(RecomputeEvent {
            product_id: product_id.to_string(),
            enqueued_at: self.clock.now(),
        });

        match self.queue.enqueue_on(&self.queue_name, payload, Duration::ZERO).await {
            Ok(id) => {
                QueueMetrics::record_enqueued(&self.queue_name);
                tracing::info!(product_id, job_id = %id, queue = %self.queue_name, "Queued statistics recompute");
                Ok(id)
            }
            Err(e) => {
                QueueMetrics::record_enqueue_failed(&self.queue_name);
                Err(e)
            }
        }
    }

    async fn emit(&self, product_id: &str, trigger: &'static str) -> Option<JobId> {
        match self.schedule(product_id).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::error!(
                    product_id,
                    trigger,
                    error = %e,
                    "Failed to queue statistics recompute; backfill will repair"
                );
                None
            }
        }
    }

    /// A review was created. Pending reviews do not count, so nothing is emitted.
    #[allow(clippy::unused_async)]
    pub async fn review_created(&self, review: &Review) -> Option<JobId> {
        tracing::debug!(
            review_id = %review.review_id,
            product_id = %review.product_id,
            "New review is pending, no recompute"
        );
        None
    }

    /// A review's publication status changed from `previous`.
    ///
    /// Always emits, including for transitions between non-published states.
    pub async fn status_changed(&self, review: &Review, previous: PublicationStatus) -> Option<JobId> {
        tracing::debug!(
            review_id = %review.review_id,
            from = %previous,
            to = %review.publication_status,
            "Publication status changed"
        );
        self.emit(&review.product_id, "status changed").await
    }

    /// A review was deleted. Emits only if it was published.
    pub async fn review_deleted(&self, review: &Review) -> Option<JobId> {
        if review.is_published() {
            self.emit(&review.product_id, "published review deleted").await
        } else {
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use product_reviews_testing::fixtures::ReviewBuilder;
    use product_reviews_testing::{InMemoryJobQueue, test_clock};

    fn producer(queue: &Arc<InMemoryJobQueue>) -> RecomputeProducer {
        RecomputeProducer::new(queue.clone(), Arc::new(test_clock()))
    }

    #[tokio::test]
    async fn test_create_emits_nothing() {
        let queue = Arc::new(InMemoryJobQueue::new());

        let id = producer(&queue)
            .review_created(&ReviewBuilder::new("p-1").build())
            .await;

        assert!(id.is_none());
        assert!(queue.is_empty(STATISTICS_QUEUE));
    }

    #[tokio::test]
    async fn test_every_status_change_emits_once() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let producer = producer(&queue);

        let published = ReviewBuilder::new("p-1").published().build();
        producer.status_changed(&published, PublicationStatus::Pending).await;

        let rejected = ReviewBuilder::new("p-2")
            .status(PublicationStatus::Rejected)
            .build();
        producer.status_changed(&rejected, PublicationStatus::Pending).await;

        assert_eq!(queue.recompute_product_ids(), vec!["p-1", "p-2"]);
    }

    #[tokio::test]
    async fn test_delete_emits_only_for_published() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let producer = producer(&queue);

        producer
            .review_deleted(&ReviewBuilder::new("p-pending").build())
            .await;
        producer
            .review_deleted(&ReviewBuilder::new("p-published").published().build())
            .await;

        assert_eq!(queue.recompute_product_ids(), vec!["p-published"]);
    }

    #[tokio::test]
    async fn test_enqueue_failure_does_not_propagate() {
        let queue = Arc::new(InMemoryJobQueue::new());
        queue.fail_enqueue(true);

        let id = producer(&queue)
            .review_deleted(&ReviewBuilder::new("p-1").published().build())
            .await;

        assert!(id.is_none());
    }

    #[tokio::test]
    async fn test_schedule_uses_configured_queue() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let producer = producer(&queue).with_queue("reviews-statistics");

        producer.schedule("p-1").await.unwrap();

        assert!(queue.is_empty(STATISTICS_QUEUE));
        assert_eq!(queue.len("reviews-statistics"), 1);
    }

    #[tokio::test]
    async fn test_schedule_reports_failure() {
        let queue = Arc::new(InMemoryJobQueue::new());
        queue.fail_enqueue(true);

        let err = producer(&queue).schedule("p-1").await.unwrap_err();

        assert_eq!(err.kind(), "queue");
    }
}
