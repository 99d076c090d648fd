//! The dependency bundle every service, handler and binary is built from.

use product_reviews_core::environment::Clock;
use product_reviews_core::external::{CdnClient, MediaStorage, Translator};
use product_reviews_core::queue::{INVALIDATION_QUEUE, JobQueue, STATISTICS_QUEUE};
use product_reviews_core::store::{ReviewStore, StatisticsStore};
use product_reviews_statistics::{Aggregator, CacheInvalidator, CdnDispatcher, RecomputeProducer};
use product_reviews_statistics::invalidator::DEFAULT_CALLER_REFERENCE_PREFIX;
use std::sync::Arc;

/// Shared handles to storage, queues and external collaborators.
///
/// Constructed once at startup (see [`crate::bootstrap`]) or from in-memory
/// doubles in tests, then cloned into whatever needs it.
#[derive(Clone)]
pub struct Deps {
    /// Review store
    pub reviews: Arc<dyn ReviewStore>,
    /// Statistics store
    pub statistics: Arc<dyn StatisticsStore>,
    /// Recompute and invalidation queues
    pub queue: Arc<dyn JobQueue>,
    /// Translation provider
    pub translator: Arc<dyn Translator>,
    /// CDN invalidation endpoint
    pub cdn: Arc<dyn CdnClient>,
    /// Media blob storage
    pub media: Arc<dyn MediaStorage>,
    /// Time source
    pub clock: Arc<dyn Clock>,
    /// Caller-reference prefix for CDN batches
    pub caller_reference_prefix: String,
    /// Queue recompute events are written to
    pub statistics_queue: String,
    /// Queue invalidation batches are written to
    pub invalidation_queue: String,
}

impl Deps {
    /// Bundle the given handles with the default caller-reference prefix.
    #[must_use]
    pub fn new(
        reviews: Arc<dyn ReviewStore>,
        statistics: Arc<dyn StatisticsStore>,
        queue: Arc<dyn JobQueue>,
        translator: Arc<dyn Translator>,
        cdn: Arc<dyn CdnClient>,
        media: Arc<dyn MediaStorage>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            reviews,
            statistics,
            queue,
            translator,
            cdn,
            media,
            clock,
            caller_reference_prefix: DEFAULT_CALLER_REFERENCE_PREFIX.to_string(),
            statistics_queue: STATISTICS_QUEUE.to_string(),
            invalidation_queue: INVALIDATION_QUEUE.to_string(),
        }
    }

    /// Write recompute and invalidation jobs to the given queue names.
    #[must_use]
    pub fn with_queue_names(
        mut self,
        statistics_queue: impl Into<String>,
        invalidation_queue: impl Into<String>,
    ) -> Self {
        self.statistics_queue = statistics_queue.into();
        self.invalidation_queue = invalidation_queue.into();
        self
    }

    /// Override the caller-reference prefix.
    #[must_use]
    pub fn with_caller_reference_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.caller_reference_prefix = prefix.into();
        self
    }

    /// Recompute event producer.
    #[must_use]
    pub fn producer(&self) -> RecomputeProducer {
        RecomputeProducer::new(self.queue.clone(), self.clock.clone())
            .with_queue(self.statistics_queue.clone())
    }

    /// Cache invalidation enqueuer.
    #[must_use]
    pub fn invalidator(&self) -> CacheInvalidator {
        CacheInvalidator::new(self.queue.clone(), self.clock.clone())
            .with_queue(self.invalidation_queue.clone())
    }

    /// Statistics aggregator.
    #[must_use]
    pub fn aggregator(&self) -> Aggregator {
        Aggregator::new(
            self.reviews.clone(),
            self.statistics.clone(),
            self.invalidator(),
            self.clock.clone(),
        )
    }

    /// Direct CDN submitter.
    #[must_use]
    pub fn dispatcher(&self) -> CdnDispatcher {
        CdnDispatcher::new(self.cdn.clone(), self.clock.clone())
            .with_caller_reference_prefix(self.caller_reference_prefix.clone())
    }
}
