//! Cache invalidation fan-out.
//!
//! [`CacheInvalidator`] turns review changes into batches of CDN path
//! patterns on the `cache-invalidation` queue. [`CdnDispatcher`] is the
//! consumer side: it submits a batch to the CDN with a time-derived
//! caller reference.

use product_reviews_core::environment::Clock;
use product_reviews_core::error::ReviewError;
use product_reviews_core::external::{CdnClient, CdnInvalidation};
use product_reviews_core::paths;
use product_reviews_core::queue::{INVALIDATION_QUEUE, InvalidationBatch, JobId, JobPayload, JobQueue};
use product_reviews_core::review::Review;
use product_reviews_runtime::metrics::{ExternalMetrics, QueueMetrics};
use product_reviews_runtime::retry::{RetryPolicy, retry_with_predicate};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default prefix of CDN caller references.
pub const DEFAULT_CALLER_REFERENCE_PREFIX: &str = "cache-invalidation";

/// Enqueues CDN invalidation batches.
#[derive(Clone)]
pub struct CacheInvalidator {
    queue: Arc<dyn JobQueue>,
    queue_name: String,
    clock: Arc<dyn Clock>,
}

impl CacheInvalidator {
    /// Create an invalidator writing to [`INVALIDATION_QUEUE`] on `queue`.
    #[must_use]
    pub fn new(queue: Arc<dyn JobQueue>, clock: Arc<dyn Clock>) -> Self {
        Self {
            queue,
            queue_name: INVALIDATION_QUEUE.to_string(),
            clock,
        }
    }

    /// Write to a different queue name.
    #[must_use]
    pub fn with_queue(mut self, name: impl Into<String>) -> Self {
        self.queue_name = name.into();
        self
    }

    /// Enqueue one batch of paths.
    ///
    /// Paths are normalised to start with `/` and de-duplicated. An empty
    /// set enqueues nothing and returns `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Queue`] if the batch could not be enqueued.
    pub async fn invalidate<I, S>(&self, paths: I) -> Result<Option<JobId>, ReviewError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let paths = paths::normalize_all(paths);
        if paths.is_empty() {
            tracing::debug!("No paths to invalidate");
            return Ok(None);
        }

        let count = paths.len();
        let payload = JobPayload::Invalidate(InvalidationBatch {
            paths,
            requested_at: self.clock.now(),
        });

        match self.queue.enqueue_on(&self.queue_name, payload, Duration::ZERO).await {
            Ok(id) => {
                QueueMetrics::record_enqueued(&self.queue_name);
                tracing::info!(job_id = %id, paths = count, queue = %self.queue_name, "Queued cache invalidation");
                Ok(Some(id))
            }
            Err(e) => {
                QueueMetrics::record_enqueue_failed(&self.queue_name);
                Err(e)
            }
        }
    }

    /// Enqueue a batch, logging instead of failing.
    pub async fn invalidate_or_log<I, S>(&self, paths: I, reason: &'static str) -> Option<JobId>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        match self.invalidate(paths).await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(reason, error = %e, "Failed to queue cache invalidation");
                None
            }
        }
    }

    /// A review was created.
    pub async fn review_created(&self, review: &Review) -> Option<JobId> {
        self.invalidate_or_log(paths::product_reviews_api(&review.product_id), "review created")
            .await
    }

    /// A review's status changed or a translation was added.
    pub async fn review_updated(&self, review: &Review) -> Option<JobId> {
        self.invalidate_or_log(
            paths::review_updated(&review.review_id, &review.product_id),
            "review updated",
        )
        .await
    }

    /// A review was deleted; its media paths are invalidated too.
    pub async fn review_deleted(&self, review: &Review) -> Option<JobId> {
        let media = review.media_paths();
        self.invalidate_or_log(
            paths::review_deleted(&review.review_id, &review.product_id, &media),
            "review deleted",
        )
        .await
    }

    /// A product's statistics were recomputed.
    pub async fn statistics_updated(&self, product_id: &str) -> Option<JobId> {
        self.invalidate_or_log(paths::product_reviews_api(product_id), "statistics updated")
            .await
    }
}

/// Submits invalidation batches to the CDN.
#[derive(Clone)]
pub struct CdnDispatcher {
    cdn: Arc<dyn CdnClient>,
    clock: Arc<dyn Clock>,
    caller_reference_prefix: String,
}

impl CdnDispatcher {
    /// Create a dispatcher with the default caller-reference prefix.
    #[must_use]
    pub fn new(cdn: Arc<dyn CdnClient>, clock: Arc<dyn Clock>) -> Self {
        Self {
            cdn,
            clock,
            caller_reference_prefix: DEFAULT_CALLER_REFERENCE_PREFIX.to_string(),
        }
    }

    /// Set the caller-reference prefix.
    #[must_use]
    pub fn with_caller_reference_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.caller_reference_prefix = prefix.into();
        self
    }

    /// Caller reference for a batch submitted now: `{prefix}-{unix seconds}`.
    #[must_use]
    pub fn caller_reference(&self) -> String {
        format!("{}-{}", self.caller_reference_prefix, self.clock.now().timestamp())
    }

    /// Submit `paths` to the CDN.
    ///
    /// Returns the CDN's invalidation id, or `None` when there was nothing to
    /// send or the client skipped the call.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::ExternalService`] if the CDN call fails.
    pub async fn dispatch(&self, paths: &[String]) -> Result<Option<String>, ReviewError> {
        let paths = paths::normalize_all(paths);
        if paths.is_empty() {
            tracing::debug!("Invalidation batch had no paths, skipping");
            return Ok(None);
        }

        let count = paths.len();
        let started = Instant::now();
        let batch = CdnInvalidation {
            paths,
            caller_reference: self.caller_reference(),
        };
        let caller_reference = batch.caller_reference.clone();

        match self.cdn.invalidate(batch).await {
            Ok(Some(id)) => {
                ExternalMetrics::record_invalidation(count);
                tracing::info!(
                    invalidation_id = %id,
                    caller_reference = %caller_reference,
                    paths = count,
                    elapsed = ?started.elapsed(),
                    "CDN invalidation created"
                );
                Ok(Some(id))
            }
            Ok(None) => {
                tracing::warn!(paths = count, "CDN not configured, invalidation skipped");
                Ok(None)
            }
            Err(e) => {
                tracing::error!(
                    caller_reference = %caller_reference,
                    paths = count,
                    error = %e,
                    "CDN invalidation failed"
                );
                Err(e)
            }
        }
    }

    /// Submit `paths` now, retrying retryable failures in-process.
    ///
    /// For callers with no queue in between, such as `invalidate --sync`.
    ///
    /// # Errors
    ///
    /// Returns the first non-retryable error, or the last one once `policy`
    /// is exhausted.
    pub async fn dispatch_with_retry(
        &self,
        paths: &[String],
        policy: &RetryPolicy,
    ) -> Result<Option<String>, ReviewError> {
        retry_with_predicate(policy, || self.dispatch(paths), ReviewError::is_retryable).await
    }
}
