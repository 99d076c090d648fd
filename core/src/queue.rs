//! Durable job queues.
//!
//! Two queues carry background work:
//!
//! - [`STATISTICS_QUEUE`]: recompute events, one per affected product
//! - [`INVALIDATION_QUEUE`]: batches of CDN path patterns
//!
//! Delivery is at-least-once. A job is *reserved* for a visibility timeout;
//! if the worker neither completes nor releases it before the timeout, it
//! becomes available again. Reserving increments the attempt counter.

use crate::error::ReviewError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Queue carrying [`RecomputeEvent`]s.
pub const STATISTICS_QUEUE: &str = "statistics";

/// Queue carrying [`InvalidationBatch`]es.
pub const INVALIDATION_QUEUE: &str = "cache-invalidation";

/// Instruction to recompute one product's statistics from scratch.
///
/// Duplicates are harmless: recomputes are absolute, not deltas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecomputeEvent {
    /// Product to recompute
    pub product_id: String,
    /// When the event was produced
    pub enqueued_at: DateTime<Utc>,
}

/// Path patterns to invalidate on the CDN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationBatch {
    /// Normalised paths, each starting with `/`
    pub paths: Vec<String>,
    /// When the batch was requested
    pub requested_at: DateTime<Utc>,
}

/// Body of a queued job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobPayload {
    /// Recompute a product's statistics
    Recompute(RecomputeEvent),
    /// Invalidate CDN paths
    Invalidate(InvalidationBatch),
}

impl JobPayload {
    /// Queue this payload goes to unless the producer names another.
    #[must_use]
    pub const fn default_queue(&self) -> &'static str {
        match self {
            Self::Recompute(_) => STATISTICS_QUEUE,
            Self::Invalidate(_) => INVALIDATION_QUEUE,
        }
    }

    /// Short name for logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Recompute(_) => "recompute",
            Self::Invalidate(_) => "invalidate",
        }
    }
}

/// Unique identifier of a queued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub i64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A job reserved by a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Queue-assigned identifier
    pub id: JobId,
    /// Queue name
    pub queue: String,
    /// Work to perform
    pub payload: JobPayload,
    /// Number of reservations so far, including the current one
    pub attempts: u32,
}

/// Durable at-least-once job queue.
///
/// # Dyn Compatibility
///
/// Methods return `Pin<Box<dyn Future>>` so the queue can be shared as
/// `Arc<dyn JobQueue>` between the HTTP edge and the workers.
pub trait JobQueue: Send + Sync {
    /// Enqueue a payload on `queue`, available after `delay`.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Queue`] if the job could not be persisted.
    fn enqueue_on<'a>(
        &'a self,
        queue: &'a str,
        payload: JobPayload,
        delay: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<JobId, ReviewError>> + Send + 'a>>;

    /// Enqueue a payload on its default queue.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Queue`] if the job could not be persisted.
    fn enqueue(
        &self,
        payload: JobPayload,
        delay: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<JobId, ReviewError>> + Send + '_>> {
        let queue = payload.default_queue();
        self.enqueue_on(queue, payload, delay)
    }

    /// Reserve the next available job on `queue`, hiding it for `visibility_timeout`.
    ///
    /// Returns `None` when no job is available.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Queue`] on storage failure or an undecodable payload.
    fn reserve<'a>(
        &'a self,
        queue: &'a str,
        visibility_timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Job>, ReviewError>> + Send + 'a>>;

    /// Delete a job after successful handling.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Queue`] on storage failure.
    fn complete(&self, id: JobId) -> Pin<Box<dyn Future<Output = Result<(), ReviewError>> + Send + '_>>;

    /// Make a reserved job available again after `delay` (retry with backoff).
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Queue`] on storage failure.
    fn release(
        &self,
        id: JobId,
        delay: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<(), ReviewError>> + Send + '_>>;

    /// Move a job to the dead-letter store with the failure reason.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Queue`] on storage failure.
    fn dead_letter<'a>(
        &'a self,
        job: &'a Job,
        error: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), ReviewError>> + Send + 'a>>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn payload_routes_to_its_queue() {
        let recompute = JobPayload::Recompute(RecomputeEvent {
            product_id: "p-1".into(),
            enqueued_at: Utc::now(),
        });
        let invalidate = JobPayload::Invalidate(InvalidationBatch {
            paths: vec!["/reviews/*".into()],
            requested_at: Utc::now(),
        });

        assert_eq!(recompute.default_queue(), "statistics");
        assert_eq!(invalidate.default_queue(), "cache-invalidation");
    }

    #[test]
    fn payload_is_tagged_json() {
        let payload = JobPayload::Recompute(RecomputeEvent {
            product_id: "p-1".into(),
            enqueued_at: Utc::now(),
        });
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["type"], "recompute");
        assert_eq!(json["product_id"], "p-1");

        let back: JobPayload = serde_json::from_value(json).unwrap();
        assert_eq!(back, payload);
    }
}
