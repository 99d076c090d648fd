//! In-memory job queue.
//!
//! Mirrors the Postgres queue semantics closely enough for worker tests:
//! reservation hides a job for its visibility timeout and increments its
//! attempt count, release makes it available again after a delay, and
//! dead-lettered jobs are kept for inspection.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use product_reviews_core::error::ReviewError;
use product_reviews_core::queue::{Job, JobId, JobPayload, JobQueue};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct StoredJob {
    id: JobId,
    queue: String,
    payload: JobPayload,
    attempts: u32,
    available_at: Instant,
    reserved_until: Option<Instant>,
}

/// A job moved to the dead-letter list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    /// The failed job as last reserved
    pub job: Job,
    /// Failure reason
    pub error: String,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    jobs: Vec<StoredJob>,
    dead: Vec<DeadLetter>,
}

/// In-memory [`JobQueue`].
#[derive(Clone, Debug, Default)]
pub struct InMemoryJobQueue {
    inner: Arc<Mutex<Inner>>,
    fail_enqueue: Arc<AtomicBool>,
    fail_release: Arc<AtomicBool>,
    fail_dead_letter: Arc<AtomicBool>,
}

impl InMemoryJobQueue {
    /// Create a new empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent enqueue fail with a queue error.
    pub fn fail_enqueue(&self, fail: bool) {
        self.fail_enqueue.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent release fail with a queue error.
    pub fn fail_release(&self, fail: bool) {
        self.fail_release.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent dead-letter write fail with a queue error.
    pub fn fail_dead_letter(&self, fail: bool) {
        self.fail_dead_letter.store(fail, Ordering::SeqCst);
    }

    /// Number of jobs (available, delayed or reserved) on a queue.
    #[must_use]
    pub fn len(&self, queue: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .jobs
            .iter()
            .filter(|j| j.queue == queue)
            .count()
    }

    /// Whether a queue has no jobs.
    #[must_use]
    pub fn is_empty(&self, queue: &str) -> bool {
        self.len(queue) == 0
    }

    /// Payloads on a queue in enqueue order.
    #[must_use]
    pub fn payloads(&self, queue: &str) -> Vec<JobPayload> {
        self.inner
            .lock()
            .unwrap()
            .jobs
            .iter()
            .filter(|j| j.queue == queue)
            .map(|j| j.payload.clone())
            .collect()
    }

    /// Product ids of every queued recompute event, in enqueue order.
    #[must_use]
    pub fn recompute_product_ids(&self) -> Vec<String> {
        self.all_payloads()
            .into_iter()
            .filter_map(|p| match p {
                JobPayload::Recompute(event) => Some(event.product_id),
                JobPayload::Invalidate(_) => None,
            })
            .collect()
    }

    /// Every path of every queued invalidation batch, in enqueue order.
    #[must_use]
    pub fn invalidated_paths(&self) -> Vec<String> {
        self.all_payloads()
            .into_iter()
            .filter_map(|p| match p {
                JobPayload::Invalidate(batch) => Some(batch.paths),
                JobPayload::Recompute(_) => None,
            })
            .flatten()
            .collect()
    }

    /// Dead-lettered jobs.
    #[must_use]
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.inner.lock().unwrap().dead.clone()
    }

    /// Remove every job and dead letter.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.jobs.clear();
        inner.dead.clear();
    }

    fn all_payloads(&self) -> Vec<JobPayload> {
        self.inner
            .lock()
            .unwrap()
            .jobs
            .iter()
            .map(|j| j.payload.clone())
            .collect()
    }
}

impl JobQueue for InMemoryJobQueue {
    fn enqueue_on<'a>(
        &'a self,
        queue: &'a str,
        payload: JobPayload,
        delay: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<JobId, ReviewError>> + Send + 'a>> {
        Box::pin(async move {
            if self.fail_enqueue.load(Ordering::SeqCst) {
                return Err(ReviewError::Queue("injected enqueue failure".to_string()));
            }
            let mut inner = self.inner.lock().unwrap();
            inner.next_id += 1;
            let id = JobId(inner.next_id);
            inner.jobs.push(StoredJob {
                id,
                queue: queue.to_string(),
                payload,
                attempts: 0,
                available_at: Instant::now() + delay,
                reserved_until: None,
            });
            Ok(id)
        })
    }

    fn reserve<'a>(
        &'a self,
        queue: &'a str,
        visibility_timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Job>, ReviewError>> + Send + 'a>> {
        Box::pin(async move {
            let now = Instant::now();
            let mut inner = self.inner.lock().unwrap();
            let Some(stored) = inner.jobs.iter_mut().find(|j| {
                j.queue == queue
                    && j.available_at <= now
                    && j.reserved_until.is_none_or(|until| until <= now)
            }) else {
                return Ok(None);
            };
            stored.attempts += 1;
            stored.reserved_until = Some(now + visibility_timeout);
            Ok(Some(Job {
                id: stored.id,
                queue: stored.queue.clone(),
                payload: stored.payload.clone(),
                attempts: stored.attempts,
            }))
        })
    }

    fn complete(&self, id: JobId) -> Pin<Box<dyn Future<Output = Result<(), ReviewError>> + Send + '_>> {
        Box::pin(async move {
            self.inner.lock().unwrap().jobs.retain(|j| j.id != id);
            Ok(())
        })
    }

    fn release(
        &self,
        id: JobId,
        delay: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<(), ReviewError>> + Send + '_>> {
        Box::pin(async move {
            if self.fail_release.load(Ordering::SeqCst) {
                return Err(ReviewError::Queue("injected release failure".to_string()));
            }
            let mut inner = self.inner.lock().unwrap();
            if let Some(job) = inner.jobs.iter_mut().find(|j| j.id == id) {
                job.reserved_until = None;
                job.available_at = Instant::now() + delay;
            }
            Ok(())
        })
    }

    fn dead_letter<'a>(
        &'a self,
        job: &'a Job,
        error: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), ReviewError>> + Send + 'a>> {
        Box::pin(async move {
            if self.fail_dead_letter.load(Ordering::SeqCst) {
                return Err(ReviewError::Queue("injected dead-letter failure".to_string()));
            }
            let mut inner = self.inner.lock().unwrap();
            inner.jobs.retain(|j| j.id != job.id);
            inner.dead.push(DeadLetter {
                job: job.clone(),
                error: error.to_string(),
            });
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use product_reviews_core::queue::{RecomputeEvent, STATISTICS_QUEUE};

    fn recompute(product_id: &str) -> JobPayload {
        JobPayload::Recompute(RecomputeEvent {
            product_id: product_id.to_string(),
            enqueued_at: Utc::now(),
        })
    }

    #[tokio::test]
    async fn test_reserved_job_is_hidden_until_timeout() {
        let queue = InMemoryJobQueue::new();
        queue.enqueue(recompute("p-1"), Duration::ZERO).await.unwrap();

        let job = queue.reserve(STATISTICS_QUEUE, Duration::from_secs(60)).await.unwrap();
        assert_eq!(job.as_ref().map(|j| j.attempts), Some(1));
        assert!(queue.reserve(STATISTICS_QUEUE, Duration::from_secs(60)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_reservation_is_redelivered() {
        let queue = InMemoryJobQueue::new();
        queue.enqueue(recompute("p-1"), Duration::ZERO).await.unwrap();

        queue.reserve(STATISTICS_QUEUE, Duration::ZERO).await.unwrap();
        let again = queue.reserve(STATISTICS_QUEUE, Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(again.attempts, 2);
    }

    #[tokio::test]
    async fn test_delayed_job_is_not_available() {
        let queue = InMemoryJobQueue::new();
        queue.enqueue(recompute("p-1"), Duration::from_secs(60)).await.unwrap();

        assert!(queue.reserve(STATISTICS_QUEUE, Duration::from_secs(1)).await.unwrap().is_none());
        assert_eq!(queue.len(STATISTICS_QUEUE), 1);
    }

    #[tokio::test]
    async fn test_dead_letter_removes_job() {
        let queue = InMemoryJobQueue::new();
        queue.enqueue(recompute("p-1"), Duration::ZERO).await.unwrap();
        let job = queue.reserve(STATISTICS_QUEUE, Duration::from_secs(1)).await.unwrap().unwrap();

        queue.dead_letter(&job, "boom").await.unwrap();

        assert!(queue.is_empty(STATISTICS_QUEUE));
        assert_eq!(queue.dead_letters()[0].error, "boom");
    }

    #[tokio::test]
    async fn test_enqueue_on_named_queue() {
        let queue = InMemoryJobQueue::new();
        queue
            .enqueue_on("reviews-statistics", recompute("p-1"), Duration::ZERO)
            .await
            .unwrap();

        assert!(queue.is_empty(STATISTICS_QUEUE));
        let job = queue
            .reserve("reviews-statistics", Duration::from_secs(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(job.queue, "reviews-statistics");
    }
}
