//! Queue worker with retry, dead-lettering, and graceful shutdown.
//!
//! A [`QueueWorker`] owns the reserve-handle-acknowledge loop for one queue.
//! The work itself is pluggable through [`JobHandler`].
//!
//! # Pattern: Reserve-Handle-Acknowledge Loop
//!
//! ```text
//! loop {
//!     reserve next job (hidden for visibility_timeout)
//!     none available → sleep poll_interval
//!     handle job (bounded by visibility_timeout)
//!         ok                         → complete
//!         retryable and attempts left → release after backoff
//!         otherwise                  → dead-letter
//!     shutdown signal → exit after the current job
//! }
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! let worker = QueueWorker::new("statistics-1", STATISTICS_QUEUE, queue, handler, shutdown_rx)
//!     .with_policy(RetryPolicy::recompute())
//!     .with_visibility_timeout(Duration::from_secs(120));
//!
//! let handle = worker.spawn();
//! ```

use async_trait::async_trait;
use product_reviews_core::error::ReviewError;
use product_reviews_core::queue::{Job, JobPayload, JobQueue};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::metrics::QueueMetrics;
use crate::retry::RetryPolicy;

/// Handler for one kind of queued job.
///
/// Errors decide the job's fate: retryable errors (see
/// [`ReviewError::is_retryable`]) are retried per the worker's policy,
/// everything else is dead-lettered immediately.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Process a job payload.
    async fn handle(&self, payload: &JobPayload) -> Result<(), ReviewError>;
}

/// What happened to a single job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Handled and removed from the queue
    Completed,
    /// Failed, released for another attempt
    Retried,
    /// Failed permanently, moved to the dead-letter table
    DeadLettered,
}

/// Totals from [`QueueWorker::drain`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Jobs completed
    pub completed: usize,
    /// Jobs released for retry
    pub retried: usize,
    /// Jobs dead-lettered
    pub dead_lettered: usize,
}

/// Worker consuming one queue.
pub struct QueueWorker {
    /// Worker name (for logging)
    name: String,

    /// Queue to consume
    queue_name: String,

    /// Queue backend
    queue: Arc<dyn JobQueue>,

    /// Handler for reserved jobs
    handler: Arc<dyn JobHandler>,

    /// Shutdown signal receiver
    shutdown: broadcast::Receiver<()>,

    /// Attempt budget and backoff
    policy: RetryPolicy,

    /// How long a reserved job stays hidden; also bounds one handler run
    visibility_timeout: Duration,

    /// Sleep between polls of an empty queue
    poll_interval: Duration,
}

impl QueueWorker {
    /// Create a worker with the default policy, a 120s visibility timeout,
    /// and a 500ms poll interval.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        queue_name: impl Into<String>,
        queue: Arc<dyn JobQueue>,
        handler: Arc<dyn JobHandler>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            name: name.into(),
            queue_name: queue_name.into(),
            queue,
            handler,
            shutdown,
            policy: RetryPolicy::default(),
            visibility_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_millis(500),
        }
    }

    /// Set the retry policy.
    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the visibility timeout.
    #[must_use]
    pub const fn with_visibility_timeout(mut self, timeout: Duration) -> Self {
        self.visibility_timeout = timeout;
        self
    }

    /// Set the empty-queue poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Spawn the worker as a background task.
    #[must_use]
    pub fn spawn(mut self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Run until a shutdown signal arrives.
    pub async fn run(&mut self) {
        info!(worker = %self.name, queue = %self.queue_name, "Queue worker started");

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    info!(worker = %self.name, "Queue worker received shutdown signal");
                    break;
                }
                reserved = self.queue.reserve(&self.queue_name, self.visibility_timeout) => {
                    match reserved {
                        Ok(Some(job)) => {
                            let job_id = job.id;
                            if let Err(e) = self.process(job).await {
                                warn!(
                                    worker = %self.name,
                                    job_id = %job_id,
                                    error = %e,
                                    "Job left reserved, it reappears after {:?}",
                                    self.visibility_timeout
                                );
                            }
                        }
                        Ok(None) => {
                            tokio::select! {
                                _ = self.shutdown.recv() => {
                                    info!(worker = %self.name, "Queue worker received shutdown signal while idle");
                                    break;
                                }
                                () = tokio::time::sleep(self.poll_interval) => {}
                            }
                        }
                        Err(e) => {
                            error!(
                                worker = %self.name,
                                error = %e,
                                "Failed to reserve job, retrying in {:?}",
                                self.poll_interval
                            );
                            tokio::time::sleep(self.poll_interval).await;
                        }
                    }
                }
            }
        }

        info!(worker = %self.name, "Queue worker stopped");
    }

    /// Process jobs until the queue reports none available.
    ///
    /// Used by the operator CLI and tests to run a queue to quiescence
    /// without a background task. Jobs released with a delay are not
    /// waited for.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Queue`] if reserving or acknowledging fails.
    pub async fn drain(&self) -> Result<DrainReport, ReviewError> {
        let mut report = DrainReport::default();
        while let Some(job) = self
            .queue
            .reserve(&self.queue_name, self.visibility_timeout)
            .await?
        {
            match self.process(job).await? {
                JobOutcome::Completed => report.completed += 1,
                JobOutcome::Retried => report.retried += 1,
                JobOutcome::DeadLettered => report.dead_lettered += 1,
            }
        }
        Ok(report)
    }

    /// Handle one reserved job and acknowledge it.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Queue`] if completing, releasing or
    /// dead-lettering the job fails; the job then reappears after its
    /// visibility timeout.
    pub async fn process(&self, job: Job) -> Result<JobOutcome, ReviewError> {
        let result =
            match tokio::time::timeout(self.visibility_timeout, self.handler.handle(&job.payload)).await {
                Ok(result) => result,
                Err(_) => Err(ReviewError::ExternalService(format!(
                    "Job {} exceeded visibility timeout of {:?}",
                    job.id, self.visibility_timeout
                ))),
            };

        let outcome = match result {
            Ok(()) => {
                self.queue.complete(job.id).await.inspect_err(|e| {
                    error!(worker = %self.name, job_id = %job.id, error = %e, "Failed to complete job");
                })?;
                QueueMetrics::record_completed(self.queue_name.clone());
                JobOutcome::Completed
            }
            Err(err) if err.is_retryable() && self.policy.should_retry(job.attempts) => {
                let delay = self.policy.delay_for_attempt(job.attempts);
                warn!(
                    worker = %self.name,
                    job_id = %job.id,
                    kind = job.payload.kind(),
                    attempt = job.attempts,
                    delay_secs = delay.as_secs(),
                    error = %err,
                    "Job failed, releasing for retry"
                );
                self.queue.release(job.id, delay).await.inspect_err(|e| {
                    error!(worker = %self.name, job_id = %job.id, error = %e, "Failed to release job for retry");
                })?;
                QueueMetrics::record_retried(self.queue_name.clone());
                JobOutcome::Retried
            }
            Err(err) => {
                error!(
                    worker = %self.name,
                    job_id = %job.id,
                    kind = job.payload.kind(),
                    attempt = job.attempts,
                    error_kind = err.kind(),
                    error = %err,
                    "Job failed permanently, moving to dead-letter table"
                );
                self.queue
                    .dead_letter(&job, &err.to_string())
                    .await
                    .inspect_err(|e| {
                        error!(worker = %self.name, job_id = %job.id, error = %e, "Failed to dead-letter job");
                    })?;
                QueueMetrics::record_dead_lettered(self.queue_name.clone());
                JobOutcome::DeadLettered
            }
        };

        Ok(outcome)
    }
}
