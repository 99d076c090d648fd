//! `PostgreSQL` job queue.
//!
//! Jobs are rows in the `jobs` table. Reserving uses
//! `FOR UPDATE SKIP LOCKED` so concurrent workers never block on, or
//! double-reserve, the same row. A reserved job carries `reserved_until`;
//! once that passes the job is visible again, which gives at-least-once
//! delivery when a worker dies mid-job.

use crate::dead_letter_queue::DeadLetterQueue;
use product_reviews_core::error::ReviewError;
use product_reviews_core::queue::{Job, JobId, JobPayload, JobQueue};
use sqlx::PgPool;
use sqlx::types::Json;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// PostgreSQL-backed [`JobQueue`].
#[derive(Clone)]
pub struct PostgresJobQueue {
    pool: PgPool,
    dead_letters: DeadLetterQueue,
}

impl PostgresJobQueue {
    /// Create a queue over an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            dead_letters: DeadLetterQueue::new(pool.clone()),
            pool,
        }
    }

    /// Dead-letter table sharing this queue's pool.
    #[must_use]
    pub const fn dead_letters(&self) -> &DeadLetterQueue {
        &self.dead_letters
    }

    /// Number of jobs on a queue, reserved or not.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Queue`] if the query fails.
    pub async fn depth(&self, queue: &str) -> Result<i64, ReviewError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM jobs WHERE queue = $1")
            .bind(queue)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| ReviewError::Queue(format!("Failed to count jobs: {e}")))?;
        Ok(count)
    }
}

impl JobQueue for PostgresJobQueue {
    fn enqueue_on<'a>(
        &'a self,
        queue: &'a str,
        payload: JobPayload,
        delay: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<JobId, ReviewError>> + Send + 'a>> {
        Box::pin(async move {
            let (id,): (i64,) = sqlx::query_as(
                r"
                INSERT INTO jobs (queue, payload, available_at)
                VALUES ($1, $2, NOW() + make_interval(secs => $3))
                RETURNING id
                ",
            )
            .bind(queue)
            .bind(Json(&payload))
            .bind(delay.as_secs_f64())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| ReviewError::Queue(format!("Failed to enqueue job: {e}")))?;

            tracing::debug!(job_id = id, queue, kind = payload.kind(), "Job enqueued");
            Ok(JobId(id))
        })
    }

    fn reserve<'a>(
        &'a self,
        queue: &'a str,
        visibility_timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Job>, ReviewError>> + Send + 'a>> {
        Box::pin(async move {
            let row: Option<(i64, String, serde_json::Value, i32)> = sqlx::query_as(
                r"
                UPDATE jobs
                SET attempts = attempts + 1,
                    reserved_until = NOW() + make_interval(secs => $2)
                WHERE id = (
                    SELECT id FROM jobs
                    WHERE queue = $1
                      AND available_at <= NOW()
                      AND (reserved_until IS NULL OR reserved_until <= NOW())
                    ORDER BY available_at, id
                    LIMIT 1
                    FOR UPDATE SKIP LOCKED
                )
                RETURNING id, queue, payload, attempts
                ",
            )
            .bind(queue)
            .bind(visibility_timeout.as_secs_f64())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ReviewError::Queue(format!("Failed to reserve job: {e}")))?;

            let Some((id, queue, payload, attempts)) = row else {
                return Ok(None);
            };

            let payload: JobPayload = serde_json::from_value(payload).map_err(|e| {
                ReviewError::Queue(format!("Undecodable payload for job {id}: {e}"))
            })?;

            Ok(Some(Job {
                id: JobId(id),
                queue,
                payload,
                attempts: u32::try_from(attempts).unwrap_or(0),
            }))
        })
    }

    fn complete(&self, id: JobId) -> Pin<Box<dyn Future<Output = Result<(), ReviewError>> + Send + '_>> {
        Box::pin(async move {
            sqlx::query("DELETE FROM jobs WHERE id = $1")
                .bind(id.0)
                .execute(&self.pool)
                .await
                .map_err(|e| ReviewError::Queue(format!("Failed to complete job {id}: {e}")))?;
            Ok(())
        })
    }

    fn release(
        &self,
        id: JobId,
        delay: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<(), ReviewError>> + Send + '_>> {
        Box::pin(async move {
            sqlx::query(
                r"
                UPDATE jobs
                SET reserved_until = NULL,
                    available_at = NOW() + make_interval(secs => $2)
                WHERE id = $1
                ",
            )
            .bind(id.0)
            .bind(delay.as_secs_f64())
            .execute(&self.pool)
            .await
            .map_err(|e| ReviewError::Queue(format!("Failed to release job {id}: {e}")))?;
            Ok(())
        })
    }

    fn dead_letter<'a>(
        &'a self,
        job: &'a Job,
        error: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), ReviewError>> + Send + 'a>> {
        Box::pin(async move {
            self.dead_letters.add_entry(job, error).await?;
            Ok(())
        })
    }
}
