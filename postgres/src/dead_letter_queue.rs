//! Dead-letter table for jobs that could not be processed.
//!
//! Jobs land here when their handler fails permanently or exhausts the retry
//! policy. Entries stay until an operator redrives them (the payload goes
//! back onto its queue with a fresh attempt count) or discards them.

use chrono::{DateTime, Utc};
use product_reviews_core::error::ReviewError;
use product_reviews_core::queue::{Job, JobPayload};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};

/// Status of a dead-lettered job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DLQStatus {
    /// Awaiting investigation
    Pending,
    /// An operator is working on it
    Processing,
    /// Redriven onto its queue
    Resolved,
    /// Dropped permanently
    Discarded,
}

impl DLQStatus {
    /// Database representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Resolved => "resolved",
            Self::Discarded => "discarded",
        }
    }

    /// Parse the database representation.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Storage`] for an unknown status.
    pub fn parse(s: &str) -> Result<Self, ReviewError> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "resolved" => Ok(Self::Resolved),
            "discarded" => Ok(Self::Discarded),
            _ => Err(ReviewError::Storage(format!("Invalid DLQ status: {s}"))),
        }
    }
}

/// A dead-lettered job.
#[derive(Debug, Clone)]
pub struct FailedJob {
    /// DLQ entry id
    pub id: i64,
    /// Id the job had on its queue
    pub job_id: i64,
    /// Queue the job came from
    pub queue: String,
    /// The job body
    pub payload: JobPayload,
    /// Last failure message
    pub error_message: String,
    /// Attempts made before giving up
    pub attempts: i32,
    /// When the job was dead-lettered
    pub failed_at: DateTime<Utc>,
    /// Current status
    pub status: DLQStatus,
    /// When the entry was redriven or discarded
    pub resolved_at: Option<DateTime<Utc>>,
    /// Operator notes
    pub resolution_notes: Option<String>,
}

/// `PostgreSQL` dead-letter queue over the `failed_jobs` table.
///
/// # Example
///
/// ```no_run
/// use product_reviews_postgres::DeadLetterQueue;
///
/// # async fn example(pool: sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let dlq = DeadLetterQueue::new(pool);
///
/// for entry in dlq.list_pending(100).await? {
///     println!("{} {} {}", entry.id, entry.queue, entry.error_message);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DeadLetterQueue {
    pool: PgPool,
}

impl DeadLetterQueue {
    /// Create a dead-letter queue over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record a failed job and remove it from the live queue, atomically.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Queue`] if the transaction fails.
    pub async fn add_entry(&self, job: &Job, error_message: &str) -> Result<i64, ReviewError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ReviewError::Queue(format!("Failed to begin transaction: {e}")))?;

        sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(job.id.0)
            .execute(&mut *tx)
            .await
            .map_err(|e| ReviewError::Queue(format!("Failed to remove job: {e}")))?;

        let (id,): (i64,) = sqlx::query_as(
            r"
            INSERT INTO failed_jobs (job_id, queue, payload, error_message, attempts)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            ",
        )
        .bind(job.id.0)
        .bind(&job.queue)
        .bind(Json(&job.payload))
        .bind(error_message)
        .bind(i32::try_from(job.attempts).unwrap_or(i32::MAX))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| ReviewError::Queue(format!("Failed to insert DLQ entry: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| ReviewError::Queue(format!("Failed to commit DLQ entry: {e}")))?;

        tracing::warn!(
            dlq_id = id,
            job_id = %job.id,
            queue = %job.queue,
            kind = job.payload.kind(),
            error = error_message,
            attempts = job.attempts,
            "Job added to Dead Letter Queue"
        );

        Ok(id)
    }

    /// Pending entries, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Storage`] if the query fails.
    pub async fn list_pending(&self, limit: usize) -> Result<Vec<FailedJob>, ReviewError> {
        self.list_by_status(DLQStatus::Pending, limit).await
    }

    /// Entries in a status, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Storage`] if the query fails.
    pub async fn list_by_status(
        &self,
        status: DLQStatus,
        limit: usize,
    ) -> Result<Vec<FailedJob>, ReviewError> {
        let rows = sqlx::query(
            r"
            SELECT id, job_id, queue, payload, error_message, attempts,
                   failed_at, status, resolved_at, resolution_notes
            FROM failed_jobs
            WHERE status = $1
            ORDER BY failed_at ASC, id ASC
            LIMIT $2
            ",
        )
        .bind(status.as_str())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ReviewError::Storage(format!("Failed to list DLQ entries: {e}")))?;

        rows.iter().map(Self::row_to_failed_job).collect()
    }

    /// Fetch one entry.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Storage`] if the query fails.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<FailedJob>, ReviewError> {
        let row = sqlx::query(
            r"
            SELECT id, job_id, queue, payload, error_message, attempts,
                   failed_at, status, resolved_at, resolution_notes
            FROM failed_jobs
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ReviewError::Storage(format!("Failed to load DLQ entry: {e}")))?;

        row.as_ref().map(Self::row_to_failed_job).transpose()
    }

    /// Update an entry's status.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Storage`] if the update fails.
    pub async fn update_status(&self, id: i64, status: DLQStatus) -> Result<(), ReviewError> {
        sqlx::query("UPDATE failed_jobs SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| ReviewError::Storage(format!("Failed to update DLQ entry: {e}")))?;

        tracing::info!(dlq_id = id, status = status.as_str(), "DLQ entry status updated");
        Ok(())
    }

    /// Put a pending entry's payload back on its queue and mark it resolved.
    ///
    /// Returns the new job id.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::NotFound`] if the entry does not exist or is no
    /// longer pending, [`ReviewError::Queue`] if the transaction fails.
    pub async fn redrive(&self, id: i64) -> Result<i64, ReviewError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ReviewError::Queue(format!("Failed to begin transaction: {e}")))?;

        let entry: Option<(String, serde_json::Value)> = sqlx::query_as(
            r"
            UPDATE failed_jobs
            SET status = 'resolved', resolved_at = NOW(), resolution_notes = 'redriven'
            WHERE id = $1 AND status IN ('pending', 'processing')
            RETURNING queue, payload
            ",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| ReviewError::Queue(format!("Failed to claim DLQ entry: {e}")))?;

        let Some((queue, payload)) = entry else {
            return Err(ReviewError::NotFound(format!("dead-letter entry {id}")));
        };

        let (job_id,): (i64,) =
            sqlx::query_as("INSERT INTO jobs (queue, payload) VALUES ($1, $2) RETURNING id")
                .bind(&queue)
                .bind(payload)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| ReviewError::Queue(format!("Failed to re-enqueue job: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| ReviewError::Queue(format!("Failed to commit redrive: {e}")))?;

        tracing::info!(dlq_id = id, job_id, queue = %queue, "DLQ entry redriven");
        metrics::counter!("reviews_dlq_redriven_total", "queue" => queue).increment(1);

        Ok(job_id)
    }

    /// Drop an entry permanently.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Storage`] if the update fails.
    pub async fn discard(&self, id: i64, reason: &str) -> Result<(), ReviewError> {
        sqlx::query(
            r"
            UPDATE failed_jobs
            SET status = 'discarded', resolved_at = NOW(), resolution_notes = $1
            WHERE id = $2
            ",
        )
        .bind(reason)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| ReviewError::Storage(format!("Failed to discard DLQ entry: {e}")))?;

        tracing::warn!(dlq_id = id, reason = reason, "DLQ entry discarded");
        metrics::counter!("reviews_dlq_discarded_total").increment(1);

        Ok(())
    }

    /// Number of pending entries.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Storage`] if the query fails.
    pub async fn count_pending(&self) -> Result<i64, ReviewError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM failed_jobs WHERE status = 'pending'")
                .fetch_one(&self.pool)
                .await
                .map_err(|e| ReviewError::Storage(format!("Failed to count DLQ entries: {e}")))?;

        Ok(count)
    }

    fn row_to_failed_job(row: &PgRow) -> Result<FailedJob, ReviewError> {
        let decode = |e: sqlx::Error| ReviewError::Storage(format!("Failed to decode DLQ row: {e}"));

        let status: String = row.try_get("status").map_err(decode)?;
        let Json(payload): Json<JobPayload> = row.try_get("payload").map_err(decode)?;

        Ok(FailedJob {
            id: row.try_get("id").map_err(decode)?,
            job_id: row.try_get("job_id").map_err(decode)?,
            queue: row.try_get("queue").map_err(decode)?,
            payload,
            error_message: row.try_get("error_message").map_err(decode)?,
            attempts: row.try_get("attempts").map_err(decode)?,
            failed_at: row.try_get("failed_at").map_err(decode)?,
            status: DLQStatus::parse(&status)?,
            resolved_at: row.try_get("resolved_at").map_err(decode)?,
            resolution_notes: row.try_get("resolution_notes").map_err(decode)?,
        })
    }
}
