//! `PostgreSQL` storage for the product review service.
//!
//! This crate provides the durable implementations of the core storage
//! traits, all sharing one connection pool:
//!
//! - [`PostgresReviewStore`]: reviews with product/user/status indexes
//! - [`PostgresStatisticsStore`]: per-product rating summaries
//! - [`PostgresJobQueue`]: the `statistics` and `cache-invalidation` queues
//! - [`DeadLetterQueue`]: jobs that failed permanently
//!
//! # Example
//!
//! ```ignore
//! use product_reviews_postgres::{connect, migrate, PostgresReviewStore};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = connect("postgres://localhost/reviews", 10).await?;
//!     migrate(&pool).await?;
//!     let reviews = PostgresReviewStore::new(pool);
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod dead_letter_queue;
pub mod queue;
pub mod reviews;
pub mod statistics;

pub use dead_letter_queue::{DLQStatus, DeadLetterQueue, FailedJob};
pub use queue::PostgresJobQueue;
pub use reviews::PostgresReviewStore;
pub use statistics::PostgresStatisticsStore;

use product_reviews_core::error::ReviewError;
use sqlx::postgres::{PgPool, PgPoolOptions};

/// Open a connection pool.
///
/// # Errors
///
/// Returns [`ReviewError::Storage`] if the database cannot be reached.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, ReviewError> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .map_err(|e| ReviewError::Storage(format!("Failed to connect: {e}")))
}

/// Create or upgrade the review, statistics and queue tables.
///
/// # Errors
///
/// Returns [`ReviewError::Storage`] if a migration fails.
pub async fn migrate(pool: &PgPool) -> Result<(), ReviewError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| ReviewError::Storage(format!("Migration failed: {e}")))?;
    Ok(())
}
