//! `PostgreSQL` statistics store.

use chrono::{DateTime, Utc};
use product_reviews_core::error::ReviewError;
use product_reviews_core::statistics::{Distribution, PercentageDistribution, ProductStatistics};
use product_reviews_core::store::StatisticsStore;
use sqlx::postgres::PgPool;
use sqlx::types::Json;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

type StatisticsRow = (
    String,
    i64,
    f64,
    Json<Distribution>,
    Json<PercentageDistribution>,
    DateTime<Utc>,
);

/// PostgreSQL-backed [`StatisticsStore`].
///
/// Upserts are last-writer-wins on `last_calculated_at`: the conflict
/// update only fires when the incoming record is at least as new as the
/// stored one.
#[derive(Clone)]
pub struct PostgresStatisticsStore {
    pool: PgPool,
}

impl PostgresStatisticsStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn from_row(row: StatisticsRow) -> ProductStatistics {
        let (product_id, count, average, Json(distribution), Json(percentages), at) = row;
        ProductStatistics {
            product_id,
            rating_count: u64::try_from(count).unwrap_or(0),
            average_rating: average,
            rating_distribution: distribution,
            percentage_distribution: percentages,
            last_calculated_at: at,
        }
    }
}

impl StatisticsStore for PostgresStatisticsStore {
    fn get<'a>(
        &'a self,
        product_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<ProductStatistics>, ReviewError>> + Send + 'a>>
    {
        Box::pin(async move {
            let row: Option<StatisticsRow> = sqlx::query_as(
                r"
                SELECT product_id, rating_count, average_rating,
                       rating_distribution, percentage_distribution, last_calculated_at
                FROM ratings_and_review_statistics
                WHERE product_id = $1
                ",
            )
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ReviewError::Storage(format!("Failed to load statistics: {e}")))?;

            Ok(row.map(Self::from_row))
        })
    }

    fn upsert(
        &self,
        statistics: ProductStatistics,
    ) -> Pin<Box<dyn Future<Output = Result<(), ReviewError>> + Send + '_>> {
        Box::pin(async move {
            let result = sqlx::query(
                r"
                INSERT INTO ratings_and_review_statistics (
                    product_id, rating_count, average_rating,
                    rating_distribution, percentage_distribution, last_calculated_at
                ) VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (product_id) DO UPDATE SET
                    rating_count = EXCLUDED.rating_count,
                    average_rating = EXCLUDED.average_rating,
                    rating_distribution = EXCLUDED.rating_distribution,
                    percentage_distribution = EXCLUDED.percentage_distribution,
                    last_calculated_at = EXCLUDED.last_calculated_at
                WHERE ratings_and_review_statistics.last_calculated_at <= EXCLUDED.last_calculated_at
                ",
            )
            .bind(&statistics.product_id)
            .bind(i64::try_from(statistics.rating_count).unwrap_or(i64::MAX))
            .bind(statistics.average_rating)
            .bind(Json(&statistics.rating_distribution))
            .bind(Json(&statistics.percentage_distribution))
            .bind(statistics.last_calculated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| ReviewError::Storage(format!("Failed to upsert statistics: {e}")))?;

            if result.rows_affected() == 0 {
                tracing::debug!(
                    product_id = %statistics.product_id,
                    "Newer statistics already stored, upsert ignored"
                );
            }
            Ok(())
        })
    }

    fn bulk_get<'a>(
        &'a self,
        product_ids: &'a [String],
    ) -> Pin<
        Box<dyn Future<Output = Result<HashMap<String, ProductStatistics>, ReviewError>> + Send + 'a>,
    > {
        Box::pin(async move {
            if product_ids.is_empty() {
                return Ok(HashMap::new());
            }

            let rows: Vec<StatisticsRow> = sqlx::query_as(
                r"
                SELECT product_id, rating_count, average_rating,
                       rating_distribution, percentage_distribution, last_calculated_at
                FROM ratings_and_review_statistics
                WHERE product_id = ANY($1)
                ",
            )
            .bind(product_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ReviewError::Storage(format!("Failed to load statistics: {e}")))?;

            Ok(rows
                .into_iter()
                .map(Self::from_row)
                .map(|stats| (stats.product_id.clone(), stats))
                .collect())
        })
    }
}
