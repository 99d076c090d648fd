//! `PostgreSQL` review store.
//!
//! Reviews live in a single `reviews` table keyed by `review_id`. The three
//! secondary indexes (`product_id`, `user_id`, `publication_status`, each
//! paired with `review_id`) back the keyset-paginated queries.
//!
//! ```sql
//! CREATE TABLE reviews (
//!     review_id TEXT PRIMARY KEY,
//!     product_id TEXT NOT NULL,
//!     ...
//!     media JSONB NOT NULL DEFAULT '[]'
//! );
//! CREATE INDEX idx_reviews_product ON reviews (product_id, review_id);
//! ```

use product_reviews_core::error::ReviewError;
use product_reviews_core::query::{Cursor, Page, ProductKey, ReviewIndex, ReviewQuery};
use product_reviews_core::review::{Media, PublicationStatus, Review};
use product_reviews_core::store::ReviewStore;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder, Row};
use std::future::Future;
use std::pin::Pin;

const REVIEW_COLUMNS: &str = "review_id, user_id, product_id, rating, original_language, \
     review_en, review_ar, country, created_at, publication_status, media";

/// PostgreSQL-backed [`ReviewStore`].
#[derive(Clone)]
pub struct PostgresReviewStore {
    pool: PgPool,
}

impl PostgresReviewStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_review(row: &PgRow) -> Result<Review, ReviewError> {
        let rating: i16 = row.try_get("rating").map_err(decode_error)?;
        let rating = u8::try_from(rating)
            .map_err(|_| ReviewError::Storage(format!("Rating out of range: {rating}")))?;

        let language: String = row.try_get("original_language").map_err(decode_error)?;
        let status: String = row.try_get("publication_status").map_err(decode_error)?;
        let Json(media): Json<Vec<Media>> = row.try_get("media").map_err(decode_error)?;

        Ok(Review {
            review_id: row.try_get("review_id").map_err(decode_error)?,
            user_id: row.try_get("user_id").map_err(decode_error)?,
            product_id: row.try_get("product_id").map_err(decode_error)?,
            rating,
            original_language: language.parse().map_err(ReviewError::Storage)?,
            review_en: row.try_get("review_en").map_err(decode_error)?,
            review_ar: row.try_get("review_ar").map_err(decode_error)?,
            country: row.try_get("country").map_err(decode_error)?,
            created_at: row.try_get("created_at").map_err(decode_error)?,
            publication_status: status.parse().map_err(ReviewError::Storage)?,
            media,
        })
    }

    /// Hash key value of `review` under `index`, for building cursors.
    fn hash_key_of(index: ReviewIndex, review: &Review) -> String {
        match index {
            ReviewIndex::Product => review.product_id.clone(),
            ReviewIndex::User => review.user_id.clone(),
            ReviewIndex::Status => review.publication_status.as_str().to_string(),
        }
    }

    fn build_query(query: &ReviewQuery) -> QueryBuilder<'static, Postgres> {
        let mut builder =
            QueryBuilder::new(format!("SELECT {REVIEW_COLUMNS} FROM reviews WHERE TRUE"));
        let key_column = query.index.hash_key_name();

        if let Some(hash_key) = &query.hash_key {
            builder
                .push(format!(" AND {key_column} = "))
                .push_bind(hash_key.clone());
        }

        let filter = &query.filter;
        if let Some(status) = filter.publication_status {
            builder
                .push(" AND publication_status = ")
                .push_bind(status.as_str());
        }
        if let Some(country) = &filter.country {
            builder.push(" AND country = ").push_bind(country.clone());
        }
        if let Some(language) = filter.language {
            builder
                .push(" AND original_language = ")
                .push_bind(language.as_str());
        }
        if let Some(user_id) = &filter.user_id {
            builder.push(" AND user_id = ").push_bind(user_id.clone());
        }

        match (&query.after, &query.hash_key) {
            (Some(cursor), Some(_)) => {
                builder
                    .push(" AND review_id > ")
                    .push_bind(cursor.review_id.clone());
            }
            (Some(cursor), None) => {
                builder
                    .push(format!(" AND ({key_column}, review_id) > ("))
                    .push_bind(cursor.hash_key.clone())
                    .push(", ")
                    .push_bind(cursor.review_id.clone())
                    .push(")");
            }
            (None, _) => {}
        }

        if query.hash_key.is_some() {
            builder.push(" ORDER BY review_id");
        } else {
            builder.push(format!(" ORDER BY {key_column}, review_id"));
        }

        builder
            .push(" LIMIT ")
            .push_bind(i64::try_from(query.limit).unwrap_or(i64::MAX));
        builder
    }
}

fn decode_error(e: sqlx::Error) -> ReviewError {
    ReviewError::Storage(format!("Failed to decode review row: {e}"))
}

impl ReviewStore for PostgresReviewStore {
    fn put(&self, review: Review) -> Pin<Box<dyn Future<Output = Result<(), ReviewError>> + Send + '_>> {
        Box::pin(async move {
            sqlx::query(
                r"
                INSERT INTO reviews (
                    review_id, user_id, product_id, rating, original_language,
                    review_en, review_ar, country, created_at, publication_status, media
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                ON CONFLICT (review_id) DO UPDATE SET
                    user_id = EXCLUDED.user_id,
                    product_id = EXCLUDED.product_id,
                    rating = EXCLUDED.rating,
                    original_language = EXCLUDED.original_language,
                    review_en = EXCLUDED.review_en,
                    review_ar = EXCLUDED.review_ar,
                    country = EXCLUDED.country,
                    created_at = EXCLUDED.created_at,
                    publication_status = EXCLUDED.publication_status,
                    media = EXCLUDED.media
                ",
            )
            .bind(&review.review_id)
            .bind(&review.user_id)
            .bind(&review.product_id)
            .bind(i16::from(review.rating))
            .bind(review.original_language.as_str())
            .bind(&review.review_en)
            .bind(&review.review_ar)
            .bind(&review.country)
            .bind(review.created_at)
            .bind(review.publication_status.as_str())
            .bind(Json(&review.media))
            .execute(&self.pool)
            .await
            .map_err(|e| ReviewError::Storage(format!("Failed to save review: {e}")))?;

            tracing::debug!(review_id = %review.review_id, "Review saved");
            Ok(())
        })
    }

    fn get<'a>(
        &'a self,
        review_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Review>, ReviewError>> + Send + 'a>> {
        Box::pin(async move {
            let row = sqlx::query(&format!(
                "SELECT {REVIEW_COLUMNS} FROM reviews WHERE review_id = $1"
            ))
            .bind(review_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ReviewError::Storage(format!("Failed to load review: {e}")))?;

            row.as_ref().map(Self::row_to_review).transpose()
        })
    }

    fn delete<'a>(
        &'a self,
        review_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Review>, ReviewError>> + Send + 'a>> {
        Box::pin(async move {
            let row = sqlx::query(&format!(
                "DELETE FROM reviews WHERE review_id = $1 RETURNING {REVIEW_COLUMNS}"
            ))
            .bind(review_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ReviewError::Storage(format!("Failed to delete review: {e}")))?;

            row.as_ref().map(Self::row_to_review).transpose()
        })
    }

    fn query(
        &self,
        query: ReviewQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Page<Review>, ReviewError>> + Send + '_>> {
        Box::pin(async move {
            query.validate_cursor()?;

            let rows = Self::build_query(&query)
                .build()
                .fetch_all(&self.pool)
                .await
                .map_err(|e| ReviewError::Storage(format!("Failed to query reviews: {e}")))?;

            let items = rows
                .iter()
                .map(Self::row_to_review)
                .collect::<Result<Vec<_>, _>>()?;

            let next_cursor = if items.len() == query.limit {
                items.last().map(|last| {
                    Cursor::new(
                        query.index,
                        Self::hash_key_of(query.index, last),
                        last.review_id.clone(),
                    )
                })
            } else {
                None
            };

            Ok(Page { items, next_cursor })
        })
    }

    fn count_by_status(
        &self,
        status: PublicationStatus,
    ) -> Pin<Box<dyn Future<Output = Result<u64, ReviewError>> + Send + '_>> {
        Box::pin(async move {
            let (count,): (i64,) =
                sqlx::query_as("SELECT COUNT(*) FROM reviews WHERE publication_status = $1")
                    .bind(status.as_str())
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| ReviewError::Storage(format!("Failed to count reviews: {e}")))?;

            Ok(u64::try_from(count).unwrap_or(0))
        })
    }

    fn scan_product_keys(
        &self,
        after: Option<Cursor>,
        limit: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Page<ProductKey>, ReviewError>> + Send + '_>> {
        Box::pin(async move {
            let limit = limit.max(1);
            let mut builder = QueryBuilder::<Postgres>::new(
                "SELECT product_id, review_id FROM reviews WHERE TRUE",
            );
            if let Some(cursor) = after {
                builder
                    .push(" AND (product_id, review_id) > (")
                    .push_bind(cursor.hash_key)
                    .push(", ")
                    .push_bind(cursor.review_id)
                    .push(")");
            }
            builder
                .push(" ORDER BY product_id, review_id LIMIT ")
                .push_bind(i64::try_from(limit).unwrap_or(i64::MAX));

            let keys: Vec<(String, String)> = builder
                .build_query_as()
                .fetch_all(&self.pool)
                .await
                .map_err(|e| ReviewError::Storage(format!("Failed to scan product keys: {e}")))?;

            let next_cursor = if keys.len() == limit {
                keys.last().map(|(product_id, review_id)| {
                    Cursor::new(ReviewIndex::Product, product_id.as_str(), review_id.as_str())
                })
            } else {
                None
            };

            Ok(Page {
                items: keys
                    .into_iter()
                    .map(|(product_id, review_id)| ProductKey {
                        product_id,
                        review_id,
                    })
                    .collect(),
                next_cursor,
            })
        })
    }
}
