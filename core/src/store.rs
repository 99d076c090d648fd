//! Storage abstractions for reviews and statistics.
//!
//! # Implementations
//!
//! - `PostgresReviewStore` / `PostgresStatisticsStore` (in `product-reviews-postgres`)
//! - `InMemoryReviewStore` / `InMemoryStatisticsStore` (in `product-reviews-testing`)
//!
//! # Dyn Compatibility
//!
//! Both traits return `Pin<Box<dyn Future>>` so they can be held as
//! `Arc<dyn ReviewStore>` inside the shared dependency bundle.

use crate::error::ReviewError;
use crate::query::{Cursor, Page, ProductKey, ReviewFilter, ReviewQuery};
use crate::review::{PublicationStatus, Review};
use crate::statistics::ProductStatistics;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

/// Durable record of individual reviews.
///
/// Not-found is an empty `Option`, never an error. Storage failures surface
/// as [`ReviewError::Storage`].
pub trait ReviewStore: Send + Sync {
    /// Insert or replace a review.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Storage`] if the write fails.
    fn put(&self, review: Review) -> Pin<Box<dyn Future<Output = Result<(), ReviewError>> + Send + '_>>;

    /// Fetch a review by id.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Storage`] if the read fails.
    fn get<'a>(
        &'a self,
        review_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Review>, ReviewError>> + Send + 'a>>;

    /// Delete a review, returning the removed record.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Storage`] if the delete fails.
    fn delete<'a>(
        &'a self,
        review_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Review>, ReviewError>> + Send + 'a>>;

    /// Run a query against one index.
    ///
    /// Results are ordered by the index's range key (`review_id`), or by
    /// `(product_id, review_id)` for a full product-index walk. Secondary
    /// filters are applied before the limit, so a short page is the last page.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Validation`] for a cursor from another index and
    /// [`ReviewError::Storage`] if the read fails.
    fn query(
        &self,
        query: ReviewQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Page<Review>, ReviewError>> + Send + '_>>;

    /// Count reviews in a status.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Storage`] if the read fails.
    fn count_by_status(
        &self,
        status: PublicationStatus,
    ) -> Pin<Box<dyn Future<Output = Result<u64, ReviewError>> + Send + '_>>;

    /// Walk the product index returning key projections only.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Storage`] if the read fails.
    fn scan_product_keys(
        &self,
        after: Option<Cursor>,
        limit: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Page<ProductKey>, ReviewError>> + Send + '_>>;

    /// Reviews of a product.
    ///
    /// # Errors
    ///
    /// See [`ReviewStore::query`].
    fn query_by_product(
        &self,
        product_id: &str,
        after: Option<Cursor>,
        limit: usize,
        filter: ReviewFilter,
    ) -> Pin<Box<dyn Future<Output = Result<Page<Review>, ReviewError>> + Send + '_>> {
        self.query(
            ReviewQuery::by_product(product_id)
                .with_filter(filter)
                .with_limit(limit)
                .after(after),
        )
    }

    /// Reviews in a status.
    ///
    /// # Errors
    ///
    /// See [`ReviewStore::query`].
    fn query_by_status(
        &self,
        status: PublicationStatus,
        after: Option<Cursor>,
        limit: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Page<Review>, ReviewError>> + Send + '_>> {
        self.query(ReviewQuery::by_status(status).with_limit(limit).after(after))
    }

    /// Reviews by a user.
    ///
    /// # Errors
    ///
    /// See [`ReviewStore::query`].
    fn query_by_user(
        &self,
        user_id: &str,
        after: Option<Cursor>,
        limit: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Page<Review>, ReviewError>> + Send + '_>> {
        self.query(ReviewQuery::by_user(user_id).with_limit(limit).after(after))
    }
}

/// Durable per-product statistics records.
pub trait StatisticsStore: Send + Sync {
    /// Fetch the record for a product; `None` means never computed.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Storage`] if the read fails.
    fn get<'a>(
        &'a self,
        product_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<ProductStatistics>, ReviewError>> + Send + 'a>>;

    /// Insert or replace a record, last-writer-wins on `last_calculated_at`.
    ///
    /// An incoming record older than the stored one is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Storage`] if the write fails.
    fn upsert(
        &self,
        statistics: ProductStatistics,
    ) -> Pin<Box<dyn Future<Output = Result<(), ReviewError>> + Send + '_>>;

    /// Fetch records for many products; absent products are omitted.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Storage`] if the read fails.
    fn bulk_get<'a>(
        &'a self,
        product_ids: &'a [String],
    ) -> Pin<
        Box<dyn Future<Output = Result<HashMap<String, ProductStatistics>, ReviewError>> + Send + 'a>,
    >;
}
