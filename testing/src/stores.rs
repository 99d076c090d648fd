//! In-memory review and statistics stores.
//!
//! Both stores honour the same ordering, filtering and last-writer-wins rules
//! as the Postgres implementations, and expose fault injection and call
//! counters for tests.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Poisoned locks only happen after a test already panicked

use product_reviews_core::error::ReviewError;
use product_reviews_core::query::{Cursor, Page, ProductKey, ReviewIndex, ReviewQuery};
use product_reviews_core::review::{PublicationStatus, Review};
use product_reviews_core::statistics::ProductStatistics;
use product_reviews_core::store::{ReviewStore, StatisticsStore};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

/// In-memory review store.
#[derive(Clone, Debug, Default)]
pub struct InMemoryReviewStore {
    reviews: Arc<RwLock<BTreeMap<String, Review>>>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
    queries: Arc<AtomicUsize>,
}

impl InMemoryReviewStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a review directly, bypassing the trait.
    pub fn insert(&self, review: Review) {
        self.reviews
            .write()
            .unwrap()
            .insert(review.review_id.clone(), review);
    }

    /// Insert many reviews.
    pub fn insert_all(&self, reviews: impl IntoIterator<Item = Review>) {
        for review in reviews {
            self.insert(review);
        }
    }

    /// Snapshot of a stored review.
    #[must_use]
    pub fn review(&self, review_id: &str) -> Option<Review> {
        self.reviews.read().unwrap().get(review_id).cloned()
    }

    /// Number of stored reviews.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reviews.read().unwrap().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reviews.read().unwrap().is_empty()
    }

    /// Make every subsequent read fail with a storage error.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent write fail with a storage error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of `query` / `scan_product_keys` calls served.
    #[must_use]
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn check_read(&self) -> Result<(), ReviewError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(ReviewError::Storage("injected read failure".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), ReviewError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ReviewError::Storage("injected write failure".to_string()));
        }
        Ok(())
    }

    fn hash_key_of(index: ReviewIndex, review: &Review) -> &str {
        match index {
            ReviewIndex::Product => &review.product_id,
            ReviewIndex::User => &review.user_id,
            ReviewIndex::Status => review.publication_status.as_str(),
        }
    }

    fn run_query(&self, query: &ReviewQuery) -> Result<Page<Review>, ReviewError> {
        query.validate_cursor()?;
        let reviews = self.reviews.read().unwrap();

        let mut matching: Vec<&Review> = reviews
            .values()
            .filter(|r| {
                query
                    .hash_key
                    .as_deref()
                    .is_none_or(|key| Self::hash_key_of(query.index, r) == key)
            })
            .filter(|r| query.filter.matches(r))
            .collect();

        // Keyed queries order by review_id; a full walk by (product_id, review_id).
        if query.hash_key.is_none() {
            matching.sort_by(|a, b| {
                (a.product_id.as_str(), a.review_id.as_str())
                    .cmp(&(b.product_id.as_str(), b.review_id.as_str()))
            });
        }

        let items: Vec<Review> = matching
            .into_iter()
            .filter(|r| match &query.after {
                None => true,
                Some(cursor) if query.hash_key.is_none() => {
                    (r.product_id.as_str(), r.review_id.as_str())
                        > (cursor.hash_key.as_str(), cursor.review_id.as_str())
                }
                Some(cursor) => r.review_id > cursor.review_id,
            })
            .take(query.limit)
            .cloned()
            .collect();

        let next_cursor = if items.len() == query.limit {
            items
                .last()
                .map(|r| Cursor::new(query.index, Self::hash_key_of(query.index, r), &r.review_id))
        } else {
            None
        };

        Ok(Page { items, next_cursor })
    }
}

impl ReviewStore for InMemoryReviewStore {
    fn put(&self, review: Review) -> Pin<Box<dyn Future<Output = Result<(), ReviewError>> + Send + '_>> {
        Box::pin(async move {
            self.check_write()?;
            self.insert(review);
            Ok(())
        })
    }

    fn get<'a>(
        &'a self,
        review_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Review>, ReviewError>> + Send + 'a>> {
        Box::pin(async move {
            self.check_read()?;
            Ok(self.review(review_id))
        })
    }

    fn delete<'a>(
        &'a self,
        review_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Review>, ReviewError>> + Send + 'a>> {
        Box::pin(async move {
            self.check_write()?;
            Ok(self.reviews.write().unwrap().remove(review_id))
        })
    }

    fn query(
        &self,
        query: ReviewQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Page<Review>, ReviewError>> + Send + '_>> {
        Box::pin(async move {
            self.queries.fetch_add(1, Ordering::SeqCst);
            self.check_read()?;
            self.run_query(&query)
        })
    }

    fn count_by_status(
        &self,
        status: PublicationStatus,
    ) -> Pin<Box<dyn Future<Output = Result<u64, ReviewError>> + Send + '_>> {
        Box::pin(async move {
            self.check_read()?;
            let count = self
                .reviews
                .read()
                .unwrap()
                .values()
                .filter(|r| r.publication_status == status)
                .count();
            Ok(count as u64)
        })
    }

    fn scan_product_keys(
        &self,
        after: Option<Cursor>,
        limit: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Page<ProductKey>, ReviewError>> + Send + '_>> {
        Box::pin(async move {
            self.queries.fetch_add(1, Ordering::SeqCst);
            self.check_read()?;
            let page = self.run_query(&ReviewQuery::scan().with_limit(limit).after(after))?;
            Ok(Page {
                items: page
                    .items
                    .into_iter()
                    .map(|r| ProductKey {
                        product_id: r.product_id,
                        review_id: r.review_id,
                    })
                    .collect(),
                next_cursor: page.next_cursor,
            })
        })
    }
}

/// In-memory statistics store with last-writer-wins upserts.
#[derive(Clone, Debug, Default)]
pub struct InMemoryStatisticsStore {
    records: Arc<RwLock<HashMap<String, ProductStatistics>>>,
    fail_writes: Arc<AtomicBool>,
    upserts: Arc<AtomicUsize>,
}

impl InMemoryStatisticsStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record directly, bypassing last-writer-wins.
    pub fn insert(&self, statistics: ProductStatistics) {
        self.records
            .write()
            .unwrap()
            .insert(statistics.product_id.clone(), statistics);
    }

    /// Snapshot of a stored record.
    #[must_use]
    pub fn record(&self, product_id: &str) -> Option<ProductStatistics> {
        self.records.read().unwrap().get(product_id).cloned()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().unwrap().is_empty()
    }

    /// Number of upserts attempted.
    #[must_use]
    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    /// Make every subsequent upsert fail with a storage error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl StatisticsStore for InMemoryStatisticsStore {
    fn get<'a>(
        &'a self,
        product_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<ProductStatistics>, ReviewError>> + Send + 'a>> {
        Box::pin(async move { Ok(self.record(product_id)) })
    }

    fn upsert(
        &self,
        statistics: ProductStatistics,
    ) -> Pin<Box<dyn Future<Output = Result<(), ReviewError>> + Send + '_>> {
        Box::pin(async move {
            self.upserts.fetch_add(1, Ordering::SeqCst);
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(ReviewError::Storage("injected write failure".to_string()));
            }
            let mut records = self.records.write().unwrap();
            let is_newer = records
                .get(&statistics.product_id)
                .is_none_or(|existing| existing.last_calculated_at <= statistics.last_calculated_at);
            if is_newer {
                records.insert(statistics.product_id.clone(), statistics);
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
            let records = self.records.read().unwrap();
            Ok(product_ids
                .iter()
                .filter_map(|id| records.get(id).map(|s| (id.clone(), s.clone())))
                .collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{ReviewBuilder, published};
    use chrono::Utc;
    use product_reviews_core::query::ReviewFilter;

    #[tokio::test]
    async fn test_product_query_pages_in_review_id_order() {
        let store = InMemoryReviewStore::new();
        for i in 0..5 {
            store.insert(ReviewBuilder::new("p-1").id(&format!("r-{i}")).published().build());
        }
        store.insert(published("p-2", 3));

        let first = store
            .query_by_product("p-1", None, 2, ReviewFilter::default())
            .await
            .unwrap();
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.items[0].review_id, "r-0");
        let cursor = first.next_cursor.clone().unwrap();
        assert_eq!(cursor.hash_key, "p-1");
        assert_eq!(cursor.review_id, "r-1");

        let rest = store
            .query_by_product("p-1", Some(cursor), 10, ReviewFilter::default())
            .await
            .unwrap();
        assert_eq!(rest.items.len(), 3);
        assert!(rest.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_filter_applies_before_limit() {
        let store = InMemoryReviewStore::new();
        store.insert(ReviewBuilder::new("p-1").id("r-1").build());
        store.insert(ReviewBuilder::new("p-1").id("r-2").published().build());
        store.insert(ReviewBuilder::new("p-1").id("r-3").published().build());

        let page = store
            .query_by_product("p-1", None, 2, ReviewFilter::published())
            .await
            .unwrap();
        assert_eq!(page.items.len(), 2);
        assert!(page.items.iter().all(Review::is_published));
    }

    #[tokio::test]
    async fn test_scan_walks_all_products() {
        let store = InMemoryReviewStore::new();
        store.insert(ReviewBuilder::new("p-b").id("r-1").build());
        store.insert(ReviewBuilder::new("p-a").id("r-2").build());
        store.insert(ReviewBuilder::new("p-a").id("r-3").build());

        let first = store.scan_product_keys(None, 2).await.unwrap();
        assert_eq!(first.items[0].product_id, "p-a");
        assert_eq!(first.items[1].product_id, "p-a");

        let second = store.scan_product_keys(first.next_cursor, 2).await.unwrap();
        assert_eq!(second.items.len(), 1);
        assert_eq!(second.items[0].product_id, "p-b");
    }

    #[tokio::test]
    async fn test_statistics_upsert_is_last_writer_wins() {
        let store = InMemoryStatisticsStore::new();
        let now = Utc::now();
        let newer = ProductStatistics::zeroed("p-1", now);
        let mut older = ProductStatistics::zeroed("p-1", now - chrono::Duration::seconds(10));
        older.rating_count = 99;

        store.upsert(newer.clone()).await.unwrap();
        store.upsert(older).await.unwrap();

        assert_eq!(store.record("p-1"), Some(newer));
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = InMemoryReviewStore::new();
        store.fail_reads(true);
        assert!(matches!(
            store.get("r-1").await,
            Err(ReviewError::Storage(_))
        ));
    }
}
