//! Per-product statistics recompute.
//!
//! The aggregator is stateless: its output depends only on the current
//! published reviews of a product. Each run walks the product index page by
//! page, tallies ratings, and upserts an absolute summary. Concurrent runs
//! for the same product are resolved by the statistics store's
//! last-writer-wins upsert.
//!
//! # Algorithm
//!
//! ```text
//! counts = [0; 5], cursor = none, iter = 0
//! loop {
//!     page = reviews(product, published, limit, after cursor)
//!     tally page ratings (invalid ratings are skipped and logged)
//!     page empty          → break
//!     iter > max_iter     → IterationCeiling (not retried)
//!     cursor = last item
//!     page short          → break
//! }
//! upsert summary (zeroed when count = 0), then invalidate product paths
//! ```

use crate::invalidator::CacheInvalidator;
use product_reviews_core::environment::Clock;
use product_reviews_core::error::ReviewError;
use product_reviews_core::query::{Cursor, ReviewFilter, ReviewIndex};
use product_reviews_core::statistics::{ProductStatistics, RatingCounts};
use product_reviews_core::store::{ReviewStore, StatisticsStore};
use product_reviews_runtime::metrics::StatisticsMetrics;
use std::sync::Arc;
use std::time::Instant;

/// Page size for review scans.
pub const PAGE_SIZE: usize = 100;

/// Safety cap on pages per scan.
pub const MAX_ITERATIONS: usize = 10_000;

/// Recomputes product statistics from the review store.
#[derive(Clone)]
pub struct Aggregator {
    reviews: Arc<dyn ReviewStore>,
    statistics: Arc<dyn StatisticsStore>,
    invalidator: CacheInvalidator,
    clock: Arc<dyn Clock>,
    page_size: usize,
    max_iterations: usize,
}

impl Aggregator {
    /// Create an aggregator with the standard page size and iteration cap.
    #[must_use]
    pub fn new(
        reviews: Arc<dyn ReviewStore>,
        statistics: Arc<dyn StatisticsStore>,
        invalidator: CacheInvalidator,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            reviews,
            statistics,
            invalidator,
            clock,
            page_size: PAGE_SIZE,
            max_iterations: MAX_ITERATIONS,
        }
    }

    /// Override the page size (at least one).
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Override the iteration cap.
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Recompute and persist the statistics of one product.
    ///
    /// # Errors
    ///
    /// - [`ReviewError::Storage`] if a page read or the upsert fails
    /// - [`ReviewError::IterationCeiling`] if the scan exceeds the page cap
    pub async fn recompute(&self, product_id: &str) -> Result<ProductStatistics, ReviewError> {
        let started = Instant::now();
        tracing::info!(product_id, "Recomputing product statistics");

        let result = self.scan_and_store(product_id).await;

        match &result {
            Ok((stats, pages)) => {
                StatisticsMetrics::record_recompute(started.elapsed(), *pages);
                tracing::info!(
                    product_id,
                    rating_count = stats.rating_count,
                    average_rating = stats.average_rating,
                    pages,
                    "Product statistics stored"
                );
            }
            Err(e) => {
                StatisticsMetrics::record_failure(e.kind());
                tracing::error!(product_id, error = %e, "Statistics recompute failed");
            }
        }

        let (stats, _) = result?;
        self.invalidator.statistics_updated(product_id).await;
        Ok(stats)
    }

    async fn scan_and_store(&self, product_id: &str) -> Result<(ProductStatistics, usize), ReviewError> {
        let (counts, pages) = self.tally(product_id).await?;

        let now = self.clock.now();
        let stats = if counts.total() == 0 {
            tracing::info!(product_id, "No published reviews, storing zeroed statistics");
            ProductStatistics::zeroed(product_id, now)
        } else {
            ProductStatistics::from_counts(product_id, &counts, now)
        };

        self.statistics.upsert(stats.clone()).await?;
        Ok((stats, pages))
    }

    /// Walk every published review of a product, returning the tally and the
    /// number of non-empty pages read.
    async fn tally(&self, product_id: &str) -> Result<(RatingCounts, usize), ReviewError> {
        let mut counts = RatingCounts::default();
        let mut cursor: Option<Cursor> = None;
        let mut iterations = 0usize;

        loop {
            let page = self
                .reviews
                .query_by_product(product_id, cursor.take(), self.page_size, ReviewFilter::published())
                .await?;

            for review in &page.items {
                if !counts.record(review.rating) {
                    tracing::warn!(
                        product_id,
                        review_id = %review.review_id,
                        rating = review.rating,
                        "Skipping review with out-of-range rating"
                    );
                }
            }

            let Some(last) = page.items.last() else {
                break;
            };

            iterations += 1;
            if iterations > self.max_iterations {
                tracing::error!(
                    product_id,
                    limit = self.max_iterations,
                    "Iteration ceiling reached while scanning reviews"
                );
                return Err(ReviewError::IterationCeiling {
                    operation: format!("aggregating product {product_id}"),
                    limit: self.max_iterations,
                });
            }

            if page.items.len() < self.page_size {
                break;
            }
            cursor = Some(Cursor::new(ReviewIndex::Product, product_id, last.review_id.as_str()));
        }

        Ok((counts, iterations))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use product_reviews_core::paths;
    use product_reviews_core::review::PublicationStatus;
    use product_reviews_testing::fixtures::{ReviewBuilder, published};
    use product_reviews_testing::{
        InMemoryJobQueue, InMemoryReviewStore, InMemoryStatisticsStore, test_clock,
    };
    use proptest::prelude::*;

    struct Harness {
        reviews: Arc<InMemoryReviewStore>,
        statistics: Arc<InMemoryStatisticsStore>,
        queue: Arc<InMemoryJobQueue>,
        aggregator: Aggregator,
    }

    fn harness() -> Harness {
        let reviews = Arc::new(InMemoryReviewStore::new());
        let statistics = Arc::new(InMemoryStatisticsStore::new());
        let queue = Arc::new(InMemoryJobQueue::new());
        let clock: Arc<dyn Clock> = Arc::new(test_clock());
        let invalidator = CacheInvalidator::new(queue.clone(), clock.clone());
        let aggregator = Aggregator::new(reviews.clone(), statistics.clone(), invalidator, clock);
        Harness {
            reviews,
            statistics,
            queue,
            aggregator,
        }
    }

    #[tokio::test]
    async fn test_five_published_ratings() {
        let h = harness();
        for rating in [5, 4, 4, 3, 1] {
            h.reviews.insert(published("p-1", rating));
        }

        let stats = h.aggregator.recompute("p-1").await.unwrap();

        assert_eq!(stats.rating_count, 5);
        assert!((stats.average_rating - 3.4).abs() < 1e-9);
        assert_eq!(stats.rating_distribution.get(&2), Some(&0));
        assert_eq!(stats.rating_distribution.get(&4), Some(&2));
        assert!((stats.percentage_distribution[&4] - 40.0).abs() < 1e-9);
        assert_eq!(h.statistics.record("p-1"), Some(stats));
    }

    #[tokio::test]
    async fn test_only_pending_reviews_store_zeroed_record() {
        let h = harness();
        h.reviews.insert(ReviewBuilder::new("p-1").rating(5).build());
        h.reviews.insert(ReviewBuilder::new("p-1").rating(2).build());

        let stats = h.aggregator.recompute("p-1").await.unwrap();

        assert_eq!(stats.rating_count, 0);
        assert!(stats.average_rating.abs() < f64::EPSILON);
        assert_eq!(stats.rating_distribution.len(), 5);
        assert!(stats.rating_distribution.values().all(|c| *c == 0));
        assert_eq!(stats.percentage_distribution.len(), 5);
        assert!(h.statistics.record("p-1").is_some());
    }

    #[tokio::test]
    async fn test_invalid_ratings_are_skipped() {
        let h = harness();
        h.reviews.insert(published("p-1", 4));
        h.reviews.insert(published("p-1", 0));
        h.reviews.insert(published("p-1", 9));

        let stats = h.aggregator.recompute("p-1").await.unwrap();

        assert_eq!(stats.rating_count, 1);
        assert!((stats.average_rating - 4.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_scan_crosses_page_boundaries() {
        let h = harness();
        let aggregator = h.aggregator.clone().with_page_size(3);
        for _ in 0..7 {
            h.reviews.insert(published("p-1", 5));
        }
        for _ in 0..3 {
            h.reviews.insert(published("p-1", 1));
        }
        h.reviews.insert(published("p-other", 1));

        let stats = aggregator.recompute("p-1").await.unwrap();

        assert_eq!(stats.rating_count, 10);
        assert_eq!(stats.rating_distribution[&5], 7);
        assert_eq!(stats.rating_distribution[&1], 3);
    }

    #[tokio::test]
    async fn test_exact_multiple_of_page_size() {
        let h = harness();
        let aggregator = h.aggregator.clone().with_page_size(2);
        for _ in 0..4 {
            h.reviews.insert(published("p-1", 3));
        }

        let stats = aggregator.recompute("p-1").await.unwrap();

        assert_eq!(stats.rating_count, 4);
    }

    #[tokio::test]
    async fn test_iteration_ceiling_aborts_without_upsert() {
        let h = harness();
        let aggregator = h
            .aggregator
            .clone()
            .with_page_size(1)
            .with_max_iterations(2);
        for _ in 0..3 {
            h.reviews.insert(published("p-1", 5));
        }

        let err = aggregator.recompute("p-1").await.unwrap_err();

        assert!(matches!(err, ReviewError::IterationCeiling { limit: 2, .. }));
        assert!(!err.is_retryable());
        assert!(h.statistics.record("p-1").is_none());
    }

    #[tokio::test]
    async fn test_reviews_at_the_ceiling_are_all_counted() {
        let h = harness();
        let aggregator = h
            .aggregator
            .clone()
            .with_page_size(1)
            .with_max_iterations(3);
        for _ in 0..3 {
            h.reviews.insert(published("p-1", 2));
        }

        let stats = aggregator.recompute("p-1").await.unwrap();

        assert_eq!(stats.rating_count, 3);
    }

    #[tokio::test]
    async fn test_read_failure_propagates_as_retryable() {
        let h = harness();
        h.reviews.insert(published("p-1", 5));
        h.reviews.fail_reads(true);

        let err = h.aggregator.recompute("p-1").await.unwrap_err();

        assert!(err.is_retryable());
        assert!(h.statistics.record("p-1").is_none());
    }

    #[tokio::test]
    async fn test_write_failure_propagates() {
        let h = harness();
        h.reviews.insert(published("p-1", 5));
        h.statistics.fail_writes(true);

        let err = h.aggregator.recompute("p-1").await.unwrap_err();

        assert!(matches!(err, ReviewError::Storage(_)));
        assert!(h.queue.invalidated_paths().is_empty());
    }

    #[tokio::test]
    async fn test_recompute_invalidates_product_paths() {
        let h = harness();
        h.reviews.insert(published("p-1", 5));

        h.aggregator.recompute("p-1").await.unwrap();

        assert_eq!(h.queue.invalidated_paths(), paths::product_reviews_api("p-1"));
    }

    #[tokio::test]
    async fn test_recompute_is_idempotent() {
        let h = harness();
        for rating in [5, 3, 3] {
            h.reviews.insert(published("p-1", rating));
        }
        h.reviews.insert(
            ReviewBuilder::new("p-1")
                .status(PublicationStatus::Rejected)
                .rating(1)
                .build(),
        );

        let first = h.aggregator.recompute("p-1").await.unwrap();
        let second = h.aggregator.recompute("p-1").await.unwrap();

        assert_eq!(first, second);
    }

    proptest! {
        #[test]
        fn prop_counts_match_published_reviews(
            ratings in prop::collection::vec((1u8..=5, any::<bool>()), 0..60),
            page_size in 1usize..8,
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let h = harness();
            for (rating, is_published) in &ratings {
                let builder = ReviewBuilder::new("p-prop").rating(*rating);
                let review = if *is_published { builder.published() } else { builder }.build();
                h.reviews.insert(review);
            }

            let stats = runtime
                .block_on(h.aggregator.clone().with_page_size(page_size).recompute("p-prop"))
                .unwrap();

            let expected: Vec<u8> = ratings.iter().filter(|(_, p)| *p).map(|(r, _)| *r).collect();
            prop_assert_eq!(stats.rating_count, expected.len() as u64);
            for value in 1u8..=5 {
                let want = expected.iter().filter(|r| **r == value).count() as u64;
                prop_assert_eq!(stats.rating_distribution[&value], want);
                prop_assert!(stats.percentage_distribution.contains_key(&value));
            }
        }
    }
}
