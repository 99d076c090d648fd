//! Backfill: recompute statistics for many products.
//!
//! Products come either from an explicit list or from a key-only sweep of
//! the product index. Each product is then recomputed in-process
//! ([`BackfillMode::Sync`]) or scheduled on the statistics queue
//! ([`BackfillMode::Queued`]). Failures are counted, not fatal.

use crate::aggregator::{Aggregator, MAX_ITERATIONS, PAGE_SIZE};
use crate::producer::RecomputeProducer;
use product_reviews_core::error::ReviewError;
use product_reviews_core::query::Cursor;
use product_reviews_core::store::ReviewStore;
use std::collections::BTreeSet;
use std::sync::Arc;

/// How discovered products are recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackfillMode {
    /// Run the aggregator in-process, one product at a time
    #[default]
    Sync,
    /// Enqueue a recompute event per product
    Queued,
}

/// Totals of a backfill run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillReport {
    /// Products attempted
    pub processed: usize,
    /// Products recomputed or scheduled
    pub succeeded: usize,
    /// Products that failed, with the error message
    pub failed: Vec<(String, String)>,
}

impl BackfillReport {
    /// Whether every product succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Drives recomputes across products.
pub struct BackfillDriver {
    reviews: Arc<dyn ReviewStore>,
    aggregator: Aggregator,
    producer: RecomputeProducer,
    chunk_size: usize,
    max_iterations: usize,
}

impl BackfillDriver {
    /// Create a driver with the standard chunk size and iteration cap.
    #[must_use]
    pub fn new(
        reviews: Arc<dyn ReviewStore>,
        aggregator: Aggregator,
        producer: RecomputeProducer,
    ) -> Self {
        Self {
            reviews,
            aggregator,
            producer,
            chunk_size: PAGE_SIZE,
            max_iterations: MAX_ITERATIONS,
        }
    }

    /// Page size of the product sweep.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Page cap of the product sweep.
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Every distinct product id that has at least one review.
    ///
    /// # Errors
    ///
    /// - [`ReviewError::Storage`] if a page read fails
    /// - [`ReviewError::IterationCeiling`] if the sweep exceeds the page cap
    pub async fn discover_products(&self) -> Result<BTreeSet<String>, ReviewError> {
        let mut products = BTreeSet::new();
        let mut cursor: Option<Cursor> = None;
        let mut iterations = 0usize;

        loop {
            let page = self
                .reviews
                .scan_product_keys(cursor.take(), self.chunk_size)
                .await?;

            if page.items.is_empty() {
                break;
            }

            iterations += 1;
            if iterations > self.max_iterations {
                return Err(ReviewError::IterationCeiling {
                    operation: "enumerating products".to_string(),
                    limit: self.max_iterations,
                });
            }

            products.extend(page.items.into_iter().map(|key| key.product_id));

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        tracing::info!(products = products.len(), pages = iterations, "Product enumeration complete");
        Ok(products)
    }

    /// Recompute the given products, or every product when `product_ids` is empty.
    ///
    /// # Errors
    ///
    /// Returns an error only if enumeration fails; per-product failures are
    /// reported in [`BackfillReport::failed`].
    pub async fn run(
        &self,
        product_ids: &[String],
        mode: BackfillMode,
    ) -> Result<BackfillReport, ReviewError> {
        let products: Vec<String> = if product_ids.is_empty() {
            self.discover_products().await?.into_iter().collect()
        } else {
            tracing::info!(products = product_ids.len(), "Using explicit product list, skipping enumeration");
            let mut seen = BTreeSet::new();
            product_ids
                .iter()
                .filter(|id| seen.insert(id.as_str()))
                .cloned()
                .collect()
        };

        let mut report = BackfillReport::default();
        for product_id in products {
            report.processed += 1;
            let outcome = match mode {
                BackfillMode::Sync => self.aggregator.recompute(&product_id).await.map(|_| ()),
                BackfillMode::Queued => self.producer.schedule(&product_id).await.map(|_| ()),
            };

            match outcome {
                Ok(()) => report.succeeded += 1,
                Err(e) => {
                    tracing::error!(product_id = %product_id, error = %e, "Backfill failed for product");
                    report.failed.push((product_id, e.to_string()));
                }
            }
        }

        tracing::info!(
            processed = report.processed,
            succeeded = report.succeeded,
            failed = report.failed.len(),
            ?mode,
            "Backfill complete"
        );
        Ok(report)
    }
}
