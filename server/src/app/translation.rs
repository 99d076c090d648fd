//! Filling in missing review translations.
//!
//! A review is translated from its original text into every other supported
//! language that has no text yet. Existing translations are never requested
//! again, so translating the same review twice calls the provider at most
//! once per language.

use product_reviews_core::error::ReviewError;
use product_reviews_core::external::Translator;
use product_reviews_core::query::{DEFAULT_PAGE_SIZE, ReviewQuery};
use product_reviews_core::review::{Language, PublicationStatus, Review};
use product_reviews_core::store::ReviewStore;
use product_reviews_statistics::CacheInvalidator;
use product_reviews_statistics::aggregator::MAX_ITERATIONS;
use std::sync::Arc;

/// Result of translating one review.
#[derive(Debug)]
pub struct TranslationOutcome {
    /// The review after any new translations were saved
    pub review: Review,
    /// Languages filled in by this call
    pub translated: Vec<Language>,
    /// Languages the provider failed on
    pub failed: Vec<(Language, ReviewError)>,
}

impl TranslationOutcome {
    /// The failure for `language`, if its translation was attempted and failed.
    #[must_use]
    pub fn failure(&self, language: Language) -> Option<&ReviewError> {
        self.failed
            .iter()
            .find(|(lang, _)| *lang == language)
            .map(|(_, e)| e)
    }
}

/// Totals of a bulk translation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkTranslationReport {
    /// Reviews that needed translation and were attempted
    pub attempted: usize,
    /// Reviews with every missing language filled
    pub translated: usize,
    /// Reviews where at least one language failed
    pub failed: usize,
}

/// Translates reviews and persists the results.
#[derive(Clone)]
pub struct TranslationService {
    reviews: Arc<dyn ReviewStore>,
    translator: Arc<dyn Translator>,
    invalidator: CacheInvalidator,
}

impl TranslationService {
    /// Create a translation service.
    #[must_use]
    pub fn new(
        reviews: Arc<dyn ReviewStore>,
        translator: Arc<dyn Translator>,
        invalidator: CacheInvalidator,
    ) -> Self {
        Self {
            reviews,
            translator,
            invalidator,
        }
    }

    /// Translate `review` into every missing language.
    ///
    /// Provider failures are recorded per language and do not stop the other
    /// languages. The review is saved and its API paths invalidated only if
    /// at least one translation was added.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Storage`] if saving the review fails.
    pub async fn translate_review(&self, mut review: Review) -> Result<TranslationOutcome, ReviewError> {
        let Some(source_text) = review.original_text().map(str::to_string) else {
            tracing::warn!(review_id = %review.review_id, "Review has no source text, nothing to translate");
            return Ok(TranslationOutcome {
                review,
                translated: Vec::new(),
                failed: Vec::new(),
            });
        };

        let source = review.original_language;
        let mut translated = Vec::new();
        let mut failed = Vec::new();

        for target in review.missing_translations() {
            match self.translator.translate(&source_text, source, target).await {
                Ok(text) => {
                    review.set_text(target, text);
                    translated.push(target);
                }
                Err(e) => {
                    tracing::error!(
                        review_id = %review.review_id,
                        target = %target,
                        error = %e,
                        "Translation failed"
                    );
                    failed.push((target, e));
                }
            }
        }

        if !translated.is_empty() {
            self.reviews.put(review.clone()).await?;
            self.invalidator.review_updated(&review).await;
            tracing::info!(
                review_id = %review.review_id,
                languages = ?translated,
                "Review translations saved"
            );
        }

        Ok(TranslationOutcome {
            review,
            translated,
            failed,
        })
    }

    /// Walk reviews (optionally in one status) and translate up to `limit`
    /// of those with missing translations.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Storage`] if listing fails and
    /// [`ReviewError::IterationCeiling`] if the walk does not terminate.
    pub async fn translate_missing(
        &self,
        status: Option<PublicationStatus>,
        limit: usize,
    ) -> Result<BulkTranslationReport, ReviewError> {
        let mut report = BulkTranslationReport::default();
        let mut cursor = None;
        let mut pages = 0;

        while report.attempted < limit {
            pages += 1;
            if pages > MAX_ITERATIONS {
                return Err(ReviewError::IterationCeiling {
                    operation: "listing reviews for translation".to_string(),
                    limit: MAX_ITERATIONS,
                });
            }

            let query = status
                .map_or_else(ReviewQuery::scan, ReviewQuery::by_status)
                .with_limit(DEFAULT_PAGE_SIZE)
                .after(cursor.take());
            let page = self.reviews.query(query).await?;

            for review in page.items {
                if report.attempted >= limit {
                    break;
                }
                if review.original_text().is_none() || review.missing_translations().is_empty() {
                    continue;
                }

                report.attempted += 1;
                let review_id = review.review_id.clone();
                match self.translate_review(review).await {
                    Ok(outcome) if outcome.failed.is_empty() => report.translated += 1,
                    Ok(_) => report.failed += 1,
                    Err(e) => {
                        tracing::error!(review_id = %review_id, error = %e, "Failed to save translations");
                        report.failed += 1;
                    }
                }
            }

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use product_reviews_core::queue::INVALIDATION_QUEUE;
    use product_reviews_testing::fixtures::ReviewBuilder;
    use product_reviews_testing::{InMemoryJobQueue, InMemoryReviewStore, MockTranslator, test_clock};

    struct Harness {
        reviews: Arc<InMemoryReviewStore>,
        translator: Arc<MockTranslator>,
        queue: Arc<InMemoryJobQueue>,
        service: TranslationService,
    }

    fn harness() -> Harness {
        let reviews = Arc::new(InMemoryReviewStore::new());
        let translator = Arc::new(MockTranslator::new());
        let queue = Arc::new(InMemoryJobQueue::new());
        let service = TranslationService::new(
            reviews.clone(),
            translator.clone(),
            CacheInvalidator::new(queue.clone(), Arc::new(test_clock())),
        );
        Harness {
            reviews,
            translator,
            queue,
            service,
        }
    }

    #[tokio::test]
    async fn test_fills_missing_language_and_saves() {
        let h = harness();
        let review = ReviewBuilder::new("p-1").id("r-1").build();
        h.reviews.insert(review.clone());

        let outcome = h.service.translate_review(review).await.unwrap();

        assert_eq!(outcome.translated, vec![Language::Ar]);
        let stored = h.reviews.review("r-1").unwrap();
        assert_eq!(stored.review_ar.as_deref(), Some("[ar] Works as described"));
        assert!(h.queue.invalidated_paths().contains(&"/api/reviews/r-1*".to_string()));
    }

    #[tokio::test]
    async fn test_second_call_does_not_hit_provider() {
        let h = harness();
        let review = ReviewBuilder::new("p-1").id("r-1").build();
        h.reviews.insert(review.clone());

        let first = h.service.translate_review(review).await.unwrap();
        let second = h.service.translate_review(first.review.clone()).await.unwrap();

        assert_eq!(h.translator.calls(), 1);
        assert!(second.translated.is_empty());
        assert_eq!(second.review, first.review);
    }

    #[tokio::test]
    async fn test_failure_is_reported_and_nothing_saved() {
        let h = harness();
        h.translator.set_failing(true);
        let review = ReviewBuilder::new("p-1").id("r-1").build();
        h.reviews.insert(review.clone());

        let outcome = h.service.translate_review(review).await.unwrap();

        assert!(outcome.translated.is_empty());
        assert!(matches!(
            outcome.failure(Language::Ar),
            Some(ReviewError::ExternalService(_))
        ));
        assert!(h.reviews.review("r-1").unwrap().review_ar.is_none());
        assert!(h.queue.is_empty(INVALIDATION_QUEUE));
    }

    #[tokio::test]
    async fn test_bulk_respects_status_and_limit() {
        let h = harness();
        h.reviews.insert_all([
            ReviewBuilder::new("p-1").id("r-1").published().build(),
            ReviewBuilder::new("p-1").id("r-2").published().build(),
            ReviewBuilder::new("p-1").id("r-3").published().build(),
            ReviewBuilder::new("p-2").id("r-4").build(),
            ReviewBuilder::new("p-2").id("r-5").published().arabic("رائع").build(),
        ]);

        let report = h
            .service
            .translate_missing(Some(PublicationStatus::Published), 2)
            .await
            .unwrap();

        assert_eq!(report.attempted, 2);
        assert_eq!(report.translated, 2);
        assert_eq!(h.translator.calls(), 2);
        assert!(h.reviews.review("r-4").unwrap().review_ar.is_none());
    }
}
