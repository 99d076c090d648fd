//! Review operations behind the HTTP edge.
//!
//! Each write follows the same order: persist the review, emit the recompute
//! event (if the transition needs one), then enqueue cache invalidation. The
//! last two are best-effort; a queue failure is logged and the write still
//! succeeds.

use crate::app::Deps;
use crate::app::media::{MediaUploader, UploadedFile};
use crate::app::translation::TranslationService;
use product_reviews_core::error::ReviewError;
use product_reviews_core::paths;
use product_reviews_core::query::{Cursor, ReviewFilter, ReviewIndex, ReviewQuery};
use product_reviews_core::review::{Language, NewReview, PublicationStatus, Review};
use product_reviews_core::statistics::RatingSummary;
use product_reviews_statistics::{CacheInvalidator, RecomputeProducer};

/// Filters of the review listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListReviews {
    /// Status index (highest priority)
    pub publication_status: Option<PublicationStatus>,
    /// User index
    pub user_id: Option<String>,
    /// Product index (lowest priority)
    pub product_id: Option<String>,
    /// Secondary filter
    pub country: Option<String>,
    /// Secondary filter on the original language
    pub language: Option<Language>,
    /// Page size
    pub per_page: usize,
    /// Cursor from the previous page
    pub next_token: Option<String>,
    /// Enqueue invalidation of the unfiltered listing
    pub invalidate_cache: bool,
}

impl ListReviews {
    /// Pick the index by priority (status, user, product, full walk) and
    /// attach the secondary filters.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Validation`] for a token that does not decode
    /// for the chosen index.
    pub fn to_query(&self) -> Result<ReviewQuery, ReviewError> {
        let (query, default_hash_key) = if let Some(status) = self.publication_status {
            (ReviewQuery::by_status(status), Some(status.as_str()))
        } else if let Some(user_id) = &self.user_id {
            (ReviewQuery::by_user(user_id.as_str()), None)
        } else if let Some(product_id) = &self.product_id {
            (ReviewQuery::by_product(product_id.as_str()), None)
        } else {
            (ReviewQuery::scan(), None)
        };

        let after = self
            .next_token
            .as_deref()
            .map(|token| Cursor::decode(query.index, token, default_hash_key))
            .transpose()?;

        Ok(query
            .with_filter(ReviewFilter {
                country: self.country.clone(),
                language: self.language,
                ..ReviewFilter::default()
            })
            .with_limit(self.per_page)
            .after(after))
    }
}

/// Filters of a product's review listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductReviews {
    /// Product
    pub product_id: String,
    /// Only this status; `None` lists every status
    pub publication_status: Option<PublicationStatus>,
    /// Secondary filter
    pub country: Option<String>,
    /// Secondary filter on the original language
    pub language: Option<Language>,
    /// Secondary filter
    pub user_id: Option<String>,
    /// Page size
    pub per_page: usize,
    /// Cursor from the previous page
    pub next_token: Option<String>,
}

/// One page of reviews.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewPage {
    /// Reviews, newest first
    pub reviews: Vec<Review>,
    /// Token for the next page, present only when this page was full
    pub next_token: Option<String>,
}

/// One page of a product's reviews with its rating summary.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductReviewPage {
    /// Reviews and cursor
    pub page: ReviewPage,
    /// Stored summary, zeroed if none has been computed
    pub rating_summary: RatingSummary,
}

/// Review counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct StatusCounts {
    /// Awaiting moderation
    pub pending: u64,
    /// Visible
    pub published: u64,
    /// Hidden
    pub rejected: u64,
    /// Sum of the above
    pub total: u64,
}

/// Application service for reviews and their summaries.
#[derive(Clone)]
pub struct ReviewService {
    deps: Deps,
    producer: RecomputeProducer,
    invalidator: CacheInvalidator,
    uploader: MediaUploader,
    translation: TranslationService,
}

impl ReviewService {
    /// Build the service from the dependency bundle.
    #[must_use]
    pub fn new(deps: Deps) -> Self {
        let invalidator = deps.invalidator();
        Self {
            producer: deps.producer(),
            uploader: MediaUploader::new(deps.media.clone()),
            translation: TranslationService::new(
                deps.reviews.clone(),
                deps.translator.clone(),
                invalidator.clone(),
            ),
            invalidator,
            deps,
        }
    }

    /// Translation service sharing this service's dependencies.
    #[must_use]
    pub const fn translation(&self) -> &TranslationService {
        &self.translation
    }

    /// Create a pending review and store its media.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Storage`] if the review cannot be saved, in
    /// which case nothing is uploaded. Media failures only drop the failed
    /// file.
    pub async fn create(&self, input: NewReview, files: Vec<UploadedFile>) -> Result<Review, ReviewError> {
        let mut review = Review::create(input, self.deps.clock.now());
        self.deps.reviews.put(review.clone()).await?;

        if !files.is_empty() {
            review.media = self.uploader.upload_all(&review.review_id, files).await;
            if !review.media.is_empty() {
                self.deps.reviews.put(review.clone()).await?;
            }
        }
        tracing::info!(
            review_id = %review.review_id,
            product_id = %review.product_id,
            media = review.media.len(),
            "Review created"
        );

        self.producer.review_created(&review).await;
        self.invalidator.review_created(&review).await;

        Ok(review)
    }

    /// Fetch a review.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::NotFound`] if it does not exist.
    pub async fn get(&self, review_id: &str) -> Result<Review, ReviewError> {
        self.deps
            .reviews
            .get(review_id)
            .await?
            .ok_or_else(|| ReviewError::NotFound(review_id.to_string()))
    }

    /// Delete a review.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::NotFound`] if it does not exist.
    pub async fn delete(&self, review_id: &str) -> Result<Review, ReviewError> {
        let review = self
            .deps
            .reviews
            .delete(review_id)
            .await?
            .ok_or_else(|| ReviewError::NotFound(review_id.to_string()))?;

        tracing::info!(
            review_id,
            product_id = %review.product_id,
            was_published = review.is_published(),
            "Review deleted"
        );

        self.producer.review_deleted(&review).await;
        self.invalidator.review_deleted(&review).await;

        Ok(review)
    }

    /// Change a review's publication status.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::NotFound`] if the review does not exist and
    /// [`ReviewError::Storage`] if it cannot be saved.
    pub async fn update_status(
        &self,
        review_id: &str,
        status: PublicationStatus,
    ) -> Result<Review, ReviewError> {
        let mut review = self.get(review_id).await?;
        let previous = review.publication_status;
        review.publication_status = status;

        self.deps.reviews.put(review.clone()).await?;
        tracing::info!(review_id, from = %previous, to = %status, "Publication status updated");

        self.producer.status_changed(&review, previous).await;
        self.invalidator.review_updated(&review).await;

        Ok(review)
    }

    /// Return a review with text in `target`, translating it if missing.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::NotFound`] if the review does not exist, and the
    /// provider's error if the translation into `target` failed.
    pub async fn translate(&self, review_id: &str, target: Language) -> Result<Review, ReviewError> {
        let review = self.get(review_id).await?;
        if review.text(target).is_some() {
            return Ok(review);
        }

        let outcome = self.translation.translate_review(review).await?;
        if let Some(e) = outcome.failure(target) {
            return Err(e.clone());
        }
        Ok(outcome.review)
    }

    /// List reviews through the highest-priority index the filters allow.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Validation`] for a foreign or malformed token
    /// and [`ReviewError::Storage`] if the query fails.
    pub async fn list(&self, params: &ListReviews) -> Result<ReviewPage, ReviewError> {
        let query = params.to_query()?;
        let page = self.deps.reviews.query(query).await?;

        if params.invalidate_cache {
            self.invalidator
                .invalidate_or_log(paths::review_listing(), "listing refresh requested")
                .await;
        }

        Ok(newest_first(page.items, page.next_cursor))
    }

    /// Whether any review awaits moderation.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Storage`] if the count fails.
    pub async fn has_pending(&self) -> Result<bool, ReviewError> {
        Ok(self
            .deps
            .reviews
            .count_by_status(PublicationStatus::Pending)
            .await?
            > 0)
    }

    /// Review counts per status.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Storage`] if a count fails.
    pub async fn status_counts(&self) -> Result<StatusCounts, ReviewError> {
        let reviews = &self.deps.reviews;
        let pending = reviews.count_by_status(PublicationStatus::Pending).await?;
        let published = reviews.count_by_status(PublicationStatus::Published).await?;
        let rejected = reviews.count_by_status(PublicationStatus::Rejected).await?;

        Ok(StatusCounts {
            pending,
            published,
            rejected,
            total: pending + published + rejected,
        })
    }

    /// A product's reviews with its stored rating summary.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Validation`] for a foreign or malformed token
    /// and [`ReviewError::Storage`] if a read fails.
    pub async fn product_reviews(&self, params: &ProductReviews) -> Result<ProductReviewPage, ReviewError> {
        let after = params
            .next_token
            .as_deref()
            .map(|token| Cursor::decode(ReviewIndex::Product, token, Some(&params.product_id)))
            .transpose()?;

        let filter = ReviewFilter {
            publication_status: params.publication_status,
            country: params.country.clone(),
            language: params.language,
            user_id: params.user_id.clone(),
        };

        let page = self
            .deps
            .reviews
            .query_by_product(&params.product_id, after, params.per_page, filter)
            .await?;
        let rating_summary = self.product_rating(&params.product_id).await?;

        Ok(ProductReviewPage {
            page: newest_first(page.items, page.next_cursor),
            rating_summary,
        })
    }

    /// A product's stored summary, zeroed when none has been computed.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Storage`] if the read fails.
    pub async fn product_rating(&self, product_id: &str) -> Result<RatingSummary, ReviewError> {
        Ok(self
            .deps
            .statistics
            .get(product_id)
            .await?
            .map_or_else(RatingSummary::zeroed, |stats| stats.summary()))
    }

    /// Summaries for many products, in request order, zeroed where absent.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Storage`] if the read fails.
    pub async fn bulk_summaries(
        &self,
        product_ids: &[String],
    ) -> Result<Vec<(String, RatingSummary)>, ReviewError> {
        let found = self.deps.statistics.bulk_get(product_ids).await?;

        Ok(product_ids
            .iter()
            .map(|id| {
                let summary = found
                    .get(id)
                    .map_or_else(RatingSummary::zeroed, |stats| stats.summary());
                (id.clone(), summary)
            })
            .collect())
    }
}

fn newest_first(mut reviews: Vec<Review>, next_cursor: Option<Cursor>) -> ReviewPage {
    reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    ReviewPage {
        reviews,
        next_token: next_cursor.map(|c| c.encode()),
    }
}
