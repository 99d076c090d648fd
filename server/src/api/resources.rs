//! Response shapes.

use chrono::{DateTime, Utc};
use product_reviews_core::review::{Language, Media, PublicationStatus, Review};
use product_reviews_core::statistics::RatingSummary;
use serde::Serialize;

/// A review as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewResource {
    /// Review id
    pub id: String,
    /// Author
    pub user_id: String,
    /// Reviewed product
    pub product_id: String,
    /// Rating, 1..=5
    pub rating: u8,
    /// Language the review was written in
    pub original_language: Language,
    /// English text
    pub review_en: Option<String>,
    /// Arabic text
    pub review_ar: Option<String>,
    /// Country code
    pub country: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Attachments
    pub media: Vec<Media>,
    /// Moderation state
    pub publication_status: PublicationStatus,
}

impl From<Review> for ReviewResource {
    fn from(review: Review) -> Self {
        Self {
            id: review.review_id,
            user_id: review.user_id,
            product_id: review.product_id,
            rating: review.rating,
            original_language: review.original_language,
            review_en: review.review_en,
            review_ar: review.review_ar,
            country: review.country,
            created_at: review.created_at,
            media: review.media,
            publication_status: review.publication_status,
        }
    }
}

/// Rating summary tagged with its product, for bulk responses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductSummary {
    /// Product
    pub product_id: String,
    /// Summary fields, inlined
    #[serde(flatten)]
    pub summary: RatingSummary,
}

/// `{"data": ..., "meta": {"timestamp": ...}}`.
#[derive(Debug, Clone, Serialize)]
pub struct Timestamped<T> {
    /// Payload
    pub data: T,
    /// Response metadata
    pub meta: TimestampMeta,
}

/// Time the response was produced.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TimestampMeta {
    /// Response time
    pub timestamp: DateTime<Utc>,
}

impl<T> Timestamped<T> {
    /// Wrap `data` stamped with `now`.
    pub const fn new(data: T, now: DateTime<Utc>) -> Self {
        Self {
            data,
            meta: TimestampMeta { timestamp: now },
        }
    }
}

/// Plain `{"message": ...}` body.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    /// Human-readable outcome
    pub message: &'static str,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use product_reviews_testing::fixtures::ReviewBuilder;

    #[test]
    fn test_resource_renames_id() {
        let review = ReviewBuilder::new("p-1").id("r-1").build();

        let json = serde_json::to_value(ReviewResource::from(review)).unwrap();

        assert_eq!(json["id"], "r-1");
        assert!(json.get("review_id").is_none());
        assert_eq!(json["publication_status"], "pending");
        assert_eq!(json["original_language"], "en");
    }

    #[test]
    fn test_summary_is_flattened() {
        let json = serde_json::to_value(ProductSummary {
            product_id: "p-1".into(),
            summary: RatingSummary::zeroed(),
        })
        .unwrap();

        assert_eq!(json["product_id"], "p-1");
        assert_eq!(json["count"], 0);
        assert!(json.get("summary").is_none());
    }
}
