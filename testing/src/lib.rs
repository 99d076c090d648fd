//! # Product Reviews Testing
//!
//! Testing utilities and helpers for the product review service.
//!
//! This crate provides:
//! - In-memory review and statistics stores
//! - An in-memory job queue with visibility timeouts and dead letters
//! - Recording/counting doubles for the CDN, translator and media storage
//! - A fixed clock and review fixtures
//!
//! ## Example
//!
//! ```
//! use product_reviews_testing::{InMemoryReviewStore, fixtures::ReviewBuilder};
//! use product_reviews_core::review::PublicationStatus;
//!
//! let store = InMemoryReviewStore::new();
//! store.insert(ReviewBuilder::new("p-1").rating(5).status(PublicationStatus::Published).build());
//! assert_eq!(store.len(), 1);
//! ```

use chrono::{DateTime, Utc};
use product_reviews_core::environment::Clock;

pub mod external;
pub mod queue;
pub mod stores;

pub use external::{InMemoryMediaStorage, MockTranslator, RecordingCdnClient};
pub use queue::{DeadLetter, InMemoryJobQueue};
pub use stores::{InMemoryReviewStore, InMemoryStatisticsStore};

/// Mock implementations of Environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::Mutex;

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use product_reviews_testing::mocks::FixedClock;
    /// use product_reviews_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug)]
    pub struct FixedClock {
        time: Mutex<DateTime<Utc>>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Mutex::new(time),
            }
        }

        /// Move the clock forward.
        #[allow(clippy::unwrap_used)]
        pub fn advance(&self, by: chrono::Duration) {
            let mut time = self.time.lock().unwrap();
            *time += by;
        }
    }

    impl Clock for FixedClock {
        #[allow(clippy::unwrap_used)]
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap()
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Review fixtures.
pub mod fixtures {
    use chrono::{DateTime, Utc};
    use product_reviews_core::review::{Language, Media, MediaKind, PublicationStatus, Review};
    use std::sync::atomic::{AtomicU64, Ordering};

    static SEQUENCE: AtomicU64 = AtomicU64::new(1);

    /// Builder for test reviews with sensible defaults.
    ///
    /// Review ids are sequential (`review-000001`, …) so index order is
    /// predictable across a test.
    #[derive(Debug, Clone)]
    pub struct ReviewBuilder {
        review: Review,
    }

    impl ReviewBuilder {
        /// A pending 5-star English review of `product_id`.
        #[must_use]
        pub fn new(product_id: &str) -> Self {
            let seq = SEQUENCE.fetch_add(1, Ordering::SeqCst);
            Self {
                review: Review {
                    review_id: format!("review-{seq:06}"),
                    user_id: "user-1".to_string(),
                    product_id: product_id.to_string(),
                    rating: 5,
                    original_language: Language::En,
                    review_en: Some("Works as described".to_string()),
                    review_ar: None,
                    country: "AE".to_string(),
                    created_at: DateTime::from_timestamp(i64::try_from(seq).unwrap_or(0), 0)
                        .unwrap_or_default(),
                    publication_status: PublicationStatus::Pending,
                    media: Vec::new(),
                },
            }
        }

        /// Set the review id.
        #[must_use]
        pub fn id(mut self, review_id: &str) -> Self {
            self.review.review_id = review_id.to_string();
            self
        }

        /// Set the rating (not validated, to allow anomaly tests).
        #[must_use]
        pub const fn rating(mut self, rating: u8) -> Self {
            self.review.rating = rating;
            self
        }

        /// Set the publication status.
        #[must_use]
        pub const fn status(mut self, status: PublicationStatus) -> Self {
            self.review.publication_status = status;
            self
        }

        /// Mark as published.
        #[must_use]
        pub const fn published(self) -> Self {
            self.status(PublicationStatus::Published)
        }

        /// Set the author.
        #[must_use]
        pub fn user(mut self, user_id: &str) -> Self {
            self.review.user_id = user_id.to_string();
            self
        }

        /// Set the country.
        #[must_use]
        pub fn country(mut self, country: &str) -> Self {
            self.review.country = country.to_string();
            self
        }

        /// Write the review in Arabic instead of English.
        #[must_use]
        pub fn arabic(mut self, text: &str) -> Self {
            self.review.original_language = Language::Ar;
            self.review.review_ar = Some(text.to_string());
            self.review.review_en = None;
            self
        }

        /// Set the creation time.
        #[must_use]
        pub const fn created_at(mut self, at: DateTime<Utc>) -> Self {
            self.review.created_at = at;
            self
        }

        /// Attach an image stored at `path`.
        #[must_use]
        pub fn with_media(mut self, path: &str) -> Self {
            let id = format!("media-{}", self.review.media.len() + 1);
            self.review.media.push(Media {
                id,
                kind: MediaKind::Image,
                path: path.to_string(),
                url: format!("https://media.example.com/{path}"),
            });
            self
        }

        /// Finish.
        #[must_use]
        pub fn build(self) -> Review {
            self.review
        }
    }

    /// A published review of `product_id` with the given rating.
    #[must_use]
    pub fn published(product_id: &str, rating: u8) -> Review {
        ReviewBuilder::new(product_id).rating(rating).published().build()
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, test_clock};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }

    #[test]
    fn test_fixed_clock_advances() {
        let clock = test_clock();
        let before = clock.now();
        clock.advance(chrono::Duration::seconds(5));
        assert_eq!(clock.now() - before, chrono::Duration::seconds(5));
    }

    #[test]
    fn test_fixture_ids_are_ordered() {
        let a = fixtures::published("p-1", 4);
        let b = fixtures::published("p-1", 3);
        assert!(a.review_id < b.review_id);
        assert!(a.is_published());
    }
}
