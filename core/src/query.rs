//! Typed query descriptors and cursors for the review store.
//!
//! Rather than chaining filter calls on a mutable builder, callers describe a
//! query once as a [`ReviewQuery`] and hand it to a single dispatcher,
//! [`ReviewStore::query`](crate::store::ReviewStore::query).
//!
//! # Indices
//!
//! Each query runs against one index. The index decides which column is the
//! hash key and therefore what a [`Cursor`] must carry:
//!
//! | Index | Hash key | Range key |
//! |---|---|---|
//! | [`ReviewIndex::Product`] | `product_id` | `review_id` |
//! | [`ReviewIndex::User`] | `user_id` | `review_id` |
//! | [`ReviewIndex::Status`] | `publication_status` | `review_id` |
//!
//! A product-index query without a hash key value walks the whole index in
//! `(product_id, review_id)` order.
//!
//! # Cursors
//!
//! Cursors are opaque to API clients. They serialize to a small JSON object,
//! e.g. `{"product_id":"p-1","review_id":"r-9"}`, and are only valid for the
//! index that produced them.

use crate::error::ReviewError;
use crate::review::{Language, PublicationStatus};
use serde_json::{Map, Value};

/// Page size used by the aggregator and the backfill sweep.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Upper bound for client-requested page sizes.
pub const MAX_PAGE_SIZE: usize = 100;

/// Secondary lookup path on the review store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReviewIndex {
    /// Hash on `product_id`, range on `review_id`
    Product,
    /// Hash on `user_id`, range on `review_id`
    User,
    /// Hash on `publication_status`, range on `review_id`
    Status,
}

impl ReviewIndex {
    /// Column name of this index's hash key.
    #[must_use]
    pub const fn hash_key_name(self) -> &'static str {
        match self {
            Self::Product => "product_id",
            Self::User => "user_id",
            Self::Status => "publication_status",
        }
    }
}

/// Position just after the last item of a page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cursor {
    /// Index the cursor belongs to
    pub index: ReviewIndex,
    /// Hash key value of the last item
    pub hash_key: String,
    /// Range key (`review_id`) of the last item
    pub review_id: String,
}

impl Cursor {
    /// Create a cursor.
    pub fn new(index: ReviewIndex, hash_key: impl Into<String>, review_id: impl Into<String>) -> Self {
        Self {
            index,
            hash_key: hash_key.into(),
            review_id: review_id.into(),
        }
    }

    /// Serialize to the opaque token handed to clients.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut map = Map::new();
        map.insert("review_id".to_string(), Value::String(self.review_id.clone()));
        map.insert(
            self.index.hash_key_name().to_string(),
            Value::String(self.hash_key.clone()),
        );
        Value::Object(map).to_string()
    }

    /// Parse a token produced by [`Cursor::encode`] for the given index.
    ///
    /// A status-index token may omit the hash key; `default_hash_key` fills it
    /// (the requested status).
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Validation`] if the token is not a JSON object,
    /// lacks `review_id`, or lacks the hash key of `index` with no default.
    pub fn decode(
        index: ReviewIndex,
        token: &str,
        default_hash_key: Option<&str>,
    ) -> Result<Self, ReviewError> {
        let value: Value = serde_json::from_str(token)
            .map_err(|e| ReviewError::Validation(format!("Malformed next_token: {e}")))?;
        let Value::Object(map) = value else {
            return Err(ReviewError::Validation(
                "Malformed next_token: expected an object".to_string(),
            ));
        };

        let review_id = map
            .get("review_id")
            .and_then(Value::as_str)
            .ok_or_else(|| ReviewError::Validation("next_token missing review_id".to_string()))?;

        let hash_key = map
            .get(index.hash_key_name())
            .and_then(Value::as_str)
            .or(default_hash_key)
            .ok_or_else(|| {
                ReviewError::Validation(format!(
                    "next_token missing {} for this listing",
                    index.hash_key_name()
                ))
            })?;

        Ok(Self::new(index, hash_key, review_id))
    }
}

/// Secondary filters applied after the index lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewFilter {
    /// Only reviews in this status
    pub publication_status: Option<PublicationStatus>,
    /// Only reviews from this country
    pub country: Option<String>,
    /// Only reviews originally written in this language
    pub language: Option<Language>,
    /// Only reviews by this user
    pub user_id: Option<String>,
}

impl ReviewFilter {
    /// Filter matching only published reviews.
    #[must_use]
    pub fn published() -> Self {
        Self {
            publication_status: Some(PublicationStatus::Published),
            ..Self::default()
        }
    }

    /// Whether a review passes every set filter.
    #[must_use]
    pub fn matches(&self, review: &crate::review::Review) -> bool {
        self.publication_status
            .is_none_or(|s| review.publication_status == s)
            && self.country.as_deref().is_none_or(|c| review.country == c)
            && self.language.is_none_or(|l| review.original_language == l)
            && self.user_id.as_deref().is_none_or(|u| review.user_id == u)
    }
}

/// A single query against one review-store index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewQuery {
    /// Index to read
    pub index: ReviewIndex,
    /// Hash key value; `None` only for a full product-index walk
    pub hash_key: Option<String>,
    /// Secondary filters
    pub filter: ReviewFilter,
    /// Maximum items in the page
    pub limit: usize,
    /// Resume after this position
    pub after: Option<Cursor>,
}

impl ReviewQuery {
    /// Reviews of one product, ordered by `review_id`.
    pub fn by_product(product_id: impl Into<String>) -> Self {
        Self::new(ReviewIndex::Product, Some(product_id.into()))
    }

    /// Reviews by one user, ordered by `review_id`.
    pub fn by_user(user_id: impl Into<String>) -> Self {
        Self::new(ReviewIndex::User, Some(user_id.into()))
    }

    /// Reviews in one status, ordered by `review_id`.
    #[must_use]
    pub fn by_status(status: PublicationStatus) -> Self {
        Self::new(ReviewIndex::Status, Some(status.as_str().to_string()))
    }

    /// Every review, ordered by `(product_id, review_id)`.
    #[must_use]
    pub fn scan() -> Self {
        Self::new(ReviewIndex::Product, None)
    }

    const fn new(index: ReviewIndex, hash_key: Option<String>) -> Self {
        Self {
            index,
            hash_key,
            filter: ReviewFilter {
                publication_status: None,
                country: None,
                language: None,
                user_id: None,
            },
            limit: DEFAULT_PAGE_SIZE,
            after: None,
        }
    }

    /// Replace the secondary filters.
    #[must_use]
    pub fn with_filter(mut self, filter: ReviewFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Set the page size (clamped to at least one).
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    /// Resume after a cursor.
    #[must_use]
    pub fn after(mut self, cursor: Option<Cursor>) -> Self {
        self.after = cursor;
        self
    }

    /// Check the cursor belongs to this query's index.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Validation`] when the cursor came from another
    /// index, or from another hash key on a keyed query.
    pub fn validate_cursor(&self) -> Result<(), ReviewError> {
        let Some(cursor) = &self.after else {
            return Ok(());
        };
        if cursor.index != self.index {
            return Err(ReviewError::Validation(
                "next_token does not belong to this listing".to_string(),
            ));
        }
        if let Some(hash_key) = &self.hash_key {
            if *hash_key != cursor.hash_key {
                return Err(ReviewError::Validation(
                    "next_token does not belong to this listing".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Items in index order
    pub items: Vec<T>,
    /// Present when the page was full and more items may follow
    pub next_cursor: Option<Cursor>,
}

impl<T> Page<T> {
    /// An empty final page.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_cursor: None,
        }
    }
}

/// Key projection of a product-index entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProductKey {
    /// Hash key
    pub product_id: String,
    /// Range key
    pub review_id: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn cursor_token_carries_hash_and_range_keys() {
        let cursor = Cursor::new(ReviewIndex::User, "user-7", "review-3");
        let json: Value = serde_json::from_str(&cursor.encode()).unwrap();

        assert_eq!(json["user_id"], "user-7");
        assert_eq!(json["review_id"], "review-3");
    }

    #[test]
    fn cursor_decodes_what_it_encodes() {
        let cursor = Cursor::new(ReviewIndex::Product, "p-1", "r-9");
        let decoded = Cursor::decode(ReviewIndex::Product, &cursor.encode(), None).unwrap();
        assert_eq!(decoded, cursor);
    }

    #[test]
    fn status_cursor_falls_back_to_requested_status() {
        let decoded =
            Cursor::decode(ReviewIndex::Status, r#"{"review_id":"r-1"}"#, Some("pending")).unwrap();
        assert_eq!(decoded.hash_key, "pending");
    }

    #[test]
    fn cursor_from_other_index_is_rejected() {
        let token = Cursor::new(ReviewIndex::Product, "p-1", "r-1").encode();
        let err = Cursor::decode(ReviewIndex::User, &token, None).unwrap_err();
        assert!(matches!(err, ReviewError::Validation(_)));
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(Cursor::decode(ReviewIndex::Product, "not json", None).is_err());
        assert!(Cursor::decode(ReviewIndex::Product, "[1,2]", None).is_err());
    }

    #[test]
    fn query_rejects_cursor_for_other_product() {
        let query = ReviewQuery::by_product("p-1")
            .after(Some(Cursor::new(ReviewIndex::Product, "p-2", "r-1")));
        assert!(query.validate_cursor().is_err());

        let scan = ReviewQuery::scan().after(Some(Cursor::new(ReviewIndex::Product, "p-2", "r-1")));
        assert!(scan.validate_cursor().is_ok());
    }

    #[test]
    fn limit_is_at_least_one() {
        assert_eq!(ReviewQuery::scan().with_limit(0).limit, 1);
    }
}
