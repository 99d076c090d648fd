//! Cursor-paginated list responses.
//!
//! ```json
//! {
//!   "data": [...],
//!   "links": { "first": "/reviews?per_page=20", "next": "/reviews?per_page=20&next_token=..." },
//!   "meta": { "per_page": 20, "path": "/reviews", "count": 20 },
//!   "next_token": "{\"review_id\":\"...\",\"product_id\":\"...\"}"
//! }
//! ```
//!
//! `next` and `next_token` are present only when the page was full.

use serde::Serialize;

/// Navigation links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Links {
    /// First page with the same page size
    pub first: String,
    /// Next page, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

/// Page metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Meta {
    /// Requested page size
    pub per_page: usize,
    /// Request path without query
    pub path: String,
    /// Items on this page
    pub count: usize,
}

/// One page of a cursor-paginated listing.
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    /// Items
    pub data: Vec<T>,
    /// Navigation links
    pub links: Links,
    /// Page metadata
    pub meta: Meta,
    /// Opaque token for the next page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

impl<T> Paginated<T> {
    /// Build a page served at `path`.
    #[must_use]
    pub fn new(data: Vec<T>, path: &str, per_page: usize, next_token: Option<String>) -> Self {
        let first = format!("{path}?per_page={per_page}");
        let next = next_token
            .as_deref()
            .map(|token| format!("{first}&next_token={}", urlencoding::encode(token)));

        Self {
            links: Links { first, next },
            meta: Meta {
                per_page,
                path: path.to_string(),
                count: data.len(),
            },
            data,
            next_token,
        }
    }
}
