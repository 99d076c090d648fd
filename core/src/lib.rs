//! # Product Reviews Core
//!
//! Domain types and abstractions for the product review service.
//!
//! The service ingests user ratings (1–5) with English or Arabic text,
//! moderates them through a publication lifecycle, and maintains per-product
//! aggregate statistics through a write-behind pipeline.
//!
//! ## Core Concepts
//!
//! - **Review**: a single rating + text + optional media record ([`review`])
//! - **Statistics**: the derived per-product summary ([`statistics`])
//! - **Query descriptor**: typed, cursor-paginated access to the review store ([`query`])
//! - **Stores**: durable review and statistics storage ([`store`])
//! - **Jobs**: recompute and cache-invalidation work on durable queues ([`queue`])
//! - **External collaborators**: CDN, translation provider, blob storage ([`external`])
//!
//! ## Architecture Principles
//!
//! - Aggregates are recomputed from scratch, never patched with deltas
//! - Every I/O boundary is a dyn-compatible trait injected at startup
//! - Storage failures surface as [`error::ReviewError`], never as panics
//!
//! ## Example
//!
//! ```
//! use product_reviews_core::statistics::RatingCounts;
//!
//! let mut counts = RatingCounts::default();
//! for rating in [5, 4, 4, 3, 1] {
//!     counts.record(rating);
//! }
//!
//! let summary = counts.summary();
//! assert_eq!(summary.count, 5);
//! assert!((summary.average - 3.4).abs() < f64::EPSILON);
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};

pub mod error;
pub mod external;
pub mod paths;
pub mod query;
pub mod queue;
pub mod review;
pub mod statistics;
pub mod store;

/// Environment module - injected dependencies shared by every component.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```ignore
    /// // Test - fixed time for deterministic tests
    /// struct FixedClock { time: DateTime<Utc> }
    /// impl Clock for FixedClock {
    ///     fn now(&self) -> DateTime<Utc> {
    ///         self.time
    ///     }
    /// }
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
