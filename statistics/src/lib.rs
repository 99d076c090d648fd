//! # Product Reviews Statistics
//!
//! The write-behind pipeline that keeps per-product rating statistics in
//! step with the review store.
//!
//! ```text
//! review write ──▶ RecomputeProducer ──▶ statistics queue ──▶ RecomputeHandler
//!                                                              │
//!                                                              ▼
//!                                  review store ◀── scan ── Aggregator ──▶ statistics store
//!                                                              │
//!                                                              ▼
//!                  CDN ◀── InvalidationHandler ◀── cache-invalidation queue
//! ```
//!
//! - [`producer`]: maps review transitions to recompute events
//! - [`aggregator`]: scans a product's published reviews and writes a fresh record
//! - [`invalidator`]: enqueues CDN path batches and submits them
//! - [`handlers`]: [`JobHandler`](product_reviews_runtime::JobHandler)s for both queues
//! - [`backfill`]: recomputes many products at once, for repair and migration
//!
//! Recomputes are absolute, so duplicate or reordered events converge on the
//! same record.

pub mod aggregator;
pub mod backfill;
pub mod handlers;
pub mod invalidator;
pub mod producer;

pub use aggregator::Aggregator;
pub use backfill::{BackfillDriver, BackfillMode, BackfillReport};
pub use handlers::{InvalidationHandler, RecomputeHandler};
pub use invalidator::{CacheInvalidator, CdnDispatcher};
pub use producer::RecomputeProducer;
