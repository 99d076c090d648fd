//! # Product Reviews Runtime
//!
//! Background-job runtime for the product review service.
//!
//! ## Core Components
//!
//! - **Queue worker**: reserve → handle → acknowledge loop with graceful shutdown
//! - **Retry policies**: per-queue attempt budgets and backoff schedules
//! - **Metrics**: Prometheus counters and histograms for the pipeline
//!
//! ## Example
//!
//! ```ignore
//! use product_reviews_runtime::{QueueWorker, retry::RetryPolicy};
//!
//! let worker = QueueWorker::new("statistics-1", "statistics", queue, handler, shutdown_rx)
//!     .with_policy(RetryPolicy::recompute());
//!
//! let handle = worker.spawn();
//! ```

/// Retry policies with backoff
pub mod retry;

/// Prometheus metrics for observability
pub mod metrics;

/// Queue worker loop
pub mod worker;

pub use worker::{DrainReport, JobHandler, JobOutcome, QueueWorker};
