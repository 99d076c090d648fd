//! Error taxonomy shared by the stores, queues, and workers.
//!
//! Every fallible core operation returns [`ReviewError`]. The variants map onto
//! how the failure is handled downstream:
//!
//! | Variant | Retried by queue | Edge status |
//! |---|---|---|
//! | `NotFound` | no | 404 |
//! | `Storage` | yes | 500 |
//! | `Queue` | yes | logged, request succeeds |
//! | `ExternalService` | yes | 500 |
//! | `IterationCeiling` | no | 500 |
//! | `Configuration` | no | 500 |
//! | `Validation` | no | 422 |

use thiserror::Error;

/// Errors produced by the review service core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReviewError {
    /// The requested review does not exist.
    #[error("Review not found: {0}")]
    NotFound(String),

    /// Read or write against the review or statistics store failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Enqueueing or reserving a job failed.
    #[error("Queue error: {0}")]
    Queue(String),

    /// The translation provider or CDN rejected or failed a call.
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Pagination exceeded its safety cap.
    ///
    /// Fatal for the current run and never retried: a runaway cursor will
    /// run away again.
    #[error("Iteration ceiling of {limit} pages reached while {operation}")]
    IterationCeiling {
        /// What was being paginated (e.g. "aggregating product p-1").
        operation: String,
        /// The cap that was hit.
        limit: usize,
    },

    /// A required setting (API key, endpoint) is missing.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Input rejected before reaching storage (bad cursor, bad payload).
    #[error("Validation error: {0}")]
    Validation(String),
}

impl ReviewError {
    /// Whether the enclosing job should be retried with backoff.
    ///
    /// Structural failures (ceiling trips, missing configuration, invalid
    /// input, missing records) are surfaced instead of retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Storage(_) | Self::Queue(_) | Self::ExternalService(_)
        )
    }

    /// Short machine-readable kind, used as a metrics label.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Storage(_) => "storage",
            Self::Queue(_) => "queue",
            Self::ExternalService(_) => "external_service",
            Self::IterationCeiling { .. } => "iteration_ceiling",
            Self::Configuration(_) => "configuration",
            Self::Validation(_) => "validation",
        }
    }
}

/// Convenience alias for core results.
pub type Result<T> = std::result::Result<T, ReviewError>;
