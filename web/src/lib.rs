//! Axum integration for the product review service.
//!
//! The HTTP edge is a thin shell: handlers parse and validate input, call
//! an application service, and map the result to a response. This crate
//! holds the pieces every handler shares.
//!
//! - [`error`]: [`AppError`] and its JSON rendering
//! - [`extractors`]: JSON/query extractors with 422 rejections, correlation id
//! - [`middleware`]: correlation-id propagation
//! - [`pagination`]: cursor-paginated list envelope
//! - [`handlers`]: health check

#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod pagination;

pub use error::{AppError, FieldErrors};
pub use extractors::{ApiJson, ApiQuery, CorrelationId};
pub use middleware::{CORRELATION_ID_HEADER, correlation_id};
pub use pagination::Paginated;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
