//! HTTP error responses.
//!
//! [`AppError`] is what every handler returns on failure. It renders as
//!
//! ```json
//! { "code": "VALIDATION_ERROR", "message": "The given data was invalid.", "errors": { "rating": ["..."] } }
//! ```
//!
//! where `errors` appears only for field-level validation failures. Core
//! [`ReviewError`]s convert with `?` using the status mapping of the error
//! taxonomy.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use product_reviews_core::error::ReviewError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Field name → messages.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Application error type for web handlers.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    code: &'static str,
    errors: Option<FieldErrors>,
    /// Internal cause, logged but never sent to clients
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create an error with the given status, message, and code.
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>, code: &'static str) -> Self {
        Self {
            status,
            message: message.into(),
            code,
            errors: None,
            source: None,
        }
    }

    /// Attach an internal cause.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// 400 Bad Request.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, "BAD_REQUEST")
    }

    /// 404 Not Found.
    #[must_use]
    pub fn not_found(resource: impl fmt::Display, id: impl fmt::Display) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            format!("{resource} with id {id} not found"),
            "NOT_FOUND",
        )
    }

    /// 422 with a single message and no field breakdown.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message, "VALIDATION_ERROR")
    }

    /// 422 listing every failing field.
    #[must_use]
    pub fn invalid_fields(errors: FieldErrors) -> Self {
        let mut err = Self::validation("The given data was invalid.");
        err.errors = Some(errors);
        err
    }

    /// 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message, "INTERNAL_SERVER_ERROR")
    }

    /// 503 Service Unavailable.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message, "SERVICE_UNAVAILABLE")
    }

    /// HTTP status of this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }

    /// Field errors, for validation failures.
    #[must_use]
    pub const fn field_errors(&self) -> Option<&FieldErrors> {
        self.errors.as_ref()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<FieldErrors>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            match &self.source {
                Some(source) => tracing::error!(
                    status = %self.status,
                    code = self.code,
                    message = %self.message,
                    error = %source,
                    "Request failed"
                ),
                None => tracing::error!(
                    status = %self.status,
                    code = self.code,
                    message = %self.message,
                    "Request failed"
                ),
            }
        }

        let body = ErrorBody {
            code: self.code,
            message: self.message,
            errors: self.errors,
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<ReviewError> for AppError {
    fn from(err: ReviewError) -> Self {
        match err {
            ReviewError::NotFound(id) => Self::not_found("Review", id),
            ReviewError::Validation(message) => Self::validation(message),
            other => Self::internal("An internal error occurred")
                .with_source(anyhow::Error::new(other)),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("An internal error occurred").with_source(err)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_not_found_display() {
        let err = AppError::not_found("Review", "r-1");
        assert_eq!(err.to_string(), "[NOT_FOUND] Review with id r-1 not found");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_field_errors_are_rendered() {
        let mut errors = FieldErrors::new();
        errors.insert("rating".into(), vec!["The rating must be between 1 and 5.".into()]);

        let (status, json) = body_json(AppError::invalid_fields(errors)).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["code"], "VALIDATION_ERROR");
        assert_eq!(json["errors"]["rating"][0], "The rating must be between 1 and 5.");
    }

    #[tokio::test]
    async fn test_plain_errors_omit_field_map() {
        let (_, json) = body_json(AppError::bad_request("nope")).await;
        assert!(json.get("errors").is_none());
    }

    #[test]
    fn test_review_error_mapping() {
        assert_eq!(
            AppError::from(ReviewError::NotFound("r-1".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(ReviewError::Validation("bad token".into())).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::from(ReviewError::Storage("down".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::from(ReviewError::Configuration("no key".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_internal_details_are_not_leaked() {
        let err = AppError::from(ReviewError::Storage("password=hunter2".into()));

        let (_, json) = body_json(err).await;

        assert_eq!(json["message"], "An internal error occurred");
    }
}
