//! Request middleware.
//!
//! [`correlation_id`] gives every request an id:
//!
//! 1. Take `X-Correlation-ID` from the request if it is a valid UUID, else generate one
//! 2. Store it in request extensions as [`CorrelationId`]
//! 3. Run the rest of the stack inside an `http_request` span carrying the id
//! 4. Echo the id on the response header
//!
//! ```ignore
//! let app = Router::new()
//!     .route("/reviews", get(list_reviews))
//!     .layer(axum::middleware::from_fn(correlation_id));
//! ```

use crate::extractors::CorrelationId;
use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

/// Header carrying the correlation id.
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

/// Assign, propagate, and echo a correlation id.
pub async fn correlation_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);

    req.extensions_mut().insert(CorrelationId(id));

    let span = tracing::info_span!(
        "http_request",
        correlation_id = %id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    let started = Instant::now();
    let mut response = next.run(req).instrument(span.clone()).await;

    span.in_scope(|| {
        tracing::debug!(
            status = response.status().as_u16(),
            elapsed = ?started.elapsed(),
            "Request completed"
        );
    });

    if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
        response.headers_mut().insert(CORRELATION_ID_HEADER, value);
    }

    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, routing::get};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route(
                "/echo",
                get(|CorrelationId(id): CorrelationId| async move { id.to_string() }),
            )
            .layer(axum::middleware::from_fn(correlation_id))
    }

    async fn call(header: Option<&str>) -> (String, String) {
        let mut builder = axum::http::Request::builder().uri("/echo");
        if let Some(value) = header {
            builder = builder.header(CORRELATION_ID_HEADER, value);
        }

        let response = app().oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();

        let echoed = response
            .headers()
            .get(CORRELATION_ID_HEADER)
            .expect("header present")
            .to_str()
            .unwrap()
            .to_string();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (echoed, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_generates_id_when_missing() {
        let (echoed, seen_by_handler) = call(None).await;

        assert!(Uuid::parse_str(&echoed).is_ok());
        assert_eq!(echoed, seen_by_handler);
    }

    #[tokio::test]
    async fn test_preserves_valid_id() {
        let id = Uuid::new_v4().to_string();

        let (echoed, seen_by_handler) = call(Some(&id)).await;

        assert_eq!(echoed, id);
        assert_eq!(seen_by_handler, id);
    }

    #[tokio::test]
    async fn test_replaces_invalid_id() {
        let (echoed, _) = call(Some("not-a-uuid")).await;

        assert_ne!(echoed, "not-a-uuid");
        assert!(Uuid::parse_str(&echoed).is_ok());
    }
}
