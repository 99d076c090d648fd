//! Readiness and metrics endpoints.
//!
//! Liveness (`/health`) is the shared handler from the web crate.

use crate::server::state::AppState;
use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Body of `GET /ready`.
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    /// Whether the service can take traffic
    pub ready: bool,
    /// Review store reachable
    pub database: bool,
}

/// Readiness probe: 200 if the review store answers, 503 otherwise.
///
/// ```bash
/// curl http://localhost:8080/ready
/// # {"ready":true,"database":true}
/// ```
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let database = match state.reviews.has_pending().await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            false
        }
    };

    let status = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(ReadinessResponse {
            ready: database,
            database,
        }),
    )
}

/// Prometheus scrape endpoint; 404 when no recorder is installed.
pub async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.as_ref().and_then(|m| m.render()) {
        Some(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
