//! Liveness endpoint.

use axum::Json;
use serde::Serialize;

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the process serves requests
    pub status: &'static str,
}

/// Liveness check. Does not touch the database or the queues.
///
/// ```text
/// GET /health → 200 {"status":"ok"}
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
