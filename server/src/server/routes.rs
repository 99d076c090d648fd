//! Router configuration.

use super::health::{metrics, readiness_check};
use super::state::AppState;
use crate::api::{products, reviews};
use crate::app::media::MAX_MEDIA_BYTES;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
};
use product_reviews_web::correlation_id;
use product_reviews_web::handlers::health_check;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Uploads per create request accepted by the body limit.
const MAX_UPLOADS_PER_REQUEST: usize = 10;

/// Build the complete router.
///
/// Probes and `/metrics` sit at the root; every resource lives under `/api`.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route(
            "/reviews",
            get(reviews::list_reviews).post(reviews::create_review).layer(
                DefaultBodyLimit::max(MAX_MEDIA_BYTES * MAX_UPLOADS_PER_REQUEST),
            ),
        )
        .route("/reviews/pending-check", get(reviews::pending_check))
        .route("/reviews/status-counts", get(reviews::status_counts))
        .route(
            "/reviews/:id",
            get(reviews::get_review).delete(reviews::delete_review),
        )
        .route("/reviews/:id/publication", put(reviews::update_publication))
        .route("/reviews/:id/translate", get(reviews::translate_review))
        .route("/products/ratings-summary", post(products::ratings_summary))
        .route("/products/:id/reviews", get(products::product_reviews))
        .route("/products/:id/rating", get(products::product_rating));

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics))
        .nest("/api", api_routes)
        .layer(middleware::from_fn(correlation_id))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
