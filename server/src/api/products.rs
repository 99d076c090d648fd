//! Product rating endpoints.
//!
//! - `GET /api/products/:id/reviews` - published reviews plus the rating summary
//! - `GET /api/products/:id/rating` - the rating summary alone
//! - `POST /api/products/ratings-summary` - summaries for many products

use crate::api::resources::{ProductSummary, ReviewResource};
use crate::api::validation::{self, Validator};
use crate::app::ProductReviews;
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
};
use product_reviews_core::review::PublicationStatus;
use product_reviews_core::statistics::RatingSummary;
use product_reviews_web::{ApiJson, ApiQuery, WebResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Query string of `GET /api/products/:id/reviews`.
#[derive(Debug, Default, Deserialize)]
pub struct ProductReviewsQuery {
    /// Status filter; defaults to `published`, `all` disables it
    pub publication_status: Option<String>,
    /// Country filter
    pub country: Option<String>,
    /// Original-language filter
    pub language: Option<String>,
    /// Author filter
    pub user_id: Option<String>,
    /// Page size, 1..=100
    pub per_page: Option<String>,
    /// Cursor from the previous page
    pub next_token: Option<String>,
}

/// Response of `GET /api/products/:id/reviews`.
#[derive(Debug, Serialize)]
pub struct ProductReviewsResponse {
    /// Reviews, newest first
    pub data: Vec<ReviewResource>,
    /// Stored summary for the product
    pub rating_summary: RatingSummary,
    /// Cursor for the next page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

/// Body of `POST /api/products/ratings-summary`.
#[derive(Debug, Default, Deserialize)]
pub struct BulkSummaryRequest {
    /// Products to look up
    pub product_ids: Option<Vec<String>>,
}

/// Response of `POST /api/products/ratings-summary`.
#[derive(Debug, Serialize)]
pub struct BulkSummaryResponse {
    /// Product id to summary
    pub data: BTreeMap<String, ProductSummary>,
}

/// A product's reviews with its rating summary.
///
/// # Errors
///
/// 422 for invalid filters or a token from another listing.
pub async fn product_reviews(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    ApiQuery(query): ApiQuery<ProductReviewsQuery>,
) -> WebResult<Json<ProductReviewsResponse>> {
    let mut v = Validator::new();
    let per_page = validation::per_page(&mut v, query.per_page.as_deref());
    let publication_status = match query.publication_status.as_deref().map(str::trim) {
        None | Some("") => Some(PublicationStatus::Published),
        Some("all") => None,
        Some(raw) => v.parse(
            "publication_status",
            raw,
            "The publication status must be one of: pending, published, rejected, all.",
        ),
    };
    let language = validation::optional_language(&mut v, "language", query.language.as_deref());
    v.finish()?;

    let params = ProductReviews {
        product_id,
        publication_status,
        country: validation::optional(query.country.as_deref()),
        language,
        user_id: validation::optional(query.user_id.as_deref()),
        per_page,
        next_token: validation::optional(query.next_token.as_deref()),
    };

    let result = state.reviews.product_reviews(&params).await?;

    Ok(Json(ProductReviewsResponse {
        data: result.page.reviews.into_iter().map(ReviewResource::from).collect(),
        rating_summary: result.rating_summary,
        next_token: result.page.next_token,
    }))
}

/// A product's rating summary, zeroed if never computed.
///
/// # Errors
///
/// 500 if the statistics store cannot be read.
pub async fn product_rating(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> WebResult<Json<RatingSummary>> {
    Ok(Json(state.reviews.product_rating(&product_id).await?))
}

/// Summaries for many products in one call.
///
/// ```bash
/// curl -X POST http://localhost:8080/api/products/ratings-summary \
///   -H "Content-Type: application/json" \
///   -d '{"product_ids": ["p-1", "p-2"]}'
/// ```
///
/// # Errors
///
/// 422 for a missing or empty id list.
pub async fn ratings_summary(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<BulkSummaryRequest>,
) -> WebResult<Json<BulkSummaryResponse>> {
    let product_ids = validation::product_ids(body.product_ids.as_deref())?;

    let data = state
        .reviews
        .bulk_summaries(&product_ids)
        .await?
        .into_iter()
        .map(|(product_id, summary)| {
            (
                product_id.clone(),
                ProductSummary {
                    product_id,
                    summary,
                },
            )
        })
        .collect();

    Ok(Json(BulkSummaryResponse { data }))
}
