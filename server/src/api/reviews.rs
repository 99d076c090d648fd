//! Review endpoints.
//!
//! - `POST /api/reviews` - create a review (multipart, optional `media_files[]`)
//! - `GET /api/reviews` - list reviews through the best matching index
//! - `GET /api/reviews/pending-check` - whether anything awaits moderation
//! - `GET /api/reviews/status-counts` - counts per publication status
//! - `GET /api/reviews/:id` - one review
//! - `DELETE /api/reviews/:id` - delete a review
//! - `PUT /api/reviews/:id/publication` - moderate a review
//! - `GET /api/reviews/:id/translate` - translate on demand

use crate::api::resources::{Message, ReviewResource, Timestamped};
use crate::api::validation::{self, ReviewForm, Validator};
use crate::app::{ListReviews, StatusCounts, UploadedFile};
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Multipart, OriginalUri, Path, State},
    http::StatusCode,
};
use product_reviews_core::error::ReviewError;
use product_reviews_web::{ApiJson, ApiQuery, AppError, Paginated, WebResult};
use serde::{Deserialize, Serialize};

/// Query string of `GET /api/reviews`.
#[derive(Debug, Default, Deserialize)]
pub struct ListReviewsQuery {
    /// Status index
    pub publication_status: Option<String>,
    /// User index
    pub user_id: Option<String>,
    /// Product index
    pub product_id: Option<String>,
    /// Country filter
    pub country: Option<String>,
    /// Original-language filter
    pub language: Option<String>,
    /// Page size, 1..=100
    pub per_page: Option<String>,
    /// Cursor from the previous page
    pub next_token: Option<String>,
    /// `true` enqueues invalidation of the listing
    pub invalidate_cache: Option<String>,
}

/// Body of `PUT /api/reviews/:id/publication`.
#[derive(Debug, Default, Deserialize)]
pub struct UpdatePublicationRequest {
    /// New status
    pub publication_status: Option<String>,
}

/// Query string of `GET /api/reviews/:id/translate`.
#[derive(Debug, Default, Deserialize)]
pub struct TranslateQuery {
    /// Target language
    pub language: Option<String>,
}

/// Body of the pending probe.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PendingCheck {
    /// Whether any review is pending
    pub has_pending_reviews: bool,
}

fn review_not_found() -> AppError {
    AppError::new(StatusCode::NOT_FOUND, "Review not found", "NOT_FOUND")
}

fn not_found_as_404(err: ReviewError) -> AppError {
    match err {
        ReviewError::NotFound(_) => review_not_found(),
        other => other.into(),
    }
}

/// Create a review.
///
/// ```bash
/// curl -X POST http://localhost:8080/api/reviews \
///   -F user_id=u-1 -F product_id=p-1 -F rating=5 \
///   -F original_language=en -F review_en="Great" -F country=AE \
///   -F "media_files[]=@photo.jpg"
/// ```
///
/// # Errors
///
/// 422 for invalid fields or an unreadable multipart body.
pub async fn create_review(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> WebResult<(StatusCode, Json<ReviewResource>)> {
    let mut form = ReviewForm::default();
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::validation(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name.starts_with("media_files") {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::validation(e.body_text()))?;
            files.push(UploadedFile {
                file_name,
                bytes: bytes.to_vec(),
            });
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| AppError::validation(e.body_text()))?;
            form.set(&name, value);
        }
    }

    let input = validation::validate_new_review(&form, &files)?;
    let review = state.reviews.create(input, files).await?;

    Ok((StatusCode::CREATED, Json(review.into())))
}

/// List reviews.
///
/// # Errors
///
/// 422 for invalid filters or a token from another listing.
pub async fn list_reviews(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    ApiQuery(query): ApiQuery<ListReviewsQuery>,
) -> WebResult<Json<Paginated<ReviewResource>>> {
    let mut v = Validator::new();
    let per_page = validation::per_page(&mut v, query.per_page.as_deref());
    let publication_status = validation::optional_status(&mut v, query.publication_status.as_deref());
    let language = validation::optional_language(&mut v, "language", query.language.as_deref());
    v.finish()?;

    let params = ListReviews {
        publication_status,
        user_id: validation::optional(query.user_id.as_deref()),
        product_id: validation::optional(query.product_id.as_deref()),
        country: validation::optional(query.country.as_deref()),
        language,
        per_page,
        next_token: validation::optional(query.next_token.as_deref()),
        invalidate_cache: matches!(query.invalidate_cache.as_deref(), Some("true" | "1")),
    };

    let page = state.reviews.list(&params).await?;
    let data = page.reviews.into_iter().map(ReviewResource::from).collect();

    Ok(Json(Paginated::new(data, uri.path(), per_page, page.next_token)))
}

/// Whether any review awaits moderation.
///
/// # Errors
///
/// 500 if the store cannot be read.
pub async fn pending_check(State(state): State<AppState>) -> WebResult<Json<Timestamped<PendingCheck>>> {
    let has_pending_reviews = state.reviews.has_pending().await?;
    Ok(Json(Timestamped::new(
        PendingCheck { has_pending_reviews },
        state.clock.now(),
    )))
}

/// Review counts per status.
///
/// # Errors
///
/// 500 if the store cannot be read.
pub async fn status_counts(State(state): State<AppState>) -> WebResult<Json<Timestamped<StatusCounts>>> {
    let counts = state.reviews.status_counts().await?;
    Ok(Json(Timestamped::new(counts, state.clock.now())))
}

/// One review.
///
/// # Errors
///
/// 404 if it does not exist.
pub async fn get_review(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> WebResult<Json<ReviewResource>> {
    let review = state.reviews.get(&id).await.map_err(not_found_as_404)?;
    Ok(Json(review.into()))
}

/// Delete a review.
///
/// # Errors
///
/// 404 if it does not exist.
pub async fn delete_review(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> WebResult<Json<Message>> {
    state.reviews.delete(&id).await.map_err(not_found_as_404)?;
    Ok(Json(Message {
        message: "Review deleted successfully",
    }))
}

/// Change a review's publication status.
///
/// # Errors
///
/// 422 for a missing or unknown status, 404 if the review does not exist.
pub async fn update_publication(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdatePublicationRequest>,
) -> WebResult<Json<ReviewResource>> {
    let status = validation::required_status(body.publication_status.as_deref())?;
    let review = state
        .reviews
        .update_status(&id, status)
        .await
        .map_err(not_found_as_404)?;
    Ok(Json(review.into()))
}

/// Return a review with text in the requested language, translating if needed.
///
/// # Errors
///
/// 422 for a missing or unsupported language, 404 if the review does not
/// exist, 500 if the provider fails.
pub async fn translate_review(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiQuery(query): ApiQuery<TranslateQuery>,
) -> WebResult<Json<ReviewResource>> {
    let language = validation::required_language(query.language.as_deref())?;

    match state.reviews.translate(&id, language).await {
        Ok(review) => Ok(Json(review.into())),
        Err(ReviewError::NotFound(_)) => Err(review_not_found()),
        Err(e @ (ReviewError::ExternalService(_) | ReviewError::Configuration(_))) => Err(
            AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "Translation failed", "TRANSLATION_FAILED")
                .with_source(e.into()),
        ),
        Err(other) => Err(other.into()),
    }
}
