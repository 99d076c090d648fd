//! HTTP tests against in-memory stores, queue and external doubles.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::http::StatusCode;
use axum_test::TestServer;
use axum_test::multipart::{MultipartForm, Part};
use product_reviews_core::environment::Clock;
use product_reviews_core::queue::{INVALIDATION_QUEUE, STATISTICS_QUEUE};
use product_reviews_core::review::PublicationStatus;
use product_reviews_core::statistics::{ProductStatistics, RatingCounts};
use product_reviews_server::app::Deps;
use product_reviews_server::{AppState, build_router};
use product_reviews_testing::fixtures::ReviewBuilder;
use product_reviews_testing::{
    InMemoryJobQueue, InMemoryMediaStorage, InMemoryReviewStore, InMemoryStatisticsStore,
    MockTranslator, RecordingCdnClient, test_clock,
};
use serde_json::{Value, json};
use std::sync::Arc;

struct Harness {
    server: TestServer,
    reviews: Arc<InMemoryReviewStore>,
    statistics: Arc<InMemoryStatisticsStore>,
    queue: Arc<InMemoryJobQueue>,
    translator: Arc<MockTranslator>,
    media: Arc<InMemoryMediaStorage>,
}

fn harness() -> Harness {
    let reviews = Arc::new(InMemoryReviewStore::new());
    let statistics = Arc::new(InMemoryStatisticsStore::new());
    let queue = Arc::new(InMemoryJobQueue::new());
    let translator = Arc::new(MockTranslator::new());
    let media = Arc::new(InMemoryMediaStorage::default());

    let deps = Deps::new(
        reviews.clone(),
        statistics.clone(),
        queue.clone(),
        translator.clone(),
        Arc::new(RecordingCdnClient::new()),
        media.clone(),
        Arc::new(test_clock()),
    );
    let server = TestServer::new(build_router(AppState::new(deps))).unwrap();

    Harness {
        server,
        reviews,
        statistics,
        queue,
        translator,
        media,
    }
}

fn stats(product_id: &str, ratings: &[u8]) -> ProductStatistics {
    let mut counts = RatingCounts::default();
    for rating in ratings {
        counts.record(*rating);
    }
    ProductStatistics::from_counts(product_id, &counts, test_clock().now())
}

fn review_form() -> MultipartForm {
    MultipartForm::new()
        .add_text("user_id", "user-9")
        .add_text("product_id", "p-1")
        .add_text("rating", "4")
        .add_text("original_language", "en")
        .add_text("review_en", "Does the job")
        .add_text("country", "SA")
}

#[tokio::test]
async fn test_health() {
    let h = harness();

    let response = h.server.get("/health").await;

    response.assert_status_ok();
    response.assert_json(&json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_create_stores_review_and_media() {
    let h = harness();
    let form = review_form().add_part(
        "media_files[]",
        Part::bytes(vec![7, 7, 7]).file_name("photo.png").mime_type("image/png"),
    );

    let response = h.server.post("/api/reviews").multipart(form).await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    let id = body["id"].as_str().unwrap();
    assert_eq!(body["publication_status"], "pending");
    assert_eq!(body["country"], "SA");
    assert_eq!(body["media"][0]["type"], "image");

    let stored = h.reviews.review(id).unwrap();
    assert_eq!(stored.media.len(), 1);
    assert_eq!(h.media.get(&stored.media[0].path), Some(vec![7, 7, 7]));

    assert!(h.queue.is_empty(STATISTICS_QUEUE));
    assert_eq!(h.queue.invalidated_paths(), vec!["/api/products/p-1/reviews*"]);
}

#[tokio::test]
async fn test_create_with_failed_upload_keeps_review() {
    let h = harness();
    h.media.set_failing(true);
    let form = review_form().add_part(
        "media_files[]",
        Part::bytes(vec![1]).file_name("clip.mp4").mime_type("video/mp4"),
    );

    let response = h.server.post("/api/reviews").multipart(form).await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["media"], json!([]));
    assert_eq!(h.reviews.len(), 1);
}

#[tokio::test]
async fn test_create_uploads_nothing_when_review_cannot_be_saved() {
    let h = harness();
    h.reviews.fail_writes(true);
    let form = review_form().add_part(
        "media_files[]",
        Part::bytes(vec![7, 7, 7]).file_name("photo.png").mime_type("image/png"),
    );

    let response = h.server.post("/api/reviews").multipart(form).await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert!(h.media.paths().is_empty());
    assert!(h.reviews.is_empty());
}

#[tokio::test]
async fn test_create_rejects_invalid_fields() {
    let h = harness();
    let form = MultipartForm::new()
        .add_text("product_id", "p-1")
        .add_text("rating", "9")
        .add_text("original_language", "en")
        .add_text("review_en", "Hmm")
        .add_text("country", "SA");

    let response = h.server.post("/api/reviews").multipart(form).await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json();
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["errors"]["user_id"].is_array());
    assert!(body["errors"]["rating"].is_array());
    assert!(h.reviews.is_empty());
}

#[tokio::test]
async fn test_get_missing_review_is_404() {
    let h = harness();

    let response = h.server.get("/api/reviews/nope").await;

    response.assert_status_not_found();
    let body: Value = response.json();
    assert_eq!(body["message"], "Review not found");
}

#[tokio::test]
async fn test_delete_published_review() {
    let h = harness();
    h.reviews.insert(
        ReviewBuilder::new("p-1")
            .id("r-1")
            .published()
            .with_media("reviews/r-1/media-aaaa1111.jpg")
            .build(),
    );

    let response = h.server.delete("/api/reviews/r-1").await;

    response.assert_status_ok();
    response.assert_json(&json!({ "message": "Review deleted successfully" }));
    assert!(h.reviews.review("r-1").is_none());
    assert_eq!(h.queue.recompute_product_ids(), vec!["p-1"]);

    let paths = h.queue.invalidated_paths();
    assert_eq!(paths[0], "/reviews/r-1/media-aaaa1111.jpg");
    assert!(paths.contains(&"/api/reviews/r-1*".to_string()));
    assert!(paths.contains(&"/api/products/p-1/reviews*".to_string()));
}

#[tokio::test]
async fn test_delete_pending_review_skips_recompute() {
    let h = harness();
    h.reviews.insert(ReviewBuilder::new("p-1").id("r-1").build());

    h.server.delete("/api/reviews/r-1").await.assert_status_ok();

    assert!(h.queue.is_empty(STATISTICS_QUEUE));
    assert!(!h.queue.is_empty(INVALIDATION_QUEUE));
}

#[tokio::test]
async fn test_delete_missing_review_is_404() {
    let h = harness();

    let response = h.server.delete("/api/reviews/r-404").await;

    response.assert_status_not_found();
    assert!(h.queue.is_empty(INVALIDATION_QUEUE));
}

#[tokio::test]
async fn test_publish_enqueues_recompute() {
    let h = harness();
    h.reviews.insert(ReviewBuilder::new("p-1").id("r-1").build());

    let response = h
        .server
        .put("/api/reviews/r-1/publication")
        .json(&json!({ "publication_status": "published" }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["publication_status"], "published");
    assert_eq!(
        h.reviews.review("r-1").unwrap().publication_status,
        PublicationStatus::Published
    );
    assert_eq!(h.queue.recompute_product_ids(), vec!["p-1"]);
    assert!(h.queue.invalidated_paths().contains(&"/api/reviews/r-1/publication*".to_string()));
}

#[tokio::test]
async fn test_publication_requires_known_status() {
    let h = harness();
    h.reviews.insert(ReviewBuilder::new("p-1").id("r-1").build());

    let missing = h.server.put("/api/reviews/r-1/publication").json(&json!({})).await;
    missing.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let unknown = h
        .server
        .put("/api/reviews/r-1/publication")
        .json(&json!({ "publication_status": "archived" }))
        .await;
    unknown.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let absent = h
        .server
        .put("/api/reviews/r-9/publication")
        .json(&json!({ "publication_status": "rejected" }))
        .await;
    absent.assert_status_not_found();

    assert!(h.queue.is_empty(STATISTICS_QUEUE));
}

#[tokio::test]
async fn test_translate_is_idempotent() {
    let h = harness();
    h.reviews.insert(ReviewBuilder::new("p-1").id("r-1").build());

    let first = h
        .server
        .get("/api/reviews/r-1/translate")
        .add_query_param("language", "ar")
        .await;
    first.assert_status_ok();
    let body: Value = first.json();
    assert_eq!(body["review_ar"], "[ar] Works as described");

    let second = h
        .server
        .get("/api/reviews/r-1/translate")
        .add_query_param("language", "ar")
        .await;
    second.assert_status_ok();

    assert_eq!(h.translator.calls(), 1);
    assert_eq!(
        h.reviews.review("r-1").unwrap().review_ar.as_deref(),
        Some("[ar] Works as described")
    );
}

#[tokio::test]
async fn test_translate_errors() {
    let h = harness();
    h.reviews.insert(ReviewBuilder::new("p-1").id("r-1").build());

    let missing = h.server.get("/api/reviews/r-1/translate").await;
    missing.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = missing.json();
    assert_eq!(body["message"], "The language query parameter is required.");

    let absent = h
        .server
        .get("/api/reviews/r-9/translate")
        .add_query_param("language", "ar")
        .await;
    absent.assert_status_not_found();

    h.translator.set_failing(true);
    let failed = h
        .server
        .get("/api/reviews/r-1/translate")
        .add_query_param("language", "ar")
        .await;
    failed.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = failed.json();
    assert_eq!(body["message"], "Translation failed");
}

#[tokio::test]
async fn test_list_paginates_through_status_index() {
    let h = harness();
    h.reviews.insert_all([
        ReviewBuilder::new("p-1").id("r-1").published().build(),
        ReviewBuilder::new("p-2").id("r-2").published().build(),
        ReviewBuilder::new("p-1").id("r-3").published().build(),
        ReviewBuilder::new("p-1").id("r-4").build(),
    ]);

    let first = h
        .server
        .get("/api/reviews")
        .add_query_param("publication_status", "published")
        .add_query_param("per_page", "2")
        .await;
    first.assert_status_ok();
    let body: Value = first.json();
    let ids: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["r-2", "r-1"]);
    assert_eq!(body["meta"]["per_page"], 2);
    assert_eq!(body["meta"]["path"], "/api/reviews");
    let token = body["next_token"].as_str().unwrap().to_string();

    let second = h
        .server
        .get("/api/reviews")
        .add_query_param("publication_status", "published")
        .add_query_param("per_page", "2")
        .add_query_param("next_token", &token)
        .await;
    second.assert_status_ok();
    let body: Value = second.json();
    assert_eq!(body["data"][0]["id"], "r-3");
    assert!(body.get("next_token").is_none());
}

#[tokio::test]
async fn test_list_rejects_bad_input() {
    let h = harness();

    h.server
        .get("/api/reviews")
        .add_query_param("per_page", "500")
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    h.server
        .get("/api/reviews")
        .add_query_param("next_token", "garbage")
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_list_can_request_cache_refresh() {
    let h = harness();

    h.server
        .get("/api/reviews")
        .add_query_param("invalidate_cache", "true")
        .await
        .assert_status_ok();

    assert_eq!(h.queue.invalidated_paths(), vec!["/api/reviews"]);
}

#[tokio::test]
async fn test_pending_check_and_counts() {
    let h = harness();
    h.reviews.insert_all([
        ReviewBuilder::new("p-1").id("r-1").build(),
        ReviewBuilder::new("p-1").id("r-2").published().build(),
        ReviewBuilder::new("p-1").id("r-3").published().build(),
        ReviewBuilder::new("p-1")
            .id("r-4")
            .status(PublicationStatus::Rejected)
            .build(),
    ]);

    let pending: Value = h.server.get("/api/reviews/pending-check").await.json();
    assert_eq!(pending["data"]["has_pending_reviews"], true);
    assert!(pending["meta"]["timestamp"].is_string());

    let counts: Value = h.server.get("/api/reviews/status-counts").await.json();
    assert_eq!(
        counts["data"],
        json!({ "pending": 1, "published": 2, "rejected": 1, "total": 4 })
    );
}

#[tokio::test]
async fn test_product_reviews_default_to_published() {
    let h = harness();
    h.reviews.insert_all([
        ReviewBuilder::new("p-1").id("r-1").published().build(),
        ReviewBuilder::new("p-1").id("r-2").build(),
        ReviewBuilder::new("p-2").id("r-3").published().build(),
    ]);
    h.statistics.insert(stats("p-1", &[5]));

    let body: Value = h.server.get("/api/products/p-1/reviews").await.json();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["id"], "r-1");
    assert_eq!(body["rating_summary"]["count"], 1);

    let all: Value = h
        .server
        .get("/api/products/p-1/reviews")
        .add_query_param("publication_status", "all")
        .await
        .json();
    assert_eq!(all["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_rating_is_zeroed_without_record() {
    let h = harness();

    let response = h.server.get("/api/products/p-404/rating").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["count"], 0);
    assert_eq!(body["average"], 0.0);
    assert_eq!(body["distribution"]["3"], 0);
}

#[tokio::test]
async fn test_bulk_summary_zeroes_missing_product() {
    let h = harness();
    h.statistics.insert(stats("p-1", &[5, 4, 4, 3, 1]));
    h.statistics.insert(stats("p-3", &[2]));

    let response = h
        .server
        .post("/api/products/ratings-summary")
        .json(&json!({ "product_ids": ["p-1", "p-2", "p-3"] }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    let data = body["data"].as_object().unwrap();
    assert_eq!(data.len(), 3);
    assert_eq!(data["p-1"]["count"], 5);
    assert_eq!(data["p-1"]["average"], 3.4);
    assert_eq!(data["p-2"]["product_id"], "p-2");
    assert_eq!(data["p-2"]["count"], 0);
    assert_eq!(data["p-3"]["distribution"]["2"], 1);
}

#[tokio::test]
async fn test_bulk_summary_requires_ids() {
    let h = harness();

    let response = h
        .server
        .post("/api/products/ratings-summary")
        .json(&json!({ "product_ids": [] }))
        .await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}
