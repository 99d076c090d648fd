//! HTTP client for a CDN invalidation gateway.
//!
//! The gateway fronts the CDN's own invalidation API and holds the provider
//! credentials; this service authenticates to it with a bearer token. One
//! batch is one request:
//!
//! ```text
//! POST {endpoint}/2020-05-31/distribution/{distribution_id}/invalidation
//! Authorization: Bearer {token}
//! {"CallerReference":"cache-invalidation-1735689600",
//!  "Paths":{"Quantity":2,"Items":["/api/reviews/r-1*","/reviews/r-1/*"]}}
//! → 201 {"Invalidation":{"Id":"I2J0...","Status":"InProgress"}}
//! ```
//!
//! Without a distribution id the client skips the call and returns `None`.

use crate::config::CdnConfig;
use product_reviews_core::error::ReviewError;
use product_reviews_core::external::{CdnClient, CdnInvalidation};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct InvalidationRequest<'a> {
    caller_reference: &'a str,
    paths: PathList<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PathList<'a> {
    quantity: usize,
    items: &'a [String],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InvalidationResponse {
    invalidation: Invalidation,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Invalidation {
    id: String,
    #[serde(default)]
    status: Option<String>,
}

/// [`CdnClient`] speaking JSON to the invalidation gateway.
#[derive(Clone)]
pub struct HttpCdnClient {
    http: reqwest::Client,
    distribution_id: Option<String>,
    endpoint: Option<String>,
    api_token: Option<String>,
}

impl HttpCdnClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Configuration`] if the HTTP client cannot be built.
    pub fn new(config: &CdnConfig) -> Result<Self, ReviewError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ReviewError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            distribution_id: config.distribution_id.clone(),
            endpoint: config
                .endpoint
                .as_deref()
                .map(|e| e.trim_end_matches('/').to_string()),
            api_token: config.api_token.clone(),
        })
    }

    async fn submit(
        &self,
        distribution_id: &str,
        batch: &CdnInvalidation,
    ) -> Result<String, ReviewError> {
        let endpoint = self.endpoint.as_deref().ok_or_else(|| {
            ReviewError::Configuration("CDN invalidation endpoint is not configured".to_string())
        })?;
        let url = format!("{endpoint}/2020-05-31/distribution/{distribution_id}/invalidation");

        let body = InvalidationRequest {
            caller_reference: &batch.caller_reference,
            paths: PathList {
                quantity: batch.paths.len(),
                items: &batch.paths,
            },
        };

        let mut request = self.http.post(&url).json(&body);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ReviewError::ExternalService(format!("CDN request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ReviewError::ExternalService(format!(
                "CDN returned {status}: {text}"
            )));
        }

        let parsed: InvalidationResponse = response
            .json()
            .await
            .map_err(|e| ReviewError::ExternalService(format!("Malformed CDN response: {e}")))?;

        tracing::debug!(
            distribution_id,
            invalidation_id = %parsed.invalidation.id,
            status = parsed.invalidation.status.as_deref().unwrap_or("unknown"),
            "CDN accepted invalidation"
        );

        Ok(parsed.invalidation.id)
    }
}

impl CdnClient for HttpCdnClient {
    fn invalidate(
        &self,
        batch: CdnInvalidation,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>, ReviewError>> + Send + '_>> {
        Box::pin(async move {
            let Some(distribution_id) = self.distribution_id.as_deref() else {
                tracing::warn!(
                    paths = batch.paths.len(),
                    "CDN distribution id not configured, skipping invalidation"
                );
                return Ok(None);
            };

            self.submit(distribution_id, &batch).await.map(Some)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(endpoint: Option<String>, distribution_id: Option<&str>) -> CdnConfig {
        CdnConfig {
            distribution_id: distribution_id.map(str::to_string),
            endpoint,
            api_token: Some("gateway-token".into()),
            timeout_secs: 5,
            caller_reference_prefix: "cache-invalidation".into(),
        }
    }

    fn batch() -> CdnInvalidation {
        CdnInvalidation {
            paths: vec!["/api/reviews/r-1*".into(), "/reviews/r-1/*".into()],
            caller_reference: "cache-invalidation-1735689600".into(),
        }
    }

    #[tokio::test]
    async fn test_posts_batch_and_returns_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2020-05-31/distribution/E123/invalidation"))
            .and(header("authorization", "Bearer gateway-token"))
            .and(body_json(json!({
                "CallerReference": "cache-invalidation-1735689600",
                "Paths": { "Quantity": 2, "Items": ["/api/reviews/r-1*", "/reviews/r-1/*"] }
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "Invalidation": { "Id": "I2J0TEST", "Status": "InProgress" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpCdnClient::new(&config(Some(server.uri()), Some("E123"))).unwrap();

        let id = client.invalidate(batch()).await.unwrap();

        assert_eq!(id.as_deref(), Some("I2J0TEST"));
    }

    #[tokio::test]
    async fn test_no_token_sends_no_authorization() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2020-05-31/distribution/E123/invalidation"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "Invalidation": { "Id": "I2J0TEST" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut cfg = config(Some(server.uri()), Some("E123"));
        cfg.api_token = None;
        let client = HttpCdnClient::new(&cfg).unwrap();

        client.invalidate(batch()).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert!(requests[0].headers.get("authorization").is_none());
    }

    #[tokio::test]
    async fn test_missing_distribution_skips_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let client = HttpCdnClient::new(&config(Some(server.uri()), None)).unwrap();

        assert_eq!(client.invalidate(batch()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rejection_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("throttled"))
            .mount(&server)
            .await;

        let client = HttpCdnClient::new(&config(Some(server.uri()), Some("E123"))).unwrap();

        let err = client.invalidate(batch()).await.unwrap_err();

        assert!(matches!(err, ReviewError::ExternalService(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_missing_endpoint_is_configuration_error() {
        let client = HttpCdnClient::new(&config(None, Some("E123"))).unwrap();

        let err = client.invalidate(batch()).await.unwrap_err();

        assert!(matches!(err, ReviewError::Configuration(_)));
    }
}
