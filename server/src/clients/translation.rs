//! Google Translate v2 client.
//!
//! ```text
//! GET {endpoint}?key=..&q=..&source=en&target=ar&format=text
//! → {"data":{"translations":[{"translatedText":"..."}]}}
//! ```

use crate::config::TranslationConfig;
use product_reviews_core::error::ReviewError;
use product_reviews_core::external::Translator;
use product_reviews_core::review::Language;
use product_reviews_runtime::metrics::ExternalMetrics;
use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    data: Option<TranslateData>,
}

#[derive(Debug, Deserialize)]
struct TranslateData {
    #[serde(default)]
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Translation {
    translated_text: String,
}

/// [`Translator`] backed by the Google Translate REST API.
#[derive(Clone)]
pub struct GoogleTranslator {
    http: reqwest::Client,
    api_key: Option<String>,
    endpoint: Option<String>,
}

impl GoogleTranslator {
    /// Create a client from configuration.
    ///
    /// A missing key or endpoint is not an error here; it surfaces as
    /// [`ReviewError::Configuration`] on the first call.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Configuration`] if the HTTP client cannot be built.
    pub fn new(config: &TranslationConfig) -> Result<Self, ReviewError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ReviewError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            endpoint: config.endpoint.clone(),
        })
    }

    async fn request(
        &self,
        text: &str,
        source: Language,
        target: Language,
    ) -> Result<String, ReviewError> {
        let (Some(api_key), Some(endpoint)) = (&self.api_key, &self.endpoint) else {
            return Err(ReviewError::Configuration(
                "Google Translate API key or endpoint is not configured".to_string(),
            ));
        };

        let response = self
            .http
            .get(endpoint)
            .query(&[
                ("key", api_key.as_str()),
                ("q", text),
                ("source", source.as_str()),
                ("target", target.as_str()),
                ("format", "text"),
            ])
            .send()
            .await
            .map_err(|e| ReviewError::ExternalService(format!("Translation request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReviewError::ExternalService(format!(
                "Translation API returned {status}: {body}"
            )));
        }

        let body: TranslateResponse = response.json().await.map_err(|e| {
            ReviewError::ExternalService(format!("Malformed translation response: {e}"))
        })?;

        Ok(body
            .data
            .and_then(|d| d.translations.into_iter().next())
            .map(|t| t.translated_text)
            .unwrap_or_default())
    }
}

impl Translator for GoogleTranslator {
    fn translate<'a>(
        &'a self,
        text: &'a str,
        source: Language,
        target: Language,
    ) -> Pin<Box<dyn Future<Output = Result<String, ReviewError>> + Send + 'a>> {
        Box::pin(async move {
            let result = self.request(text, source, target).await;
            ExternalMetrics::record_translation(result.is_ok());
            if let Err(e) = &result {
                tracing::error!(
                    source = %source,
                    target = %target,
                    error = %e,
                    "Translation failed"
                );
            }
            result
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(endpoint: Option<String>, api_key: Option<&str>) -> TranslationConfig {
        TranslationConfig {
            api_key: api_key.map(str::to_string),
            endpoint,
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn test_translates_via_query_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/language/translate/v2"))
            .and(query_param("key", "secret"))
            .and(query_param("q", "Great kettle"))
            .and(query_param("source", "en"))
            .and(query_param("target", "ar"))
            .and(query_param("format", "text"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "translations": [{ "translatedText": "غلاية رائعة" }] }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let translator = GoogleTranslator::new(&config(
            Some(format!("{}/language/translate/v2", server.uri())),
            Some("secret"),
        ))
        .unwrap();

        let text = translator
            .translate("Great kettle", Language::En, Language::Ar)
            .await
            .unwrap();

        assert_eq!(text, "غلاية رائعة");
    }

    #[tokio::test]
    async fn test_empty_translation_list_yields_empty_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "translations": [] }
            })))
            .mount(&server)
            .await;

        let translator = GoogleTranslator::new(&config(Some(server.uri()), Some("k"))).unwrap();

        let text = translator
            .translate("hello", Language::En, Language::Ar)
            .await
            .unwrap();

        assert_eq!(text, "");
    }

    #[tokio::test]
    async fn test_provider_error_is_external_service_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_string("quota exceeded"))
            .mount(&server)
            .await;

        let translator = GoogleTranslator::new(&config(Some(server.uri()), Some("k"))).unwrap();

        let err = translator
            .translate("hello", Language::En, Language::Ar)
            .await
            .unwrap_err();

        assert!(matches!(err, ReviewError::ExternalService(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_missing_key_is_configuration_error() {
        let translator = GoogleTranslator::new(&config(
            Some("http://127.0.0.1:9".to_string()),
            None,
        ))
        .unwrap();

        let err = translator
            .translate("hello", Language::En, Language::Ar)
            .await
            .unwrap_err();

        assert!(matches!(err, ReviewError::Configuration(_)));
        assert!(!err.is_retryable());
    }
}
