//! Gemini API client.
//!
//! Non-streaming `generateContent` calls only. The API key travels in the
//! `x-goog-api-key` header, marked sensitive, and never in the URL.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use tracing::instrument;
use url::Url;

use crate::config::GeminiConfig;
use crate::services::{GenerationParams, ReasoningService, ServiceError};

use super::error::{ApiErrorResponse, GeminiError};
use super::types::{GenerateContentRequest, GenerateContentResponse};

const API_KEY_HEADER: HeaderName = HeaderName::from_static("x-goog-api-key");

/// Gemini API client.
#[derive(Clone)]
pub struct GeminiClient {
    inner: Arc<GeminiClientInner>,
}

struct GeminiClientInner {
    client: reqwest::Client,
    endpoint: Url,
    api_key: Option<SecretString>,
    model: String,
}

impl GeminiClient {
    /// Create a new Gemini client.
    ///
    /// A missing API key is not an error here; every call then fails with
    /// [`GeminiError::NotConfigured`].
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the endpoint
    /// URL is invalid.
    pub fn new(config: &GeminiConfig) -> Result<Self, GeminiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;
        let endpoint = config
            .base_url
            .join(&format!("models/{}:generateContent", config.model))?;

        Ok(Self {
            inner: Arc::new(GeminiClientInner {
                client,
                endpoint,
                api_key: config.api_key.clone(),
                model: config.model.clone(),
            }),
        })
    }

    /// Complete a single text prompt and return the first candidate's text.
    ///
    /// # Errors
    ///
    /// Returns an error if no key is configured, the request fails, the API
    /// reports an error, or the response has no text.
    #[instrument(skip_all, fields(model = %self.inner.model, prompt_chars = prompt.len()))]
    pub async fn generate_content(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, GeminiError> {
        let api_key = self
            .inner
            .api_key
            .as_ref()
            .ok_or(GeminiError::NotConfigured)?;

        let mut key_header = HeaderValue::from_str(api_key.expose_secret())
            .map_err(|_| GeminiError::Unauthorized("API key is not a valid header value".to_string()))?;
        key_header.set_sensitive(true);

        let response = self
            .inner
            .client
            .post(self.inner.endpoint.clone())
            .header(API_KEY_HEADER, key_header)
            .json(&GenerateContentRequest::text(prompt, params))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(handle_error_status(status, response).await);
        }

        let body = response.text().await?;
        let parsed: GenerateContentResponse = serde_json::from_str(&body)
            .map_err(|e| GeminiError::Parse(format!("Failed to parse response: {e}")))?;

        if let Some(error) = parsed.error {
            return Err(GeminiError::Api {
                status: error.status,
                message: error.message,
            });
        }

        let text = parsed.into_text().ok_or(GeminiError::Empty)?;
        tracing::debug!(response_chars = text.len(), "gemini response received");
        Ok(text)
    }
}

/// Map a non-success status to an error.
async fn handle_error_status(status: reqwest::StatusCode, response: reqwest::Response) -> GeminiError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);
        return GeminiError::RateLimited(retry_after);
    }

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return GeminiError::Unauthorized("Invalid API key".to_string());
    }

    match response.text().await {
        Ok(body) => match serde_json::from_str::<ApiErrorResponse>(&body) {
            Ok(api_error) => GeminiError::Api {
                status: api_error.error.status,
                message: api_error.error.message,
            },
            Err(_) => GeminiError::Api {
                status: status.to_string(),
                message: body,
            },
        },
        Err(e) => e.into(),
    }
}

#[async_trait]
impl ReasoningService for GeminiClient {
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, ServiceError> {
        Ok(self.generate_content(prompt, params).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use axum::extract::Path;
    use axum::http::{HeaderMap as RequestHeaders, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{Value, json};

    use super::*;

    /// Serve a fake `generateContent` endpoint on an ephemeral port.
    async fn fake_gemini(router: Router) -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        Url::parse(&format!("http://{addr}/v1beta/")).unwrap()
    }

    fn config(base_url: Url, api_key: Option<&str>) -> GeminiConfig {
        GeminiConfig {
            api_key: api_key.map(|k| SecretString::from(k.to_string())),
            model: "test-model".to_string(),
            base_url,
            timeout: Duration::from_secs(5),
        }
    }

    async fn echo(
        Path(call): Path<String>,
        headers: RequestHeaders,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        let text = format!(
            "{call}|{}|{}",
            headers
                .get("x-goog-api-key")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default(),
            body["contents"][0]["parts"][0]["text"].as_str().unwrap_or_default()
        );
        Json(json!({"candidates": [{"content": {"parts": [{"text": text}]}}]}))
    }

    #[test]
    fn test_endpoint_includes_model() {
        let base = Url::parse("https://generativelanguage.googleapis.com/v1beta/").unwrap();
        let client = GeminiClient::new(&config(base, None)).unwrap();
        assert_eq!(
            client.inner.endpoint.as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/test-model:generateContent"
        );
    }

    #[tokio::test]
    async fn test_generate_sends_prompt_and_key() {
        let base = fake_gemini(Router::new().route("/v1beta/models/{call}", post(echo))).await;
        let client = GeminiClient::new(&config(base, Some("k-123"))).unwrap();

        let text = client
            .generate_content("hi there", &GenerationParams::default())
            .await
            .unwrap();
        assert_eq!(text, "test-model:generateContent|k-123|hi there");
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_calling_out() {
        let base = Url::parse("http://127.0.0.1:9/").unwrap();
        let client = GeminiClient::new(&config(base, None)).unwrap();
        let err = client
            .generate_content("x", &GenerationParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GeminiError::NotConfigured));
    }

    #[tokio::test]
    async fn test_transport_error_does_not_leak_key() {
        // Nothing listens on the discard port.
        let base = Url::parse("http://127.0.0.1:9/v1beta/").unwrap();
        let client = GeminiClient::new(&config(base, Some("SUPERSECRETKEY"))).unwrap();
        let err: ServiceError = client
            .generate("x", &GenerationParams::default())
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("external service error: HTTP error"), "{message}");
        assert!(!message.contains("SUPERSECRETKEY"), "{message}");
        assert!(!message.contains("127.0.0.1"), "{message}");
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let router = Router::new()
            .route(
                "/v1beta/models/{call}",
                post(|| async {
                    (
                        StatusCode::TOO_MANY_REQUESTS,
                        [("Retry-After", "7")],
                        "slow down",
                    )
                        .into_response()
                }),
            );
        let base = fake_gemini(router).await;
        let client = GeminiClient::new(&config(base, Some("k"))).unwrap();
        let err = client
            .generate_content("x", &GenerationParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GeminiError::RateLimited(7)));

        let router = Router::new().route(
            "/v1beta/models/{call}",
            post(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"error": {"code": 400, "message": "bad prompt", "status": "INVALID_ARGUMENT"}})),
                )
            }),
        );
        let base = fake_gemini(router).await;
        let client = GeminiClient::new(&config(base, Some("k"))).unwrap();
        let err: ServiceError = client
            .generate("x", &GenerationParams::default())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "external service error: API error (INVALID_ARGUMENT): bad prompt"
        );
    }

    #[tokio::test]
    async fn test_empty_candidates() {
        let router = Router::new().route(
            "/v1beta/models/{call}",
            post(|| async { Json(json!({"candidates": []})) }),
        );
        let base = fake_gemini(router).await;
        let client = GeminiClient::new(&config(base, Some("k"))).unwrap();
        let err = client
            .generate_content("x", &GenerationParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GeminiError::Empty));
    }
}
