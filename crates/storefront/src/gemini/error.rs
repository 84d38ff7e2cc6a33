//! Error types for the Gemini API client.

use thiserror::Error;

use crate::services::ServiceError;

/// Errors that can occur when calling the Gemini API.
#[derive(Debug, Error)]
pub enum GeminiError {
    /// No API key was configured.
    #[error("Gemini API key not configured")]
    NotConfigured,

    /// HTTP request failed (includes timeouts). Stored without its URL.
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    /// The endpoint URL could not be built.
    #[error("invalid endpoint: {0}")]
    Url(#[from] url::ParseError),

    /// Gemini returned an error object.
    #[error("API error ({status}): {message}")]
    Api { status: String, message: String },

    #[error("rate limited, retry after {0} seconds")]
    RateLimited(u64),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Failed to parse response.
    #[error("parse error: {0}")]
    Parse(String),

    /// The response carried no candidate text.
    #[error("no response from Gemini API")]
    Empty,
}

impl From<reqwest::Error> for GeminiError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.without_url())
    }
}

impl From<GeminiError> for ServiceError {
    fn from(err: GeminiError) -> Self {
        Self::ExternalService(err.to_string())
    }
}

/// Error envelope returned with non-success statuses.
#[derive(Debug, serde::Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiError,
}

/// Error details. Also embedded in otherwise successful responses.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub code: i32,
    pub message: String,
    #[serde(default)]
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gemini_error_display() {
        let err = GeminiError::RateLimited(30);
        assert_eq!(err.to_string(), "rate limited, retry after 30 seconds");

        let err = GeminiError::Api {
            status: "INVALID_ARGUMENT".to_string(),
            message: "API key not valid".to_string(),
        };
        assert_eq!(err.to_string(), "API error (INVALID_ARGUMENT): API key not valid");
    }

    #[test]
    fn test_maps_to_external_service() {
        let err: ServiceError = GeminiError::NotConfigured.into();
        assert!(matches!(err, ServiceError::ExternalService(_)));
    }

    #[test]
    fn test_api_error_deserialization() {
        let json = r#"{
            "error": {
                "code": 400,
                "message": "API key not valid. Please pass a valid API key.",
                "status": "INVALID_ARGUMENT"
            }
        }"#;

        let response: ApiErrorResponse = serde_json::from_str(json).expect("deserialize");
        assert_eq!(response.error.code, 400);
        assert_eq!(response.error.status, "INVALID_ARGUMENT");
    }
}
