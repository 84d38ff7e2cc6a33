//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Every error body has the same shape:
//!
//! ```json
//! {"success": false, "error": {"code": "NOT_FOUND", "message": "Order not found"}}
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::services::ServiceError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// A service operation failed.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Missing or invalid bearer token.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated, but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::Service(err) => match err {
                ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
                ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
                ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
                ServiceError::InvalidState(_) => StatusCode::UNPROCESSABLE_ENTITY,
                ServiceError::Conflict(_) => StatusCode::CONFLICT,
                ServiceError::ExternalService(_) | ServiceError::InvalidResponse(_) => {
                    StatusCode::BAD_GATEWAY
                }
                ServiceError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Stable machine-readable code for clients.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Service(err) => match err {
                ServiceError::Validation(_) => "VALIDATION_ERROR",
                ServiceError::NotFound(_) => "NOT_FOUND",
                ServiceError::Forbidden(_) => "FORBIDDEN",
                ServiceError::InvalidState(_) => "INVALID_STATE",
                ServiceError::Conflict(_) => "CONFLICT",
                ServiceError::ExternalService(_) => "EXTERNAL_SERVICE_ERROR",
                ServiceError::InvalidResponse(_) => "INVALID_RESPONSE",
                ServiceError::Repository(_) => "INTERNAL_ERROR",
            },
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::BadRequest(_) => "BAD_REQUEST",
        }
    }

    const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Service(
                ServiceError::Repository(_)
                    | ServiceError::ExternalService(_)
                    | ServiceError::InvalidResponse(_)
            )
        )
    }

    /// Message safe to show to clients.
    fn public_message(&self) -> String {
        match self {
            Self::Service(ServiceError::Repository(_)) => "Internal server error".to_string(),
            Self::Service(ServiceError::ExternalService(_)) => "External service error".to_string(),
            Self::Service(ServiceError::InvalidResponse(_)) => {
                "Could not understand the recommendation service response".to_string()
            }
            Self::Service(err) => err.to_string(),
            Self::Unauthorized(msg) | Self::Forbidden(msg) | Self::BadRequest(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let body = json!({
            "success": false,
            "error": {
                "code": self.code(),
                "message": self.public_message(),
            },
        });

        (self.status(), Json(body)).into_response()
    }
}

impl From<crate::db::RepositoryError> for AppError {
    fn from(err: crate::db::RepositoryError) -> Self {
        Self::Service(err.into())
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Success envelope: `{"success": true, "data": ...}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    success: bool,
    data: T,
}

/// Wrap `data` in the success envelope.
pub fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        data,
    })
}

/// Set the Sentry user context from a user ID.
///
/// Called by the identity extractor once a bearer token checks out.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Item added", Some(&[("product_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
