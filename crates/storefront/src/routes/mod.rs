//! HTTP route handlers for the ordering API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                            - Liveness check
//! GET  /health/ready                      - Readiness check (database)
//!
//! # Catalog
//! GET  /api/v1/categories                 - Active categories
//! GET  /api/v1/categories/{slug}          - Category detail
//! GET  /api/v1/products?category=&search= - Active products
//! GET  /api/v1/products/{slug}            - Product detail
//! GET  /api/v1/promotions                 - Running promotions
//! GET  /api/v1/promotions/{id}            - Promotion detail
//!
//! # Cart (bearer token or X-Session-ID)
//! GET    /api/v1/cart                     - Current cart
//! DELETE /api/v1/cart                     - Empty the cart
//! POST   /api/v1/cart/items               - Add a line
//! PUT    /api/v1/cart/items/{product_id}  - Change a line
//! DELETE /api/v1/cart/items/{product_id}  - Remove a line
//!
//! # Orders
//! POST /api/v1/orders                     - Checkout
//! GET  /api/v1/orders                     - Order history
//! GET  /api/v1/orders/{id}                - Order detail
//! POST /api/v1/orders/{id}/cancel         - Cancel
//!
//! # Admin (admin bearer token)
//! PUT  /api/v1/admin/orders/{id}/status   - Advance an order
//!
//! # Mood quiz
//! GET  /api/v1/mood/questions             - Active questions
//! POST /api/v1/mood/recommend             - Run the recommender
//! GET  /api/v1/mood/history               - Past recommendation sessions
//! ```

pub mod admin;
pub mod cart;
pub mod catalog;
pub mod mood;
pub mod orders;

use std::str::FromStr;

use axum::{
    Json, Router,
    extract::{FromRequest, Request, State, rejection::JsonRejection},
    http::{HeaderName, HeaderValue, Method, StatusCode, header},
    routing::get,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::error::AppError;
use crate::middleware::{RateLimiterLayer, SESSION_HEADER};
use crate::state::AppState;

/// Optional layers the binary installs around parts of the API.
#[derive(Default)]
pub struct RouteLayers {
    /// Applied to every `/api/v1` route.
    pub api: Option<RateLimiterLayer>,
    /// Applied to `POST /mood/recommend` only.
    pub recommend: Option<RateLimiterLayer>,
}

/// Build the full router.
pub fn routes(layers: RouteLayers) -> Router<AppState> {
    let mut api = Router::new()
        .nest("/categories", catalog::category_routes())
        .nest("/products", catalog::product_routes())
        .nest("/promotions", catalog::promotion_routes())
        .nest("/cart", cart::routes())
        .nest("/orders", orders::routes())
        .nest("/admin", admin::routes())
        .nest("/mood", mood::routes(layers.recommend));

    if let Some(limiter) = layers.api {
        api = api.layer(limiter);
    }

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api/v1", api)
}

/// CORS for the browser client.
///
/// Unparseable origins are skipped with a warning.
#[must_use]
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(SESSION_HEADER),
        ])
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    let Some(pool) = state.pool() else {
        return StatusCode::OK;
    };
    match sqlx::query("SELECT 1").fetch_one(pool).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// JSON body extractor whose rejections use the API's error envelope.
pub struct Payload<T>(pub T);

impl<S, T> FromRequest<S> for Payload<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// Parse an id path segment, rejecting garbage with 400.
fn parse_id<T: FromStr>(raw: &str, what: &str) -> Result<T, AppError> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid {what} ID")))
}
