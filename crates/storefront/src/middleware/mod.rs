//! HTTP middleware stack for the storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. CORS
//! 5. Rate limiting (governor, binary only)
//!
//! Caller identity is not a layer: handlers pull it with the [`Identity`]
//! and [`RequireAdmin`] extractors.

pub mod identity;
pub mod rate_limit;
pub mod request_id;

pub use identity::{Claims, Identity, RequireAdmin, SESSION_HEADER};
pub use rate_limit::{RateLimiterLayer, api_rate_limiter, recommend_rate_limiter};
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
