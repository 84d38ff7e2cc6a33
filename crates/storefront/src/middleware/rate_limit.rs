//! Rate limiting middleware using governor and `tower_governor`.
//!
//! - `recommend_rate_limiter`: strict limits for the AI endpoint (~10/min),
//!   since every call costs a model request
//! - `api_rate_limiter`: relaxed limits for the rest of the API (~100/min)
//!
//! Both are keyed by client IP taken from proxy headers, so they are only
//! installed by the binary; routers built in tests run without them.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::Request;
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

// =============================================================================
// Custom IP Key Extractor for Cloudflare + Fly.io
// =============================================================================

/// Custom key extractor that checks Cloudflare's `CF-Connecting-IP` header first,
/// then falls back to standard proxy headers and finally the peer address.
#[derive(Clone, Copy)]
pub struct CloudflareIpKeyExtractor;

impl tower_governor::key_extractor::KeyExtractor for CloudflareIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        let headers = req.headers();

        // Try CF-Connecting-IP first (Cloudflare's real client IP)
        if let Some(ip) = headers
            .get("cf-connecting-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<IpAddr>().ok())
        {
            return Ok(ip);
        }

        // Try X-Forwarded-For (first IP in the chain)
        if let Some(ip) = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
        {
            return Ok(ip);
        }

        // Try X-Real-IP
        if let Some(ip) = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
        {
            return Ok(ip);
        }

        // Try Fly-Client-IP (Fly.io's header)
        if let Some(ip) = headers
            .get("fly-client-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
        {
            return Ok(ip);
        }

        // Direct connections (local development, no proxy in front)
        if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
            return Ok(addr.ip());
        }

        Err(GovernorError::UnableToExtractKey)
    }
}

// =============================================================================
// Rate Limiter Configuration
// =============================================================================

/// Rate limiter layer type for Axum.
///
/// Uses `CloudflareIpKeyExtractor` to get the real client IP from Cloudflare
/// and Fly.io proxy headers.
pub type RateLimiterLayer =
    GovernorLayer<CloudflareIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

fn limiter(replenish_secs: u64, burst: u32) -> Option<RateLimiterLayer> {
    let config = GovernorConfigBuilder::default()
        .key_extractor(CloudflareIpKeyExtractor)
        .per_second(replenish_secs)
        .burst_size(burst)
        .finish()?;
    Some(GovernorLayer::new(Arc::new(config)))
}

/// Rate limiter for `POST /api/v1/mood/recommend`: ~10 requests per minute
/// per IP.
///
/// Configuration: 1 request every 6 seconds (replenish), burst of 5.
/// Returns `None` only if governor rejects the quota.
#[must_use]
pub fn recommend_rate_limiter() -> Option<RateLimiterLayer> {
    limiter(6, 5)
}

/// Rate limiter for general API: ~100 requests per minute per IP.
///
/// Configuration: 1 request per second (replenish), burst of 50.
#[must_use]
pub fn api_rate_limiter() -> Option<RateLimiterLayer> {
    limiter(1, 50)
}
