//! Caller identity extractors.
//!
//! Requests identify their owner with an HS256 bearer token, an
//! `X-Session-ID` header, or neither:
//!
//! - [`Identity`] never rejects. A valid token wins over the session header;
//!   an invalid token is ignored.
//! - [`RequireAdmin`] rejects with 401 unless a valid token is present, and
//!   with 403 unless the token's role is `admin`.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use fastspot_core::OwnerKey;

use crate::error::{AppError, set_sentry_user};
use crate::state::AppState;

/// Header carrying a guest's opaque session id.
pub const SESSION_HEADER: &str = "x-session-id";

const ADMIN_ROLE: &str = "admin";

/// Bearer token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub role: String,
    /// Expiry, seconds since the epoch.
    pub exp: u64,
}

impl Claims {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenError {
    Missing,
    Malformed,
    Invalid,
}

impl TokenError {
    const fn message(self) -> &'static str {
        match self {
            Self::Missing => "Authorization header is required",
            Self::Malformed => "Invalid authorization format",
            Self::Invalid => "Invalid or expired token",
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        Self::Unauthorized(err.message().to_string())
    }
}

fn verify(parts: &Parts, key: &DecodingKey) -> Result<Claims, TokenError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or(TokenError::Missing)?
        .to_str()
        .map_err(|_| TokenError::Malformed)?;
    let token = header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(TokenError::Malformed)?;

    let claims = jsonwebtoken::decode::<Claims>(token, key, &Validation::new(Algorithm::HS256))
        .map_err(|e| {
            tracing::debug!(error = %e, "bearer token rejected");
            TokenError::Invalid
        })?
        .claims;

    if claims.user_id.trim().is_empty() {
        return Err(TokenError::Invalid);
    }
    set_sentry_user(&claims.user_id, claims.email.as_deref());
    Ok(claims)
}

fn session_id(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
}

/// The request's owner key, if any.
///
/// # Example
///
/// ```rust,ignore
/// async fn get_cart(State(state): State<AppState>, identity: Identity) -> Json<CartView> {
///     Json(CartService::new(state.catalog(), state.carts()).get(identity.owner()).await)
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity(pub Option<OwnerKey>);

impl Identity {
    #[must_use]
    pub const fn owner(&self) -> Option<&OwnerKey> {
        self.0.as_ref()
    }
}

impl FromRequestParts<AppState> for Identity {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user_id = verify(parts, state.jwt_key()).ok().map(|c| c.user_id);
        Ok(Self(OwnerKey::resolve(user_id.as_deref(), session_id(parts))))
    }
}

/// A caller whose token carries the `admin` role.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub Claims);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let claims = verify(parts, state.jwt_key())?;
        if !claims.is_admin() {
            tracing::warn!(user_id = %claims.user_id, "non-admin attempted admin route");
            return Err(AppError::Forbidden("Admin access required".to_string()));
        }
        Ok(Self(claims))
    }
}
