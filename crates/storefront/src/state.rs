//! Application state shared across handlers.

use std::sync::Arc;

use jsonwebtoken::DecodingKey;
use secrecy::ExposeSecret;
use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::db::{self, AiSessionStore, CartStore, CatalogStore, OrderStore};
use crate::gemini::{GeminiClient, GeminiError};
use crate::services::{PaymentProvider, ReasoningService, StubPaymentProvider};

/// The stores and external services a request may need.
pub struct Collaborators {
    pub catalog: Arc<dyn CatalogStore>,
    pub carts: Arc<dyn CartStore>,
    pub orders: Arc<dyn OrderStore>,
    pub ai_sessions: Arc<dyn AiSessionStore>,
    pub payments: Arc<dyn PaymentProvider>,
    pub reasoning: Arc<dyn ReasoningService>,
}

impl Collaborators {
    /// In-memory carts, orders and sessions with the stub payment provider.
    #[must_use]
    pub fn in_memory(
        catalog: Arc<dyn CatalogStore>,
        reasoning: Arc<dyn ReasoningService>,
    ) -> Self {
        Self {
            catalog,
            carts: db::carts::memory(),
            orders: db::orders::memory(),
            ai_sessions: db::ai_sessions::memory(),
            payments: Arc::new(StubPaymentProvider),
            reasoning,
        }
    }
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like stores, external clients and the token key.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    parts: Collaborators,
    jwt_key: DecodingKey,
    pool: Option<PgPool>,
}

impl AppState {
    /// Create the production state: `PostgreSQL` stores, the stub payment
    /// provider and the Gemini client.
    ///
    /// # Errors
    ///
    /// Returns an error if the Gemini client cannot be built.
    pub fn new(config: &StorefrontConfig, pool: PgPool) -> Result<Self, GeminiError> {
        let timeout = config.store_timeout;
        let parts = Collaborators {
            catalog: db::catalog::postgres(pool.clone(), timeout),
            carts: db::carts::postgres(pool.clone(), timeout),
            orders: db::orders::postgres(pool.clone(), timeout),
            ai_sessions: db::ai_sessions::postgres(pool.clone(), timeout),
            payments: Arc::new(StubPaymentProvider),
            reasoning: Arc::new(GeminiClient::new(&config.gemini)?),
        };

        Ok(Self::with_collaborators(
            parts,
            config.jwt_secret.expose_secret().as_bytes(),
            Some(pool),
        ))
    }

    /// Assemble state from explicit collaborators.
    ///
    /// Without a pool, readiness checks always pass.
    #[must_use]
    pub fn with_collaborators(parts: Collaborators, jwt_secret: &[u8], pool: Option<PgPool>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                parts,
                jwt_key: DecodingKey::from_secret(jwt_secret),
                pool,
            }),
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &dyn CatalogStore {
        self.inner.parts.catalog.as_ref()
    }

    #[must_use]
    pub fn carts(&self) -> &dyn CartStore {
        self.inner.parts.carts.as_ref()
    }

    #[must_use]
    pub fn orders(&self) -> &dyn OrderStore {
        self.inner.parts.orders.as_ref()
    }

    #[must_use]
    pub fn ai_sessions(&self) -> &dyn AiSessionStore {
        self.inner.parts.ai_sessions.as_ref()
    }

    #[must_use]
    pub fn payments(&self) -> &dyn PaymentProvider {
        self.inner.parts.payments.as_ref()
    }

    #[must_use]
    pub fn reasoning(&self) -> &dyn ReasoningService {
        self.inner.parts.reasoning.as_ref()
    }

    /// Key for verifying HS256 bearer tokens.
    #[must_use]
    pub fn jwt_key(&self) -> &DecodingKey {
        &self.inner.jwt_key
    }

    /// Get a reference to the database connection pool, if one is in use.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }
}
