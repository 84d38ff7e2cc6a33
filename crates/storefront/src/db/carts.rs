//! Cart persistence with version-checked writes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::types::Json;
use tokio::sync::Mutex;

use fastspot_core::{CartId, OwnerKey};

use super::{RepositoryError, corrupt, map_unique_violation, with_timeout};
use crate::models::{Cart, CartLine};

#[async_trait]
pub trait CartStore: Send + Sync {
    async fn find_by_owner(&self, owner: &OwnerKey) -> Result<Option<Cart>, RepositoryError>;

    /// Insert a new cart and return it at version 1.
    ///
    /// Fails with `Conflict` if the owner already has a cart.
    async fn create(&self, cart: &Cart) -> Result<Cart, RepositoryError>;

    /// Overwrite the stored cart if its version still equals `cart.version`.
    /// Returns the cart at its new version.
    ///
    /// A cart that is gone or was superseded is a `Conflict`, like a stale
    /// version.
    async fn replace(&self, cart: &Cart) -> Result<Cart, RepositoryError>;
}

pub fn memory() -> Arc<dyn CartStore> {
    Arc::new(MemoryCartStore::default())
}

pub fn postgres(pool: PgPool, timeout: Duration) -> Arc<dyn CartStore> {
    Arc::new(PostgresCartStore { pool, timeout })
}

fn stale(id: CartId) -> RepositoryError {
    RepositoryError::Conflict(format!("cart {id} was modified concurrently"))
}

// =============================================================================
// In-memory
// =============================================================================

#[derive(Default)]
struct MemoryCartStore {
    carts: Mutex<HashMap<OwnerKey, Cart>>,
}

#[async_trait]
impl CartStore for MemoryCartStore {
    async fn find_by_owner(&self, owner: &OwnerKey) -> Result<Option<Cart>, RepositoryError> {
        Ok(self.carts.lock().await.get(owner).cloned())
    }

    async fn create(&self, cart: &Cart) -> Result<Cart, RepositoryError> {
        let mut carts = self.carts.lock().await;
        if carts.contains_key(&cart.owner) {
            return Err(RepositoryError::Conflict("cart already exists".to_string()));
        }
        let stored = Cart {
            version: 1,
            ..cart.clone()
        };
        carts.insert(stored.owner.clone(), stored.clone());
        Ok(stored)
    }

    async fn replace(&self, cart: &Cart) -> Result<Cart, RepositoryError> {
        let mut carts = self.carts.lock().await;
        let current = carts
            .get_mut(&cart.owner)
            .filter(|c| c.id == cart.id && c.version == cart.version)
            .ok_or_else(|| stale(cart.id))?;
        *current = Cart {
            version: cart.version + 1,
            ..cart.clone()
        };
        Ok(current.clone())
    }
}

// =============================================================================
// PostgreSQL
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    id: CartId,
    owner_kind: String,
    owner_id: String,
    lines: Json<Vec<CartLine>>,
    total: Decimal,
    currency: String,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CartRow> for Cart {
    type Error = RepositoryError;

    fn try_from(row: CartRow) -> Result<Self, Self::Error> {
        let owner = OwnerKey::from_parts(&row.owner_kind, row.owner_id)
            .ok_or_else(|| corrupt("carts.owner_kind", &row.owner_kind))?;
        Ok(Self {
            id: row.id,
            owner,
            lines: row.lines.0,
            total: row.total,
            currency: row.currency.parse().map_err(|e| corrupt("carts.currency", e))?,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

struct PostgresCartStore {
    pool: PgPool,
    timeout: Duration,
}

#[async_trait]
impl CartStore for PostgresCartStore {
    async fn find_by_owner(&self, owner: &OwnerKey) -> Result<Option<Cart>, RepositoryError> {
        with_timeout(self.timeout, async {
            let row = sqlx::query_as::<_, CartRow>(
                r"
                SELECT id, owner_kind, owner_id, lines, total, currency, version,
                       created_at, updated_at
                FROM carts
                WHERE owner_kind = $1 AND owner_id = $2
                ",
            )
            .bind(owner.kind())
            .bind(owner.id())
            .fetch_optional(&self.pool)
            .await?;
            row.map(Cart::try_from).transpose()
        })
        .await
    }

    async fn create(&self, cart: &Cart) -> Result<Cart, RepositoryError> {
        with_timeout(self.timeout, async {
            sqlx::query(
                r"
                INSERT INTO carts
                    (id, owner_kind, owner_id, lines, total, currency, version,
                     created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, 1, $7, $8)
                ",
            )
            .bind(cart.id)
            .bind(cart.owner.kind())
            .bind(cart.owner.id())
            .bind(Json(&cart.lines))
            .bind(cart.total)
            .bind(cart.currency.code())
            .bind(cart.created_at)
            .bind(cart.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, "cart"))?;

            Ok(Cart {
                version: 1,
                ..cart.clone()
            })
        })
        .await
    }

    async fn replace(&self, cart: &Cart) -> Result<Cart, RepositoryError> {
        with_timeout(self.timeout, async {
            let version: Option<i64> = sqlx::query_scalar(
                r"
                UPDATE carts
                SET lines = $1, total = $2, updated_at = $3, version = version + 1
                WHERE id = $4 AND version = $5
                RETURNING version
                ",
            )
            .bind(Json(&cart.lines))
            .bind(cart.total)
            .bind(cart.updated_at)
            .bind(cart.id)
            .bind(cart.version)
            .fetch_optional(&self.pool)
            .await?;

            let version = version.ok_or_else(|| stale(cart.id))?;
            Ok(Cart {
                version,
                ..cart.clone()
            })
        })
        .await
    }
}
