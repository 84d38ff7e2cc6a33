//! Order persistence.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::types::Json;
use tokio::sync::Mutex;

use fastspot_core::{OrderId, OwnerKey};

use super::{RepositoryError, corrupt, map_unique_violation, with_timeout};
use crate::models::{CustomerInfo, Delivery, Order, OrderItem, Payment};

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert a new order and return it at version 1.
    async fn create(&self, order: &Order) -> Result<Order, RepositoryError>;

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// The owner's orders, newest first.
    async fn find_by_owner(&self, owner: &OwnerKey) -> Result<Vec<Order>, RepositoryError>;

    /// Overwrite status, payment and delivery if the version still matches.
    async fn replace(&self, order: &Order) -> Result<Order, RepositoryError>;
}

pub fn memory() -> Arc<dyn OrderStore> {
    Arc::new(MemoryOrderStore::default())
}

pub fn postgres(pool: PgPool, timeout: Duration) -> Arc<dyn OrderStore> {
    Arc::new(PostgresOrderStore { pool, timeout })
}

fn stale(id: OrderId) -> RepositoryError {
    RepositoryError::Conflict(format!("order {id} was modified concurrently"))
}

// =============================================================================
// In-memory
// =============================================================================

#[derive(Default)]
struct MemoryOrderStore {
    orders: Mutex<HashMap<OrderId, Order>>,
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn create(&self, order: &Order) -> Result<Order, RepositoryError> {
        let mut orders = self.orders.lock().await;
        if orders
            .values()
            .any(|o| o.id == order.id || o.order_number == order.order_number)
        {
            return Err(RepositoryError::Conflict("order already exists".to_string()));
        }
        let stored = Order {
            version: 1,
            ..order.clone()
        };
        orders.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.orders.lock().await.get(&id).cloned())
    }

    async fn find_by_owner(&self, owner: &OwnerKey) -> Result<Vec<Order>, RepositoryError> {
        let orders = self.orders.lock().await;
        let mut out: Vec<Order> = orders
            .values()
            .filter(|o| &o.owner == owner)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn replace(&self, order: &Order) -> Result<Order, RepositoryError> {
        let mut orders = self.orders.lock().await;
        let current = orders.get_mut(&order.id).ok_or(RepositoryError::NotFound)?;
        if current.version != order.version {
            return Err(stale(order.id));
        }
        *current = Order {
            version: order.version + 1,
            ..order.clone()
        };
        Ok(current.clone())
    }
}

// =============================================================================
// PostgreSQL
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    owner_kind: String,
    owner_id: String,
    order_number: String,
    items: Json<Vec<OrderItem>>,
    total: Decimal,
    currency: String,
    status: String,
    payment: Json<Payment>,
    delivery: Json<Delivery>,
    customer: Json<CustomerInfo>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let owner = OwnerKey::from_parts(&row.owner_kind, row.owner_id)
            .ok_or_else(|| corrupt("orders.owner_kind", &row.owner_kind))?;
        Ok(Self {
            id: row.id,
            owner,
            order_number: row.order_number,
            items: row.items.0,
            total: row.total,
            currency: row.currency.parse().map_err(|e| corrupt("orders.currency", e))?,
            status: row.status.parse().map_err(|e| corrupt("orders.status", e))?,
            payment: row.payment.0,
            delivery: row.delivery.0,
            customer: row.customer.0,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const ORDER_COLUMNS: &str = "id, owner_kind, owner_id, order_number, items, total, currency, \
     status, payment, delivery, customer, version, created_at, updated_at";

struct PostgresOrderStore {
    pool: PgPool,
    timeout: Duration,
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn create(&self, order: &Order) -> Result<Order, RepositoryError> {
        with_timeout(self.timeout, async {
            sqlx::query(
                r"
                INSERT INTO orders
                    (id, owner_kind, owner_id, order_number, items, total, currency,
                     status, payment, delivery, customer, version, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 1, $12, $13)
                ",
            )
            .bind(order.id)
            .bind(order.owner.kind())
            .bind(order.owner.id())
            .bind(&order.order_number)
            .bind(Json(&order.items))
            .bind(order.total)
            .bind(order.currency.code())
            .bind(order.status.as_str())
            .bind(Json(&order.payment))
            .bind(Json(&order.delivery))
            .bind(Json(&order.customer))
            .bind(order.created_at)
            .bind(order.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, "order"))?;

            Ok(Order {
                version: 1,
                ..order.clone()
            })
        })
        .await
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        with_timeout(self.timeout, async {
            let row = sqlx::query_as::<_, OrderRow>(&sql)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
            row.map(Order::try_from).transpose()
        })
        .await
    }

    async fn find_by_owner(&self, owner: &OwnerKey) -> Result<Vec<Order>, RepositoryError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE owner_kind = $1 AND owner_id = $2 \
             ORDER BY created_at DESC"
        );
        with_timeout(self.timeout, async {
            let rows = sqlx::query_as::<_, OrderRow>(&sql)
                .bind(owner.kind())
                .bind(owner.id())
                .fetch_all(&self.pool)
                .await?;
            rows.into_iter().map(Order::try_from).collect()
        })
        .await
    }

    async fn replace(&self, order: &Order) -> Result<Order, RepositoryError> {
        with_timeout(self.timeout, async {
            let version: Option<i64> = sqlx::query_scalar(
                r"
                UPDATE orders
                SET status = $1, payment = $2, delivery = $3, updated_at = $4,
                    version = version + 1
                WHERE id = $5 AND version = $6
                RETURNING version
                ",
            )
            .bind(order.status.as_str())
            .bind(Json(&order.payment))
            .bind(Json(&order.delivery))
            .bind(order.updated_at)
            .bind(order.id)
            .bind(order.version)
            .fetch_optional(&self.pool)
            .await?;

            let version = version.ok_or_else(|| stale(order.id))?;
            Ok(Order {
                version,
                ..order.clone()
            })
        })
        .await
    }
}
