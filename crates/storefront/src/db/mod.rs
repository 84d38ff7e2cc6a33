//! Persistence for the storefront.
//!
//! Every store is an object-safe `async_trait` with two implementations:
//! an in-memory one (`memory()`) used by tests and local runs, and a
//! `PostgreSQL` one (`postgres(pool, timeout)`).
//!
//! # Tables
//!
//! - `categories`, `products`, `mood_questions` - read-only catalog
//! - `carts` - one row per owner, lines as JSONB
//! - `orders` - items, payment, delivery and customer as JSONB
//! - `ai_sessions` - append-only recommendation log
//!
//! Carts and orders carry a `version` column. Writes are conditional on the
//! version the caller read, so a stale writer gets
//! [`RepositoryError::Conflict`] instead of silently overwriting.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p fastspot-cli -- migrate
//! ```

pub mod ai_sessions;
pub mod carts;
pub mod catalog;
pub mod orders;

use std::future::Future;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use ai_sessions::AiSessionStore;
pub use carts::CartStore;
pub use catalog::{CatalogStore, MemoryCatalogStore};
pub use orders::OrderStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Unique constraint hit or a version check failed.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The store did not answer within the configured limit.
    #[error("store call timed out")]
    Timeout,
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Bound a store call by `limit`.
pub(crate) async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T, RepositoryError>
where
    F: Future<Output = Result<T, RepositoryError>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| RepositoryError::Timeout)?
}

/// Map a unique-constraint violation to [`RepositoryError::Conflict`].
pub(crate) fn map_unique_violation(err: sqlx::Error, what: &str) -> RepositoryError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepositoryError::Conflict(format!("{what} already exists"))
        }
        _ => RepositoryError::Database(err),
    }
}

fn corrupt(what: &str, err: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::DataCorruption(format!("{what}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_passes_result_through() {
        let out = with_timeout(Duration::from_secs(1), async { Ok::<_, RepositoryError>(7) }).await;
        assert!(matches!(out, Ok(7)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_expires() {
        let out = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, RepositoryError>(())
        })
        .await;
        assert!(matches!(out, Err(RepositoryError::Timeout)));
    }
}
