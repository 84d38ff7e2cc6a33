//! Append-only log of recommendation runs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;
use tokio::sync::Mutex;

use fastspot_core::{AiSessionId, OwnerKey};

use super::{RepositoryError, with_timeout};
use crate::models::{AiSession, MoodAnswer};

#[async_trait]
pub trait AiSessionStore: Send + Sync {
    async fn create(&self, session: &AiSession) -> Result<(), RepositoryError>;

    /// The owner's sessions, newest first.
    async fn find_by_owner(&self, owner: &OwnerKey) -> Result<Vec<AiSession>, RepositoryError>;
}

pub fn memory() -> Arc<dyn AiSessionStore> {
    Arc::new(MemoryAiSessionStore::default())
}

pub fn postgres(pool: PgPool, timeout: Duration) -> Arc<dyn AiSessionStore> {
    Arc::new(PostgresAiSessionStore { pool, timeout })
}

#[derive(Default)]
struct MemoryAiSessionStore {
    sessions: Mutex<Vec<AiSession>>,
}

#[async_trait]
impl AiSessionStore for MemoryAiSessionStore {
    async fn create(&self, session: &AiSession) -> Result<(), RepositoryError> {
        self.sessions.lock().await.push(session.clone());
        Ok(())
    }

    async fn find_by_owner(&self, owner: &OwnerKey) -> Result<Vec<AiSession>, RepositoryError> {
        let sessions = self.sessions.lock().await;
        let mut out: Vec<AiSession> = sessions
            .iter()
            .filter(|s| s.owner.as_ref() == Some(owner))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AiSessionRow {
    id: AiSessionId,
    owner_kind: Option<String>,
    owner_id: Option<String>,
    answers: Json<Vec<MoodAnswer>>,
    recommendations: Vec<String>,
    reasoning: String,
    created_at: DateTime<Utc>,
}

impl From<AiSessionRow> for AiSession {
    fn from(row: AiSessionRow) -> Self {
        let owner = row
            .owner_kind
            .zip(row.owner_id)
            .and_then(|(kind, id)| OwnerKey::from_parts(&kind, id));
        Self {
            id: row.id,
            owner,
            answers: row.answers.0,
            recommendations: row.recommendations,
            reasoning: row.reasoning,
            created_at: row.created_at,
        }
    }
}

struct PostgresAiSessionStore {
    pool: PgPool,
    timeout: Duration,
}

#[async_trait]
impl AiSessionStore for PostgresAiSessionStore {
    async fn create(&self, session: &AiSession) -> Result<(), RepositoryError> {
        with_timeout(self.timeout, async {
            sqlx::query(
                r"
                INSERT INTO ai_sessions
                    (id, owner_kind, owner_id, answers, recommendations, reasoning, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ",
            )
            .bind(session.id)
            .bind(session.owner.as_ref().map(OwnerKey::kind))
            .bind(session.owner.as_ref().map(OwnerKey::id))
            .bind(Json(&session.answers))
            .bind(&session.recommendations)
            .bind(&session.reasoning)
            .bind(session.created_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
        .await
    }

    async fn find_by_owner(&self, owner: &OwnerKey) -> Result<Vec<AiSession>, RepositoryError> {
        with_timeout(self.timeout, async {
            let rows = sqlx::query_as::<_, AiSessionRow>(
                r"
                SELECT id, owner_kind, owner_id, answers, recommendations, reasoning, created_at
                FROM ai_sessions
                WHERE owner_kind = $1 AND owner_id = $2
                ORDER BY created_at DESC
                ",
            )
            .bind(owner.kind())
            .bind(owner.id())
            .fetch_all(&self.pool)
            .await?;
            Ok(rows.into_iter().map(AiSession::from).collect())
        })
        .await
    }
}
