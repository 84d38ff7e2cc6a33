//! Mood quiz and AI recommendations.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use crate::error::{Envelope, Result, ok};
use crate::middleware::{Identity, RateLimiterLayer};
use crate::models::MoodAnswer;
use crate::services::{Recommendation, RecommendationService};
use crate::state::AppState;

use super::Payload;

/// Quiz routes. `limiter` guards only the model-backed endpoint.
pub fn routes(limiter: Option<RateLimiterLayer>) -> Router<AppState> {
    let mut recommend_route = Router::new().route("/recommend", post(recommend));
    if let Some(limiter) = limiter {
        recommend_route = recommend_route.layer(limiter);
    }

    Router::new()
        .route("/questions", get(questions))
        .route("/history", get(history))
        .merge(recommend_route)
}

#[derive(Debug, Deserialize)]
pub struct RecommendRequest {
    pub answers: Vec<MoodAnswer>,
}

fn service(state: &AppState) -> RecommendationService<'_> {
    RecommendationService::new(state.catalog(), state.ai_sessions(), state.reasoning())
}

async fn questions(State(state): State<AppState>) -> Result<Json<Envelope<Value>>> {
    let questions = service(&state).questions().await?;
    Ok(ok(json!({ "questions": questions })))
}

#[instrument(skip_all, fields(answers = req.answers.len()))]
async fn recommend(
    State(state): State<AppState>,
    identity: Identity,
    Payload(req): Payload<RecommendRequest>,
) -> Result<Json<Envelope<Recommendation>>> {
    Ok(ok(service(&state)
        .recommend(identity.owner(), &req.answers)
        .await?))
}

async fn history(State(state): State<AppState>, identity: Identity) -> Result<Json<Envelope<Value>>> {
    let sessions = service(&state).history(identity.owner()).await?;
    Ok(ok(json!({ "sessions": sessions })))
}
