//! Routes for participant quests.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use rally_core::ids::{CommunityId, ParticipantId};
use rally_quests::domain::book::{Quest, QuestBook, QuestStats};
use rally_quests::domain::outcomes::ClaimOutcome;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /quests/init.
#[derive(Debug, Deserialize)]
pub struct InitQuestsRequest {
    /// Target community.
    pub community: CommunityId,
    /// The running event.
    pub event_id: String,
    /// Quest holder.
    pub participant: ParticipantId,
}

/// Request body for POST /quests/progress.
#[derive(Debug, Deserialize)]
pub struct QuestProgressRequest {
    /// Target community.
    pub community: CommunityId,
    /// The running event.
    pub event_id: String,
    /// Quest holder.
    pub participant: ParticipantId,
    /// Kind of action performed.
    pub action_type: String,
    /// How much of it.
    pub amount: u64,
}

/// Request body for POST /quests/claim.
#[derive(Debug, Deserialize)]
pub struct ClaimQuestRequest {
    /// Target community.
    pub community: CommunityId,
    /// The running event.
    pub event_id: String,
    /// Quest holder.
    pub participant: ParticipantId,
    /// Quest to claim.
    pub quest_id: String,
}

/// Response body for POST /quests/progress.
#[derive(Debug, Serialize)]
pub struct QuestProgressResponse {
    /// Quests this update completed.
    pub completed: Vec<Quest>,
}

/// POST /quests/init
#[instrument(skip(state, request), fields(community = %request.community, participant = %request.participant))]
async fn init_quests(
    State(state): State<AppState>,
    Json(request): Json<InitQuestsRequest>,
) -> Result<Json<QuestBook>, ApiError> {
    let definition = state
        .engine
        .active_definition(request.community, &request.event_id)
        .await??;
    let book = state
        .quests
        .init_quests(request.community, &definition, request.participant)
        .await?;
    Ok(Json(book))
}

/// POST /quests/progress
#[instrument(skip(state, request), fields(community = %request.community, participant = %request.participant))]
async fn update_progress(
    State(state): State<AppState>,
    Json(request): Json<QuestProgressRequest>,
) -> Result<Json<QuestProgressResponse>, ApiError> {
    let completed = state
        .quests
        .update_progress(
            request.community,
            &request.event_id,
            request.participant,
            &request.action_type,
            request.amount,
        )
        .await?;
    Ok(Json(QuestProgressResponse { completed }))
}

/// POST /quests/claim
#[instrument(skip(state, request), fields(community = %request.community, participant = %request.participant))]
async fn claim(
    State(state): State<AppState>,
    Json(request): Json<ClaimQuestRequest>,
) -> Result<Json<ClaimOutcome>, ApiError> {
    match state
        .quests
        .claim(
            request.community,
            &request.event_id,
            request.participant,
            &request.quest_id,
        )
        .await?
    {
        ClaimOutcome::Rejected(rejection) => Err(rejection.into()),
        claimed => Ok(Json(claimed)),
    }
}

/// GET /quests/stats/{community}/{event_id}/{participant}
async fn stats(
    State(state): State<AppState>,
    Path((community, event_id, participant)): Path<(u64, String, u64)>,
) -> Result<Json<QuestStats>, ApiError> {
    let stats = state
        .quests
        .stats(
            CommunityId(community),
            &event_id,
            ParticipantId(participant),
        )
        .await?;
    Ok(Json(stats))
}

/// Returns the router for quests.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/init", post(init_quests))
        .route("/progress", post(update_progress))
        .route("/claim", post(claim))
        .route("/stats/{community}/{event_id}/{participant}", get(stats))
}
