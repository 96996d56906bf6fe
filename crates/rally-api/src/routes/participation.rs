//! Participant calls against the running event.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use rally_core::ids::{CommunityId, ParticipantId};
use rally_events::domain::outcomes::{ActionOutcome, ContributionOutcome};
use serde::Deserialize;
use tracing::instrument;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /contribute.
#[derive(Debug, Deserialize)]
pub struct ContributeRequest {
    /// Target community.
    pub community: CommunityId,
    /// Event the participant believes is running.
    pub event_id: String,
    /// Contributor.
    pub participant: ParticipantId,
    /// Requested contribution.
    pub amount: u64,
}

/// Request body for POST /actions/execute.
#[derive(Debug, Deserialize)]
pub struct ExecuteActionRequest {
    /// Target community.
    pub community: CommunityId,
    /// Event the participant believes is running.
    pub event_id: String,
    /// Actor.
    pub participant: ParticipantId,
    /// Index into the event's action list.
    pub action_index: usize,
}

/// POST /contribute
#[instrument(skip(state, request), fields(community = %request.community, participant = %request.participant))]
async fn contribute(
    State(state): State<AppState>,
    Json(request): Json<ContributeRequest>,
) -> Result<Json<ContributionOutcome>, ApiError> {
    match state
        .engine
        .contribute(
            request.community,
            &request.event_id,
            request.participant,
            request.amount,
        )
        .await?
    {
        ContributionOutcome::Rejected(rejection) => Err(rejection.into()),
        applied => Ok(Json(applied)),
    }
}

/// POST /actions/execute
#[instrument(skip(state, request), fields(community = %request.community, participant = %request.participant))]
async fn execute_action(
    State(state): State<AppState>,
    Json(request): Json<ExecuteActionRequest>,
) -> Result<Json<ActionOutcome>, ApiError> {
    match state
        .engine
        .execute_action(
            request.community,
            &request.event_id,
            request.participant,
            request.action_index,
        )
        .await?
    {
        ActionOutcome::Rejected(rejection) => Err(rejection.into()),
        executed => Ok(Json(executed)),
    }
}

/// Returns the router for participant calls.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/contribute", post(contribute))
        .route("/actions/execute", post(execute_action))
}
