//! Operator commands: start, end, inspect and adjust events.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use rally_core::ids::{CommunityId, ParticipantId};
use rally_events::domain::outcomes::{
    ContributionOutcome, EndOutcome, EventStatus, GrantOutcome, StartOutcome,
};
use rally_registry::application::loader::ConfigIssue;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /start.
#[derive(Debug, Deserialize)]
pub struct StartRequest {
    /// Target community.
    pub community: CommunityId,
    /// Definition to start.
    pub event_id: String,
}

/// Request body for POST /end.
#[derive(Debug, Deserialize)]
pub struct EndRequest {
    /// Target community.
    pub community: CommunityId,
}

/// Request body for POST /grant-currency.
#[derive(Debug, Deserialize)]
pub struct GrantCurrencyRequest {
    /// Recipient.
    pub participant: ParticipantId,
    /// Amount to credit.
    pub amount: u64,
}

/// Request body for POST /add-progress.
#[derive(Debug, Deserialize)]
pub struct AddProgressRequest {
    /// Target community.
    pub community: CommunityId,
    /// Progress to add to the running event.
    pub amount: u64,
}

/// Response body for GET /status/{community}.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Community inspected.
    pub community: CommunityId,
    /// The running event, if any.
    pub event: Option<EventStatus>,
}

/// Query string for GET /effects/{community}/{name}.
#[derive(Debug, Deserialize)]
pub struct EffectQuery {
    /// Value returned when no running event sets the effect.
    #[serde(default = "neutral_effect")]
    pub default: f64,
}

fn neutral_effect() -> f64 {
    1.0
}

/// Response body for GET /effects/{community}/{name}.
#[derive(Debug, Serialize)]
pub struct EffectResponse {
    /// Community inspected.
    pub community: CommunityId,
    /// Effect looked up.
    pub name: String,
    /// Value in force right now.
    pub value: f64,
}

/// Response body for POST /registry/reload.
#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    /// Definitions now loaded.
    pub definitions: usize,
    /// Content hash of the loaded file.
    pub fingerprint: String,
    /// Definitions excluded from the new registry.
    pub issues: Vec<ConfigIssue>,
}

/// POST /start
#[instrument(skip(state, request), fields(community = %request.community, event_id = %request.event_id))]
async fn start(
    State(state): State<AppState>,
    Json(request): Json<StartRequest>,
) -> Result<Json<StartOutcome>, ApiError> {
    info!("handling operator start");
    match state.engine.start(request.community, &request.event_id).await? {
        StartOutcome::Rejected(rejection) => Err(rejection.into()),
        started => Ok(Json(started)),
    }
}

/// POST /end
#[instrument(skip(state, request), fields(community = %request.community))]
async fn end(
    State(state): State<AppState>,
    Json(request): Json<EndRequest>,
) -> Result<Json<EndOutcome>, ApiError> {
    info!("handling operator end");
    match state.engine.end(request.community).await? {
        EndOutcome::Rejected(rejection) => Err(rejection.into()),
        ended => Ok(Json(ended)),
    }
}

/// GET /status/{community}
async fn status(
    State(state): State<AppState>,
    Path(community): Path<u64>,
) -> Result<Json<StatusResponse>, ApiError> {
    let community = CommunityId(community);
    let event = state.engine.status(community).await?;
    Ok(Json(StatusResponse { community, event }))
}

/// GET /effects/{community}/{name}
async fn effect(
    State(state): State<AppState>,
    Path((community, name)): Path<(u64, String)>,
    Query(query): Query<EffectQuery>,
) -> Result<Json<EffectResponse>, ApiError> {
    let community = CommunityId(community);
    let value = state.engine.effect(community, &name, query.default).await?;
    Ok(Json(EffectResponse {
        community,
        name,
        value,
    }))
}

/// POST /grant-currency
#[instrument(skip(state, request), fields(participant = %request.participant, amount = request.amount))]
async fn grant_currency(
    State(state): State<AppState>,
    Json(request): Json<GrantCurrencyRequest>,
) -> Result<Json<GrantOutcome>, ApiError> {
    match state
        .engine
        .grant_currency(request.participant, request.amount)
        .await?
    {
        GrantOutcome::Rejected(rejection) => Err(rejection.into()),
        granted => Ok(Json(granted)),
    }
}

/// POST /add-progress
#[instrument(skip(state, request), fields(community = %request.community, amount = request.amount))]
async fn add_progress(
    State(state): State<AppState>,
    Json(request): Json<AddProgressRequest>,
) -> Result<Json<ContributionOutcome>, ApiError> {
    match state
        .engine
        .add_progress(request.community, request.amount)
        .await?
    {
        ContributionOutcome::Rejected(rejection) => Err(rejection.into()),
        applied => Ok(Json(applied)),
    }
}

/// POST /registry/reload
#[instrument(skip(state))]
async fn reload_registry(State(state): State<AppState>) -> Result<Json<ReloadResponse>, ApiError> {
    let issues = state.engine.reload_registry().await?;
    let registry = state.engine.registry();
    Ok(Json(ReloadResponse {
        definitions: registry.len(),
        fingerprint: registry.fingerprint().to_owned(),
        issues,
    }))
}

/// Returns the router for operator commands.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/start", post(start))
        .route("/end", post(end))
        .route("/status/{community}", get(status))
        .route("/effects/{community}/{name}", get(effect))
        .route("/grant-currency", post(grant_currency))
        .route("/add-progress", post(add_progress))
        .route("/registry/reload", post(reload_registry))
}
