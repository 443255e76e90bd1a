//! HTTP API handlers for the matchmaker
//!
//! Response bodies keep the `status` strings existing clients poll for:
//! `match_found`, `waiting_for_match`, `success`, `failed` and `error`.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::{MatchId, ParticipantId};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, warn};

use crate::domain::Match;
use crate::engine::Matchmaker;
use crate::error::MatchmakingError;
use crate::result::{EndMatchOutcome, ParticipantSummary, SubmitOutcome};

#[derive(Clone)]
pub struct MatchmakerApiState {
    pub matchmaker: Arc<Matchmaker>,
}

impl MatchmakerApiState {
    pub fn new(matchmaker: Arc<Matchmaker>) -> Self {
        Self { matchmaker }
    }
}

/// Request to join the pool
#[derive(Debug, Default, Deserialize)]
pub struct SubmitRequest {
    #[serde(default, alias = "interest")]
    pub interests: Option<Vec<String>>,
    #[serde(default, alias = "user_id")]
    pub participant_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EndMatchRequest {
    #[serde(default)]
    pub match_id: Option<String>,
}

/// Participants are anonymous to each other, so the partner id is not exposed
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitResponse {
    MatchFound {
        user_id: ParticipantId,
        match_id: MatchId,
        similarity_score: f64,
        common_interests: Vec<String>,
    },
    WaitingForMatch {
        user_id: ParticipantId,
        message: String,
    },
}

impl From<SubmitOutcome> for SubmitResponse {
    fn from(outcome: SubmitOutcome) -> Self {
        match outcome {
            SubmitOutcome::MatchFound {
                participant_id,
                match_id,
                similarity_score,
                common_interests,
                ..
            } => SubmitResponse::MatchFound {
                user_id: participant_id,
                match_id,
                similarity_score,
                common_interests,
            },
            SubmitOutcome::Waiting { participant_id } => SubmitResponse::WaitingForMatch {
                user_id: participant_id,
                message: "Looking for someone with similar interests...".to_string(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WaitingResponse {
    pub waiting_users_count: usize,
}

#[derive(Debug, Serialize)]
pub struct ParticipantResponse {
    pub status: &'static str,
    pub participant: ParticipantSummary,
}

#[derive(Debug, Serialize)]
pub struct MatchResponse {
    pub status: &'static str,
    #[serde(rename = "match")]
    pub record: Match,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Matchmaking(MatchmakingError),
}

impl From<MatchmakingError> for ApiError {
    fn from(e: MatchmakingError) -> Self {
        ApiError::Matchmaking(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, "error", message),
            ApiError::Matchmaking(MatchmakingError::InvalidInput(message)) => {
                (StatusCode::BAD_REQUEST, "error", message)
            }
            ApiError::Matchmaking(e) if e.is_not_found() => {
                (StatusCode::NOT_FOUND, "failed", e.to_string())
            }
            ApiError::Matchmaking(e) => {
                error!(error = %e, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "error", e.to_string())
            }
        };

        (code, Json(json!({ "status": status, "message": message }))).into_response()
    }
}

/// Submit interests: match immediately or wait
pub async fn submit_match(
    State(state): State<MatchmakerApiState>,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let Json(req) = payload?;
    let participant_id = req
        .participant_id
        .filter(|id| !id.trim().is_empty())
        .map(ParticipantId::from);

    let outcome = state
        .matchmaker
        .submit(req.interests.unwrap_or_default(), participant_id)
        .await?;

    Ok(Json(outcome.into()))
}

pub async fn end_match(
    State(state): State<MatchmakerApiState>,
    payload: Result<Json<EndMatchRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(req) = payload?;
    let match_id = req
        .match_id
        .filter(|id| !id.trim().is_empty())
        .map(MatchId::from)
        .ok_or_else(|| ApiError::BadRequest("Match ID required".to_string()))?;

    match state.matchmaker.end_match(&match_id).await {
        Ok(EndMatchOutcome::Ended { .. }) => Ok(Json(json!({ "status": "success" }))),
        Ok(EndMatchOutcome::AlreadyEnded { .. }) => Ok(Json(json!({
            "status": "success",
            "message": "Match already ended"
        }))),
        Err(e) => {
            warn!(match_id = %match_id, error = %e, "End match failed");
            Err(e.into())
        }
    }
}

pub async fn waiting_users(State(state): State<MatchmakerApiState>) -> Json<WaitingResponse> {
    Json(WaitingResponse {
        waiting_users_count: state.matchmaker.waiting_count().await,
    })
}

pub async fn get_participant(
    State(state): State<MatchmakerApiState>,
    Path(id): Path<String>,
) -> Result<Json<ParticipantResponse>, ApiError> {
    let participant = state
        .matchmaker
        .participant_status(&ParticipantId::from(id))
        .await?;

    Ok(Json(ParticipantResponse {
        status: "success",
        participant,
    }))
}

pub async fn get_match(
    State(state): State<MatchmakerApiState>,
    Path(id): Path<String>,
) -> Result<Json<MatchResponse>, ApiError> {
    let record = state.matchmaker.get_match(&MatchId::from(id)).await?;

    Ok(Json(MatchResponse {
        status: "success",
        record,
    }))
}

pub async fn stats(State(state): State<MatchmakerApiState>) -> Json<serde_json::Value> {
    let matchmaker = &state.matchmaker;
    Json(json!({
        "service": "matchmaker",
        "provider": matchmaker.provider_name(),
        "store": matchmaker.store().name(),
        "metrics": matchmaker.metrics(),
    }))
}

/// Health check, including a store ping
pub async fn health(State(state): State<MatchmakerApiState>) -> Response {
    let store = state.matchmaker.store();
    match store.ping().await {
        Ok(()) => Json(json!({
            "status": "healthy",
            "service": "matchmaker",
            "store": store.name()
        }))
        .into_response(),
        Err(e) => {
            warn!(error = %e, "Store ping failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": "matchmaker",
                    "store": store.name(),
                    "error": e.to_string()
                })),
            )
                .into_response()
        }
    }
}
