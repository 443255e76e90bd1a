//! HTTP routes for the matchmaker API

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::*;

/// Create the matchmaker router
///
/// Routes:
/// - POST /api/v1/match (alias /process_match)      - Submit interests
/// - POST /api/v1/match/end (alias /end_match)      - End a match
/// - GET  /api/v1/waiting (alias /waiting_users)    - Waiting pool size
/// - GET  /api/v1/participants/:id                  - Participant status
/// - GET  /api/v1/matches/:id                       - Match record
/// - GET  /api/v1/stats                             - Engine metrics
/// - GET  /api/v1/matchmaker/health                 - Health check with store ping
pub fn create_router(state: MatchmakerApiState) -> Router {
    Router::new()
        .route("/api/v1/matchmaker/health", get(health))
        .route("/api/v1/match", post(submit_match))
        .route("/process_match", post(submit_match))
        .route("/api/v1/match/end", post(end_match))
        .route("/end_match", post(end_match))
        .route("/api/v1/waiting", get(waiting_users))
        .route("/waiting_users", get(waiting_users))
        .route("/api/v1/participants/:id", get(get_participant))
        .route("/api/v1/matches/:id", get(get_match))
        .route("/api/v1/stats", get(stats))
        .with_state(state)
}
