//! HTTP API for the matchmaker

pub mod handlers;
pub mod routes;

pub use handlers::{ApiError, MatchmakerApiState};
pub use routes::create_router;
