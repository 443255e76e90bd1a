//! Matchmaking error types

use common::{MatchId, ParticipantId};
use thiserror::Error;

use crate::embedding::EmbeddingError;
use crate::store::StoreError;

/// Errors returned by the public [`Matchmaker`](crate::Matchmaker) operations
#[derive(Error, Debug)]
pub enum MatchmakingError {
    /// Missing, empty or oversized interests
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The embedding provider failed or timed out; nothing was mutated
    #[error("Embedding failure: {0}")]
    EmbeddingFailure(#[from] EmbeddingError),

    #[error("Participant not found: {0}")]
    ParticipantNotFound(ParticipantId),

    #[error("Match not found: {0}")]
    MatchNotFound(MatchId),

    /// A synchronous store read failed
    #[error("Persistence failure: {0}")]
    PersistenceFailure(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MatchmakingError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            MatchmakingError::ParticipantNotFound(_) | MatchmakingError::MatchNotFound(_)
        )
    }
}

pub type MatchmakingResult<T> = std::result::Result<T, MatchmakingError>;
