//! Store trait for the matchmaker
//!
//! The store is a durable mirror. Matching decisions never read from it;
//! only `end_match`, status lookups and the health check do.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{MatchId, ParticipantId};

use crate::domain::{Match, MatchStatus, ParticipantRecord, ParticipantStatus};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Redis error: {0}")]
    RedisError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Store error: {0}")]
    Other(String),
}

impl StoreError {
    /// Errors that retrying the same write cannot fix
    pub fn is_permanent(&self) -> bool {
        matches!(self, StoreError::NotFound(_) | StoreError::SerializationError(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MatchmakingStore: Send + Sync {
    fn name(&self) -> &'static str;

    // ------------------------------------------------------------------------
    // Participants
    // ------------------------------------------------------------------------

    async fn put_participant(&self, record: ParticipantRecord) -> StoreResult<()>;

    /// Fails with [`StoreError::NotFound`] if the participant was never written
    async fn update_participant_status(
        &self,
        id: &ParticipantId,
        status: ParticipantStatus,
        current_match_id: Option<MatchId>,
        last_active: DateTime<Utc>,
    ) -> StoreResult<()>;

    async fn get_participant(&self, id: &ParticipantId) -> StoreResult<Option<ParticipantRecord>>;

    // ------------------------------------------------------------------------
    // Matches
    // ------------------------------------------------------------------------

    async fn put_match(&self, record: Match) -> StoreResult<()>;

    async fn update_match_status(
        &self,
        id: &MatchId,
        status: MatchStatus,
        ended_at: Option<DateTime<Utc>>,
    ) -> StoreResult<()>;

    async fn get_match(&self, id: &MatchId) -> StoreResult<Option<Match>>;

    // ------------------------------------------------------------------------
    // Health
    // ------------------------------------------------------------------------

    async fn ping(&self) -> StoreResult<()>;
}
