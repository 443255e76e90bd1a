//! In-memory store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{MatchId, ParticipantId};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::{Match, MatchStatus, ParticipantRecord, ParticipantStatus};
use crate::store::traits::{MatchmakingStore, StoreError, StoreResult};

/// Keeps every record in process memory. Nothing survives a restart.
#[derive(Default)]
pub struct InMemoryStore {
    participants: RwLock<HashMap<ParticipantId, ParticipantRecord>>,
    matches: RwLock<HashMap<MatchId, Match>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn participant_count(&self) -> usize {
        self.participants.read().await.len()
    }

    pub async fn match_count(&self) -> usize {
        self.matches.read().await.len()
    }
}

#[async_trait]
impl MatchmakingStore for InMemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn put_participant(&self, record: ParticipantRecord) -> StoreResult<()> {
        debug!(participant_id = %record.id, status = %record.status, "Storing participant");
        self.participants
            .write()
            .await
            .insert(record.id.clone(), record);
        Ok(())
    }

    async fn update_participant_status(
        &self,
        id: &ParticipantId,
        status: ParticipantStatus,
        current_match_id: Option<MatchId>,
        last_active: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut participants = self.participants.write().await;
        let record = participants
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("participant {}", id)))?;

        record.status = status;
        record.current_match_id = current_match_id;
        record.last_active = last_active;
        Ok(())
    }

    async fn get_participant(&self, id: &ParticipantId) -> StoreResult<Option<ParticipantRecord>> {
        Ok(self.participants.read().await.get(id).cloned())
    }

    async fn put_match(&self, record: Match) -> StoreResult<()> {
        debug!(match_id = %record.id, "Storing match");
        self.matches.write().await.insert(record.id.clone(), record);
        Ok(())
    }

    async fn update_match_status(
        &self,
        id: &MatchId,
        status: MatchStatus,
        ended_at: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        let mut matches = self.matches.write().await;
        let record = matches
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("match {}", id)))?;

        record.status = status;
        record.ended_at = ended_at;
        Ok(())
    }

    async fn get_match(&self, id: &MatchId) -> StoreResult<Option<Match>> {
        Ok(self.matches.read().await.get(id).cloned())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
