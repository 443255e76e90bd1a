//! Outcomes returned by the engine

use chrono::{DateTime, Utc};
use common::{MatchId, ParticipantId};
use serde::Serialize;

use crate::domain::{Participant, ParticipantRecord, ParticipantStatus};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmitOutcome {
    MatchFound {
        participant_id: ParticipantId,
        match_id: MatchId,
        partner_id: ParticipantId,
        similarity_score: f64,
        common_interests: Vec<String>,
    },
    Waiting {
        participant_id: ParticipantId,
    },
}

impl SubmitOutcome {
    pub fn participant_id(&self) -> &ParticipantId {
        match self {
            SubmitOutcome::MatchFound { participant_id, .. } => participant_id,
            SubmitOutcome::Waiting { participant_id } => participant_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EndMatchOutcome {
    Ended { match_id: MatchId },
    /// The match had already been ended; nothing changed
    AlreadyEnded { match_id: MatchId },
}

/// Participant view without embeddings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParticipantSummary {
    pub id: ParticipantId,
    pub interests: Vec<String>,
    pub status: ParticipantStatus,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub current_match_id: Option<MatchId>,
}

impl From<&Participant> for ParticipantSummary {
    fn from(p: &Participant) -> Self {
        Self {
            id: p.id.clone(),
            interests: p.interests.clone(),
            status: p.status,
            created_at: p.created_at,
            last_active: p.last_active,
            current_match_id: p.current_match_id.clone(),
        }
    }
}

impl From<ParticipantRecord> for ParticipantSummary {
    fn from(r: ParticipantRecord) -> Self {
        Self {
            id: r.id,
            interests: r.interests,
            status: r.status,
            created_at: r.created_at,
            last_active: r.last_active,
            current_match_id: r.current_match_id,
        }
    }
}
