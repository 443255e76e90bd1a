//! Participants and matches

use chrono::{DateTime, Utc};
use common::{MatchId, ParticipantId};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::embedding::ProfileEmbeddings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    Waiting,
    Matched,
    Offline,
}

impl fmt::Display for ParticipantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParticipantStatus::Waiting => write!(f, "waiting"),
            ParticipantStatus::Matched => write!(f, "matched"),
            ParticipantStatus::Offline => write!(f, "offline"),
        }
    }
}

/// A participant held in memory by the engine.
///
/// `interest_embeddings` holds one vector per entry of `interests` and is
/// never persisted.
#[derive(Debug, Clone)]
pub struct Participant {
    pub id: ParticipantId,
    pub interests: Vec<String>,
    pub embedding: Vec<f32>,
    pub interest_embeddings: Vec<Vec<f32>>,
    pub status: ParticipantStatus,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub current_match_id: Option<MatchId>,
}

impl Participant {
    pub fn waiting(
        id: ParticipantId,
        interests: Vec<String>,
        embeddings: ProfileEmbeddings,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            interests,
            embedding: embeddings.profile,
            interest_embeddings: embeddings.per_interest,
            status: ParticipantStatus::Waiting,
            created_at: now,
            last_active: now,
            current_match_id: None,
        }
    }

    pub fn embeddings(&self) -> ProfileEmbeddings {
        ProfileEmbeddings {
            profile: self.embedding.clone(),
            per_interest: self.interest_embeddings.clone(),
        }
    }

    pub fn assign(&mut self, match_id: MatchId, now: DateTime<Utc>) {
        self.status = ParticipantStatus::Matched;
        self.current_match_id = Some(match_id);
        self.last_active = now;
    }

    pub fn go_offline(&mut self, now: DateTime<Utc>) {
        self.status = ParticipantStatus::Offline;
        self.current_match_id = None;
        self.last_active = now;
    }

    pub fn record(&self) -> ParticipantRecord {
        ParticipantRecord {
            id: self.id.clone(),
            interests: self.interests.clone(),
            embedding: self.embedding.clone(),
            status: self.status,
            created_at: self.created_at,
            last_active: self.last_active,
            current_match_id: self.current_match_id.clone(),
        }
    }
}

/// Durable form of a participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantRecord {
    pub id: ParticipantId,
    pub interests: Vec<String>,
    pub embedding: Vec<f32>,
    pub status: ParticipantStatus,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub current_match_id: Option<MatchId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Active,
    Ended,
}

/// A pairing of two participants. `participant_a_id` is the requester,
/// `participant_b_id` the waiting candidate it was matched with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub participant_a_id: ParticipantId,
    pub participant_b_id: ParticipantId,
    pub similarity_score: f64,
    pub common_interests: Vec<String>,
    pub status: MatchStatus,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Match {
    pub fn new(
        participant_a_id: ParticipantId,
        participant_b_id: ParticipantId,
        similarity_score: f64,
        common_interests: Vec<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MatchId::generate(),
            participant_a_id,
            participant_b_id,
            similarity_score,
            common_interests,
            status: MatchStatus::Active,
            created_at: now,
            ended_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == MatchStatus::Active
    }

    pub fn participants(&self) -> [&ParticipantId; 2] {
        [&self.participant_a_id, &self.participant_b_id]
    }

    /// The other side of the match, if `id` is part of it
    pub fn partner_of(&self, id: &ParticipantId) -> Option<&ParticipantId> {
        if &self.participant_a_id == id {
            Some(&self.participant_b_id)
        } else if &self.participant_b_id == id {
            Some(&self.participant_a_id)
        } else {
            None
        }
    }

    pub fn end(&mut self, now: DateTime<Utc>) {
        self.status = MatchStatus::Ended;
        self.ended_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partner_of() {
        let a = ParticipantId::new("a");
        let b = ParticipantId::new("b");
        let m = Match::new(a.clone(), b.clone(), 0.8, vec![], Utc::now());

        assert_eq!(m.partner_of(&a), Some(&b));
        assert_eq!(m.partner_of(&b), Some(&a));
        assert_eq!(m.partner_of(&ParticipantId::new("c")), None);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&ParticipantStatus::Waiting).unwrap(),
            "\"waiting\""
        );
        assert_eq!(serde_json::to_string(&MatchStatus::Ended).unwrap(), "\"ended\"");
    }

    #[test]
    fn test_record_drops_interest_vectors() {
        let now = Utc::now();
        let mut p = Participant::waiting(
            ParticipantId::new("p"),
            vec!["jazz".into()],
            ProfileEmbeddings {
                profile: vec![1.0, 0.0],
                per_interest: vec![vec![1.0, 0.0]],
            },
            now,
        );
        p.assign(MatchId::new("m"), now);

        let record = p.record();
        assert_eq!(record.status, ParticipantStatus::Matched);
        assert_eq!(record.current_match_id, Some(MatchId::new("m")));
        assert_eq!(record.embedding, vec![1.0, 0.0]);
    }
}
