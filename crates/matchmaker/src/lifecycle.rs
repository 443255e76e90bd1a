//! In-memory match state: the waiting pool plus the match registries.
//!
//! Everything here is synchronous and runs under the engine's single lock.

use chrono::{DateTime, Utc};
use common::{MatchId, ParticipantId};
use std::collections::HashMap;

use crate::domain::{Match, Participant};
use crate::error::{MatchmakingError, MatchmakingResult};
use crate::pool::WaitingPool;

/// Result of ending an active match held in memory
#[derive(Debug, Clone)]
pub struct EndedMatch {
    pub record: Match,
    /// Participants flipped to offline, in match order
    pub participants: Vec<Participant>,
    /// Ids that were still waiting and got removed from the pool
    pub strays_removed: Vec<ParticipantId>,
}

#[derive(Debug, Default)]
pub struct MatchState {
    pub pool: WaitingPool,
    active: HashMap<MatchId, Match>,
    matched: HashMap<ParticipantId, Participant>,
    ended: HashMap<MatchId, Match>,
}

impl MatchState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pair `requester_id` with `candidate_id`. Both must be waiting.
    pub fn create_match(
        &mut self,
        requester_id: &ParticipantId,
        candidate_id: &ParticipantId,
        score: f64,
        common_interests: Vec<String>,
        now: DateTime<Utc>,
    ) -> MatchmakingResult<(Match, Participant, Participant)> {
        if requester_id == candidate_id {
            return Err(MatchmakingError::Internal(format!(
                "participant {} cannot be matched with itself",
                requester_id
            )));
        }
        if !self.pool.contains(requester_id) || !self.pool.contains(candidate_id) {
            return Err(MatchmakingError::Internal(format!(
                "cannot match {} with {}: both must be waiting",
                requester_id, candidate_id
            )));
        }

        let record = Match::new(
            requester_id.clone(),
            candidate_id.clone(),
            score,
            common_interests,
            now,
        );

        let mut pair = Vec::with_capacity(2);
        for id in [requester_id, candidate_id] {
            if let Some(mut participant) = self.pool.remove(id) {
                participant.assign(record.id.clone(), now);
                self.matched.insert(id.clone(), participant.clone());
                pair.push(participant);
            }
        }
        self.active.insert(record.id.clone(), record.clone());

        let candidate = pair.pop();
        let requester = pair.pop();
        match (requester, candidate) {
            (Some(requester), Some(candidate)) => Ok((record, requester, candidate)),
            _ => Err(MatchmakingError::Internal("pool changed during match".to_string())),
        }
    }

    /// End an active match. `None` when `match_id` is not active in memory.
    pub fn end_match(&mut self, match_id: &MatchId, now: DateTime<Utc>) -> Option<EndedMatch> {
        let mut record = self.active.remove(match_id)?;
        record.end(now);

        let mut participants = Vec::with_capacity(2);
        let mut strays_removed = Vec::new();
        for id in record.participants() {
            let participant = match self.matched.remove(id) {
                Some(p) => Some(p),
                None => {
                    let stray = self.pool.remove(id);
                    if stray.is_some() {
                        strays_removed.push(id.clone());
                    }
                    stray
                }
            };
            if let Some(mut participant) = participant {
                participant.go_offline(now);
                participants.push(participant);
            }
        }

        self.ended.insert(record.id.clone(), record.clone());
        Some(EndedMatch {
            record,
            participants,
            strays_removed,
        })
    }

    /// Remove waiting entries for ids of a match known only to the store
    pub fn remove_strays(&mut self, record: &Match) -> Vec<ParticipantId> {
        record
            .participants()
            .into_iter()
            .filter_map(|id| self.pool.remove(id).map(|p| p.id))
            .collect()
    }

    pub fn active_match(&self, match_id: &MatchId) -> Option<&Match> {
        self.active.get(match_id)
    }

    pub fn ended_match(&self, match_id: &MatchId) -> Option<&Match> {
        self.ended.get(match_id)
    }

    pub fn matched_participant(&self, id: &ParticipantId) -> Option<&Participant> {
        self.matched.get(id)
    }

    /// The active match `id` is currently part of
    pub fn current_match_of(&self, id: &ParticipantId) -> Option<&Match> {
        let match_id = self.matched.get(id)?.current_match_id.as_ref()?;
        self.active.get(match_id)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Refresh `last_active` of a matched participant
    pub fn touch_matched(&mut self, id: &ParticipantId, now: DateTime<Utc>) -> bool {
        match self.matched.get_mut(id) {
            Some(participant) => {
                participant.last_active = now;
                true
            }
            None => false,
        }
    }

    /// End active matches whose participants have both been idle since before
    /// `cutoff`, oldest match first.
    pub fn expire_abandoned(
        &mut self,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Vec<EndedMatch> {
        let mut idle: Vec<(DateTime<Utc>, MatchId)> = self
            .active
            .values()
            .filter(|m| {
                m.participants().into_iter().all(|id| {
                    self.matched
                        .get(id)
                        .map_or(true, |p| p.last_active < cutoff)
                })
            })
            .map(|m| (m.created_at, m.id.clone()))
            .collect();
        idle.sort();

        idle.into_iter()
            .take(limit)
            .filter_map(|(_, id)| self.end_match(&id, now))
            .collect()
    }

    /// Remove waiting participants idle since before `cutoff`, oldest first
    pub fn evict_stale(&mut self, cutoff: DateTime<Utc>, limit: usize) -> Vec<Participant> {
        self.pool
            .stale(cutoff, limit)
            .into_iter()
            .filter_map(|id| self.pool.remove(&id))
            .collect()
    }

    /// Forget ended matches older than `cutoff`; returns how many were dropped
    pub fn prune_ended(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.ended.len();
        self.ended
            .retain(|_, m| m.ended_at.map_or(true, |ended| ended >= cutoff));
        before - self.ended.len()
    }
}
