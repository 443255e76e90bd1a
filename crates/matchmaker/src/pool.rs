//! The waiting pool
//!
//! Entries are keyed by participant id and ordered by an insertion sequence
//! so that scans, and therefore tie-breaks, are deterministic. The pool does
//! no locking of its own; the engine owns it behind its state mutex.

use chrono::{DateTime, Utc};
use common::ParticipantId;
use std::collections::{BTreeMap, HashMap};

use crate::domain::Participant;

#[derive(Debug)]
struct PoolEntry {
    sequence: u64,
    participant: Participant,
}

#[derive(Debug, Default)]
pub struct WaitingPool {
    entries: HashMap<ParticipantId, PoolEntry>,
    order: BTreeMap<u64, ParticipantId>,
    next_sequence: u64,
}

impl WaitingPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. A replaced entry keeps its place in the queue.
    /// Returns true when the participant was not already waiting.
    pub fn upsert(&mut self, participant: Participant) -> bool {
        if let Some(entry) = self.entries.get_mut(&participant.id) {
            entry.participant = participant;
            return false;
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.order.insert(sequence, participant.id.clone());
        self.entries.insert(
            participant.id.clone(),
            PoolEntry {
                sequence,
                participant,
            },
        );
        true
    }

    pub fn remove(&mut self, id: &ParticipantId) -> Option<Participant> {
        let entry = self.entries.remove(id)?;
        self.order.remove(&entry.sequence);
        Some(entry.participant)
    }

    pub fn get(&self, id: &ParticipantId) -> Option<&Participant> {
        self.entries.get(id).map(|e| &e.participant)
    }

    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.entries.contains_key(id)
    }

    /// Refresh `last_active`. Returns false if the participant is not waiting.
    pub fn touch(&mut self, id: &ParticipantId, now: DateTime<Utc>) -> bool {
        match self.entries.get_mut(id) {
            Some(entry) => {
                entry.participant.last_active = now;
                true
            }
            None => false,
        }
    }

    /// Waiting participants in ascending insertion order
    pub fn scan(&self) -> impl Iterator<Item = &Participant> + '_ {
        self.order
            .values()
            .filter_map(move |id| self.entries.get(id).map(|e| &e.participant))
    }

    /// Up to `limit` ids whose `last_active` is strictly before `cutoff`,
    /// oldest queue position first
    pub fn stale(&self, cutoff: DateTime<Utc>, limit: usize) -> Vec<ParticipantId> {
        self.scan()
            .filter(|p| p.last_active < cutoff)
            .take(limit)
            .map(|p| p.id.clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::participant;
    use chrono::Duration;

    fn ids(pool: &WaitingPool) -> Vec<&str> {
        pool.scan().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn test_scan_follows_insertion_order() {
        let mut pool = WaitingPool::new();
        for id in ["c", "a", "b"] {
            assert!(pool.upsert(participant(id, &["x"], vec![1.0])));
        }
        assert_eq!(ids(&pool), vec!["c", "a", "b"]);
        assert_eq!(pool.count(), 3);
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut pool = WaitingPool::new();
        pool.upsert(participant("a", &["x"], vec![1.0]));
        pool.upsert(participant("b", &["y"], vec![1.0]));

        let replaced = pool.upsert(participant("a", &["z"], vec![0.5]));

        assert!(!replaced);
        assert_eq!(pool.count(), 2);
        assert_eq!(ids(&pool), vec!["a", "b"]);
        assert_eq!(pool.get(&"a".into()).unwrap().interests, vec!["z"]);
    }

    #[test]
    fn test_remove_is_noop_when_absent() {
        let mut pool = WaitingPool::new();
        pool.upsert(participant("a", &["x"], vec![1.0]));

        assert!(pool.remove(&"missing".into()).is_none());
        assert!(pool.remove(&"a".into()).is_some());
        assert!(pool.is_empty());
        assert_eq!(pool.scan().count(), 0);
    }

    #[test]
    fn test_stale_uses_strict_cutoff_and_limit() {
        let now = Utc::now();
        let mut pool = WaitingPool::new();
        for (id, age) in [("old", 7200), ("edge", 3600), ("fresh", 10), ("older", 9000)] {
            let mut p = participant(id, &["x"], vec![1.0]);
            p.last_active = now - Duration::seconds(age);
            pool.upsert(p);
        }

        let cutoff = now - Duration::seconds(3600);
        let stale = pool.stale(cutoff, 10);
        assert_eq!(stale, vec![ParticipantId::new("old"), ParticipantId::new("older")]);

        assert_eq!(pool.stale(cutoff, 1), vec![ParticipantId::new("old")]);
    }

    #[test]
    fn test_touch() {
        let now = Utc::now();
        let mut pool = WaitingPool::new();
        pool.upsert(participant("a", &["x"], vec![1.0]));

        assert!(pool.touch(&"a".into(), now));
        assert_eq!(pool.get(&"a".into()).unwrap().last_active, now);
        assert!(!pool.touch(&"b".into(), now));
    }
}
