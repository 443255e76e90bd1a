//! The matchmaking orchestrator
//!
//! [`Matchmaker`] owns the in-memory state behind one `tokio::sync::Mutex`.
//! A submission runs in two short critical sections around the embedding
//! call, which never happens under the lock:
//!
//! 1. look the participant up, refresh it and decide whether its cached
//!    embeddings can be reused;
//! 2. upsert it into the pool, scan for the best candidate and, on a hit,
//!    remove both from the pool and register the match.
//!
//! Step 2 is a single critical section, so a waiting participant can never
//! be handed to two requesters. Store writes are queued on the
//! [`PersistenceWriter`] after the lock is released.

use chrono::{DateTime, Utc};
use common::{MatchId, ParticipantId};
use config::TandemConfig;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::domain::{Match, MatchStatus, Participant};
use crate::embedding::{embed_profile, EmbeddingProvider, ProfileEmbeddings};
use crate::error::{MatchmakingError, MatchmakingResult};
use crate::interests::{common_interests, InterestSet};
use crate::lifecycle::{EndedMatch, MatchState};
use crate::metrics::{MatchmakingMetrics, MetricsSnapshot};
use crate::persistence::{PersistOp, PersistenceWriter};
use crate::result::{EndMatchOutcome, ParticipantSummary, SubmitOutcome};
use crate::similarity::find_best_match;
use crate::store::MatchmakingStore;

/// Tunables for matching, validation and eviction
#[derive(Debug, Clone)]
pub struct MatchSettings {
    pub similarity_threshold: f64,
    pub semantic_threshold: f64,
    pub max_common_interests: usize,
    pub max_interests: usize,
    pub max_interest_length: usize,
    /// Recompute embeddings when a waiting participant resubmits different interests
    pub recompute_on_resubmit: bool,
    pub embedding_timeout: Duration,
    /// Waiting participants idle for longer than this are evicted
    pub staleness: chrono::Duration,
    pub max_evictions_per_sweep: usize,
}

impl MatchSettings {
    pub fn from_config(config: &TandemConfig) -> Self {
        Self {
            similarity_threshold: config.matching.similarity_threshold,
            semantic_threshold: config.matching.semantic_threshold,
            max_common_interests: config.matching.max_common_interests,
            max_interests: config.matching.max_interests,
            max_interest_length: config.matching.max_interest_length,
            recompute_on_resubmit: config.matching.recompute_on_resubmit,
            embedding_timeout: Duration::from_millis(config.embedding.timeout_ms),
            staleness: chrono::Duration::seconds(
                i64::try_from(config.janitor.staleness_seconds).unwrap_or(i64::MAX / 1000),
            ),
            max_evictions_per_sweep: config.janitor.max_evictions_per_sweep,
        }
    }
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self::from_config(&config::generate_default_config())
    }
}

pub struct Matchmaker {
    state: Mutex<MatchState>,
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn MatchmakingStore>,
    writer: PersistenceWriter,
    settings: MatchSettings,
    metrics: Arc<MatchmakingMetrics>,
}

impl Matchmaker {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn MatchmakingStore>,
        writer: PersistenceWriter,
        settings: MatchSettings,
        metrics: Arc<MatchmakingMetrics>,
    ) -> Self {
        info!(
            provider = provider.name(),
            store = store.name(),
            threshold = settings.similarity_threshold,
            "Matchmaker created"
        );

        Self {
            state: Mutex::new(MatchState::new()),
            provider,
            store,
            writer,
            settings,
            metrics,
        }
    }

    pub fn settings(&self) -> &MatchSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn MatchmakingStore> {
        &self.store
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn writer(&self) -> &PersistenceWriter {
        &self.writer
    }

    /// Submit interests and either get paired immediately or join the pool.
    ///
    /// Without `participant_id` a fresh id is generated. Resubmitting the id
    /// of a participant that is already matched returns its current match
    /// unchanged.
    #[instrument(skip(self, interests), fields(count = interests.len()))]
    pub async fn submit(
        &self,
        interests: Vec<String>,
        participant_id: Option<ParticipantId>,
    ) -> MatchmakingResult<SubmitOutcome> {
        let started = Instant::now();
        self.metrics.submissions.increment();

        let interests = self.validate_interests(interests).map_err(|e| {
            self.metrics.invalid_submissions.increment();
            e
        })?;
        let id = participant_id.unwrap_or_else(ParticipantId::generate);

        let cached = {
            let mut state = self.state.lock().await;
            state.touch_matched(&id, Utc::now());
            if let Some(outcome) = existing_match(&state, &id) {
                debug!(participant_id = %id, "Participant already matched");
                return Ok(outcome);
            }

            state.pool.touch(&id, Utc::now());
            state.pool.get(&id).and_then(|waiting| {
                let reuse =
                    waiting.interests == interests || !self.settings.recompute_on_resubmit;
                reuse.then(|| (waiting.interests.clone(), waiting.embeddings()))
            })
        };

        let (interests, embeddings) = match cached {
            Some(cached) => {
                debug!(participant_id = %id, "Reusing cached embeddings");
                cached
            }
            None => {
                let embeddings = self.compute_embeddings(&id, &interests).await?;
                (interests, embeddings)
            }
        };

        let now = Utc::now();
        let mut ops = Vec::with_capacity(3);
        let outcome = {
            let mut state = self.state.lock().await;

            // matched by another requester while embeddings were computed
            if let Some(outcome) = existing_match(&state, &id) {
                return Ok(outcome);
            }

            let mut participant = Participant::waiting(id.clone(), interests, embeddings, now);
            if let Some(previous) = state.pool.get(&id) {
                participant.created_at = previous.created_at;
            }
            let record = participant.record();
            let inserted = state.pool.upsert(participant);

            let decision = state.pool.get(&id).and_then(|requester| {
                let candidate = find_best_match(
                    &id,
                    &requester.embedding,
                    state.pool.scan(),
                    self.settings.similarity_threshold,
                )?;
                let partner = state.pool.get(&candidate.participant_id)?;
                let common = common_interests(
                    InterestSet::new(&requester.interests, &requester.interest_embeddings),
                    InterestSet::new(&partner.interests, &partner.interest_embeddings),
                    self.settings.max_common_interests,
                    self.settings.semantic_threshold,
                );
                Some((candidate, common))
            });

            let outcome = match decision {
                Some((candidate, common)) => {
                    let (record, requester, partner) = state.create_match(
                        &id,
                        &candidate.participant_id,
                        candidate.score,
                        common,
                        now,
                    )?;

                    ops.push(PersistOp::PutMatch(record.clone()));
                    ops.push(PersistOp::PutParticipant(requester.record()));
                    ops.push(PersistOp::participant_status(&partner));

                    self.metrics.matches_created.increment();
                    info!(
                        participant_id = %id,
                        partner_id = %partner.id,
                        match_id = %record.id,
                        score = record.similarity_score,
                        "Match created"
                    );

                    SubmitOutcome::MatchFound {
                        participant_id: id.clone(),
                        match_id: record.id,
                        partner_id: partner.id,
                        similarity_score: record.similarity_score,
                        common_interests: record.common_interests,
                    }
                }
                None => {
                    ops.push(PersistOp::PutParticipant(record));
                    info!(
                        participant_id = %id,
                        new = inserted,
                        waiting = state.pool.count(),
                        "No match above threshold, participant waiting"
                    );
                    SubmitOutcome::Waiting {
                        participant_id: id.clone(),
                    }
                }
            };

            self.refresh_gauges(&state);
            outcome
        };

        self.writer.enqueue_all(ops);
        self.metrics.submit_latency.record(started.elapsed());
        Ok(outcome)
    }

    /// End a match. Ending an already-ended match is not an error.
    #[instrument(skip(self, match_id), fields(match_id = %match_id))]
    pub async fn end_match(&self, match_id: &MatchId) -> MatchmakingResult<EndMatchOutcome> {
        let now = Utc::now();

        {
            let mut state = self.state.lock().await;
            if let Some(ended) = state.end_match(match_id, now) {
                self.refresh_gauges(&state);
                drop(state);

                self.writer.enqueue_all(ended_ops(&ended));

                self.metrics.matches_ended.increment();
                info!(strays = ended.strays_removed.len(), "Match ended");
                return Ok(EndMatchOutcome::Ended {
                    match_id: match_id.clone(),
                });
            }

            if state.ended_match(match_id).is_some() {
                debug!("Match already ended");
                return Ok(EndMatchOutcome::AlreadyEnded {
                    match_id: match_id.clone(),
                });
            }
        }

        // Not in memory, e.g. created before a restart
        let record = self
            .store
            .get_match(match_id)
            .await?
            .ok_or_else(|| MatchmakingError::MatchNotFound(match_id.clone()))?;

        if record.status == MatchStatus::Ended {
            return Ok(EndMatchOutcome::AlreadyEnded {
                match_id: match_id.clone(),
            });
        }

        let release = {
            let mut state = self.state.lock().await;
            let strays = state.remove_strays(&record);
            self.refresh_gauges(&state);
            let release: Vec<ParticipantId> = record
                .participants()
                .into_iter()
                .filter(|id| state.matched_participant(id).is_none())
                .cloned()
                .collect();
            info!(strays = strays.len(), "Ending stored match");
            release
        };

        let mut ops = vec![PersistOp::UpdateMatchStatus {
            id: record.id.clone(),
            status: MatchStatus::Ended,
            ended_at: Some(now),
        }];
        ops.extend(release.into_iter().map(|id| PersistOp::offline(id, now)));
        self.writer.enqueue_all(ops);
        self.metrics.matches_ended.increment();

        Ok(EndMatchOutcome::Ended {
            match_id: match_id.clone(),
        })
    }

    /// Live state for waiting or matched participants, else the stored record
    pub async fn participant_status(
        &self,
        id: &ParticipantId,
    ) -> MatchmakingResult<ParticipantSummary> {
        {
            let mut state = self.state.lock().await;
            if state.pool.touch(id, Utc::now()) {
                if let Some(waiting) = state.pool.get(id) {
                    return Ok(waiting.into());
                }
            }
            if state.touch_matched(id, Utc::now()) {
                if let Some(matched) = state.matched_participant(id) {
                    return Ok(matched.into());
                }
            }
        }

        self.store
            .get_participant(id)
            .await?
            .map(ParticipantSummary::from)
            .ok_or_else(|| MatchmakingError::ParticipantNotFound(id.clone()))
    }

    pub async fn get_match(&self, match_id: &MatchId) -> MatchmakingResult<Match> {
        {
            let state = self.state.lock().await;
            if let Some(found) = state
                .active_match(match_id)
                .or_else(|| state.ended_match(match_id))
            {
                return Ok(found.clone());
            }
        }

        self.store
            .get_match(match_id)
            .await?
            .ok_or_else(|| MatchmakingError::MatchNotFound(match_id.clone()))
    }

    pub async fn waiting_count(&self) -> usize {
        self.state.lock().await.pool.count()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Evict waiting participants idle for longer than the staleness window.
    ///
    /// Active matches whose two participants have both been idle that long are
    /// ended as well. Returns the evicted waiting ids. Offline statuses are
    /// persisted after the lock is released.
    pub async fn evict_stale(&self, now: DateTime<Utc>) -> Vec<ParticipantId> {
        let cutoff = now - self.settings.staleness;
        let limit = self.settings.max_evictions_per_sweep;

        let (evicted, abandoned, pruned) = {
            let mut state = self.state.lock().await;
            let evicted = state.evict_stale(cutoff, limit);
            let abandoned = state.expire_abandoned(cutoff, now, limit);
            let pruned = state.prune_ended(cutoff);
            self.refresh_gauges(&state);
            (evicted, abandoned, pruned)
        };

        let ids: Vec<ParticipantId> = evicted.into_iter().map(|p| p.id).collect();
        self.writer
            .enqueue_all(ids.iter().cloned().map(|id| PersistOp::offline(id, now)));

        if !abandoned.is_empty() {
            for ended in &abandoned {
                self.writer.enqueue_all(ended_ops(ended));
            }
            self.metrics.matches_ended.add(abandoned.len() as u64);
            info!(expired = abandoned.len(), "Ended abandoned matches");
        }

        if !ids.is_empty() {
            self.metrics.evictions.add(ids.len() as u64);
            info!(evicted = ids.len(), pruned, "Evicted stale participants");
        } else {
            debug!(pruned, "No stale participants");
        }

        ids
    }

    async fn compute_embeddings(
        &self,
        id: &ParticipantId,
        interests: &[String],
    ) -> MatchmakingResult<ProfileEmbeddings> {
        let started = Instant::now();
        let result = embed_profile(
            self.provider.as_ref(),
            interests,
            self.settings.embedding_timeout,
        )
        .await;
        self.metrics.embedding_latency.record(started.elapsed());

        result.map_err(|e| {
            self.metrics.embedding_failures.increment();
            warn!(participant_id = %id, provider = self.provider.name(), error = %e, "Embedding failed");
            MatchmakingError::EmbeddingFailure(e)
        })
    }

    fn validate_interests(&self, interests: Vec<String>) -> MatchmakingResult<Vec<String>> {
        if interests.is_empty() {
            return Err(MatchmakingError::InvalidInput("Interests required".to_string()));
        }
        if interests.len() > self.settings.max_interests {
            return Err(MatchmakingError::InvalidInput(format!(
                "At most {} interests are allowed",
                self.settings.max_interests
            )));
        }

        interests
            .into_iter()
            .map(|interest| {
                let trimmed = interest.trim();
                if trimmed.is_empty() {
                    return Err(MatchmakingError::InvalidInput(
                        "Interests must not be blank".to_string(),
                    ));
                }
                if trimmed.chars().count() > self.settings.max_interest_length {
                    return Err(MatchmakingError::InvalidInput(format!(
                        "Interests are limited to {} characters",
                        self.settings.max_interest_length
                    )));
                }
                Ok(trimmed.to_string())
            })
            .collect()
    }

    fn refresh_gauges(&self, state: &MatchState) {
        self.metrics
            .waiting_participants
            .set(state.pool.count() as u64);
        self.metrics.active_matches.set(state.active_count() as u64);
    }
}

fn ended_ops(ended: &EndedMatch) -> Vec<PersistOp> {
    let mut ops = vec![PersistOp::UpdateMatchStatus {
        id: ended.record.id.clone(),
        status: MatchStatus::Ended,
        ended_at: ended.record.ended_at,
    }];
    ops.extend(ended.participants.iter().map(PersistOp::participant_status));
    ops
}

fn existing_match(state: &MatchState, id: &ParticipantId) -> Option<SubmitOutcome> {
    let current = state.current_match_of(id)?;
    let partner_id = current.partner_of(id)?.clone();
    Some(SubmitOutcome::MatchFound {
        participant_id: id.clone(),
        match_id: current.id.clone(),
        partner_id,
        similarity_score: current.similarity_score,
        common_interests: current.common_interests.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ParticipantStatus;
    use crate::persistence::RetryPolicy;
    use crate::store::{InMemoryStore, MockMatchmakingStore, StoreError};
    use crate::testing::ScriptedEmbedder;
    use assert_matches::assert_matches;
    use std::collections::HashSet;
    use tokio_util::sync::CancellationToken;

    const A: &[&str] = &["jazz", "chess"];
    const B: &[&str] = &["jazz", "soccer"];
    const C: &[&str] = &["skydiving"];

    fn scenario_embedder() -> ScriptedEmbedder {
        ScriptedEmbedder::new(3)
            .profile(A, vec![1.0, 0.0, 0.0])
            .profile(B, vec![0.55, 0.835165, 0.0])
            .profile(C, vec![0.1, 0.0, 0.994987])
    }

    fn test_settings() -> MatchSettings {
        MatchSettings {
            similarity_threshold: 0.5,
            semantic_threshold: 0.6,
            max_common_interests: 5,
            max_interests: 20,
            max_interest_length: 100,
            recompute_on_resubmit: true,
            embedding_timeout: Duration::from_secs(1),
            staleness: chrono::Duration::seconds(3600),
            max_evictions_per_sweep: 100,
        }
    }

    fn fast_retries() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    fn engine_with_store(
        embedder: ScriptedEmbedder,
        store: Arc<dyn MatchmakingStore>,
        settings: MatchSettings,
    ) -> Matchmaker {
        let metrics = Arc::new(MatchmakingMetrics::new());
        let (writer, _handle) = PersistenceWriter::spawn(
            store.clone(),
            fast_retries(),
            metrics.clone(),
            CancellationToken::new(),
        );
        Matchmaker::new(Arc::new(embedder), store, writer, settings, metrics)
    }

    fn engine(embedder: ScriptedEmbedder) -> (Matchmaker, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let engine = engine_with_store(embedder, store.clone(), test_settings());
        (engine, store)
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_scenario_jazz_pairs_and_skydiving_waits() {
        let (engine, _) = engine(scenario_embedder());

        let a = engine.submit(strings(A), Some("a".into())).await.unwrap();
        assert_matches!(a, SubmitOutcome::Waiting { .. });
        assert_eq!(engine.waiting_count().await, 1);

        let b = engine.submit(strings(B), Some("b".into())).await.unwrap();
        assert_matches!(
            b,
            SubmitOutcome::MatchFound { ref partner_id, similarity_score, ref common_interests, .. } => {
                assert_eq!(partner_id, &ParticipantId::new("a"));
                assert!((similarity_score - 0.55).abs() < 1e-4);
                assert_eq!(common_interests, &vec!["jazz".to_string()]);
            }
        );
        assert_eq!(engine.waiting_count().await, 0);

        let c = engine.submit(strings(C), Some("c".into())).await.unwrap();
        assert_matches!(c, SubmitOutcome::Waiting { .. });
        assert_eq!(engine.waiting_count().await, 1);

        let snapshot = engine.metrics();
        assert_eq!(snapshot.matches_created, 1);
        assert_eq!(snapshot.active_matches, 1);
        assert_eq!(snapshot.waiting_participants, 1);
    }

    #[tokio::test]
    async fn test_dissimilar_participants_both_wait() {
        let (engine, _) = engine(scenario_embedder());

        engine.submit(strings(A), None).await.unwrap();
        let c = engine.submit(strings(C), None).await.unwrap();

        assert_matches!(c, SubmitOutcome::Waiting { .. });
        assert_eq!(engine.waiting_count().await, 2);
    }

    #[tokio::test]
    async fn test_resubmit_does_not_duplicate_and_reuses_embeddings() {
        let embedder = scenario_embedder();
        let (engine, _) = engine(embedder.clone());

        engine.submit(strings(A), Some("a".into())).await.unwrap();
        let first = engine.participant_status(&"a".into()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        engine.submit(strings(A), Some("a".into())).await.unwrap();
        let second = engine.participant_status(&"a".into()).await.unwrap();

        assert_eq!(engine.waiting_count().await, 1);
        assert_eq!(embedder.calls(), 1);
        assert_eq!(second.created_at, first.created_at);
        assert!(second.last_active > first.last_active);
    }

    #[tokio::test]
    async fn test_resubmit_with_new_interests_recomputes() {
        let embedder = scenario_embedder();
        let (engine, _) = engine(embedder.clone());

        engine.submit(strings(A), Some("x".into())).await.unwrap();
        engine.submit(strings(C), Some("x".into())).await.unwrap();

        assert_eq!(embedder.calls(), 2);
        let status = engine.participant_status(&"x".into()).await.unwrap();
        assert_eq!(status.interests, strings(C));
    }

    #[tokio::test]
    async fn test_resubmit_keeps_first_profile_when_recompute_disabled() {
        let embedder = scenario_embedder();
        let settings = MatchSettings {
            recompute_on_resubmit: false,
            ..test_settings()
        };
        let engine = engine_with_store(embedder.clone(), Arc::new(InMemoryStore::new()), settings);

        engine.submit(strings(A), Some("x".into())).await.unwrap();
        engine.submit(strings(C), Some("x".into())).await.unwrap();

        assert_eq!(embedder.calls(), 1);
        let status = engine.participant_status(&"x".into()).await.unwrap();
        assert_eq!(status.interests, strings(A));
    }

    #[tokio::test]
    async fn test_matched_participant_resubmit_returns_current_match() {
        let (engine, _) = engine(scenario_embedder());

        engine.submit(strings(A), Some("a".into())).await.unwrap();
        let b = engine.submit(strings(B), Some("b".into())).await.unwrap();
        let again = engine.submit(strings(A), Some("a".into())).await.unwrap();

        let (SubmitOutcome::MatchFound { match_id: first, .. }, SubmitOutcome::MatchFound { match_id: polled, partner_id, .. }) = (b, again) else {
            panic!("expected both submissions to report the match");
        };
        assert_eq!(first, polled);
        assert_eq!(partner_id, ParticipantId::new("b"));
        assert_eq!(engine.waiting_count().await, 0);
    }

    #[tokio::test]
    async fn test_invalid_interests_are_rejected() {
        let (engine, _) = engine(scenario_embedder());

        assert_matches!(
            engine.submit(vec![], None).await,
            Err(MatchmakingError::InvalidInput(_))
        );
        assert_matches!(
            engine.submit(strings(&["jazz", "  "]), None).await,
            Err(MatchmakingError::InvalidInput(_))
        );
        assert_matches!(
            engine.submit(vec!["x".repeat(101)], None).await,
            Err(MatchmakingError::InvalidInput(_))
        );
        assert_eq!(engine.waiting_count().await, 0);
        assert_eq!(engine.metrics().invalid_submissions, 3);
    }

    #[tokio::test]
    async fn test_interests_are_trimmed() {
        let (engine, _) = engine(scenario_embedder());

        let outcome = engine
            .submit(strings(&[" jazz ", "chess\n"]), Some("a".into()))
            .await
            .unwrap();
        assert_matches!(outcome, SubmitOutcome::Waiting { .. });
    }

    #[tokio::test]
    async fn test_embedding_timeout_leaves_pool_untouched() {
        let embedder = scenario_embedder().with_delay(Duration::from_millis(200));
        let settings = MatchSettings {
            embedding_timeout: Duration::from_millis(20),
            ..test_settings()
        };
        let engine = engine_with_store(embedder, Arc::new(InMemoryStore::new()), settings);

        let err = engine.submit(strings(A), None).await.unwrap_err();
        assert_matches!(err, MatchmakingError::EmbeddingFailure(crate::EmbeddingError::Timeout(_)));
        assert_eq!(engine.waiting_count().await, 0);
        assert_eq!(engine.metrics().embedding_failures, 1);
    }

    #[tokio::test]
    async fn test_unknown_profile_is_embedding_failure() {
        let (engine, _) = engine(scenario_embedder());

        let err = engine.submit(strings(&["knitting"]), None).await.unwrap_err();
        assert_matches!(err, MatchmakingError::EmbeddingFailure(_));
        assert_eq!(engine.waiting_count().await, 0);
    }

    #[tokio::test]
    async fn test_end_match_unknown_is_not_found() {
        let (engine, _) = engine(scenario_embedder());
        engine.submit(strings(C), None).await.unwrap();

        let err = engine.end_match(&MatchId::new("nope")).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(engine.waiting_count().await, 1);
    }

    #[tokio::test]
    async fn test_end_match_sets_both_offline() {
        let (engine, store) = engine(scenario_embedder());

        engine.submit(strings(A), Some("a".into())).await.unwrap();
        let SubmitOutcome::MatchFound { match_id, .. } =
            engine.submit(strings(B), Some("b".into())).await.unwrap()
        else {
            panic!("expected a match");
        };
        engine.submit(strings(C), Some("c".into())).await.unwrap();

        let outcome = engine.end_match(&match_id).await.unwrap();
        assert_eq!(outcome, EndMatchOutcome::Ended { match_id: match_id.clone() });
        assert_eq!(engine.waiting_count().await, 1);

        engine.writer().flush().await;
        for id in ["a", "b"] {
            let record = store.get_participant(&id.into()).await.unwrap().unwrap();
            assert_eq!(record.status, ParticipantStatus::Offline);
            assert_eq!(record.current_match_id, None);
        }
        let stored = store.get_match(&match_id).await.unwrap().unwrap();
        assert_eq!(stored.status, MatchStatus::Ended);

        let again = engine.end_match(&match_id).await.unwrap();
        assert_eq!(again, EndMatchOutcome::AlreadyEnded { match_id });
        assert_eq!(engine.metrics().matches_ended, 1);
    }

    #[tokio::test]
    async fn test_end_match_falls_back_to_store() {
        let (engine, store) = engine(scenario_embedder());

        // a match from before a restart; "a" has since rejoined the pool
        let old = Match::new("a".into(), "z".into(), 0.7, vec![], Utc::now());
        store.put_match(old.clone()).await.unwrap();
        engine.submit(strings(A), Some("a".into())).await.unwrap();

        let outcome = engine.end_match(&old.id).await.unwrap();
        assert_matches!(outcome, EndMatchOutcome::Ended { .. });
        assert_eq!(engine.waiting_count().await, 0);

        engine.writer().flush().await;
        let stored = store.get_match(&old.id).await.unwrap().unwrap();
        assert_eq!(stored.status, MatchStatus::Ended);
        assert_matches!(
            engine.end_match(&old.id).await,
            Ok(EndMatchOutcome::AlreadyEnded { .. })
        );
    }

    #[tokio::test]
    async fn test_get_match_and_participant_lookup() {
        let (engine, _) = engine(scenario_embedder());

        engine.submit(strings(A), Some("a".into())).await.unwrap();
        let SubmitOutcome::MatchFound { match_id, .. } =
            engine.submit(strings(B), Some("b".into())).await.unwrap()
        else {
            panic!("expected a match");
        };

        let found = engine.get_match(&match_id).await.unwrap();
        assert_eq!(found.participant_a_id, ParticipantId::new("b"));
        assert_eq!(found.participant_b_id, ParticipantId::new("a"));

        let a = engine.participant_status(&"a".into()).await.unwrap();
        assert_eq!(a.status, ParticipantStatus::Matched);
        assert_eq!(a.current_match_id, Some(match_id));

        assert_matches!(
            engine.participant_status(&"ghost".into()).await,
            Err(MatchmakingError::ParticipantNotFound(_))
        );
    }

    #[tokio::test]
    async fn test_evict_stale_only_removes_idle_participants() {
        let (engine, store) = engine(scenario_embedder());
        engine.submit(strings(A), Some("a".into())).await.unwrap();

        assert!(engine.evict_stale(Utc::now()).await.is_empty());
        assert_eq!(engine.waiting_count().await, 1);

        let later = Utc::now() + chrono::Duration::hours(2);
        let evicted = engine.evict_stale(later).await;
        assert_eq!(evicted, vec![ParticipantId::new("a")]);
        assert_eq!(engine.waiting_count().await, 0);

        engine.writer().flush().await;
        let record = store.get_participant(&"a".into()).await.unwrap().unwrap();
        assert_eq!(record.status, ParticipantStatus::Offline);
        assert_eq!(engine.metrics().evictions, 1);
    }

    #[tokio::test]
    async fn test_concurrent_submits_never_double_match() {
        let mut embedder = ScriptedEmbedder::new(2);
        for i in 0..20 {
            let interest = format!("topic-{}", i);
            embedder = embedder.profile(&[interest.as_str()], vec![1.0, 0.01 * i as f32]);
        }
        let (engine, _) = engine(embedder);
        let engine = Arc::new(engine);

        let handles: Vec<_> = (0..20)
            .map(|i| {
                let engine = Arc::clone(&engine);
                tokio::spawn(async move {
                    engine
                        .submit(vec![format!("topic-{}", i)], Some(format!("p{}", i).into()))
                        .await
                })
            })
            .collect();

        let mut seen = HashSet::new();
        let mut matches = HashSet::new();
        for handle in handles {
            if let SubmitOutcome::MatchFound {
                participant_id,
                partner_id,
                match_id,
                ..
            } = handle.await.unwrap().unwrap()
            {
                assert!(seen.insert(participant_id));
                assert!(seen.insert(partner_id));
                assert!(matches.insert(match_id));
            }
        }

        assert_eq!(matches.len(), 10);
        assert_eq!(engine.waiting_count().await, 0);
    }

    #[tokio::test]
    async fn test_failing_store_does_not_fail_submit() {
        let mut store = MockMatchmakingStore::new();
        store.expect_name().return_const("mock");
        store
            .expect_put_participant()
            .returning(|_| Err(StoreError::RedisError("down".to_string())));
        store
            .expect_put_match()
            .returning(|_| Err(StoreError::RedisError("down".to_string())));
        store
            .expect_update_participant_status()
            .returning(|_, _, _, _| Err(StoreError::RedisError("down".to_string())));

        let engine = engine_with_store(scenario_embedder(), Arc::new(store), test_settings());

        engine.submit(strings(A), Some("a".into())).await.unwrap();
        let b = engine.submit(strings(B), Some("b".into())).await.unwrap();
        assert_matches!(b, SubmitOutcome::MatchFound { .. });

        engine.writer().flush().await;
        let snapshot = engine.metrics();
        assert_eq!(snapshot.persistence_writes, 0);
        // put(a), put(match) and put(b) each fail twice; update(a) waits behind put(a)
        assert_eq!(snapshot.persistence_retries, 3);
        assert_eq!(snapshot.persistence_failures, 3);
        assert_eq!(snapshot.dirty_backlog, 4);
    }

    #[tokio::test]
    async fn test_ending_stored_match_does_not_stall_unstored_participant() {
        let (engine, store) = engine(scenario_embedder());

        // neither participant of this stored match has a record
        let old = Match::new("a".into(), "z".into(), 0.7, vec![], Utc::now());
        store.put_match(old.clone()).await.unwrap();
        engine.end_match(&old.id).await.unwrap();

        engine.submit(strings(B), Some("z".into())).await.unwrap();
        engine.writer().reconcile();
        engine.writer().flush().await;

        let z = store.get_participant(&"z".into()).await.unwrap().unwrap();
        assert_eq!(z.status, ParticipantStatus::Waiting);
        assert_eq!(engine.metrics().dirty_backlog, 0);
    }

    #[tokio::test]
    async fn test_evict_stale_ends_abandoned_matches() {
        let (engine, store) = engine(scenario_embedder());
        engine.submit(strings(A), Some("a".into())).await.unwrap();
        let SubmitOutcome::MatchFound { match_id, .. } =
            engine.submit(strings(B), Some("b".into())).await.unwrap()
        else {
            panic!("expected a match");
        };

        engine.evict_stale(Utc::now()).await;
        assert_eq!(
            engine.get_match(&match_id).await.unwrap().status,
            MatchStatus::Active
        );

        engine.evict_stale(Utc::now() + chrono::Duration::hours(2)).await;
        assert_eq!(
            engine.get_match(&match_id).await.unwrap().status,
            MatchStatus::Ended
        );
        assert_eq!(engine.metrics().matches_ended, 1);

        // no longer answered as a live match on resubmit
        let again = engine.submit(strings(A), Some("a".into())).await.unwrap();
        assert_matches!(again, SubmitOutcome::Waiting { .. });

        engine.writer().flush().await;
        let b = store.get_participant(&"b".into()).await.unwrap().unwrap();
        assert_eq!(b.status, ParticipantStatus::Offline);
        assert_eq!(
            store.get_match(&match_id).await.unwrap().unwrap().status,
            MatchStatus::Ended
        );
    }
}
