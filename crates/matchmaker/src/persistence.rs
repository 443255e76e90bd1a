//! Write-behind persistence
//!
//! The engine never waits on the store for a matching decision. Every durable
//! write is queued here and applied in order by one worker task. A write is
//! retried with exponential backoff; when its attempts run out it is parked in
//! a dirty backlog, and any later write for the same record is parked behind
//! it so per-record order holds. [`PersistenceWriter::reconcile`] (driven by
//! the janitor) replays the backlog. Permanent failures, such as a status
//! update for a record the store never saw, are dropped instead of parked.

use chrono::{DateTime, Utc};
use common::{MatchId, ParticipantId};
use config::PersistenceConfig;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::{Match, MatchStatus, Participant, ParticipantRecord, ParticipantStatus};
use crate::metrics::MatchmakingMetrics;
use crate::store::{MatchmakingStore, StoreResult};

/// Parked writes still failing after this many reconcile rounds are dropped
const MAX_RECONCILE_ROUNDS: u32 = 60;

#[derive(Debug, Clone, PartialEq)]
pub enum PersistOp {
    PutParticipant(ParticipantRecord),
    UpdateParticipantStatus {
        id: ParticipantId,
        status: ParticipantStatus,
        current_match_id: Option<MatchId>,
        last_active: DateTime<Utc>,
    },
    PutMatch(Match),
    UpdateMatchStatus {
        id: MatchId,
        status: MatchStatus,
        ended_at: Option<DateTime<Utc>>,
    },
}

impl PersistOp {
    pub fn participant_status(participant: &Participant) -> Self {
        PersistOp::UpdateParticipantStatus {
            id: participant.id.clone(),
            status: participant.status,
            current_match_id: participant.current_match_id.clone(),
            last_active: participant.last_active,
        }
    }

    pub fn offline(id: ParticipantId, now: DateTime<Utc>) -> Self {
        PersistOp::UpdateParticipantStatus {
            id,
            status: ParticipantStatus::Offline,
            current_match_id: None,
            last_active: now,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PersistOp::PutParticipant(_) => "put_participant",
            PersistOp::UpdateParticipantStatus { .. } => "update_participant_status",
            PersistOp::PutMatch(_) => "put_match",
            PersistOp::UpdateMatchStatus { .. } => "update_match_status",
        }
    }

    /// Identity of the record this op touches
    fn record_key(&self) -> String {
        match self {
            PersistOp::PutParticipant(r) => format!("participant:{}", r.id),
            PersistOp::UpdateParticipantStatus { id, .. } => format!("participant:{}", id),
            PersistOp::PutMatch(m) => format!("match:{}", m.id),
            PersistOp::UpdateMatchStatus { id, .. } => format!("match:{}", id),
        }
    }

    async fn apply(&self, store: &dyn MatchmakingStore) -> StoreResult<()> {
        match self {
            PersistOp::PutParticipant(record) => store.put_participant(record.clone()).await,
            PersistOp::UpdateParticipantStatus {
                id,
                status,
                current_match_id,
                last_active,
            } => {
                store
                    .update_participant_status(id, *status, current_match_id.clone(), *last_active)
                    .await
            }
            PersistOp::PutMatch(record) => store.put_match(record.clone()).await,
            PersistOp::UpdateMatchStatus { id, status, ended_at } => {
                store.update_match_status(id, *status, *ended_at).await
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (1-based): `base * 2^(attempt-1)`, capped
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl From<&PersistenceConfig> for RetryPolicy {
    fn from(config: &PersistenceConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

enum Command {
    Write(PersistOp),
    Reconcile,
    Flush(oneshot::Sender<()>),
}

/// Handle to the persistence worker. Cheap to clone.
#[derive(Clone)]
pub struct PersistenceWriter {
    tx: mpsc::UnboundedSender<Command>,
    metrics: Arc<MatchmakingMetrics>,
}

impl PersistenceWriter {
    /// Start the worker. It drains whatever is already queued once `shutdown`
    /// fires, then exits.
    pub fn spawn(
        store: Arc<dyn MatchmakingStore>,
        policy: RetryPolicy,
        metrics: Arc<MatchmakingMetrics>,
        shutdown: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = Worker {
            store,
            policy,
            metrics: Arc::clone(&metrics),
            backlog: VecDeque::new(),
        };
        let handle = tokio::spawn(worker.run(rx, shutdown));

        (Self { tx, metrics }, handle)
    }

    pub fn enqueue(&self, op: PersistOp) {
        let kind = op.kind();
        if self.tx.send(Command::Write(op)).is_err() {
            self.metrics.persistence_failures.increment();
            error!(op = kind, "Persistence worker stopped, write dropped");
        }
    }

    pub fn enqueue_all(&self, ops: impl IntoIterator<Item = PersistOp>) {
        for op in ops {
            self.enqueue(op);
        }
    }

    /// Ask the worker to replay its dirty backlog
    pub fn reconcile(&self) {
        let _ = self.tx.send(Command::Reconcile);
    }

    /// Resolves once every command queued before it has been handled
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(Command::Flush(tx)).is_ok() {
            let _ = rx.await;
        }
    }
}

struct Parked {
    op: PersistOp,
    rounds: u32,
}

struct Worker {
    store: Arc<dyn MatchmakingStore>,
    policy: RetryPolicy,
    metrics: Arc<MatchmakingMetrics>,
    backlog: VecDeque<Parked>,
}

impl Worker {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>, shutdown: CancellationToken) {
        info!("Persistence worker started");

        loop {
            tokio::select! {
                biased;
                command = rx.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
                _ = shutdown.cancelled() => {
                    rx.close();
                    while let Some(command) = rx.recv().await {
                        self.handle(command).await;
                    }
                    break;
                }
            }
        }

        if self.backlog.is_empty() {
            info!("Persistence worker stopped");
        } else {
            warn!(unsynced = self.backlog.len(), "Persistence worker stopped with unsynced writes");
        }
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Write(op) => {
                if self.is_blocked(&op.record_key()) {
                    debug!(op = op.kind(), "Record has parked writes, queueing behind them");
                    self.park(op);
                } else {
                    self.write_with_retry(op).await;
                }
            }
            Command::Reconcile => self.reconcile().await,
            Command::Flush(done) => {
                let _ = done.send(());
            }
        }
    }

    fn is_blocked(&self, key: &str) -> bool {
        self.backlog.iter().any(|p| p.op.record_key() == key)
    }

    fn park(&mut self, op: PersistOp) {
        self.backlog.push_back(Parked { op, rounds: 0 });
        self.metrics.dirty_backlog.set(self.backlog.len() as u64);
    }

    async fn write_with_retry(&mut self, op: PersistOp) {
        let attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=attempts {
            match op.apply(self.store.as_ref()).await {
                Ok(()) => {
                    self.metrics.persistence_writes.increment();
                    return;
                }
                Err(e) if e.is_permanent() => {
                    self.metrics.persistence_failures.increment();
                    warn!(op = op.kind(), error = %e, "Store write cannot succeed, dropping");
                    return;
                }
                Err(e) if attempt < attempts => {
                    let delay = self.policy.delay_for(attempt);
                    self.metrics.persistence_retries.increment();
                    warn!(op = op.kind(), attempt, ?delay, error = %e, "Store write failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    self.metrics.persistence_failures.increment();
                    error!(
                        op = op.kind(),
                        attempts,
                        error = %e,
                        "Store write failed, parking for reconciliation"
                    );
                }
            }
        }

        self.park(op);
    }

    async fn reconcile(&mut self) {
        if self.backlog.is_empty() {
            return;
        }

        let pending = std::mem::take(&mut self.backlog);
        let total = pending.len();
        let mut blocked: HashSet<String> = HashSet::new();
        let mut recovered = 0usize;
        let mut dropped = 0usize;

        for mut parked in pending {
            let key = parked.op.record_key();
            if blocked.contains(&key) {
                self.backlog.push_back(parked);
                continue;
            }

            match parked.op.apply(self.store.as_ref()).await {
                Ok(()) => {
                    recovered += 1;
                    self.metrics.persistence_writes.increment();
                }
                Err(e) if e.is_permanent() => {
                    dropped += 1;
                    warn!(op = parked.op.kind(), error = %e, "Parked write cannot succeed, dropping");
                }
                Err(e) => {
                    parked.rounds += 1;
                    blocked.insert(key);
                    if parked.rounds >= MAX_RECONCILE_ROUNDS {
                        dropped += 1;
                        error!(op = parked.op.kind(), error = %e, "Giving up on parked store write");
                    } else {
                        debug!(op = parked.op.kind(), error = %e, "Parked write still failing");
                        self.backlog.push_back(parked);
                    }
                }
            }
        }

        self.metrics.dirty_backlog.set(self.backlog.len() as u64);
        info!(
            total,
            recovered,
            dropped,
            remaining = self.backlog.len(),
            "Reconciled dirty backlog"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryStore, MockMatchmakingStore, StoreError};
    use crate::testing::participant;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(4), Duration::from_millis(500));
        assert_eq!(policy.delay_for(40), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_writes_are_applied_in_order() {
        let store = Arc::new(InMemoryStore::new());
        let metrics = Arc::new(MatchmakingMetrics::new());
        let (writer, _handle) = PersistenceWriter::spawn(
            store.clone(),
            fast_policy(3),
            metrics.clone(),
            CancellationToken::new(),
        );

        let mut p = participant("a", &["jazz"], vec![1.0]);
        writer.enqueue(PersistOp::PutParticipant(p.record()));
        p.go_offline(Utc::now());
        writer.enqueue(PersistOp::participant_status(&p));
        writer.flush().await;

        let stored = store.get_participant(&p.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ParticipantStatus::Offline);
        assert_eq!(metrics.persistence_writes.get(), 2);
    }

    #[tokio::test]
    async fn test_failed_write_is_parked_then_reconciled() {
        let put_calls = Arc::new(AtomicUsize::new(0));
        let counter = put_calls.clone();

        let mut store = MockMatchmakingStore::new();
        store.expect_put_participant().times(4).returning(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) < 3 {
                Err(StoreError::RedisError("connection refused".to_string()))
            } else {
                Ok(())
            }
        });
        // parked behind the failed put, only attempted during reconcile
        store
            .expect_update_participant_status()
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let metrics = Arc::new(MatchmakingMetrics::new());
        let (writer, _handle) = PersistenceWriter::spawn(
            Arc::new(store),
            fast_policy(3),
            metrics.clone(),
            CancellationToken::new(),
        );

        let p = participant("a", &["jazz"], vec![1.0]);
        writer.enqueue(PersistOp::PutParticipant(p.record()));
        writer.enqueue(PersistOp::offline(p.id.clone(), Utc::now()));
        writer.flush().await;

        assert_eq!(put_calls.load(Ordering::SeqCst), 3);
        assert_eq!(metrics.persistence_retries.get(), 2);
        assert_eq!(metrics.persistence_failures.get(), 1);
        assert_eq!(metrics.dirty_backlog.get(), 2);

        writer.reconcile();
        writer.flush().await;

        assert_eq!(metrics.dirty_backlog.get(), 0);
        assert_eq!(metrics.persistence_writes.get(), 2);
    }

    #[tokio::test]
    async fn test_missing_record_update_is_dropped_not_parked() {
        let store = Arc::new(InMemoryStore::new());
        let metrics = Arc::new(MatchmakingMetrics::new());
        let (writer, _handle) = PersistenceWriter::spawn(
            store.clone(),
            fast_policy(3),
            metrics.clone(),
            CancellationToken::new(),
        );

        let p = participant("z", &["jazz"], vec![1.0]);
        writer.enqueue(PersistOp::offline(p.id.clone(), Utc::now()));
        writer.enqueue(PersistOp::PutParticipant(p.record()));
        writer.flush().await;

        assert!(store.get_participant(&p.id).await.unwrap().is_some());
        assert_eq!(metrics.persistence_retries.get(), 0);
        assert_eq!(metrics.persistence_failures.get(), 1);
        assert_eq!(metrics.dirty_backlog.get(), 0);
    }

    #[tokio::test]
    async fn test_unrelated_records_are_not_blocked() {
        let mut store = MockMatchmakingStore::new();
        store
            .expect_put_participant()
            .returning(|_| Err(StoreError::Other("down".to_string())));
        store.expect_put_match().times(1).returning(|_| Ok(()));

        let metrics = Arc::new(MatchmakingMetrics::new());
        let (writer, _handle) = PersistenceWriter::spawn(
            Arc::new(store),
            fast_policy(1),
            metrics.clone(),
            CancellationToken::new(),
        );

        let p = participant("a", &["jazz"], vec![1.0]);
        writer.enqueue(PersistOp::PutParticipant(p.record()));
        writer.enqueue(PersistOp::PutMatch(Match::new(
            "a".into(),
            "b".into(),
            0.9,
            vec![],
            Utc::now(),
        )));
        writer.flush().await;

        assert_eq!(metrics.dirty_backlog.get(), 1);
        assert_eq!(metrics.persistence_writes.get(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_drains_queue() {
        let store = Arc::new(InMemoryStore::new());
        let token = CancellationToken::new();
        let (writer, handle) = PersistenceWriter::spawn(
            store.clone(),
            fast_policy(1),
            Arc::new(MatchmakingMetrics::new()),
            token.clone(),
        );

        for id in ["a", "b", "c"] {
            writer.enqueue(PersistOp::PutParticipant(participant(id, &["x"], vec![1.0]).record()));
        }
        token.cancel();
        handle.await.unwrap();

        assert_eq!(store.participant_count().await, 3);
    }
}
