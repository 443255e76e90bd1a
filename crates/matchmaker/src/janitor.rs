//! Periodic eviction of idle waiting participants

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::engine::Matchmaker;

pub struct Janitor {
    matchmaker: Arc<Matchmaker>,
    interval: Duration,
}

impl Janitor {
    pub fn new(matchmaker: Arc<Matchmaker>, interval: Duration) -> Self {
        Self {
            matchmaker,
            interval,
        }
    }

    /// Sweep every `interval` until `shutdown` fires
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(interval = ?self.interval, "Janitor started");

        let mut timer = tokio::time::interval(self.interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        timer.tick().await; // first tick fires immediately

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    self.sweep().await;
                }
                _ = shutdown.cancelled() => {
                    info!("Janitor shutting down");
                    return;
                }
            }
        }
    }

    /// One eviction pass followed by a retry of parked store writes
    pub async fn sweep(&self) -> usize {
        let evicted = self.matchmaker.evict_stale(Utc::now()).await.len();
        self.matchmaker.writer().reconcile();
        debug!(evicted, "Janitor sweep complete");
        evicted
    }
}
