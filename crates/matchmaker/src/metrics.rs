//! Engine-local metrics
//!
//! Plain atomics, served as a JSON snapshot by the stats endpoint.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn increment(&self) {
        self.add(1);
    }

    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicU64,
}

impl Gauge {
    pub fn set(&self, value: u64) {
        self.value.store(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Count, sum, min and max of recorded microsecond values
#[derive(Debug)]
pub struct Histogram {
    count: AtomicU64,
    sum: AtomicU64,
    min: AtomicU64,
    max: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self {
            count: AtomicU64::new(0),
            sum: AtomicU64::new(0),
            min: AtomicU64::new(u64::MAX),
            max: AtomicU64::new(0),
        }
    }
}

impl Histogram {
    pub fn record(&self, duration: Duration) {
        let us = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum.fetch_add(us, Ordering::Relaxed);
        self.min.fetch_min(us, Ordering::Relaxed);
        self.max.fetch_max(us, Ordering::Relaxed);
    }

    pub fn stats(&self) -> HistogramStats {
        let count = self.count.load(Ordering::Relaxed);
        let sum = self.sum.load(Ordering::Relaxed);

        HistogramStats {
            count,
            avg_us: if count > 0 { sum / count } else { 0 },
            min_us: if count > 0 { self.min.load(Ordering::Relaxed) } else { 0 },
            max_us: self.max.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramStats {
    pub count: u64,
    pub avg_us: u64,
    pub min_us: u64,
    pub max_us: u64,
}

#[derive(Debug, Default)]
pub struct MatchmakingMetrics {
    pub submissions: Counter,
    pub invalid_submissions: Counter,
    pub embedding_failures: Counter,
    pub matches_created: Counter,
    pub matches_ended: Counter,
    pub evictions: Counter,
    pub persistence_writes: Counter,
    pub persistence_retries: Counter,
    pub persistence_failures: Counter,
    pub dirty_backlog: Gauge,
    pub waiting_participants: Gauge,
    pub active_matches: Gauge,
    pub embedding_latency: Histogram,
    pub submit_latency: Histogram,
}

impl MatchmakingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            submissions: self.submissions.get(),
            invalid_submissions: self.invalid_submissions.get(),
            embedding_failures: self.embedding_failures.get(),
            matches_created: self.matches_created.get(),
            matches_ended: self.matches_ended.get(),
            evictions: self.evictions.get(),
            persistence_writes: self.persistence_writes.get(),
            persistence_retries: self.persistence_retries.get(),
            persistence_failures: self.persistence_failures.get(),
            dirty_backlog: self.dirty_backlog.get(),
            waiting_participants: self.waiting_participants.get(),
            active_matches: self.active_matches.get(),
            embedding_latency: self.embedding_latency.stats(),
            submit_latency: self.submit_latency.stats(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub submissions: u64,
    pub invalid_submissions: u64,
    pub embedding_failures: u64,
    pub matches_created: u64,
    pub matches_ended: u64,
    pub evictions: u64,
    pub persistence_writes: u64,
    pub persistence_retries: u64,
    pub persistence_failures: u64,
    pub dirty_backlog: u64,
    pub waiting_participants: u64,
    pub active_matches: u64,
    pub embedding_latency: HistogramStats,
    pub submit_latency: HistogramStats,
}
