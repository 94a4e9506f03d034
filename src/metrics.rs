//! Round and dispatch counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Process-wide counters shared by every table
pub struct RoundMetrics {
    start_time: Instant,
    rounds_opened: AtomicU64,
    rounds_settled: AtomicU64,
    empty_rounds: AtomicU64,
    bets_admitted: AtomicU64,
    bets_rejected: AtomicU64,
    dispatch_retries: AtomicU64,
    dispatch_failures: AtomicU64,
    fallback_rolls: AtomicU64,
    settlement_failures: AtomicU64,
}

/// Point-in-time copy of [`RoundMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub rounds_opened: u64,
    pub rounds_settled: u64,
    pub empty_rounds: u64,
    pub bets_admitted: u64,
    pub bets_rejected: u64,
    pub dispatch_retries: u64,
    pub dispatch_failures: u64,
    pub fallback_rolls: u64,
    pub settlement_failures: u64,
    pub uptime_secs: u64,
}

impl Default for RoundMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RoundMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            rounds_opened: AtomicU64::new(0),
            rounds_settled: AtomicU64::new(0),
            empty_rounds: AtomicU64::new(0),
            bets_admitted: AtomicU64::new(0),
            bets_rejected: AtomicU64::new(0),
            dispatch_retries: AtomicU64::new(0),
            dispatch_failures: AtomicU64::new(0),
            fallback_rolls: AtomicU64::new(0),
            settlement_failures: AtomicU64::new(0),
        }
    }

    pub fn record_round_opened(&self) {
        self.rounds_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_round_settled(&self) {
        self.rounds_settled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_empty_round(&self) {
        self.empty_rounds.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bet_admitted(&self) {
        self.bets_admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bet_rejected(&self) {
        self.bets_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatch_retry(&self) {
        self.dispatch_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatch_failure(&self) {
        self.dispatch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fallback_roll(&self) {
        self.fallback_rolls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_settlement_failure(&self) {
        self.settlement_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_runtime(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rounds_opened: self.rounds_opened.load(Ordering::Relaxed),
            rounds_settled: self.rounds_settled.load(Ordering::Relaxed),
            empty_rounds: self.empty_rounds.load(Ordering::Relaxed),
            bets_admitted: self.bets_admitted.load(Ordering::Relaxed),
            bets_rejected: self.bets_rejected.load(Ordering::Relaxed),
            dispatch_retries: self.dispatch_retries.load(Ordering::Relaxed),
            dispatch_failures: self.dispatch_failures.load(Ordering::Relaxed),
            fallback_rolls: self.fallback_rolls.load(Ordering::Relaxed),
            settlement_failures: self.settlement_failures.load(Ordering::Relaxed),
            uptime_secs: self.total_runtime().as_secs(),
        }
    }
}
