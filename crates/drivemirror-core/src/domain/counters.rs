//! Shared run counters
//!
//! Four counters describe one mirroring run: jobs discovered, jobs a
//! worker is currently driving, and the terminal completed/failed tallies.
//! Many executor workers mutate them concurrently, so every mutation is a
//! single atomic operation; readers take a [`CounterSnapshot`].
//!
//! `total`, `completed` and `failed` are monotonically non-decreasing
//! within a run; `in_flight` rises and falls. Counters live for one run
//! and are discarded afterward.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Atomic counters mutated by executor workers during a run
#[derive(Debug, Default)]
pub struct MirrorCounters {
    total: AtomicU64,
    in_flight: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

impl MirrorCounters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy job was discovered and queued
    pub fn record_queued(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    /// A worker picked a job up
    pub fn record_started(&self) {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
    }

    /// A job reached terminal success
    pub fn record_completed(&self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    /// A job reached terminal failure
    pub fn record_failed(&self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time view for the status sink
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            total: self.total.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time counter values handed to the status sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub total: u64,
    pub in_flight: u64,
    pub completed: u64,
    pub failed: u64,
}

impl CounterSnapshot {
    /// Jobs discovered but not yet terminal
    #[must_use]
    pub fn pending(&self) -> u64 {
        self.total
            .saturating_sub(self.completed)
            .saturating_sub(self.failed)
    }
}
