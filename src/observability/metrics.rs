//! Engine counters
//!
//! - Counters only, monotonic, reset on process start
//! - Lock-free: Relaxed atomics, readable while the engine lock is held

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Operational counters of one transaction engine.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    commits: AtomicU64,
    commit_failures: AtomicU64,
    serialization_conflicts: AtomicU64,
    aborts: AtomicU64,
    retracted_entries: AtomicU64,
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
    offloaded: AtomicU64,
    gc_runs: AtomicU64,
    keys_trimmed: AtomicU64,
    versions_collected: AtomicU64,
    identities: AtomicU64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_commits(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_commit_failures(&self) {
        self.commit_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_serialization_conflicts(&self) {
        self.serialization_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_aborts(&self) {
        self.aborts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_retracted_entries(&self, count: u64) {
        self.retracted_entries.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_reads(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_writes(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_deletes(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_offloaded(&self, count: u64) {
        self.offloaded.fetch_add(count, Ordering::Relaxed);
    }

    /// Records one collection run.
    pub fn record_gc_run(&self, keys_trimmed: u64, versions_collected: u64) {
        self.gc_runs.fetch_add(1, Ordering::Relaxed);
        self.keys_trimmed.fetch_add(keys_trimmed, Ordering::Relaxed);
        self.versions_collected
            .fetch_add(versions_collected, Ordering::Relaxed);
    }

    pub fn increment_identities(&self) {
        self.identities.fetch_add(1, Ordering::Relaxed);
    }

    pub fn identities(&self) -> u64 {
        self.identities.load(Ordering::Relaxed)
    }

    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    /// Get all counters at once
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            commits: self.commits.load(Ordering::Relaxed),
            commit_failures: self.commit_failures.load(Ordering::Relaxed),
            serialization_conflicts: self.serialization_conflicts.load(Ordering::Relaxed),
            aborts: self.aborts.load(Ordering::Relaxed),
            retracted_entries: self.retracted_entries.load(Ordering::Relaxed),
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            offloaded: self.offloaded.load(Ordering::Relaxed),
            gc_runs: self.gc_runs.load(Ordering::Relaxed),
            keys_trimmed: self.keys_trimmed.load(Ordering::Relaxed),
            versions_collected: self.versions_collected.load(Ordering::Relaxed),
            identities: self.identities.load(Ordering::Relaxed),
        }
    }

    /// Serialize counters as one JSON object
    pub fn to_json(&self) -> String {
        // A struct of plain u64 fields always serializes
        serde_json::to_string(&self.snapshot()).unwrap_or_default()
    }
}

/// Point-in-time copy of the engine counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub commits: u64,
    pub commit_failures: u64,
    pub serialization_conflicts: u64,
    pub aborts: u64,
    pub retracted_entries: u64,
    pub reads: u64,
    pub writes: u64,
    pub deletes: u64,
    pub offloaded: u64,
    pub gc_runs: u64,
    pub keys_trimmed: u64,
    pub versions_collected: u64,
    pub identities: u64,
}
