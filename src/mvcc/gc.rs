//! MVCC Garbage Collection - Bounding version chains
//!
//! A chain longer than `max_versions` is cut back to its newest
//! `max_versions` entries. Two retention policies exist:
//!
//! - `Count`: committed history beyond the window is dropped unconditionally.
//!   A REPEATABLE_READ or SERIALIZABLE transaction whose snapshot predates the
//!   retained window can then observe the key as absent. This is a known
//!   limitation of count-based trimming, kept as the default.
//! - `SnapshotAware`: the entry visible at each open snapshot boundary (the
//!   low-water-mark set) is kept even when it falls outside the window.
//!
//! Under both policies uncommitted entries are never collected; they belong
//! to open transactions and leave the chain through commit or abort.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use super::{CommitId, EntryId, VersionChain};

/// How garbage collection treats history needed by open snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// Keep only the newest `max_versions` entries.
    #[default]
    Count,
    /// Additionally keep every entry an open snapshot can still see.
    SnapshotAware,
}

/// Snapshot boundaries of open REPEATABLE_READ / SERIALIZABLE transactions.
#[derive(Debug, Clone, Default)]
pub struct SnapshotFloor {
    boundaries: BTreeSet<CommitId>,
}

impl SnapshotFloor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_boundaries(boundaries: impl IntoIterator<Item = CommitId>) -> Self {
        let mut floor = Self::new();
        for boundary in boundaries {
            floor.register(boundary);
        }
        floor
    }

    pub fn register(&mut self, boundary: CommitId) {
        self.boundaries.insert(boundary);
    }

    /// Returns the oldest open snapshot boundary.
    pub fn low_water_mark(&self) -> Option<CommitId> {
        self.boundaries.iter().next().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
    }

    /// Returns the handles of entries visible at some open boundary.
    fn protected_entries(&self, chain: &VersionChain) -> HashSet<EntryId> {
        self.boundaries
            .iter()
            .filter_map(|boundary| {
                chain
                    .iter()
                    .filter_map(|(id, entry)| entry.commit_id().map(|commit| (commit, id)))
                    .filter(|(commit, _)| commit <= boundary)
                    .max_by_key(|(commit, _)| *commit)
                    .map(|(_, id)| id)
            })
            .collect()
    }
}

/// Entries selected for removal from one chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionPlan {
    drop: Vec<EntryId>,
}

impl RetentionPlan {
    pub fn is_empty(&self) -> bool {
        self.drop.is_empty()
    }

    pub fn len(&self) -> usize {
        self.drop.len()
    }

    pub fn contains(&self, id: EntryId) -> bool {
        self.drop.contains(&id)
    }

    /// Removes the planned entries from `chain`, returning how many were removed.
    pub fn apply(&self, chain: &mut VersionChain) -> usize {
        self.drop
            .iter()
            .filter(|id| chain.retract(**id).is_some())
            .count()
    }
}

/// Plans chain trimming under a retention policy.
pub struct Retention;

impl Retention {
    /// Plans which entries to drop so that at most `max_versions` remain.
    ///
    /// `max_versions` is clamped to at least one so the newest entry always
    /// survives.
    pub fn plan(
        chain: &VersionChain,
        max_versions: usize,
        policy: RetentionPolicy,
        floor: &SnapshotFloor,
    ) -> RetentionPlan {
        let max_versions = max_versions.max(1);
        if chain.len() <= max_versions {
            return RetentionPlan::default();
        }

        let excess = chain.len() - max_versions;
        let protected = match policy {
            RetentionPolicy::SnapshotAware if !floor.is_empty() => floor.protected_entries(chain),
            RetentionPolicy::SnapshotAware | RetentionPolicy::Count => HashSet::new(),
        };

        // Only entries older than the retained window are candidates
        let drop = chain
            .iter()
            .take(excess)
            .filter(|(id, entry)| entry.is_committed() && !protected.contains(id))
            .map(|(id, _)| id)
            .collect();

        RetentionPlan { drop }
    }
}
