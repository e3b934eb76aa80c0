//! ReadView - Snapshot boundary
//!
//! A read view is a single upper bound: committed entries stamped at or
//! below it are candidates for visibility, everything above is invisible.
//! READ_COMMITTED builds one from the live commit counter on every read;
//! REPEATABLE_READ and SERIALIZABLE build one from the caller's
//! transaction version and keep using it for the whole transaction.

use super::CommitId;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ReadView {
    upper_bound: CommitId,
}

impl ReadView {
    #[inline]
    pub fn new(upper_bound: CommitId) -> Self {
        Self { upper_bound }
    }

    /// Builds a view from a raw transaction version.
    #[inline]
    pub fn at_version(transaction_version: u64) -> Self {
        Self::new(CommitId::new(transaction_version))
    }

    #[inline]
    pub fn upper_bound(&self) -> CommitId {
        self.upper_bound
    }

    /// Returns true if a commit stamp falls inside this view.
    #[inline]
    pub fn includes(&self, commit_id: CommitId) -> bool {
        commit_id <= self.upper_bound
    }
}
