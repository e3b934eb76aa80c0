//! Commit Authority - Owner of the global commit counter
//!
//! - Commit identities are assigned exactly once, in strictly increasing order
//! - The counter only moves after the commit's entries are durable
//! - At startup the counter resumes from the highest durable commit
//!
//! Assignment is split in two steps so the caller can persist between them:
//! `next_commit_id` proposes an identity, `mark_committed` accepts it once
//! the persistence adapter has acknowledged the batch. A failed write simply
//! never calls `mark_committed`, and the same identity is proposed again on
//! retry.

use crate::mvcc::{CommitId, ReadView};

/// Tracks the highest accepted commit identity.
///
/// Not thread-safe on its own; the engine keeps it behind its lock.
#[derive(Debug, Default)]
pub struct CommitAuthority {
    highest_commit_id: u64,
}

impl CommitAuthority {
    /// Creates an authority for an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an authority that resumes after `durable`.
    pub fn resume_from(durable: Option<CommitId>) -> Self {
        Self {
            highest_commit_id: durable.map(|id| id.value()).unwrap_or(0),
        }
    }

    /// Proposes the identity for the next commit.
    pub fn next_commit_id(&self) -> CommitId {
        CommitId::new(self.highest_commit_id + 1)
    }

    /// Accepts a proposed identity after its entries were persisted.
    ///
    /// Returns an error if `commit_id` is not exactly the proposed one.
    pub fn mark_committed(&mut self, commit_id: CommitId) -> Result<(), CommitAuthorityError> {
        let expected = self.highest_commit_id + 1;
        if commit_id.value() != expected {
            return Err(CommitAuthorityError::OutOfOrder {
                attempted: commit_id.value(),
                expected,
            });
        }
        self.highest_commit_id = commit_id.value();
        Ok(())
    }

    /// Returns the current commit counter (ORIGIN before the first commit).
    pub fn current(&self) -> CommitId {
        CommitId::new(self.highest_commit_id)
    }

    /// Returns a read view bounded by the current counter.
    pub fn current_snapshot(&self) -> ReadView {
        ReadView::new(self.current())
    }
}

/// Errors from commit identity assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitAuthorityError {
    /// Attempted to accept an identity other than the proposed one.
    OutOfOrder { attempted: u64, expected: u64 },
}

impl std::fmt::Display for CommitAuthorityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommitAuthorityError::OutOfOrder { attempted, expected } => {
                write!(
                    f,
                    "Out of order commit: attempted {} but expected {}",
                    attempted, expected
                )
            }
        }
    }
}

impl std::error::Error for CommitAuthorityError {}
