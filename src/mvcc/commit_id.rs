//! CommitId - Global commit sequence number
//!
//! - Totally orders all commits across every keyspace
//! - Assigned exactly once per successful commit
//! - Zero means "nothing committed yet"

use serde::{Deserialize, Serialize};

/// A totally ordered commit sequence number.
///
/// Every committed version carries the CommitId of the commit that made it
/// durable. Snapshot boundaries (see `ReadView`) are expressed in the same
/// unit, so visibility is a plain integer comparison.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitId(u64);

impl CommitId {
    /// The boundary before the first commit.
    pub const ORIGIN: CommitId = CommitId(0);

    #[inline]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the underlying sequence number.
    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Returns the commit identity that follows this one.
    #[inline]
    pub fn successor(&self) -> CommitId {
        CommitId(self.0 + 1)
    }
}

impl std::fmt::Display for CommitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_is_zero() {
        assert_eq!(CommitId::ORIGIN.value(), 0);
    }

    #[test]
    fn test_successor_is_strictly_greater() {
        let id = CommitId::new(41);
        assert_eq!(id.successor(), CommitId::new(42));
        assert!(id < id.successor());
    }

    #[test]
    fn test_serializes_as_plain_number() {
        let json = serde_json::to_string(&CommitId::new(7)).unwrap();
        assert_eq!(json, "7");

        let back: CommitId = serde_json::from_str("7").unwrap();
        assert_eq!(back, CommitId::new(7));
    }

    #[test]
    fn test_display() {
        assert_eq!(CommitId::new(123).to_string(), "123");
    }
}
