//! Visibility - Resolving a chain to the entry a reader may see
//!
//! Two rules cover all four isolation levels:
//!
//! - **Newest** (READ_UNCOMMITTED): the most recently appended entry,
//!   committed or not.
//! - **Committed at view** (every other level): among committed entries whose
//!   commit stamp is within the read view, the one with the largest stamp.
//!
//! In both rules a tombstone as the selected entry makes the key invisible;
//! older values behind it are never resurrected.

use super::{CommitId, ReadView, VersionChain, VersionedData};

/// Result of resolving a chain under one visibility rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisibilityResult<'a> {
    /// A live value is visible.
    Visible(&'a VersionedData),
    /// The selected entry is a tombstone.
    Deleted(&'a VersionedData),
    /// No entry qualifies.
    Invisible,
}

impl<'a> VisibilityResult<'a> {
    /// Returns the visible value, if any.
    pub fn value(&self) -> Option<&'a [u8]> {
        match self {
            VisibilityResult::Visible(entry) => entry.value(),
            VisibilityResult::Deleted(_) | VisibilityResult::Invisible => None,
        }
    }

    /// Returns the selected entry, tombstones included.
    pub fn entry(&self) -> Option<&'a VersionedData> {
        match self {
            VisibilityResult::Visible(entry) | VisibilityResult::Deleted(entry) => Some(entry),
            VisibilityResult::Invisible => None,
        }
    }

    /// Returns the commit stamp of the selected entry.
    ///
    /// This is what a serializable transaction records in its read set.
    pub fn observed_commit(&self) -> Option<CommitId> {
        self.entry().and_then(|entry| entry.commit_id())
    }

    pub fn is_visible(&self) -> bool {
        matches!(self, VisibilityResult::Visible(_))
    }
}

/// Stateless visibility resolver.
pub struct Visibility;

impl Visibility {
    /// Resolves the newest appended entry regardless of commit state.
    pub fn newest(chain: &VersionChain) -> VisibilityResult<'_> {
        match chain.newest() {
            Some(entry) => Self::classify(entry),
            None => VisibilityResult::Invisible,
        }
    }

    /// Resolves the latest committed entry inside `view`.
    ///
    /// Entries are compared by commit stamp rather than by position, so a
    /// transaction that appended earlier but committed later still wins.
    pub fn committed_at(chain: &VersionChain, view: ReadView) -> VisibilityResult<'_> {
        let selected = chain
            .iter_newest_first()
            .filter_map(|(_, entry)| entry.commit_id().map(|commit| (commit, entry)))
            .filter(|(commit, _)| view.includes(*commit))
            .max_by_key(|(commit, _)| *commit);

        match selected {
            Some((_, entry)) => Self::classify(entry),
            None => VisibilityResult::Invisible,
        }
    }

    fn classify(entry: &VersionedData) -> VisibilityResult<'_> {
        if entry.is_tombstone() {
            VisibilityResult::Deleted(entry)
        } else {
            VisibilityResult::Visible(entry)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn committed(value: &[u8], commit: u64) -> VersionedData {
        VersionedData::write(value.to_vec(), commit).committed_as(CommitId::new(commit))
    }

    fn committed_tombstone(commit: u64) -> VersionedData {
        VersionedData::tombstone(commit).committed_as(CommitId::new(commit))
    }

    #[test]
    fn test_newest_sees_uncommitted() {
        let mut chain = VersionChain::with_entries(vec![committed(b"v1", 1)]);
        chain.append(VersionedData::write(b"dirty".to_vec(), 2));

        let result = Visibility::newest(&chain);
        assert_eq!(result.value(), Some(&b"dirty"[..]));
    }

    #[test]
    fn test_newest_tombstone_is_absent() {
        let mut chain = VersionChain::with_entries(vec![committed(b"v1", 1)]);
        chain.append(VersionedData::tombstone(1));

        let result = Visibility::newest(&chain);
        assert!(matches!(result, VisibilityResult::Deleted(_)));
        assert_eq!(result.value(), None);
    }

    #[test]
    fn test_committed_at_selects_largest_within_bound() {
        let chain = VersionChain::with_entries(vec![
            committed(b"v1", 10),
            committed(b"v2", 20),
            committed(b"v3", 30),
        ]);

        let result = Visibility::committed_at(&chain, ReadView::new(CommitId::new(25)));
        assert_eq!(result.value(), Some(&b"v2"[..]));
        assert_eq!(result.observed_commit(), Some(CommitId::new(20)));
    }

    #[test]
    fn test_committed_at_skips_uncommitted() {
        let mut chain = VersionChain::with_entries(vec![committed(b"v1", 1)]);
        chain.append(VersionedData::write(b"pending".to_vec(), 2));

        let result = Visibility::committed_at(&chain, ReadView::new(CommitId::new(100)));
        assert_eq!(result.value(), Some(&b"v1"[..]));
    }

    #[test]
    fn test_committed_tombstone_hides_older_values() {
        let chain = VersionChain::with_entries(vec![committed(b"v1", 1), committed_tombstone(2)]);

        let result = Visibility::committed_at(&chain, ReadView::new(CommitId::new(2)));
        assert!(!result.is_visible());
        assert_eq!(result.observed_commit(), Some(CommitId::new(2)));

        // A view from before the delete still sees the value
        let earlier = Visibility::committed_at(&chain, ReadView::new(CommitId::new(1)));
        assert_eq!(earlier.value(), Some(&b"v1"[..]));
    }

    #[test]
    fn test_commit_order_beats_append_order() {
        // Appended first, committed second
        let mut chain = VersionChain::new();
        chain.append(committed(b"late-commit", 8));
        chain.append(committed(b"early-commit", 5));

        let result = Visibility::committed_at(&chain, ReadView::new(CommitId::new(10)));
        assert_eq!(result.value(), Some(&b"late-commit"[..]));
    }

    #[test]
    fn test_empty_chain_invisible() {
        let chain = VersionChain::new();
        assert_eq!(Visibility::newest(&chain), VisibilityResult::Invisible);
        assert_eq!(
            Visibility::committed_at(&chain, ReadView::new(CommitId::new(1))),
            VisibilityResult::Invisible
        );
    }
}
