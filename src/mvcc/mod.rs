//! MVCC Domain Types
//!
//! This module provides:
//! - `CommitId` - Global commit sequence number
//! - `VersionedData` - One value or tombstone with its version and commit stamp
//! - `VersionChain` - Append-ordered history of one key, addressed by `EntryId`
//! - `IsolationLevel` - The four read isolation levels
//! - `ReadView` - Snapshot boundary
//! - `CommitAuthority` - Commit counter with two-step assignment
//! - `Visibility` - Read rules over a chain
//! - `Retention` - Count-based and snapshot-aware chain trimming

mod commit_authority;
mod commit_id;
mod gc;
mod isolation;
mod read_view;
mod version;
mod version_chain;
mod visibility;

pub use commit_authority::{CommitAuthority, CommitAuthorityError};
pub use commit_id::CommitId;
pub use gc::{Retention, RetentionPlan, RetentionPolicy, SnapshotFloor};
pub use isolation::{IsolationLevel, UnknownIsolationLevel};
pub use read_view::ReadView;
pub use version::VersionedData;
pub use version_chain::{EntryId, VersionChain};
pub use visibility::{Visibility, VisibilityResult};
