//! Persistence for version chains
//!
//! The engine only sees the `PersistenceAdapter` trait. Two adapters ship
//! with the crate:
//!
//! - `MemoryAdapter`: in-process, with failure injection for tests
//! - `FileAdapter`: append-only checksummed frame log, fsync per frame
//!
//! # Guarantees
//!
//! - A commit batch is durable as a whole or not at all
//! - Writing the same (key, commit id) twice leaves one entry
//! - Corruption before the log tail halts the open

mod adapter;
mod checksum;
mod errors;
mod file;
mod memory;
mod record;

pub use adapter::PersistenceAdapter;
pub use checksum::compute_checksum;
pub use errors::{StorageError, StorageResult};
pub use file::{FileAdapter, CHAIN_LOG_FILE};
pub use memory::MemoryAdapter;
pub use record::{Frame, FrameError};
