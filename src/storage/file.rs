//! File-backed persistence adapter
//!
//! All chains live in one append-only log, `<data_dir>/chains.dat`, made of
//! checksummed frames (see `record`). Every frame is fsynced before the
//! write is acknowledged.
//!
//! On open the log is replayed into an in-memory index of
//! `(keyspace, key) -> chain`:
//! - a torn final frame (the process died mid-write) is truncated away
//! - any other undecodable frame is corruption and the open fails
//!
//! A frame only counts as torn when its declared length is within
//! `MAX_FRAME_SIZE`, runs past the end of the file, and no intact frame
//! starts anywhere after it. Otherwise truncating would drop committed
//! frames, so the open fails with `Corruption` instead.
//!
//! A failed append truncates the file back to its previous length so a
//! partially written frame never survives to the next open.
//!
//! The log is never compacted. Garbage collection appends a trim frame
//! that replaces the chain in the index, but the superseded commit frames
//! stay on disk. They also carry the commit-id high-water mark that
//! `highest_commit` reports after a reopen, even when every entry of that
//! commit has since been trimmed.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::adapter::{merge_entry, PersistenceAdapter};
use super::errors::{StorageError, StorageResult};
use super::record::{Frame, FrameError, MAX_FRAME_SIZE};
use crate::mvcc::{CommitId, VersionedData};
use crate::observability::{log_event_with_fields, Event};

/// File name of the chain log inside the data directory.
pub const CHAIN_LOG_FILE: &str = "chains.dat";

type ChainIndex = HashMap<(String, String), Vec<VersionedData>>;

#[derive(Debug)]
struct LogState {
    file: File,
    offset: u64,
    index: ChainIndex,
    highest_commit: Option<CommitId>,
}

/// Append-only, fsynced chain log.
#[derive(Debug)]
pub struct FileAdapter {
    path: PathBuf,
    state: Mutex<LogState>,
}

impl FileAdapter {
    /// Opens or creates the chain log under `data_dir`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the directory or file cannot be created,
    /// and `StorageError::Corruption` if a frame before the tail is invalid.
    pub fn open(data_dir: &Path) -> StorageResult<Self> {
        if !data_dir.exists() {
            fs::create_dir_all(data_dir).map_err(|e| {
                StorageError::io(
                    format!("Failed to create data directory: {}", data_dir.display()),
                    e,
                )
            })?;
        }

        let path = data_dir.join(CHAIN_LOG_FILE);
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                StorageError::io(format!("Failed to open chain log: {}", path.display()), e)
            })?;

        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .map_err(|e| StorageError::io("Failed to read chain log", e))?;

        let path_str = path.display().to_string();
        let mut index = ChainIndex::new();
        let mut highest_commit = None;
        let mut offset = 0usize;
        let mut frames = 0u64;

        while offset < data.len() {
            match Frame::deserialize(&data[offset..]) {
                Ok((frame, consumed)) => {
                    apply_frame(&mut index, &mut highest_commit, &frame);
                    offset += consumed;
                    frames += 1;
                }
                Err(FrameError::Truncated { .. }) => {
                    if let Some(next) = intact_frame_after(&data, offset) {
                        let reason = format!(
                            "frame runs past end of log but an intact frame starts at {}",
                            next
                        );
                        return Err(corruption_at(&path_str, offset, reason));
                    }

                    let discarded = (data.len() - offset).to_string();
                    let at = offset.to_string();
                    log_event_with_fields(
                        Event::StoreTornTail,
                        &[
                            ("path", path_str.as_str()),
                            ("offset", at.as_str()),
                            ("discarded_bytes", discarded.as_str()),
                        ],
                    );
                    file.set_len(offset as u64)
                        .map_err(|e| StorageError::io("Failed to truncate torn tail", e))?;
                    file.sync_all()
                        .map_err(|e| StorageError::io("Failed to fsync chain log", e))?;
                    break;
                }
                Err(e) => return Err(corruption_at(&path_str, offset, e.to_string())),
            }
        }

        let frames = frames.to_string();
        let chains = index.len().to_string();
        log_event_with_fields(
            Event::StoreOpened,
            &[
                ("path", path_str.as_str()),
                ("frames", frames.as_str()),
                ("chains", chains.as_str()),
            ],
        );

        Ok(Self {
            path,
            state: Mutex::new(LogState {
                file,
                offset: offset as u64,
                index,
                highest_commit,
            }),
        })
    }

    /// Returns the path of the chain log.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, LogState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl LogState {
    /// Appends and fsyncs one frame, then folds it into the index.
    fn append(&mut self, frame: Frame) -> StorageResult<()> {
        let bytes = frame.serialize().map_err(|e| match e {
            FrameError::Oversized { size, max } => StorageError::FrameTooLarge { size, max },
            other => StorageError::corruption(self.offset, other.to_string()),
        })?;

        let written = self
            .file
            .write_all(&bytes)
            .and_then(|_| self.file.sync_all());
        if let Err(e) = written {
            // Best effort: drop whatever part of the frame reached the file
            let _ = self.file.set_len(self.offset);
            return Err(StorageError::io("Failed to append frame", e));
        }

        self.offset += bytes.len() as u64;
        apply_frame(&mut self.index, &mut self.highest_commit, &frame);
        Ok(())
    }
}

fn corruption_at(path: &str, offset: usize, reason: String) -> StorageError {
    let at = offset.to_string();
    log_event_with_fields(
        Event::StoreCorruption,
        &[("path", path), ("offset", at.as_str()), ("reason", reason.as_str())],
    );
    StorageError::corruption(offset as u64, reason)
}

/// Offset of the first decodable frame strictly after `start`, if any.
///
/// Only offsets within one maximal frame of `start` are scanned; a torn
/// frame is never longer than that.
fn intact_frame_after(data: &[u8], start: usize) -> Option<usize> {
    let end = data.len().min(start.saturating_add(MAX_FRAME_SIZE));
    (start + 1..end).find(|&at| Frame::deserialize(&data[at..]).is_ok())
}

fn apply_frame(index: &mut ChainIndex, highest_commit: &mut Option<CommitId>, frame: &Frame) {
    match frame {
        Frame::Commit { keyspace, entries } => {
            for (key, entry) in entries {
                let chain = index.entry((keyspace.clone(), key.clone())).or_default();
                merge_entry(chain, entry);
                if let Some(commit) = entry.commit_id() {
                    *highest_commit = (*highest_commit).max(Some(commit));
                }
            }
        }
        Frame::Trim {
            keyspace,
            key,
            retained,
        } => {
            index.insert((keyspace.clone(), key.clone()), retained.clone());
        }
    }
}

impl PersistenceAdapter for FileAdapter {
    fn put(&self, keyspace: &str, key: &str, entry: &VersionedData) -> StorageResult<()> {
        self.put_batch(keyspace, &[(key.to_string(), entry.clone())])
    }

    fn put_batch(&self, keyspace: &str, entries: &[(String, VersionedData)]) -> StorageResult<()> {
        let mut state = self.lock();

        let fresh: Vec<(String, VersionedData)> = entries
            .iter()
            .filter(|(key, entry)| {
                let durable = state.index.get(&(keyspace.to_string(), key.clone()));
                match (durable, entry.commit_id()) {
                    (Some(chain), Some(commit)) => {
                        !chain.iter().any(|e| e.commit_id() == Some(commit))
                    }
                    _ => true,
                }
            })
            .cloned()
            .collect();
        if fresh.is_empty() {
            return Ok(());
        }

        state.append(Frame::Commit {
            keyspace: keyspace.to_string(),
            entries: fresh,
        })
    }

    fn load_chain(&self, keyspace: &str, key: &str) -> StorageResult<Vec<VersionedData>> {
        let state = self.lock();
        Ok(state
            .index
            .get(&(keyspace.to_string(), key.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    fn trim_chain(
        &self,
        keyspace: &str,
        key: &str,
        retained: &[VersionedData],
    ) -> StorageResult<()> {
        self.lock().append(Frame::Trim {
            keyspace: keyspace.to_string(),
            key: key.to_string(),
            retained: retained.to_vec(),
        })
    }

    fn keys(&self, keyspace: &str) -> StorageResult<Vec<String>> {
        let state = self.lock();
        let mut keys: Vec<String> = state
            .index
            .keys()
            .filter(|(space, _)| space == keyspace)
            .map(|(_, key)| key.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn highest_commit(&self) -> StorageResult<Option<CommitId>> {
        Ok(self.lock().highest_commit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn committed(value: &[u8], commit: u64) -> VersionedData {
        VersionedData::write(value.to_vec(), commit).committed_as(CommitId::new(commit))
    }

    #[test]
    fn test_open_creates_log() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("nested");
        let adapter = FileAdapter::open(&dir).unwrap();

        assert!(adapter.path().exists());
        assert_eq!(adapter.highest_commit().unwrap(), None);
    }

    #[test]
    fn test_entries_survive_reopen() {
        let temp = TempDir::new().unwrap();
        {
            let adapter = FileAdapter::open(temp.path()).unwrap();
            adapter
                .put_batch(
                    "a",
                    &[
                        ("x".to_string(), committed(b"1", 1)),
                        ("y".to_string(), committed(b"2", 1)),
                    ],
                )
                .unwrap();
            adapter.put("a", "x", &committed(b"3", 2)).unwrap();
        }

        let adapter = FileAdapter::open(temp.path()).unwrap();
        assert_eq!(adapter.keys("a").unwrap(), vec!["x".to_string(), "y".to_string()]);
        assert_eq!(adapter.load_chain("a", "x").unwrap().len(), 2);
        assert_eq!(adapter.highest_commit().unwrap(), Some(CommitId::new(2)));
    }

    #[test]
    fn test_duplicate_put_not_rewritten() {
        let temp = TempDir::new().unwrap();
        let adapter = FileAdapter::open(temp.path()).unwrap();
        let entry = committed(b"1", 1);

        adapter.put("a", "k", &entry).unwrap();
        let len_after_first = fs::metadata(adapter.path()).unwrap().len();
        adapter.put("a", "k", &entry).unwrap();

        assert_eq!(fs::metadata(adapter.path()).unwrap().len(), len_after_first);
        assert_eq!(adapter.load_chain("a", "k").unwrap().len(), 1);
    }

    #[test]
    fn test_trim_survives_reopen() {
        let temp = TempDir::new().unwrap();
        {
            let adapter = FileAdapter::open(temp.path()).unwrap();
            for c in 1..=3 {
                adapter.put("a", "k", &committed(b"v", c)).unwrap();
            }
            adapter.trim_chain("a", "k", &[committed(b"v", 3)]).unwrap();
        }

        let adapter = FileAdapter::open(temp.path()).unwrap();
        let chain = adapter.load_chain("a", "k").unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].commit_id(), Some(CommitId::new(3)));
        assert_eq!(adapter.highest_commit().unwrap(), Some(CommitId::new(3)));
    }

    #[test]
    fn test_trim_appends_and_keeps_high_water_mark() {
        let temp = TempDir::new().unwrap();
        {
            let adapter = FileAdapter::open(temp.path()).unwrap();
            for c in 1..=3 {
                adapter.put("a", "k", &committed(b"v", c)).unwrap();
            }
            let before = fs::metadata(adapter.path()).unwrap().len();
            adapter.trim_chain("a", "k", &[]).unwrap();
            assert!(fs::metadata(adapter.path()).unwrap().len() > before);
        }

        let adapter = FileAdapter::open(temp.path()).unwrap();
        assert!(adapter.load_chain("a", "k").unwrap().is_empty());
        assert_eq!(adapter.highest_commit().unwrap(), Some(CommitId::new(3)));
    }

    #[test]
    fn test_oversized_entry_rejected_without_writing() {
        let temp = TempDir::new().unwrap();
        let adapter = FileAdapter::open(temp.path()).unwrap();
        adapter.put("a", "k", &committed(b"small", 1)).unwrap();
        let len_before = fs::metadata(adapter.path()).unwrap().len();

        let huge = committed(&vec![7u8; MAX_FRAME_SIZE], 2);
        let err = adapter.put("a", "k", &huge).unwrap_err();

        assert_eq!(err.code(), "ATOMIX_STORAGE_FRAME_TOO_LARGE");
        assert_eq!(fs::metadata(adapter.path()).unwrap().len(), len_before);
        assert_eq!(adapter.highest_commit().unwrap(), Some(CommitId::new(1)));
    }

    #[test]
    fn test_torn_tail_truncated() {
        let temp = TempDir::new().unwrap();
        let path;
        {
            let adapter = FileAdapter::open(temp.path()).unwrap();
            adapter.put("a", "k", &committed(b"1", 1)).unwrap();
            path = adapter.path().to_path_buf();
        }
        let good_len = fs::metadata(&path).unwrap().len();

        let mut torn = Frame::Commit {
            keyspace: "a".to_string(),
            entries: vec![("k".to_string(), committed(b"2", 2))],
        }
        .serialize()
        .unwrap();
        torn.truncate(torn.len() / 2);
        OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(&torn)
            .unwrap();

        let adapter = FileAdapter::open(temp.path()).unwrap();
        assert_eq!(adapter.load_chain("a", "k").unwrap().len(), 1);
        assert_eq!(adapter.highest_commit().unwrap(), Some(CommitId::new(1)));
        assert_eq!(fs::metadata(&path).unwrap().len(), good_len);
    }

    #[test]
    fn test_corrupted_frame_fails_open() {
        let temp = TempDir::new().unwrap();
        let path;
        {
            let adapter = FileAdapter::open(temp.path()).unwrap();
            adapter.put("a", "k", &committed(b"1", 1)).unwrap();
            adapter.put("a", "k", &committed(b"2", 2)).unwrap();
            path = adapter.path().to_path_buf();
        }

        let mut data = fs::read(&path).unwrap();
        data[8] ^= 0xFF;
        fs::write(&path, &data).unwrap();

        let err = FileAdapter::open(temp.path()).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(err.code(), "ATOMIX_DATA_CORRUPTION");
    }
}
