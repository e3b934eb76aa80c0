//! Chain log frame format
//!
//! ```text
//! +------------------+
//! | Frame Length     | (u32 LE, includes itself and the checksum)
//! +------------------+
//! | Kind             | (u8: 1 = commit batch, 2 = trim)
//! +------------------+
//! | Body             | (kind specific)
//! +------------------+
//! | Checksum         | (u32 LE, CRC32 over length + kind + body)
//! +------------------+
//! ```
//!
//! Commit body: keyspace, entry count, then per entry the key and the entry.
//! Trim body: keyspace, key, entry count, then the retained entries.
//!
//! Entry encoding: version (u64 LE), commit stamp (u64 LE, 0 = uncommitted),
//! flags (u8: bit 0 tombstone, bit 1 has value), value (length-prefixed,
//! present only when bit 1 is set).

use std::io::{self, Cursor, Read};

use super::checksum::{compute_checksum, verify_checksum};
use crate::mvcc::{CommitId, VersionedData};

const KIND_COMMIT: u8 = 1;
const KIND_TRIM: u8 = 2;

const FLAG_TOMBSTONE: u8 = 0b01;
const FLAG_HAS_VALUE: u8 = 0b10;

/// Length prefix + kind + checksum.
pub const MIN_FRAME_SIZE: usize = 4 + 1 + 4;

/// Largest frame the log writes or accepts.
///
/// A decoded length above this bound is a damaged prefix, never a torn
/// write.
pub const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

/// One durable unit of the chain log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// All entries made durable by one commit.
    Commit {
        keyspace: String,
        entries: Vec<(String, VersionedData)>,
    },
    /// Replacement of one chain after garbage collection.
    Trim {
        keyspace: String,
        key: String,
        retained: Vec<VersionedData>,
    },
}

/// Why a frame could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Fewer bytes remain than the frame needs; a torn write at the tail.
    Truncated { needed: usize, available: usize },
    /// The bytes are complete but wrong.
    Invalid(String),
    /// The frame would exceed `MAX_FRAME_SIZE` and cannot be written.
    Oversized { size: usize, max: usize },
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameError::Truncated { needed, available } => write!(
                f,
                "frame truncated: needed {} bytes, {} available",
                needed, available
            ),
            FrameError::Invalid(reason) => write!(f, "invalid frame: {}", reason),
            FrameError::Oversized { size, max } => {
                write!(f, "frame of {} bytes exceeds the {} byte limit", size, max)
            }
        }
    }
}

impl Frame {
    /// Serializes the frame including length prefix and checksum.
    ///
    /// # Errors
    ///
    /// `FrameError::Oversized` if the encoded frame would exceed
    /// `MAX_FRAME_SIZE`.
    pub fn serialize(&self) -> Result<Vec<u8>, FrameError> {
        let mut body = Vec::new();
        let kind = match self {
            Frame::Commit { keyspace, entries } => {
                write_bytes(&mut body, keyspace.as_bytes())?;
                write_len(&mut body, entries.len())?;
                for (key, entry) in entries {
                    write_bytes(&mut body, key.as_bytes())?;
                    write_entry(&mut body, entry)?;
                }
                KIND_COMMIT
            }
            Frame::Trim {
                keyspace,
                key,
                retained,
            } => {
                write_bytes(&mut body, keyspace.as_bytes())?;
                write_bytes(&mut body, key.as_bytes())?;
                write_len(&mut body, retained.len())?;
                for entry in retained {
                    write_entry(&mut body, entry)?;
                }
                KIND_TRIM
            }
        };

        let frame_length = MIN_FRAME_SIZE + body.len();
        if frame_length > MAX_FRAME_SIZE {
            return Err(FrameError::Oversized {
                size: frame_length,
                max: MAX_FRAME_SIZE,
            });
        }

        let mut frame = Vec::with_capacity(frame_length);
        write_len(&mut frame, frame_length)?;
        frame.push(kind);
        frame.extend_from_slice(&body);

        let checksum = compute_checksum(&frame);
        frame.extend_from_slice(&checksum.to_le_bytes());
        Ok(frame)
    }

    /// Decodes one frame from the start of `data`, verifying its checksum.
    ///
    /// Returns the frame and the number of bytes consumed.
    pub fn deserialize(data: &[u8]) -> Result<(Self, usize), FrameError> {
        if data.len() < MIN_FRAME_SIZE {
            return Err(FrameError::Truncated {
                needed: MIN_FRAME_SIZE,
                available: data.len(),
            });
        }

        let frame_length = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if !(MIN_FRAME_SIZE..=MAX_FRAME_SIZE).contains(&frame_length) {
            return Err(FrameError::Invalid(format!(
                "frame length {} outside {}..={}",
                frame_length, MIN_FRAME_SIZE, MAX_FRAME_SIZE
            )));
        }
        if data.len() < frame_length {
            return Err(FrameError::Truncated {
                needed: frame_length,
                available: data.len(),
            });
        }

        let checksum_offset = frame_length - 4;
        let stored = u32::from_le_bytes([
            data[checksum_offset],
            data[checksum_offset + 1],
            data[checksum_offset + 2],
            data[checksum_offset + 3],
        ]);
        if !verify_checksum(&data[..checksum_offset], stored) {
            return Err(FrameError::Invalid(format!(
                "checksum mismatch: computed {:08x}, stored {:08x}",
                compute_checksum(&data[..checksum_offset]),
                stored
            )));
        }

        let kind = data[4];
        let mut cursor = Cursor::new(&data[5..checksum_offset]);
        let frame = match kind {
            KIND_COMMIT => {
                let keyspace = read_string(&mut cursor)?;
                let count = read_u32(&mut cursor)?;
                let mut entries = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let key = read_string(&mut cursor)?;
                    entries.push((key, read_entry(&mut cursor)?));
                }
                Frame::Commit { keyspace, entries }
            }
            KIND_TRIM => {
                let keyspace = read_string(&mut cursor)?;
                let key = read_string(&mut cursor)?;
                let count = read_u32(&mut cursor)?;
                let mut retained = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    retained.push(read_entry(&mut cursor)?);
                }
                Frame::Trim {
                    keyspace,
                    key,
                    retained,
                }
            }
            other => return Err(FrameError::Invalid(format!("unknown frame kind {}", other))),
        };

        Ok((frame, frame_length))
    }
}

fn write_len(buf: &mut Vec<u8>, len: usize) -> Result<(), FrameError> {
    let encoded = u32::try_from(len).map_err(|_| FrameError::Oversized {
        size: len,
        max: MAX_FRAME_SIZE,
    })?;
    buf.extend_from_slice(&encoded.to_le_bytes());
    Ok(())
}

fn write_bytes(buf: &mut Vec<u8>, bytes: &[u8]) -> Result<(), FrameError> {
    write_len(buf, bytes.len())?;
    buf.extend_from_slice(bytes);
    Ok(())
}

fn write_entry(buf: &mut Vec<u8>, entry: &VersionedData) -> Result<(), FrameError> {
    buf.extend_from_slice(&entry.version().to_le_bytes());
    let commit = entry.commit_id().map(|c| c.value()).unwrap_or(0);
    buf.extend_from_slice(&commit.to_le_bytes());

    let mut flags = 0u8;
    if entry.is_tombstone() {
        flags |= FLAG_TOMBSTONE;
    }
    match entry.value() {
        Some(value) => {
            buf.push(flags | FLAG_HAS_VALUE);
            write_bytes(buf, value)
        }
        None => {
            buf.push(flags);
            Ok(())
        }
    }
}

fn invalid(e: io::Error) -> FrameError {
    FrameError::Invalid(format!("malformed body: {}", e))
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32, FrameError> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf).map_err(invalid)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(reader: &mut R) -> Result<u64, FrameError> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf).map_err(invalid)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_bytes<R: Read>(reader: &mut R) -> Result<Vec<u8>, FrameError> {
    let len = read_u32(reader)? as usize;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).map_err(invalid)?;
    Ok(buf)
}

fn read_string<R: Read>(reader: &mut R) -> Result<String, FrameError> {
    String::from_utf8(read_bytes(reader)?)
        .map_err(|e| FrameError::Invalid(format!("invalid UTF-8: {}", e)))
}

fn read_entry<R: Read>(reader: &mut R) -> Result<VersionedData, FrameError> {
    let version = read_u64(reader)?;
    let commit = match read_u64(reader)? {
        0 => None,
        c => Some(CommitId::new(c)),
    };

    let mut flags = [0u8; 1];
    reader.read_exact(&mut flags).map_err(invalid)?;
    let value = if flags[0] & FLAG_HAS_VALUE != 0 {
        Some(read_bytes(reader)?)
    } else {
        None
    };

    Ok(VersionedData::restore(
        value,
        version,
        commit,
        flags[0] & FLAG_TOMBSTONE != 0,
    ))
}
