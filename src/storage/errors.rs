//! Persistence error types
//!
//! Error codes:
//! - ATOMIX_STORAGE_IO_ERROR (retryable)
//! - ATOMIX_DATA_CORRUPTION (fatal, the store must not be opened)
//! - ATOMIX_STORAGE_FRAME_TOO_LARGE (the write can never succeed as is)
//! - ATOMIX_STORAGE_INJECTED (test adapters only)

use std::io;

use thiserror::Error;

/// Result type for persistence adapter operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence adapter errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {message}: {source}")]
    Io {
        message: String,
        #[source]
        source: io::Error,
    },

    #[error("Data corruption at byte offset {offset}: {reason}")]
    Corruption { offset: u64, reason: String },

    #[error("Frame of {size} bytes exceeds the {max} byte limit")]
    FrameTooLarge { size: usize, max: usize },

    #[error("Injected failure: {0}")]
    Injected(String),
}

impl StorageError {
    /// Wraps an I/O error with context.
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        StorageError::Io {
            message: message.into(),
            source,
        }
    }

    pub fn corruption(offset: u64, reason: impl Into<String>) -> Self {
        StorageError::Corruption {
            offset,
            reason: reason.into(),
        }
    }

    /// Returns the stable error code.
    pub fn code(&self) -> &'static str {
        match self {
            StorageError::Io { .. } => "ATOMIX_STORAGE_IO_ERROR",
            StorageError::Corruption { .. } => "ATOMIX_DATA_CORRUPTION",
            StorageError::FrameTooLarge { .. } => "ATOMIX_STORAGE_FRAME_TOO_LARGE",
            StorageError::Injected(_) => "ATOMIX_STORAGE_INJECTED",
        }
    }

    /// Fatal errors mean durable state cannot be trusted.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StorageError::Corruption { .. })
    }

    /// Whether repeating the same write may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Io { .. } | StorageError::Injected(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        let io_err = StorageError::io("write", io::Error::new(io::ErrorKind::Other, "disk"));
        assert_eq!(io_err.code(), "ATOMIX_STORAGE_IO_ERROR");
        assert!(!io_err.is_fatal());

        let corrupt = StorageError::corruption(128, "checksum mismatch");
        assert_eq!(corrupt.code(), "ATOMIX_DATA_CORRUPTION");
        assert!(corrupt.is_fatal());
        assert!(!corrupt.is_retryable());

        let oversized = StorageError::FrameTooLarge { size: 10, max: 5 };
        assert_eq!(oversized.code(), "ATOMIX_STORAGE_FRAME_TOO_LARGE");
        assert!(!oversized.is_fatal());
        assert!(!oversized.is_retryable());
    }

    #[test]
    fn test_display_carries_context() {
        let err = StorageError::corruption(64, "bad frame kind 9");
        let message = err.to_string();
        assert!(message.contains("64"));
        assert!(message.contains("bad frame kind 9"));
    }
}
