//! Errors that end a CLI invocation
//!
//! A `CliError` stops the process with exit code 1. Failures of single
//! `exec` requests are written as error responses instead.

use std::io;

use thiserror::Error;

use crate::storage::StorageError;
use crate::txn::TxnError;

/// Stable classification of a `CliError`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliErrorCode {
    ConfigError,
    IoError,
    AlreadyInitialized,
    NotInitialized,
    OpenFailed,
    InvalidRequest,
    EngineFailed,
}

impl CliErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "ATOMIX_CLI_CONFIG_ERROR",
            Self::IoError => "ATOMIX_CLI_IO_ERROR",
            Self::AlreadyInitialized => "ATOMIX_CLI_ALREADY_INITIALIZED",
            Self::NotInitialized => "ATOMIX_CLI_NOT_INITIALIZED",
            Self::OpenFailed => "ATOMIX_CLI_OPEN_FAILED",
            Self::InvalidRequest => "ATOMIX_CLI_INVALID_REQUEST",
            Self::EngineFailed => "ATOMIX_CLI_ENGINE_FAILED",
        }
    }
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration: {0}")]
    Config(String),

    #[error("i/o: {0}")]
    Io(#[from] io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("data directory already initialized")]
    AlreadyInitialized,

    #[error("data directory not initialized, run 'atomix init' first")]
    NotInitialized,

    #[error("open failed [{}]: {0}", .0.code())]
    Open(#[from] StorageError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("[{}] {0}", .0.code())]
    Engine(#[from] TxnError),
}

impl CliError {
    pub fn kind(&self) -> CliErrorCode {
        match self {
            CliError::Config(_) => CliErrorCode::ConfigError,
            CliError::Io(_) | CliError::Json(_) => CliErrorCode::IoError,
            CliError::AlreadyInitialized => CliErrorCode::AlreadyInitialized,
            CliError::NotInitialized => CliErrorCode::NotInitialized,
            CliError::Open(_) => CliErrorCode::OpenFailed,
            CliError::InvalidRequest(_) => CliErrorCode::InvalidRequest,
            CliError::Engine(_) => CliErrorCode::EngineFailed,
        }
    }

    pub fn code(&self) -> &'static str {
        self.kind().code()
    }
}

pub type CliResult<T> = Result<T, CliError>;
