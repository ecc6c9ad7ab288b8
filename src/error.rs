//! Error taxonomy for the indexing and retrieval core.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors surfaced by the library.
///
/// `MalformedRecord` is produced by record sources and consumed by the
/// indexer, which logs and counts it. Every other variant is fatal to the
/// current run and propagates to the command layer.
#[derive(Error, Debug)]
pub enum Error {
    #[error("storage failure: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("no index found at {}; run `index` first", .0.display())]
    MissingIndex(PathBuf),

    #[error("malformed record #{position}: {reason}")]
    MalformedRecord { position: u64, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    pub fn malformed(position: u64, reason: impl Into<String>) -> Self {
        Error::MalformedRecord {
            position,
            reason: reason.into(),
        }
    }

    /// Short machine-readable category used by the CLI error payload.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Storage(_) | Error::MissingIndex(_) => "storage",
            Error::MalformedRecord { .. } => "malformed-record",
            Error::Io(_) | Error::Csv(_) => "io",
            Error::Config(_) => "config",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
