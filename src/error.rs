use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading and decoding trajectory samples.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("record not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// The demonstration record paired with a follower record is missing.
    #[error("companion demonstration record not found: {}", path.display())]
    CompanionNotFound { path: PathBuf },

    #[error("malformed record {}: {reason}", path.display())]
    MalformedRecord { path: PathBuf, reason: String },

    #[error("action code {code} maps to index {index}, outside one-hot range 0..{action_dim}")]
    InvalidActionCode {
        code: i64,
        index: i64,
        action_dim: usize,
    },

    #[error("index {index} out of range for dataset of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration: {reason}")]
    Config { reason: String },

    #[error("failed to write frame {}: {source}", path.display())]
    Export {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Flat classification of [`DataError`], handy for matching in callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    FileNotFound,
    CompanionNotFound,
    MalformedRecord,
    InvalidActionCode,
    IndexOutOfRange,
    Io,
    Config,
    Export,
}

impl DataError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DataError::FileNotFound { .. } => ErrorKind::FileNotFound,
            DataError::CompanionNotFound { .. } => ErrorKind::CompanionNotFound,
            DataError::MalformedRecord { .. } => ErrorKind::MalformedRecord,
            DataError::InvalidActionCode { .. } => ErrorKind::InvalidActionCode,
            DataError::IndexOutOfRange { .. } => ErrorKind::IndexOutOfRange,
            DataError::Io { .. } => ErrorKind::Io,
            DataError::Config { .. } => ErrorKind::Config,
            DataError::Export { .. } => ErrorKind::Export,
        }
    }

    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        DataError::MalformedRecord {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Maps an I/O failure on `path`, turning `NotFound` into [`DataError::FileNotFound`].
    pub(crate) fn from_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::NotFound {
            DataError::FileNotFound { path }
        } else {
            DataError::Io { path, source }
        }
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
