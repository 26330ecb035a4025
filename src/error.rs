//! Error types shared by the whole crate.

use std::path::PathBuf;
use thiserror::Error;

/// Structural failure kinds for algebra files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileErrorKind {
    /// A required element is absent.
    MissingElement,
    /// An element or attribute could not be parsed.
    Malformed,
    /// The file contains an algebra kind this crate does not read.
    UnsupportedKind,
    /// A numeric value lies outside its permitted range.
    ValueOutOfRange,
}

/// Error type for all fallible calculator operations.
#[derive(Error, Debug)]
pub enum CalcError {
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("invalid algebra: {message}")]
    InvalidAlgebra { message: String },

    #[error("invalid partition: {message}")]
    InvalidPartition { message: String },

    #[error("operation not found: {symbol}")]
    UnknownOperation { symbol: String },

    #[error("unbound variable: {name}")]
    UnboundVariable { name: String },

    #[error("bad algebra file ({kind:?}): {message}")]
    BadFile {
        kind: FileErrorKind,
        message: String,
        path: Option<PathBuf>,
        /// Byte offset into the input, when the parser can supply one.
        offset: Option<usize>,
    },

    #[error("memory limit exceeded: {message}")]
    MemoryLimitExceeded { message: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CalcError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        CalcError::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn invalid_algebra(message: impl Into<String>) -> Self {
        CalcError::InvalidAlgebra {
            message: message.into(),
        }
    }

    pub fn invalid_partition(message: impl Into<String>) -> Self {
        CalcError::InvalidPartition {
            message: message.into(),
        }
    }

    pub fn memory_limit(message: impl Into<String>) -> Self {
        CalcError::MemoryLimitExceeded {
            message: message.into(),
        }
    }

    pub fn bad_file(kind: FileErrorKind, message: impl Into<String>) -> Self {
        CalcError::BadFile {
            kind,
            message: message.into(),
            path: None,
            offset: None,
        }
    }

    /// Attach a file path to a `BadFile` error; other kinds pass through.
    pub fn with_path(self, p: impl Into<PathBuf>) -> Self {
        match self {
            CalcError::BadFile {
                kind,
                message,
                offset,
                ..
            } => CalcError::BadFile {
                kind,
                message,
                path: Some(p.into()),
                offset,
            },
            other => other,
        }
    }

    /// Attach a byte offset to a `BadFile` error; other kinds pass through.
    pub fn at_offset(self, pos: usize) -> Self {
        match self {
            CalcError::BadFile {
                kind,
                message,
                path,
                ..
            } => CalcError::BadFile {
                kind,
                message,
                path,
                offset: Some(pos),
            },
            other => other,
        }
    }
}

/// Result alias used throughout the crate.
pub type CalcResult<T> = Result<T, CalcError>;
