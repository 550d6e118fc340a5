//! Error types for the decode pipeline.

use thiserror::Error;

/// The external decoder rejected a payload.
///
/// Always recoverable: the engine records it and moves on to the next payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DecodeError {
    pub message: String,
}

impl DecodeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The decoder artifact could not be loaded. Fatal at startup.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("decoder artifact not found at {path}")]
    NotFound { path: String },

    #[error("failed to read decoder artifact {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed decoder artifact {path}: {reason}")]
    Malformed { path: String, reason: String },
}

/// The section list and the content list of a row disagree, so a decoded
/// payload cannot be mapped back to a content slot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorrelationError {
    #[error("payload of {bytes} bytes not found in any Data section")]
    NoMatch { bytes: usize },

    #[error("payload found in Data section {section_index} with no preceding Code section")]
    DataBeforeCode { section_index: usize },

    #[error("content index {index} out of range ({len} content entries)")]
    MissingContent { index: usize, len: usize },

    #[error("content entry {index} has type '{found}', expected '{expected}'")]
    TypeMismatch {
        index: usize,
        expected: String,
        found: String,
    },
}

/// Errors that escape the decode step.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("transaction {tx_hash} not found")]
    RowNotFound { tx_hash: String },

    #[error("transaction hash {tx_hash} matches {count} rows")]
    AmbiguousRow { tx_hash: String, count: u64 },

    #[error("Correlation error in tx {tx_hash}: {source}")]
    Correlation {
        tx_hash: String,
        #[source]
        source: CorrelationError,
    },

    #[error("transaction {tx_hash} is unreadable: {reason}")]
    MalformedRow { tx_hash: String, reason: String },

    #[error("Decoder load error: {0}")]
    DecoderLoad(#[from] LoadError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl PipelineError {
    /// Returns `true` if the error only poisons the current row; the loop
    /// skips the row and keeps going. Everything else stops the process.
    pub fn is_row_level(&self) -> bool {
        matches!(self, Self::Correlation { .. } | Self::MalformedRow { .. })
    }

    pub fn correlation(tx_hash: impl Into<String>, source: CorrelationError) -> Self {
        Self::Correlation {
            tx_hash: tx_hash.into(),
            source,
        }
    }
}
