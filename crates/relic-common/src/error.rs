//! Error types for relic-common.

use thiserror::Error;

/// Common error type for cursor and formatting operations.
#[derive(Debug, Error)]
pub enum Error {
    /// End of buffer reached while reading.
    #[error("unexpected end of buffer at offset {offset:#x}: needed {needed} bytes but only {available} available")]
    UnexpectedEnd {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// A regex-delimited read found no match in the rest of the buffer.
    #[error("pattern {pattern:?} not found after offset {offset:#x}")]
    PatternNotFound { offset: usize, pattern: String },

    /// A delimited read was asked to stop at an empty delimiter.
    #[error("empty delimiter at offset {offset:#x}")]
    EmptyDelimiter { offset: usize },

    /// Seek target lies past the end of the buffer.
    #[error("cannot seek to {position:#x}: buffer is only {len} bytes")]
    SeekOutOfBounds { position: usize, len: usize },

    /// Malformed hex pair string.
    #[error("invalid hex string: {0}")]
    InvalidHex(String),
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
