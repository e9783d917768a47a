//! Error types for the codec.
//!
//! Every failure raised while walking a schema is reported as an [`Error`]:
//! the [`ErrorKind`] plus the byte offset and the [`SchemaPath`] at which the
//! walk stopped. When a guessed layout diverges from the real format, those
//! two coordinates are what tell you where.

use thiserror::Error;

use crate::path::SchemaPath;

/// What went wrong, independent of where.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// A read ran past the end of the buffer.
    #[error("unexpected end of buffer: needed {needed} bytes but only {available} available")]
    UnexpectedEnd { needed: usize, available: usize },

    /// A regex-delimited field found no match in the rest of the buffer.
    #[error("pattern {0:?} not found in remaining data")]
    PatternNotFound(String),

    /// A delimited field was declared with an empty delimiter.
    #[error("delimiter must not be empty")]
    EmptyDelimiter,

    /// A fixed-size array or tuple was given the wrong number of elements.
    #[error("expected {expected} elements, got {actual}")]
    ArityMismatch { expected: usize, actual: usize },

    /// The format can decode but has no encode transform.
    #[error("format is decode-only and cannot be written")]
    WriteIncapableFormat,

    /// A schema branch that has not been reverse-engineered yet.
    #[error("section not yet reverse-engineered: {0}")]
    UnimplementedSection(String),

    /// The value does not fit the format it is being written through.
    #[error("expected {expected}, found {found}")]
    ValueMismatch { expected: String, found: String },

    /// A string field held invalid UTF-8.
    #[error("invalid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// A length prefix decoded to something that is not a usable count.
    #[error("invalid element count: {0}")]
    InvalidCount(String),

    /// A record value lacks a field the schema declares.
    #[error("missing field {0:?}")]
    MissingField(String),

    /// A record value has a field the schema does not declare.
    #[error("unexpected field {0:?}")]
    UnexpectedField(String),

    /// Decoding finished with unread bytes left over.
    #[error("{0} trailing bytes left after decoding")]
    TrailingBytes(usize),

    /// A failure reported by a custom transform or selector.
    #[error("{0}")]
    Custom(String),
}

impl ErrorKind {
    /// Shorthand for a [`ErrorKind::ValueMismatch`].
    pub fn mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::ValueMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }
}

impl From<relic_common::Error> for ErrorKind {
    fn from(error: relic_common::Error) -> Self {
        match error {
            relic_common::Error::UnexpectedEnd {
                needed, available, ..
            } => Self::UnexpectedEnd { needed, available },
            relic_common::Error::PatternNotFound { pattern, .. } => Self::PatternNotFound(pattern),
            relic_common::Error::EmptyDelimiter { .. } => Self::EmptyDelimiter,
            other => Self::Custom(other.to_string()),
        }
    }
}

/// A located codec failure.
#[derive(Debug, Error)]
#[error("{kind} at offset {offset:#x} ({path})")]
pub struct Error {
    /// The failure itself.
    pub kind: ErrorKind,
    /// Byte offset into the payload (decode) or the output (encode).
    pub offset: usize,
    /// Field names and indices leading to the failing node.
    pub path: SchemaPath,
}

impl Error {
    /// Create a located error.
    pub fn new(kind: ErrorKind, offset: usize, path: SchemaPath) -> Self {
        Self { kind, offset, path }
    }
}

/// Result type for codec operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type for single-field transforms, which know nothing of location.
pub type FormatResult<T> = std::result::Result<T, ErrorKind>;
