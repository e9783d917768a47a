//! Error types for save container handling.

use thiserror::Error;

/// Errors that can occur when reading or writing saved games.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Cursor error while reading the header.
    #[error("{0}")]
    Common(#[from] relic_common::Error),

    /// Payload decode or encode error.
    #[error("{0}")]
    Codec(#[from] relic_codec::Error),

    /// Sidecar header file could not be read or written.
    #[error("header sidecar error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid file extension.
    #[error("invalid file extension: expected {expected}, got {actual}")]
    InvalidExtension { expected: String, actual: String },

    /// A header string ran to the end of the file without its terminator.
    #[error("header field `{0}` is not null-terminated")]
    MissingTerminator(&'static str),

    /// The header declares a negative number of mods.
    #[error("invalid mod count: {0}")]
    NegativeModCount(i32),

    /// A header string holds a null byte and would end early on read.
    #[error("header field `{0}` contains a null byte")]
    InvalidHeaderField(&'static str),

    /// More mods than the header's signed 32-bit count can describe.
    #[error("too many mods for the header: {0}")]
    TooManyMods(usize),

    /// Decompression error.
    #[error("decompression error: {0}")]
    Decompression(String),

    /// Compression error.
    #[error("compression error: {0}")]
    Compression(String),

    /// UTF-8 decoding error in a header string.
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

/// Result type alias for save container operations.
pub type Result<T> = std::result::Result<T, Error>;
