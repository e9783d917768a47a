//! Common utilities for Relic.
//!
//! This crate provides the foundational pieces shared by the codec and the
//! save container:
//!
//! - [`ByteCursor`] - Zero-copy cursor with delimiter and regex scanning
//! - [`hex`] - Hex pair formatting for opaque byte runs

mod cursor;
mod error;

pub mod hex;

pub use cursor::{ByteCursor, Scan};
pub use error::{Error, Result};

/// Re-export the byte regex type used by pattern-delimited reads.
pub use regex::bytes::Regex;
