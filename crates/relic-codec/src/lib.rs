//! Declarative binary codec for reverse-engineered save payloads.
//!
//! A payload layout is written down as a [`SchemaNode`] tree built from
//! [`FieldFormat`] leaves. The same tree drives both directions:
//!
//! - [`Decoder`] walks a byte buffer and produces a [`Value`] tree, plus
//!   non-fatal [`Warning`]s and optional section [`Bookmark`]s;
//! - [`Encoder`] walks a value tree and produces bytes.
//!
//! For any buffer a schema fully accepts, encoding the decoded tree
//! reproduces the buffer byte for byte. Length prefixes are rewritten from
//! the live collection sizes, so edited trees repack consistently.
//!
//! # Example
//!
//! ```
//! use relic_codec::{decode_exact, encode, FieldFormat, SchemaNode, Value};
//!
//! let schema = SchemaNode::record([
//!     ("turn", FieldFormat::i32().into()),
//!     ("mods", SchemaNode::list(FieldFormat::string())),
//! ]);
//!
//! let data = b"\x05\x00\x00\x00\x01\x00\x00\x00modA\0";
//! let mut value = decode_exact(&schema, data)?.value;
//! assert_eq!(value.get("turn"), Some(&Value::Int(5)));
//!
//! value.as_record_mut().unwrap()["mods"].as_list_mut().unwrap().push("modB".into());
//! let bytes = encode(&schema, &value)?;
//! assert_eq!(&bytes[4..8], &[2, 0, 0, 0]);
//! # Ok::<(), relic_codec::Error>(())
//! ```
//!
//! # Features
//!
//! - `json` (default): serde support for [`Value`], the [`interchange`]
//!   helpers and the [`description`] schema loader.

mod decode;
mod encode;
mod error;
mod format;
mod path;
mod schema;
mod value;

#[cfg(feature = "json")]
pub mod description;
#[cfg(feature = "json")]
pub mod interchange;

pub use decode::{decode, decode_exact, Bookmark, Decoded, Decoder, Warning};
pub use encode::{encode, Encoder};
pub use error::{Error, ErrorKind, FormatResult, Result};
pub use format::{Codec, DecodeFn, EncodeFn, FieldFormat, LengthRule, NumericKind, NUL};
pub use path::{PathSegment, SchemaPath};
pub use schema::SchemaNode;
pub use value::{Fields, Value};
