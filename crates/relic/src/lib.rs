//! Relic - Gladius saved game tooling.
//!
//! This crate provides a unified interface to the Relic crates:
//!
//! - [`relic_common`] - Byte cursor, pattern scanning and hex helpers
//! - [`relic_codec`] - Declarative schema-driven binary codec
//! - [`relic_save`] - `.GladiusSave` container (header + zlib payload)
//!
//! # Example
//!
//! ```no_run
//! use relic::prelude::*;
//!
//! let save = SaveContainer::open("Campaign.GladiusSave")?;
//!
//! let schema = SchemaNode::record([
//!     ("climates", SchemaNode::list(FieldFormat::string())),
//!     ("tail", FieldFormat::rest().into()),
//! ]);
//! let decoded = save.decode_payload(&schema)?;
//! println!("{}", to_json(&decoded.value)?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Re-export all sub-crates
pub use relic_codec as codec;
pub use relic_common as common;
pub use relic_save as save;

/// Prelude module for convenient imports.
pub mod prelude {
    #[cfg(feature = "json")]
    pub use relic_codec::description::parse_schema;
    #[cfg(feature = "json")]
    pub use relic_codec::interchange::{from_json, to_json};
    pub use relic_codec::{
        decode, decode_exact, encode, Decoder, Encoder, FieldFormat, SchemaNode, Value, Warning,
    };
    pub use relic_common::ByteCursor;
    pub use relic_save::{SaveContainer, SaveHeader};
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
