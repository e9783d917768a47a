//! Gladius saved game container.
//!
//! A `.GladiusSave` file is a short plain header followed by a zlib stream
//! holding the game state:
//!
//! - 5 null-terminated strings: version, branch, revision, build, steam user
//! - 3 little-endian `i32`: turn, checksum, mod count
//! - mod count null-terminated mod names (a lone `\0` when there are none)
//! - zlib-compressed payload to the end of the file
//!
//! # Example
//!
//! ```no_run
//! use relic_save::SaveContainer;
//!
//! let mut save = SaveContainer::open("Campaign.GladiusSave")?;
//! println!("Turn {} with {} mods", save.header().turn, save.header().mod_count());
//!
//! save.header_mut().turn += 1;
//! save.write_to("Campaign.GladiusSave")?;
//! # Ok::<(), relic_save::Error>(())
//! ```

mod container;
mod error;
mod header;

pub use container::{
    default_unpack_dir, SaveContainer, UnpackedFiles, COMPRESSION_LEVEL, HEADER_SUFFIX,
    PAYLOAD_EXTENSION, SAVE_EXTENSION, UNPACK_DIR_NAME,
};
pub use error::{Error, Result};
pub use header::SaveHeader;
