//! The plain-text header in front of the compressed payload.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Values recovered from a saved game header.
///
/// The mod count is not stored: it is always the length of [`mods`](Self::mods).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveHeader {
    pub version: String,
    pub branch: String,
    pub revision: String,
    pub build: String,
    pub steamuser: String,
    pub turn: i32,
    /// Carried through unchanged; the game does not appear to verify it.
    pub checksum: i32,
    #[serde(default)]
    pub mods: Vec<String>,
}

impl SaveHeader {
    /// Number of mods as written to the container.
    pub fn mod_count(&self) -> usize {
        self.mods.len()
    }

    /// Read a header sidecar file.
    pub fn read_sidecar<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Write this header as a sidecar file.
    pub fn write_sidecar<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}
