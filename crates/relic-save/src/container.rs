//! `.GladiusSave` container handling.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use memmap2::Mmap;
use relic_codec::{Decoded, SchemaNode, Value};
use relic_common::ByteCursor;

use crate::header::SaveHeader;
use crate::{Error, Result};

/// Extension of saved games, compared case-insensitively.
pub const SAVE_EXTENSION: &str = "GladiusSave";

/// Extension of an unpacked payload.
pub const PAYLOAD_EXTENSION: &str = "bin";

/// Suffix of a header sidecar file.
pub const HEADER_SUFFIX: &str = ".header.json";

/// Name of the default unpack directory, created next to the save.
pub const UNPACK_DIR_NAME: &str = "unpacked saves";

/// zlib level used when repacking (the zlib default).
pub const COMPRESSION_LEVEL: u32 = 6;

const NUL: u8 = 0;

/// A saved game split into its header and inflated payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveContainer {
    header: SaveHeader,
    payload: Vec<u8>,
    /// Whether an empty mod list was followed by a lone separator.
    empty_mods_separator: bool,
}

/// Files written by [`SaveContainer::unpack_to_dir`].
#[derive(Debug, Clone)]
pub struct UnpackedFiles {
    pub header: PathBuf,
    pub payload: PathBuf,
}

impl SaveContainer {
    /// Create a container from a header and an inflated payload.
    pub fn new(header: SaveHeader, payload: Vec<u8>) -> Self {
        Self {
            header,
            payload,
            empty_mods_separator: true,
        }
    }

    /// Get the header.
    pub fn header(&self) -> &SaveHeader {
        &self.header
    }

    /// Get mutable access to the header.
    pub fn header_mut(&mut self) -> &mut SaveHeader {
        &mut self.header
    }

    /// Get the inflated payload.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Replace the inflated payload.
    pub fn set_payload(&mut self, payload: Vec<u8>) {
        self.payload = payload;
    }

    /// Split the container into header and payload.
    pub fn into_parts(self) -> (SaveHeader, Vec<u8>) {
        (self.header, self.payload)
    }

    /// Decode the payload with a schema.
    pub fn decode_payload(&self, schema: &SchemaNode) -> Result<Decoded> {
        Ok(relic_codec::decode(schema, &self.payload)?)
    }

    /// Replace the payload with an encoded value tree.
    ///
    /// The current payload is kept if encoding fails.
    pub fn encode_payload(&mut self, schema: &SchemaNode, value: &Value) -> Result<()> {
        self.payload = relic_codec::encode(schema, value)?;
        Ok(())
    }

    /// Open a saved game from disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        check_extension(path, SAVE_EXTENSION)?;

        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Self::parse(&[]);
        }
        let mmap = unsafe { Mmap::map(&file)? };
        Self::parse(&mmap)
    }

    /// Parse a saved game from bytes.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut cursor = ByteCursor::new(data);

        let version = read_string(&mut cursor, "version")?;
        let branch = read_string(&mut cursor, "branch")?;
        let revision = read_string(&mut cursor, "revision")?;
        let build = read_string(&mut cursor, "build")?;
        let steamuser = read_string(&mut cursor, "steamuser")?;

        let turn = read_i32(&mut cursor)?;
        let checksum = read_i32(&mut cursor)?;
        let mod_count = read_i32(&mut cursor)?;
        let mod_count = usize::try_from(mod_count).map_err(|_| Error::NegativeModCount(mod_count))?;

        let mods = (0..mod_count)
            .map(|_| read_string(&mut cursor, "mods"))
            .collect::<Result<Vec<_>>>()?;

        // A zlib stream never starts with a null byte.
        let empty_mods_separator = mod_count == 0 && cursor.peek_bytes(1).map_or(false, |b| b[0] == NUL);
        if empty_mods_separator {
            cursor.read(1)?;
        }

        let payload = inflate(cursor.remaining_bytes())?;

        Ok(Self {
            header: SaveHeader {
                version,
                branch,
                revision,
                build,
                steamuser,
                turn,
                checksum,
                mods,
            },
            payload,
            empty_mods_separator,
        })
    }

    /// Serialize to container bytes.
    ///
    /// The mod count is always taken from the mod list.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let header = &self.header;
        let mut output = Vec::with_capacity(self.payload.len() / 4 + 256);

        for (name, field) in [
            ("version", &header.version),
            ("branch", &header.branch),
            ("revision", &header.revision),
            ("build", &header.build),
            ("steamuser", &header.steamuser),
        ] {
            write_string(&mut output, name, field)?;
        }

        output.extend_from_slice(&header.turn.to_le_bytes());
        output.extend_from_slice(&header.checksum.to_le_bytes());
        output.extend_from_slice(&mod_count(header.mods.len())?.to_le_bytes());

        for mod_name in &header.mods {
            write_string(&mut output, "mods", mod_name)?;
        }
        if header.mods.is_empty() && self.empty_mods_separator {
            output.push(NUL);
        }

        deflate(&self.payload, &mut output)?;
        Ok(output)
    }

    /// Write a saved game to disk.
    ///
    /// Nothing is written unless serialization succeeds.
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let buffer = self.to_bytes()?;
        fs::write(path, buffer)?;
        Ok(())
    }

    /// Unpack a saved game into `<name>.header.json` and `<name>.bin` inside `dir`.
    pub fn unpack_to_dir<P: AsRef<Path>, D: AsRef<Path>>(save_path: P, dir: D) -> Result<UnpackedFiles> {
        let save_path = save_path.as_ref();
        let dir = dir.as_ref();
        let container = Self::open(save_path)?;

        if dir.is_file() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("{} exists and is a file", dir.display()),
            )));
        }
        fs::create_dir_all(dir)?;

        let name = file_stem(save_path);
        let files = UnpackedFiles {
            header: dir.join(format!("{}{}", name, HEADER_SUFFIX)),
            payload: dir.join(format!("{}.{}", name, PAYLOAD_EXTENSION)),
        };

        container.header.write_sidecar(&files.header)?;
        fs::write(&files.payload, &container.payload)?;
        Ok(files)
    }

    /// Rebuild a saved game from an unpacked pair.
    ///
    /// `path` may name either the payload or the header sidecar. The save is
    /// written to `output`, or next to the inputs as `<name>.GladiusSave`.
    pub fn repack_from<P: AsRef<Path>>(path: P, output: Option<&Path>) -> Result<PathBuf> {
        let path = path.as_ref();
        let base = unpacked_base(path)?;

        let header = SaveHeader::read_sidecar(with_suffix(&base, HEADER_SUFFIX))?;
        let payload = fs::read(with_suffix(&base, &format!(".{}", PAYLOAD_EXTENSION)))?;

        let target = match output {
            Some(path) => path.to_path_buf(),
            None => with_suffix(&base, &format!(".{}", SAVE_EXTENSION)),
        };
        Self::new(header, payload).write_to(&target)?;
        Ok(target)
    }
}

/// Default unpack directory for a saved game: `unpacked saves` beside it.
pub fn default_unpack_dir(save_path: &Path) -> PathBuf {
    save_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(UNPACK_DIR_NAME)
}

fn read_string(cursor: &mut ByteCursor<'_>, field: &'static str) -> Result<String> {
    let scan = cursor.read_until(&[NUL])?;
    if !scan.found {
        return Err(Error::MissingTerminator(field));
    }
    Ok(std::str::from_utf8(scan.bytes)?.to_string())
}

fn write_string(output: &mut Vec<u8>, field: &'static str, value: &str) -> Result<()> {
    if value.as_bytes().contains(&NUL) {
        return Err(Error::InvalidHeaderField(field));
    }
    output.extend_from_slice(value.as_bytes());
    output.push(NUL);
    Ok(())
}

fn mod_count(count: usize) -> Result<i32> {
    i32::try_from(count).map_err(|_| Error::TooManyMods(count))
}

fn read_i32(cursor: &mut ByteCursor<'_>) -> Result<i32> {
    let bytes = cursor.read(4)?;
    Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(data.len() * 4);
    ZlibDecoder::new(data)
        .read_to_end(&mut output)
        .map_err(|e| Error::Decompression(e.to_string()))?;
    Ok(output)
}

fn deflate(data: &[u8], output: &mut Vec<u8>) -> Result<()> {
    let mut encoder = ZlibEncoder::new(output, Compression::new(COMPRESSION_LEVEL));
    encoder
        .write_all(data)
        .map_err(|e| Error::Compression(e.to_string()))?;
    encoder.finish().map_err(|e| Error::Compression(e.to_string()))?;
    Ok(())
}

fn check_extension(path: &Path, expected: &str) -> Result<()> {
    let actual = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if !actual.eq_ignore_ascii_case(expected) {
        return Err(Error::InvalidExtension {
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Strip `.bin` or `.header.json` from an unpacked file path.
fn unpacked_base(path: &Path) -> Result<PathBuf> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let lower = name.to_ascii_lowercase();

    let stem_len = if lower.ends_with(HEADER_SUFFIX) {
        name.len() - HEADER_SUFFIX.len()
    } else if lower.ends_with(&format!(".{}", PAYLOAD_EXTENSION)) {
        name.len() - PAYLOAD_EXTENSION.len() - 1
    } else {
        return Err(Error::InvalidExtension {
            expected: format!("{} or {}", PAYLOAD_EXTENSION, HEADER_SUFFIX.trim_start_matches('.')),
            actual: path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("")
                .to_string(),
        });
    };

    Ok(path.with_file_name(&name[..stem_len]))
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use relic_codec::FieldFormat;

    fn sample_header(mods: &[&str]) -> SaveHeader {
        SaveHeader {
            version: "1.0".into(),
            branch: "main".into(),
            revision: "42".into(),
            build: "7".into(),
            steamuser: "tester".into(),
            turn: 5,
            checksum: 0,
            mods: mods.iter().map(|m| m.to_string()).collect(),
        }
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("relic-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_container_layout() {
        let container = SaveContainer::new(sample_header(&["modA"]), b"payload".to_vec());
        let bytes = container.to_bytes().unwrap();

        let mut expected = b"1.0\0main\x0042\x007\0tester\0".to_vec();
        expected.extend_from_slice(&5i32.to_le_bytes());
        expected.extend_from_slice(&0i32.to_le_bytes());
        expected.extend_from_slice(&1i32.to_le_bytes());
        expected.extend_from_slice(b"modA\0");
        assert_eq!(&bytes[..expected.len()], &expected[..]);

        let mut deflated = Vec::new();
        deflate(b"payload", &mut deflated).unwrap();
        assert_eq!(&bytes[expected.len()..], &deflated[..]);
    }

    #[test]
    fn test_container_roundtrip_is_exact() {
        let payload: Vec<u8> = (0..4096u32).flat_map(|i| (i % 251).to_le_bytes()).collect();
        let bytes = SaveContainer::new(sample_header(&["modA"]), payload.clone())
            .to_bytes()
            .unwrap();

        let parsed = SaveContainer::parse(&bytes).unwrap();
        assert_eq!(parsed.header(), &sample_header(&["modA"]));
        assert_eq!(parsed.payload(), &payload[..]);
        assert_eq!(parsed.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_empty_mod_list_separator() {
        let container = SaveContainer::new(sample_header(&[]), b"x".to_vec());
        let bytes = container.to_bytes().unwrap();
        let mods_at = b"1.0\0main\x0042\x007\0tester\0".len() + 12;
        assert_eq!(bytes[mods_at], 0);

        let parsed = SaveContainer::parse(&bytes).unwrap();
        assert!(parsed.header().mods.is_empty());
        assert_eq!(parsed.to_bytes().unwrap(), bytes);

        // Without the separator the zlib stream follows directly.
        let mut bare = bytes.clone();
        bare.remove(mods_at);
        let parsed = SaveContainer::parse(&bare).unwrap();
        assert_eq!(parsed.payload(), b"x");
        assert_eq!(parsed.to_bytes().unwrap(), bare);
    }

    #[test]
    fn test_mod_count_follows_mod_list() {
        let mut container = SaveContainer::new(sample_header(&["modA"]), Vec::new());
        container.header_mut().mods.push("modB".into());

        let bytes = container.to_bytes().unwrap();
        let parsed = SaveContainer::parse(&bytes).unwrap();
        assert_eq!(parsed.header().mods, ["modA", "modB"]);
    }

    #[test]
    fn test_null_in_header_string_rejected() {
        let mut header = sample_header(&["modA"]);
        header.steamuser = "a\0b".into();
        assert!(matches!(
            SaveContainer::new(header, Vec::new()).to_bytes(),
            Err(Error::InvalidHeaderField("steamuser"))
        ));

        let header = sample_header(&["mod\0A"]);
        assert!(matches!(
            SaveContainer::new(header, Vec::new()).to_bytes(),
            Err(Error::InvalidHeaderField("mods"))
        ));
    }

    #[test]
    fn test_mod_count_overflow() {
        assert_eq!(mod_count(3).unwrap(), 3);
        let too_many = i32::MAX as usize + 1;
        assert!(matches!(mod_count(too_many), Err(Error::TooManyMods(n)) if n == too_many));
    }

    #[test]
    fn test_malformed_headers() {
        assert!(matches!(
            SaveContainer::parse(b"1.0\0main"),
            Err(Error::MissingTerminator("branch"))
        ));

        let mut data = b"a\0b\0c\0d\0e\0".to_vec();
        data.extend_from_slice(&1i32.to_le_bytes());
        data.extend_from_slice(&0i32.to_le_bytes());
        data.extend_from_slice(&(-1i32).to_le_bytes());
        assert!(matches!(SaveContainer::parse(&data), Err(Error::NegativeModCount(-1))));

        let mut data = b"a\0b\0c\0d\0e\0".to_vec();
        data.extend_from_slice(&[0u8; 12]);
        data.extend_from_slice(b"\0not zlib");
        assert!(matches!(SaveContainer::parse(&data), Err(Error::Decompression(_))));
    }

    #[test]
    fn test_payload_through_schema() {
        let schema = SchemaNode::list(FieldFormat::string());
        let mut container = SaveContainer::new(sample_header(&[]), b"\x01\x00\x00\x00Tau\0".to_vec());

        let mut value = container.decode_payload(&schema).unwrap().value;
        value.as_list_mut().unwrap().push("Necron".into());
        container.encode_payload(&schema, &value).unwrap();
        assert_eq!(container.payload(), b"\x02\x00\x00\x00Tau\0Necron\0");

        assert!(container.encode_payload(&schema, &Value::UInt(3)).is_err());
        assert_eq!(container.payload(), b"\x02\x00\x00\x00Tau\0Necron\0");
    }

    #[test]
    fn test_unpack_and_repack_files() {
        let dir = scratch_dir("unpack");
        let save = dir.join("Campaign.GLADIUSSAVE");
        let original = SaveContainer::new(sample_header(&["modA"]), b"bulk data".to_vec());
        original.write_to(&save).unwrap();

        let out = default_unpack_dir(&save);
        assert_eq!(out, dir.join(UNPACK_DIR_NAME));
        let files = SaveContainer::unpack_to_dir(&save, &out).unwrap();
        assert_eq!(files.payload, out.join("Campaign.bin"));
        assert_eq!(files.header, out.join("Campaign.header.json"));
        assert_eq!(fs::read(&files.payload).unwrap(), b"bulk data");

        let rebuilt = SaveContainer::repack_from(&files.header, None).unwrap();
        assert_eq!(rebuilt, out.join("Campaign.GladiusSave"));
        assert_eq!(fs::read(&rebuilt).unwrap(), fs::read(&save).unwrap());

        let copy = dir.join("copy.GladiusSave");
        let from_bin = SaveContainer::repack_from(&files.payload, Some(copy.as_path())).unwrap();
        assert_eq!(fs::read(from_bin).unwrap(), fs::read(&save).unwrap());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_extension_checks() {
        assert!(matches!(
            SaveContainer::open("save.zip"),
            Err(Error::InvalidExtension { .. })
        ));
        assert!(matches!(
            SaveContainer::repack_from("save.cfg", None),
            Err(Error::InvalidExtension { .. })
        ));
        assert_eq!(
            unpacked_base(Path::new("dir/Save.Header.JSON")).unwrap(),
            Path::new("dir/Save")
        );
    }
}
