//! Relic CLI - Command-line tool for Gladius saved games.
//!
//! This is the main entry point for the Relic command-line application.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use relic::common::hex;
use relic::prelude::*;
use relic::save::default_unpack_dir;

/// Relic - Gladius saved game unpacking, decoding and repacking tool
#[derive(Parser)]
#[command(name = "relic")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a saved game into a header sidecar and the inflated payload
    Unpack {
        /// Path to the .GladiusSave file
        save: PathBuf,

        /// Output directory (default: "unpacked saves" next to the save)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Rebuild a saved game from an unpacked payload and header
    Repack {
        /// The .bin payload or .header.json sidecar
        input: PathBuf,

        /// Output save file (default: <name>.GladiusSave next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Decode a payload to JSON using a schema description
    Decode {
        /// Schema description (JSON)
        #[arg(short, long, env = "RELIC_SCHEMA")]
        schema: PathBuf,

        /// Payload (.bin) or saved game (.GladiusSave)
        input: PathBuf,

        /// Output JSON file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Encode an edited JSON value tree back into a payload
    Encode {
        /// Schema description (JSON)
        #[arg(short, long, env = "RELIC_SCHEMA")]
        schema: PathBuf,

        /// Input JSON file
        input: PathBuf,

        /// Output payload (default: input with a .bin extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the header of a saved game
    Inspect {
        /// Path to the .GladiusSave file
        save: PathBuf,
    },

    /// Decode and re-encode a payload and compare the bytes
    Check {
        /// Schema description (JSON)
        #[arg(short, long, env = "RELIC_SCHEMA")]
        schema: PathBuf,

        /// Payload (.bin) or saved game (.GladiusSave)
        input: PathBuf,
    },

    /// Print a window of a payload as hex
    Dump {
        /// Payload (.bin) or saved game (.GladiusSave)
        input: PathBuf,

        /// Start offset (decimal or 0x-prefixed hex)
        #[arg(long, default_value = "0", value_parser = parse_offset)]
        offset: usize,

        /// Number of bytes to show
        #[arg(long, default_value = "256", value_parser = parse_offset)]
        len: usize,

        /// Show bits instead of hex pairs
        #[arg(long)]
        binary: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Unpack { save, output } => {
            cmd_unpack(&save, output.as_deref())?;
        }
        Commands::Repack { input, output } => {
            cmd_repack(&input, output.as_deref())?;
        }
        Commands::Decode { schema, input, output } => {
            cmd_decode(&schema, &input, output.as_deref())?;
        }
        Commands::Encode { schema, input, output } => {
            cmd_encode(&schema, &input, output.as_deref())?;
        }
        Commands::Inspect { save } => {
            cmd_inspect(&save)?;
        }
        Commands::Check { schema, input } => {
            cmd_check(&schema, &input)?;
        }
        Commands::Dump {
            input,
            offset,
            len,
            binary,
        } => {
            cmd_dump(&input, offset, len, binary)?;
        }
    }

    Ok(())
}

fn cmd_unpack(save: &Path, output: Option<&Path>) -> Result<()> {
    let dir = output.map_or_else(|| default_unpack_dir(save), Path::to_path_buf);
    println!("Unpacking: {} -> {}", save.display(), dir.display());

    let start = Instant::now();
    let pb = spinner("Inflating payload...");
    let files = SaveContainer::unpack_to_dir(save, &dir).context("Failed to unpack saved game");
    pb.finish_and_clear();
    let files = files?;

    println!("Header:  {}", files.header.display());
    println!("Payload: {}", files.payload.display());
    println!("Unpacked in {:?}", start.elapsed());

    Ok(())
}

fn cmd_repack(input: &Path, output: Option<&Path>) -> Result<()> {
    println!("Repacking: {}", input.display());

    let start = Instant::now();
    let pb = spinner("Compressing payload...");
    let written = SaveContainer::repack_from(input, output).context("Failed to repack saved game");
    pb.finish_and_clear();
    let written = written?;

    println!("Saved game written to {} in {:?}", written.display(), start.elapsed());

    Ok(())
}

fn cmd_decode(schema_path: &Path, input: &Path, output: Option<&Path>) -> Result<()> {
    let schema = load_schema(schema_path)?;
    let payload = load_payload(input)?;

    let start = Instant::now();
    let mut decoder = Decoder::new(&payload);
    let value = decoder
        .decode_sections(&schema)
        .context("Failed to decode payload")?;
    let sections = decoder.bookmarks().to_vec();
    let decoded = decoder.finish(value);

    eprintln!("Decoded {} of {} bytes in {:?}", decoded.end, payload.len(), start.elapsed());
    for section in &sections {
        eprintln!("  {:#010x}  {}", section.offset, section.name);
    }
    report_warnings(&decoded.warnings);
    if decoded.end < payload.len() {
        eprintln!("Warning: {} trailing bytes not covered by the schema", payload.len() - decoded.end);
    }

    let json = to_json(&decoded.value).context("Failed to serialize value tree")?;
    match output {
        Some(path) => {
            fs::write(path, json).context("Failed to write JSON file")?;
            eprintln!("JSON written to {}", path.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}

fn cmd_encode(schema_path: &Path, input: &Path, output: Option<&Path>) -> Result<()> {
    let schema = load_schema(schema_path)?;
    let output = output.map_or_else(|| input.with_extension("bin"), Path::to_path_buf);
    println!("Encoding: {} -> {}", input.display(), output.display());

    schema
        .check_writable()
        .context("Schema contains sections that cannot be written")?;

    let text = fs::read_to_string(input).context("Failed to read JSON file")?;
    let value = from_json(&text).context("Failed to parse JSON value tree")?;
    let bytes = encode(&schema, &value).context("Failed to encode payload")?;
    fs::write(&output, &bytes).context("Failed to write payload")?;

    println!("Wrote {} bytes", bytes.len());

    Ok(())
}

fn cmd_inspect(save: &Path) -> Result<()> {
    let container = SaveContainer::open(save).context("Failed to open saved game")?;
    let header = container.header();

    println!("Version:   {}", header.version);
    println!("Branch:    {}", header.branch);
    println!("Revision:  {}", header.revision);
    println!("Build:     {}", header.build);
    println!("Steam user: {}", header.steamuser);
    println!("Turn:      {}", header.turn);
    println!("Checksum:  {:#010x}", header.checksum);
    println!("Mods:      {}", header.mod_count());
    for name in &header.mods {
        println!("  {}", name);
    }
    println!("Payload:   {} bytes", container.payload().len());

    Ok(())
}

fn cmd_check(schema_path: &Path, input: &Path) -> Result<()> {
    let schema = load_schema(schema_path)?;
    let payload = load_payload(input)?;

    let decoded = decode(&schema, &payload).context("Failed to decode payload")?;
    report_warnings(&decoded.warnings);
    let covered = &payload[..decoded.end];

    let bytes = encode(&schema, &decoded.value).context("Failed to re-encode payload")?;

    if bytes == covered {
        println!("Round trip identical: {} bytes", bytes.len());
    } else {
        let offset = bytes
            .iter()
            .zip(covered)
            .position(|(a, b)| a != b)
            .unwrap_or_else(|| bytes.len().min(covered.len()));
        println!(
            "Round trip differs at offset {:#x} (original {} bytes, re-encoded {} bytes)",
            offset,
            covered.len(),
            bytes.len()
        );
    }

    if decoded.end < payload.len() {
        println!("{} trailing bytes not covered by the schema", payload.len() - decoded.end);
    }
    if bytes != covered || decoded.end < payload.len() {
        anyhow::bail!("Payload does not round-trip through the schema");
    }

    Ok(())
}

fn cmd_dump(input: &Path, offset: usize, len: usize, binary: bool) -> Result<()> {
    let payload = load_payload(input)?;
    if offset > payload.len() {
        anyhow::bail!("Offset {:#x} is past the end of the payload ({} bytes)", offset, payload.len());
    }

    let end = offset.saturating_add(len).min(payload.len());
    let width = if binary { 4 } else { 16 };

    for (row, chunk) in payload[offset..end].chunks(width).enumerate() {
        let line = if binary {
            hex::to_binary_groups(chunk)
        } else {
            hex::to_hex_pairs(chunk)
        };
        println!("{:08X}  {}", offset + row * width, line);
    }

    Ok(())
}

fn load_schema(path: &Path) -> Result<SchemaNode> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema {}", path.display()))?;
    parse_schema(&text).with_context(|| format!("Invalid schema {}", path.display()))
}

/// Read a raw payload, inflating it first when given a saved game.
fn load_payload(input: &Path) -> Result<Vec<u8>> {
    let is_save = input
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(relic::save::SAVE_EXTENSION));

    if is_save {
        let pb = spinner("Inflating payload...");
        let container = SaveContainer::open(input).context("Failed to open saved game");
        pb.finish_and_clear();
        Ok(container?.into_parts().1)
    } else {
        fs::read(input).context("Failed to read payload")
    }
}

fn report_warnings(warnings: &[Warning]) {
    for warning in warnings {
        eprintln!("Warning: {}", warning);
    }
}

fn spinner(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn parse_offset(text: &str) -> std::result::Result<usize, String> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(digits) => usize::from_str_radix(digits, 16),
        None => text.parse(),
    };
    parsed.map_err(|e| format!("invalid offset {:?}: {}", text, e))
}
