//! Field formats: how one value is delimited and transformed.
//!
//! A [`FieldFormat`] pairs a [`LengthRule`] (how many bytes the field spans,
//! or how to find its end) with a [`Codec`] (how those bytes become a
//! [`Value`] and back). The transforms are a closed set of tagged variants
//! rather than free-form callables, so whether a format can be written is
//! known when the schema is built, not discovered halfway through an encode.
//!
//! # Built-in catalogue
//!
//! | Constructor | Length rule | Value |
//! |-------------|-------------|-------|
//! | [`u8`](FieldFormat::u8) .. [`i64`](FieldFormat::i64) | 1/2/4/8 bytes | `UInt` / `Int` |
//! | [`f32`](FieldFormat::f32), [`f64`](FieldFormat::f64) | 4/8 bytes | `Float` |
//! | [`bool`](FieldFormat::bool) | 1 byte | `Bool` |
//! | [`bytes`](FieldFormat::bytes) | n bytes | `Bytes` |
//! | [`string`](FieldFormat::string) | up to `\0` | `String` |
//! | [`nz_string`](FieldFormat::nz_string) | up to `\0`, non-empty | `String` |
//! | [`pattern`](FieldFormat::pattern) | up to a regex match | `Bytes` |
//! | [`rest`](FieldFormat::rest) | to end of buffer | `Bytes` |

use std::fmt;

use byteorder::{ByteOrder, LittleEndian};
use relic_common::Regex;

use crate::error::{ErrorKind, FormatResult};
use crate::value::Value;

/// Decode transform of a custom format.
pub type DecodeFn = fn(&[u8]) -> FormatResult<Value>;

/// Encode transform of a custom format. Returns the field bytes without any
/// delimiter; the length rule appends that.
pub type EncodeFn = fn(&Value) -> FormatResult<Vec<u8>>;

/// The null byte terminating strings.
pub const NUL: &[u8] = b"\0";

/// Fixed-width little-endian numeric types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericKind {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
}

impl NumericKind {
    /// Width in bytes.
    pub const fn width(self) -> usize {
        match self {
            NumericKind::U8 | NumericKind::I8 => 1,
            NumericKind::U16 | NumericKind::I16 => 2,
            NumericKind::U32 | NumericKind::I32 | NumericKind::F32 => 4,
            NumericKind::U64 | NumericKind::I64 | NumericKind::F64 => 8,
        }
    }

    /// Name as used in schema descriptions.
    pub const fn name(self) -> &'static str {
        match self {
            NumericKind::U8 => "u8",
            NumericKind::I8 => "i8",
            NumericKind::U16 => "u16",
            NumericKind::I16 => "i16",
            NumericKind::U32 => "u32",
            NumericKind::I32 => "i32",
            NumericKind::U64 => "u64",
            NumericKind::I64 => "i64",
            NumericKind::F32 => "f32",
            NumericKind::F64 => "f64",
        }
    }

    /// Whether values of this kind are integers.
    pub const fn is_integer(self) -> bool {
        !matches!(self, NumericKind::F32 | NumericKind::F64)
    }

    fn decode(self, bytes: &[u8]) -> FormatResult<Value> {
        if bytes.len() != self.width() {
            return Err(ErrorKind::mismatch(
                format!("{} bytes for {}", self.width(), self.name()),
                format!("{} bytes", bytes.len()),
            ));
        }

        Ok(match self {
            NumericKind::U8 => Value::UInt(bytes[0].into()),
            NumericKind::I8 => Value::Int((bytes[0] as i8).into()),
            NumericKind::U16 => Value::UInt(LittleEndian::read_u16(bytes).into()),
            NumericKind::I16 => Value::Int(LittleEndian::read_i16(bytes).into()),
            NumericKind::U32 => Value::UInt(LittleEndian::read_u32(bytes).into()),
            NumericKind::I32 => Value::Int(LittleEndian::read_i32(bytes).into()),
            NumericKind::U64 => Value::UInt(LittleEndian::read_u64(bytes)),
            NumericKind::I64 => Value::Int(LittleEndian::read_i64(bytes)),
            NumericKind::F32 => Value::Float(LittleEndian::read_f32(bytes).into()),
            NumericKind::F64 => Value::Float(LittleEndian::read_f64(bytes)),
        })
    }

    fn encode(self, value: &Value, output: &mut Vec<u8>) -> FormatResult<()> {
        let mismatch = || ErrorKind::mismatch(self.name(), value.summary());

        match self {
            NumericKind::U8 => {
                let v = value.as_u64().and_then(|v| u8::try_from(v).ok());
                output.push(v.ok_or_else(mismatch)?);
            }
            NumericKind::I8 => {
                let v = value.as_i64().and_then(|v| i8::try_from(v).ok());
                output.extend_from_slice(&v.ok_or_else(mismatch)?.to_le_bytes());
            }
            NumericKind::U16 => {
                let v = value.as_u64().and_then(|v| u16::try_from(v).ok());
                output.extend_from_slice(&v.ok_or_else(mismatch)?.to_le_bytes());
            }
            NumericKind::I16 => {
                let v = value.as_i64().and_then(|v| i16::try_from(v).ok());
                output.extend_from_slice(&v.ok_or_else(mismatch)?.to_le_bytes());
            }
            NumericKind::U32 => {
                let v = value.as_u64().and_then(|v| u32::try_from(v).ok());
                output.extend_from_slice(&v.ok_or_else(mismatch)?.to_le_bytes());
            }
            NumericKind::I32 => {
                let v = value.as_i64().and_then(|v| i32::try_from(v).ok());
                output.extend_from_slice(&v.ok_or_else(mismatch)?.to_le_bytes());
            }
            NumericKind::U64 => {
                output.extend_from_slice(&value.as_u64().ok_or_else(mismatch)?.to_le_bytes());
            }
            NumericKind::I64 => {
                output.extend_from_slice(&value.as_i64().ok_or_else(mismatch)?.to_le_bytes());
            }
            NumericKind::F32 => {
                let v = value.as_f64().ok_or_else(mismatch)? as f32;
                output.extend_from_slice(&v.to_le_bytes());
            }
            NumericKind::F64 => {
                output.extend_from_slice(&value.as_f64().ok_or_else(mismatch)?.to_le_bytes());
            }
        }
        Ok(())
    }
}

/// How the extent of a field is determined.
#[derive(Debug, Clone)]
pub enum LengthRule {
    /// Exactly this many bytes.
    Fixed(usize),
    /// Everything up to a delimiter, which is consumed but not returned.
    ///
    /// When `allow_empty` is false, an empty match is treated as a stray
    /// separator: it is skipped and the scan retried.
    Delimited { delimiter: Vec<u8>, allow_empty: bool },
    /// Everything up to the first regex match.
    ///
    /// This is a heuristic fallback for runs whose boundary encoding is not
    /// understood. Prefer fixed or length-prefixed layouts when known.
    Pattern { regex: Regex, inclusive: bool },
    /// Everything left in the buffer.
    Rest,
}

/// How field bytes turn into a value and back.
#[derive(Clone)]
pub enum Codec {
    /// Bytes pass through as [`Value::Bytes`].
    Raw,
    /// Fixed-width little-endian number.
    Numeric(NumericKind),
    /// One byte, `0` or `1`.
    Bool,
    /// UTF-8 text.
    Utf8,
    /// A pure function pair. Without `encode` the format is decode-only.
    Custom {
        name: &'static str,
        decode: DecodeFn,
        encode: Option<EncodeFn>,
    },
    /// A section not yet reverse-engineered. Fails in both directions.
    Unimplemented(String),
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Codec::Raw => f.write_str("Raw"),
            Codec::Numeric(kind) => write!(f, "Numeric({:?})", kind),
            Codec::Bool => f.write_str("Bool"),
            Codec::Utf8 => f.write_str("Utf8"),
            Codec::Custom { name, encode, .. } => f
                .debug_struct("Custom")
                .field("name", name)
                .field("writable", &encode.is_some())
                .finish(),
            Codec::Unimplemented(section) => write!(f, "Unimplemented({:?})", section),
        }
    }
}

/// A descriptor for reading and writing one value.
#[derive(Debug, Clone)]
pub struct FieldFormat {
    rule: LengthRule,
    codec: Codec,
}

impl FieldFormat {
    /// Create a format from its parts.
    pub fn new(rule: LengthRule, codec: Codec) -> Self {
        Self { rule, codec }
    }

    /// The length rule.
    #[inline]
    pub fn rule(&self) -> &LengthRule {
        &self.rule
    }

    /// The value codec.
    #[inline]
    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    /// Whether values can be written through this format.
    pub fn is_writable(&self) -> bool {
        match &self.codec {
            Codec::Custom { encode, .. } => encode.is_some(),
            Codec::Unimplemented(_) => false,
            _ => true,
        }
    }

    fn numeric(kind: NumericKind) -> Self {
        Self::new(LengthRule::Fixed(kind.width()), Codec::Numeric(kind))
    }

    /// Unsigned 8-bit integer.
    pub fn u8() -> Self {
        Self::numeric(NumericKind::U8)
    }

    /// Signed 8-bit integer.
    pub fn i8() -> Self {
        Self::numeric(NumericKind::I8)
    }

    /// Unsigned 16-bit little-endian integer.
    pub fn u16() -> Self {
        Self::numeric(NumericKind::U16)
    }

    /// Signed 16-bit little-endian integer.
    pub fn i16() -> Self {
        Self::numeric(NumericKind::I16)
    }

    /// Unsigned 32-bit little-endian integer.
    pub fn u32() -> Self {
        Self::numeric(NumericKind::U32)
    }

    /// Signed 32-bit little-endian integer.
    pub fn i32() -> Self {
        Self::numeric(NumericKind::I32)
    }

    /// Unsigned 64-bit little-endian integer.
    pub fn u64() -> Self {
        Self::numeric(NumericKind::U64)
    }

    /// Signed 64-bit little-endian integer.
    pub fn i64() -> Self {
        Self::numeric(NumericKind::I64)
    }

    /// 32-bit IEEE float.
    pub fn f32() -> Self {
        Self::numeric(NumericKind::F32)
    }

    /// 64-bit IEEE float.
    pub fn f64() -> Self {
        Self::numeric(NumericKind::F64)
    }

    /// One-byte boolean.
    pub fn bool() -> Self {
        Self::new(LengthRule::Fixed(1), Codec::Bool)
    }

    /// Opaque run of `count` bytes.
    pub fn bytes(count: usize) -> Self {
        Self::new(LengthRule::Fixed(count), Codec::Raw)
    }

    /// One opaque byte.
    pub fn byte() -> Self {
        Self::bytes(1)
    }

    /// Two opaque bytes.
    pub fn word() -> Self {
        Self::bytes(2)
    }

    /// Four opaque bytes.
    pub fn dword() -> Self {
        Self::bytes(4)
    }

    /// Eight opaque bytes.
    pub fn qword() -> Self {
        Self::bytes(8)
    }

    /// Null-terminated UTF-8 string, possibly empty.
    pub fn string() -> Self {
        Self::new(
            LengthRule::Delimited {
                delimiter: NUL.to_vec(),
                allow_empty: true,
            },
            Codec::Utf8,
        )
    }

    /// Null-terminated UTF-8 string that is never empty.
    ///
    /// A zero-length match skips the extra separator and reads again.
    pub fn nz_string() -> Self {
        Self::new(
            LengthRule::Delimited {
                delimiter: NUL.to_vec(),
                allow_empty: false,
            },
            Codec::Utf8,
        )
    }

    /// Opaque bytes up to an arbitrary delimiter.
    pub fn until(delimiter: impl Into<Vec<u8>>) -> Self {
        Self::new(
            LengthRule::Delimited {
                delimiter: delimiter.into(),
                allow_empty: true,
            },
            Codec::Raw,
        )
    }

    /// Opaque bytes up to the first match of `regex`.
    pub fn pattern(regex: Regex, inclusive: bool) -> Self {
        Self::new(LengthRule::Pattern { regex, inclusive }, Codec::Raw)
    }

    /// Opaque bytes to the end of the buffer.
    pub fn rest() -> Self {
        Self::new(LengthRule::Rest, Codec::Raw)
    }

    /// A custom pure transform pair.
    pub fn custom(name: &'static str, rule: LengthRule, decode: DecodeFn, encode: EncodeFn) -> Self {
        Self::new(
            rule,
            Codec::Custom {
                name,
                decode,
                encode: Some(encode),
            },
        )
    }

    /// A custom transform with no inverse. Schemas using it cannot be written.
    pub fn decode_only(name: &'static str, rule: LengthRule, decode: DecodeFn) -> Self {
        Self::new(
            rule,
            Codec::Custom {
                name,
                decode,
                encode: None,
            },
        )
    }

    /// Placeholder for a section whose layout is not known yet.
    pub fn unimplemented(section: impl Into<String>) -> Self {
        Self::new(LengthRule::Fixed(0), Codec::Unimplemented(section.into()))
    }

    /// Little-endian u32 stored one below the count it stands for.
    pub fn u32_plus_one() -> Self {
        Self::custom(
            "u32_plus_one",
            LengthRule::Fixed(4),
            |bytes| {
                let stored = NumericKind::U32.decode(bytes)?.as_u64().unwrap_or_default();
                Ok(Value::UInt(stored + 1))
            },
            |value| {
                let count = value
                    .as_u64()
                    .filter(|&v| v >= 1)
                    .ok_or_else(|| ErrorKind::mismatch("count of at least 1", value.summary()))?;
                let mut output = Vec::with_capacity(4);
                NumericKind::U32.encode(&Value::UInt(count - 1), &mut output)?;
                Ok(output)
            },
        )
    }

    /// Apply the decode transform to bytes delimited by the length rule.
    pub fn decode_bytes(&self, bytes: &[u8]) -> FormatResult<Value> {
        match &self.codec {
            Codec::Raw => Ok(Value::Bytes(bytes.to_vec())),
            Codec::Numeric(kind) => kind.decode(bytes),
            Codec::Bool => match bytes {
                [0] => Ok(Value::Bool(false)),
                [1] => Ok(Value::Bool(true)),
                other => Err(ErrorKind::mismatch(
                    "boolean byte 00 or 01",
                    relic_common::hex::to_hex_pairs(other),
                )),
            },
            Codec::Utf8 => Ok(Value::String(std::str::from_utf8(bytes)?.to_string())),
            Codec::Custom { decode, .. } => decode(bytes),
            Codec::Unimplemented(section) => Err(ErrorKind::UnimplementedSection(section.clone())),
        }
    }

    /// Apply the encode transform and append the field, including any
    /// delimiter, to `output`.
    ///
    /// Output is only appended on success.
    pub fn encode_value(&self, value: &Value, output: &mut Vec<u8>) -> FormatResult<()> {
        let start = output.len();
        let result = self.encode_unchecked(value, output);
        if result.is_err() {
            output.truncate(start);
        }
        result
    }

    fn encode_unchecked(&self, value: &Value, output: &mut Vec<u8>) -> FormatResult<()> {
        let start = output.len();

        match &self.codec {
            Codec::Raw => {
                let bytes = value
                    .as_bytes()
                    .ok_or_else(|| ErrorKind::mismatch("bytes", value.summary()))?;
                output.extend_from_slice(bytes);
            }
            Codec::Numeric(kind) => kind.encode(value, output)?,
            Codec::Bool => {
                let flag = value
                    .as_bool()
                    .ok_or_else(|| ErrorKind::mismatch("bool", value.summary()))?;
                output.push(u8::from(flag));
            }
            Codec::Utf8 => {
                let text = value
                    .as_str()
                    .ok_or_else(|| ErrorKind::mismatch("string", value.summary()))?;
                output.extend_from_slice(text.as_bytes());
            }
            Codec::Custom { encode, .. } => {
                let encode = encode.ok_or(ErrorKind::WriteIncapableFormat)?;
                output.extend_from_slice(&encode(value)?);
            }
            Codec::Unimplemented(section) => {
                return Err(ErrorKind::UnimplementedSection(section.clone()));
            }
        }

        let written = output.len() - start;
        match &self.rule {
            LengthRule::Fixed(count) if written != *count => Err(ErrorKind::mismatch(
                format!("{} bytes", count),
                format!("{} bytes", written),
            )),
            LengthRule::Delimited {
                delimiter,
                allow_empty,
            } => {
                if delimiter.is_empty() {
                    return Err(ErrorKind::EmptyDelimiter);
                }
                // Empty runs are skipped on read; the next field's bytes would land here.
                if written == 0 && !*allow_empty {
                    return Err(ErrorKind::mismatch("non-empty field", value.summary()));
                }
                // A delimiter inside the field would split it on the next read.
                if contains_subslice(&output[start..], delimiter) {
                    return Err(ErrorKind::mismatch(
                        "field without its delimiter",
                        value.summary(),
                    ));
                }
                output.extend_from_slice(delimiter);
                Ok(())
            }
            LengthRule::Pattern { regex, inclusive } => {
                let field = &output[start..];
                let first = regex.find(field);
                let fits = if *inclusive {
                    // The first match must be the one closing the field.
                    first.is_some_and(|m| m.end() == field.len())
                } else {
                    // Any match inside the field would end it early.
                    !first.is_some_and(|m| m.start() < field.len())
                };
                if fits {
                    Ok(())
                } else {
                    let expected = if *inclusive {
                        format!("field ending in its first match of {:?}", regex.as_str())
                    } else {
                        format!("field without a match of {:?}", regex.as_str())
                    };
                    Err(ErrorKind::mismatch(expected, value.summary()))
                }
            }
            _ => Ok(()),
        }
    }
}

fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}
