//! Schema-driven decoding.
//!
//! [`Decoder`] walks a [`SchemaNode`] against a [`ByteCursor`] and builds a
//! [`Value`] tree. Consumption is final: nothing back-tracks, and a failure
//! anywhere aborts the pass with the offset and path where it happened.

use std::fmt;

use relic_common::ByteCursor;

use crate::error::{Error, ErrorKind, Result};
use crate::format::{FieldFormat, LengthRule};
use crate::path::{SchemaPath, Trail};
use crate::schema::SchemaNode;
use crate::value::{Fields, Value};

/// A recoverable schema-mismatch signal raised during decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// A delimiter was never found; the field swallowed the rest of the
    /// buffer.
    DelimiterNotFound {
        offset: usize,
        path: SchemaPath,
        delimiter: Vec<u8>,
    },
    /// A non-empty delimited field skipped over empty runs before its
    /// content. Those separators are not part of the value, so re-encoding
    /// writes `count` fewer bytes.
    SeparatorsSkipped {
        offset: usize,
        path: SchemaPath,
        count: usize,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::DelimiterNotFound {
                offset,
                path,
                delimiter,
            } => write!(
                f,
                "delimiter <{}> not found for {} at offset {:#x}, returned rest of data",
                relic_common::hex::to_hex_pairs(delimiter),
                path,
                offset
            ),
            Warning::SeparatorsSkipped {
                offset,
                path,
                count,
            } => write!(
                f,
                "{} empty run(s) skipped for {} at offset {:#x}, not kept on re-encode",
                count, path, offset
            ),
        }
    }
}

/// Start offset of a named section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bookmark {
    pub name: String,
    pub offset: usize,
}

/// The result of a full decode pass.
#[derive(Debug, Clone)]
pub struct Decoded {
    /// The decoded tree.
    pub value: Value,
    /// Recoverable mismatches met along the way.
    pub warnings: Vec<Warning>,
    /// Offset at which decoding stopped.
    pub end: usize,
}

/// Decode `bytes` with `schema`. Unread trailing bytes are allowed.
pub fn decode(schema: &SchemaNode, bytes: &[u8]) -> Result<Decoded> {
    let mut decoder = Decoder::new(bytes);
    let value = decoder.decode(schema)?;
    Ok(decoder.finish(value))
}

/// Decode `bytes` with `schema` and require the whole buffer be consumed.
pub fn decode_exact(schema: &SchemaNode, bytes: &[u8]) -> Result<Decoded> {
    let decoded = decode(schema, bytes)?;
    if decoded.end != bytes.len() {
        return Err(Error::new(
            ErrorKind::TrailingBytes(bytes.len() - decoded.end),
            decoded.end,
            SchemaPath::root(),
        ));
    }
    Ok(decoded)
}

/// A single decode pass over one buffer.
#[derive(Debug)]
pub struct Decoder<'a> {
    cursor: ByteCursor<'a>,
    warnings: Vec<Warning>,
    bookmarks: Vec<Bookmark>,
}

impl<'a> Decoder<'a> {
    /// Start decoding at the beginning of `bytes`.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self::from_cursor(ByteCursor::new(bytes))
    }

    /// Continue decoding from an existing cursor position.
    pub fn from_cursor(cursor: ByteCursor<'a>) -> Self {
        Self {
            cursor,
            warnings: Vec::new(),
            bookmarks: Vec::new(),
        }
    }

    /// Current offset into the buffer.
    #[inline]
    pub fn position(&self) -> usize {
        self.cursor.position()
    }

    /// Bytes not yet consumed.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.cursor.remaining()
    }

    /// The underlying cursor.
    #[inline]
    pub fn cursor(&self) -> &ByteCursor<'a> {
        &self.cursor
    }

    /// Warnings collected so far.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Section offsets recorded so far.
    pub fn bookmarks(&self) -> &[Bookmark] {
        &self.bookmarks
    }

    /// Record the current offset under `name`.
    pub fn bookmark(&mut self, name: impl Into<String>) {
        self.bookmarks.push(Bookmark {
            name: name.into(),
            offset: self.cursor.position(),
        });
    }

    /// Decode one node at the current offset.
    pub fn decode(&mut self, node: &SchemaNode) -> Result<Value> {
        self.decode_node(node, &Trail::Root)
    }

    /// Decode a top-level record, bookmarking the start of every field.
    ///
    /// Non-record nodes decode normally under a single `$` bookmark.
    pub fn decode_sections(&mut self, node: &SchemaNode) -> Result<Value> {
        let SchemaNode::Record(fields) = node else {
            self.bookmark("$");
            return self.decode(node);
        };

        let root = Trail::Root;
        let mut output = Fields::with_capacity(fields.len());
        for (name, child) in fields {
            self.bookmark(name.as_str());
            let value = self.decode_node(child, &Trail::Field(&root, name))?;
            output.insert(name.clone(), value);
        }
        Ok(Value::Record(output))
    }

    /// Decode one element per hint, choosing each element's layout from its
    /// hint.
    ///
    /// This covers sections whose shape depends on earlier content, such as a
    /// second pass over actions where weapon actions carry an extra field.
    /// `select` returns an error message when it cannot decide.
    pub fn decode_guided<'s, F>(&mut self, hints: &[Value], mut select: F) -> Result<Value>
    where
        F: FnMut(usize, &Value) -> std::result::Result<&'s SchemaNode, String>,
    {
        let root = Trail::Root;
        let mut items = Vec::with_capacity(hints.len());
        for (index, hint) in hints.iter().enumerate() {
            let trail = Trail::Index(&root, index);
            let node = select(index, hint).map_err(|msg| self.error(ErrorKind::Custom(msg), &trail))?;
            items.push(self.decode_node(node, &trail)?);
        }
        Ok(Value::List(items))
    }

    /// Finish the pass, packaging the value with warnings and end offset.
    pub fn finish(self, value: Value) -> Decoded {
        Decoded {
            value,
            warnings: self.warnings,
            end: self.cursor.position(),
        }
    }

    fn decode_node(&mut self, node: &SchemaNode, trail: &Trail<'_>) -> Result<Value> {
        match node {
            SchemaNode::Scalar(format) => self.read_scalar(format, trail),
            SchemaNode::FixedArray(element, count) => self.read_elements(element, *count, trail),
            SchemaNode::PrefixedArray(element, count_format) => {
                let count = self.read_count(count_format, trail)?;
                self.read_elements(element, count, trail)
            }
            SchemaNode::Tuple(elements) => {
                let mut items = Vec::with_capacity(elements.len());
                for (index, child) in elements.iter().enumerate() {
                    items.push(self.decode_node(child, &Trail::Index(trail, index))?);
                }
                Ok(Value::List(items))
            }
            SchemaNode::Record(fields) => {
                let mut output = Fields::with_capacity(fields.len());
                for (name, child) in fields {
                    let value = self.decode_node(child, &Trail::Field(trail, name))?;
                    output.insert(name.clone(), value);
                }
                Ok(Value::Record(output))
            }
        }
    }

    fn read_elements(&mut self, element: &SchemaNode, count: usize, trail: &Trail<'_>) -> Result<Value> {
        // A corrupt count must not trigger a huge allocation up front.
        let mut items = Vec::with_capacity(count.min(self.cursor.remaining()));
        for index in 0..count {
            items.push(self.decode_node(element, &Trail::Index(trail, index))?);
        }
        Ok(Value::List(items))
    }

    fn read_count(&mut self, format: &FieldFormat, trail: &Trail<'_>) -> Result<usize> {
        let offset = self.cursor.position();
        let value = self.read_scalar(format, trail)?;
        value
            .as_u64()
            .and_then(|count| usize::try_from(count).ok())
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::InvalidCount(value.summary()),
                    offset,
                    trail.to_path(),
                )
            })
    }

    fn read_scalar(&mut self, format: &FieldFormat, trail: &Trail<'_>) -> Result<Value> {
        let offset = self.cursor.position();

        let bytes = match format.rule() {
            LengthRule::Fixed(count) => self.cursor.read(*count),
            LengthRule::Delimited {
                delimiter,
                allow_empty,
            } => self.read_delimited(delimiter, *allow_empty, offset, trail),
            LengthRule::Pattern { regex, inclusive } => {
                self.cursor.read_until_pattern(regex, *inclusive)
            }
            LengthRule::Rest => self.cursor.read(self.cursor.remaining()),
        }
        .map_err(|e| Error::new(e.into(), offset, trail.to_path()))?;

        format
            .decode_bytes(bytes)
            .map_err(|kind| Error::new(kind, offset, trail.to_path()))
    }

    fn read_delimited(
        &mut self,
        delimiter: &[u8],
        allow_empty: bool,
        offset: usize,
        trail: &Trail<'_>,
    ) -> relic_common::Result<&'a [u8]> {
        let mut skipped = 0;
        let bytes = loop {
            let scan = self.cursor.read_until(delimiter)?;
            if !scan.found {
                self.warnings.push(Warning::DelimiterNotFound {
                    offset,
                    path: trail.to_path(),
                    delimiter: delimiter.to_vec(),
                });
                break scan.bytes;
            }
            if !scan.bytes.is_empty() || allow_empty {
                break scan.bytes;
            }
            skipped += 1;
        };

        if skipped > 0 {
            self.warnings.push(Warning::SeparatorsSkipped {
                offset,
                path: trail.to_path(),
                count: skipped,
            });
        }
        Ok(bytes)
    }

    fn error(&self, kind: ErrorKind, trail: &Trail<'_>) -> Error {
        Error::new(kind, self.cursor.position(), trail.to_path())
    }
}
