//! Schemas authored as JSON documents.
//!
//! A node is one of:
//!
//! - a format name: `"u32"`, `"string"`, `"nz_string"`, `"dword"`, `"rest"`, ...
//!   Names are case-insensitive and the C-style aliases (`"uint"`,
//!   `"ushort"`, `"double"`, `"ullong"`, ...) are accepted;
//! - a list shorthand: `[node]` (u32 count prefix), `[node, 10]` (fixed
//!   count) or `[node, "u16"]` (count prefix in the named format);
//! - an object with exactly one tag key:
//!   `{"bytes": 12}`, `{"list": node, "count": "u8"}`, `{"array": node, "len": 3}`,
//!   `{"tuple": [node, ...]}`, `{"record": {"name": node, ...}}` or
//!   `{"record": [["name", node], ...]}`, `{"until": "FF 00", "allow_empty": true}`,
//!   `{"pattern": "regex", "inclusive": false}`, `{"unimplemented": "section"}`,
//!   `{"ref": "definition"}`.
//!
//! Patterns are compiled with Unicode mode off, so escapes like `\xFF` and
//! classes like `\w` work on single bytes.
//!
//! A document may also be `{"definitions": {...}, "root": node}`. Any bare
//! name that is not a format resolves against the definitions.
//!
//! ```
//! use relic_codec::description::parse_schema;
//!
//! let schema = parse_schema(r#"{"record": {"turn": "int", "mods": ["string"]}}"#).unwrap();
//! assert!(schema.field("mods").is_some());
//! ```

use serde_json::{Map, Value as Json};
use thiserror::Error;

use relic_common::Regex;

use crate::format::{Codec, FieldFormat, LengthRule};
use crate::path::SchemaPath;
use crate::schema::SchemaNode;

/// Errors raised while loading a schema description.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("malformed schema document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown format {name:?} at {at}")]
    UnknownFormat { name: String, at: SchemaPath },

    #[error("invalid node at {at}: {reason}")]
    InvalidNode { at: SchemaPath, reason: String },

    #[error("definition {name:?} references itself")]
    ReferenceCycle { name: String },
}

type Result<T> = std::result::Result<T, SchemaError>;

/// Parse a schema description from JSON text.
pub fn parse_schema(text: &str) -> Result<SchemaNode> {
    let document: Json = serde_json::from_str(text)?;
    schema_from_json(&document)
}

/// Build a schema from an already parsed JSON document.
pub fn schema_from_json(document: &Json) -> Result<SchemaNode> {
    let empty = Map::new();
    let root = SchemaPath::root();

    match document {
        Json::Object(map) if map.contains_key("root") => {
            let definitions = match map.get("definitions") {
                Some(Json::Object(defs)) => defs,
                Some(_) => return Err(invalid(&root, "`definitions` must be an object")),
                None => &empty,
            };
            if let Some(key) = map.keys().find(|k| *k != "root" && *k != "definitions") {
                return Err(invalid(&root, format!("unexpected document key {:?}", key)));
            }
            let mut loader = Loader::new(definitions);
            loader.node(&map["root"], &root)
        }
        node => Loader::new(&empty).node(node, &root),
    }
}

/// Look up a built-in format by name.
///
/// Accepts both Rust-style names (`u32`, `f64`) and the C-style aliases
/// (`uint`, `double`), case-insensitively.
pub fn format_by_name(name: &str) -> Option<FieldFormat> {
    let format = match name.to_ascii_lowercase().as_str() {
        "u8" | "uchar" => FieldFormat::u8(),
        "i8" | "schar" => FieldFormat::i8(),
        "u16" | "ushort" => FieldFormat::u16(),
        "i16" | "short" => FieldFormat::i16(),
        "u32" | "uint" | "ulong" => FieldFormat::u32(),
        "i32" | "int" | "long" => FieldFormat::i32(),
        "u64" | "ullong" => FieldFormat::u64(),
        "i64" | "llong" => FieldFormat::i64(),
        "f32" | "float" => FieldFormat::f32(),
        "f64" | "double" => FieldFormat::f64(),
        "bool" => FieldFormat::bool(),
        "byte" | "char" => FieldFormat::byte(),
        "word" => FieldFormat::word(),
        "dword" => FieldFormat::dword(),
        "qword" => FieldFormat::qword(),
        "string" => FieldFormat::string(),
        "nz_string" => FieldFormat::nz_string(),
        "rest" => FieldFormat::rest(),
        "u32_plus_one" => FieldFormat::u32_plus_one(),
        _ => return None,
    };
    Some(format)
}

fn invalid(at: &SchemaPath, reason: impl Into<String>) -> SchemaError {
    SchemaError::InvalidNode {
        at: at.clone(),
        reason: reason.into(),
    }
}

struct Loader<'d> {
    definitions: &'d Map<String, Json>,
    resolving: Vec<String>,
}

impl<'d> Loader<'d> {
    fn new(definitions: &'d Map<String, Json>) -> Self {
        Self {
            definitions,
            resolving: Vec::new(),
        }
    }

    fn node(&mut self, json: &Json, at: &SchemaPath) -> Result<SchemaNode> {
        match json {
            Json::String(name) => self.named(name, at),
            Json::Array(items) => self.shorthand(items, at),
            Json::Object(map) => self.tagged(map, at),
            other => Err(invalid(at, format!("expected a name, list or object, found {}", other))),
        }
    }

    fn named(&mut self, name: &str, at: &SchemaPath) -> Result<SchemaNode> {
        if let Some(format) = format_by_name(name) {
            return Ok(format.into());
        }
        if self.definitions.contains_key(name) {
            return self.reference(name, at);
        }
        Err(SchemaError::UnknownFormat {
            name: name.to_string(),
            at: at.clone(),
        })
    }

    fn reference(&mut self, name: &str, at: &SchemaPath) -> Result<SchemaNode> {
        let Some(definition) = self.definitions.get(name) else {
            return Err(invalid(at, format!("undefined reference {:?}", name)));
        };
        if self.resolving.iter().any(|n| n == name) {
            return Err(SchemaError::ReferenceCycle { name: name.to_string() });
        }

        self.resolving.push(name.to_string());
        let node = self.node(definition, at);
        self.resolving.pop();
        node
    }

    fn shorthand(&mut self, items: &[Json], at: &SchemaPath) -> Result<SchemaNode> {
        match items {
            [element] => Ok(SchemaNode::list(self.node(element, &at.index(0))?)),
            [element, Json::Number(count)] => {
                let count = count
                    .as_u64()
                    .and_then(|n| usize::try_from(n).ok())
                    .ok_or_else(|| invalid(at, "fixed count must be a non-negative integer"))?;
                Ok(SchemaNode::array(self.node(element, &at.index(0))?, count))
            }
            [element, Json::String(count)] => {
                let count = self.count_format(count, at)?;
                Ok(SchemaNode::list_with_count(self.node(element, &at.index(0))?, count))
            }
            [_, _] => Err(invalid(at, "second list element must be a count or a format name")),
            _ => Err(invalid(at, format!("list shorthand takes 1 or 2 elements, found {}", items.len()))),
        }
    }

    fn tagged(&mut self, map: &Map<String, Json>, at: &SchemaPath) -> Result<SchemaNode> {
        const TAGS: &[&str] = &["bytes", "list", "array", "tuple", "record", "until", "pattern", "unimplemented", "ref"];

        let mut tags = map.keys().filter(|k| TAGS.contains(&k.as_str()));
        let (Some(tag), None) = (tags.next(), tags.next()) else {
            return Err(invalid(at, "object must carry exactly one node tag"));
        };
        let body = &map[tag.as_str()];

        let options: &[&str] = match tag.as_str() {
            "list" => &["count"],
            "array" => &["len"],
            "until" => &["allow_empty"],
            "pattern" => &["inclusive"],
            _ => &[],
        };
        if let Some(key) = map.keys().find(|k| *k != tag && !options.contains(&k.as_str())) {
            return Err(invalid(at, format!("unexpected key {:?} on {:?} node", key, tag)));
        }

        match tag.as_str() {
            "bytes" => Ok(FieldFormat::bytes(self.count_of(body, at, "bytes")?).into()),
            "list" => {
                let element = self.node(body, &at.index(0))?;
                let count = match map.get("count") {
                    Some(Json::String(name)) => self.count_format(name, at)?,
                    Some(_) => return Err(invalid(at, "`count` must be a format name")),
                    None => FieldFormat::u32(),
                };
                Ok(SchemaNode::list_with_count(element, count))
            }
            "array" => {
                let len = map
                    .get("len")
                    .ok_or_else(|| invalid(at, "`array` needs a `len`"))
                    .and_then(|len| self.count_of(len, at, "len"))?;
                Ok(SchemaNode::array(self.node(body, &at.index(0))?, len))
            }
            "tuple" => {
                let Json::Array(items) = body else {
                    return Err(invalid(at, "`tuple` must be a list of nodes"));
                };
                let elements = items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.node(item, &at.index(i)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(SchemaNode::Tuple(elements))
            }
            "record" => self.record(body, at),
            "until" => {
                let Json::String(hex) = body else {
                    return Err(invalid(at, "`until` must be a hex string"));
                };
                let delimiter =
                    relic_common::hex::from_hex_pairs(hex).map_err(|e| invalid(at, e.to_string()))?;
                if delimiter.is_empty() {
                    return Err(invalid(at, "delimiter must not be empty"));
                }
                let allow_empty = self.flag(map, "allow_empty", true, at)?;
                let rule = LengthRule::Delimited {
                    delimiter,
                    allow_empty,
                };
                Ok(FieldFormat::new(rule, Codec::Raw).into())
            }
            "pattern" => {
                let Json::String(pattern) = body else {
                    return Err(invalid(at, "`pattern` must be a regex string"));
                };
                // Payloads are raw bytes: `\xFF` means the byte, not U+00FF.
                let regex = Regex::new(&format!("(?-u){}", pattern))
                    .map_err(|e| invalid(at, e.to_string()))?;
                let inclusive = self.flag(map, "inclusive", false, at)?;
                Ok(FieldFormat::pattern(regex, inclusive).into())
            }
            "unimplemented" => match body {
                Json::String(section) => Ok(FieldFormat::unimplemented(section.as_str()).into()),
                _ => Err(invalid(at, "`unimplemented` must name a section")),
            },
            "ref" => match body {
                Json::String(name) => self.reference(name, at),
                _ => Err(invalid(at, "`ref` must name a definition")),
            },
            other => Err(invalid(at, format!("unsupported tag {:?}", other))),
        }
    }

    fn record(&mut self, body: &Json, at: &SchemaPath) -> Result<SchemaNode> {
        let mut fields: Vec<(String, SchemaNode)> = Vec::new();

        let mut push = |loader: &mut Self, name: &str, node: &Json| -> Result<()> {
            if fields.iter().any(|(n, _)| n == name) {
                return Err(invalid(at, format!("duplicate field {:?}", name)));
            }
            let child = loader.node(node, &at.field(name))?;
            fields.push((name.to_string(), child));
            Ok(())
        };

        match body {
            Json::Object(map) => {
                for (name, node) in map {
                    push(self, name, node)?;
                }
            }
            Json::Array(pairs) => {
                for pair in pairs {
                    match pair.as_array().map(Vec::as_slice) {
                        Some([Json::String(name), node]) => push(self, name, node)?,
                        _ => return Err(invalid(at, "record entries must be [name, node] pairs")),
                    }
                }
            }
            _ => return Err(invalid(at, "`record` must be an object or a list of pairs")),
        }

        Ok(SchemaNode::Record(fields))
    }

    fn count_format(&self, name: &str, at: &SchemaPath) -> Result<FieldFormat> {
        let format = format_by_name(name).ok_or_else(|| SchemaError::UnknownFormat {
            name: name.to_string(),
            at: at.clone(),
        })?;
        match format.codec() {
            Codec::Numeric(kind) if kind.is_integer() => Ok(format),
            _ => Err(invalid(at, format!("count format {:?} is not an integer", name))),
        }
    }

    fn count_of(&self, json: &Json, at: &SchemaPath, what: &str) -> Result<usize> {
        json.as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| invalid(at, format!("`{}` must be a non-negative integer", what)))
    }

    fn flag(&self, map: &Map<String, Json>, key: &str, default: bool, at: &SchemaPath) -> Result<bool> {
        match map.get(key) {
            None => Ok(default),
            Some(Json::Bool(flag)) => Ok(*flag),
            Some(_) => Err(invalid(at, format!("`{}` must be a boolean", key))),
        }
    }
}
