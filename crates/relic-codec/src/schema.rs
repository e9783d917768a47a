//! The structure grammar.
//!
//! A [`SchemaNode`] tree describes a payload layout. Trees are immutable and
//! hold no buffer state, so one tree can drive any number of decode and
//! encode passes.
//!
//! ```
//! use relic_codec::{FieldFormat, SchemaNode};
//!
//! let tile = SchemaNode::record([
//!     ("id", FieldFormat::u32().into()),
//!     ("flags", FieldFormat::byte().into()),
//!     ("region", FieldFormat::string().into()),
//!     ("features", SchemaNode::list(FieldFormat::i32())),
//! ]);
//! let tiles = SchemaNode::list(tile);
//! assert!(tiles.is_writable());
//! ```

use crate::error::{Error, ErrorKind, Result};
use crate::format::{Codec, FieldFormat};
use crate::path::SchemaPath;

/// A node of a layout description.
#[derive(Debug, Clone)]
pub enum SchemaNode {
    /// One value.
    Scalar(FieldFormat),
    /// Exactly `count` repetitions with no length marker.
    FixedArray(Box<SchemaNode>, usize),
    /// Repetitions preceded by a count read and written through the format.
    PrefixedArray(Box<SchemaNode>, FieldFormat),
    /// Heterogeneous sequence addressed by position.
    Tuple(Vec<SchemaNode>),
    /// Heterogeneous sequence addressed by name, in declaration order.
    Record(Vec<(String, SchemaNode)>),
}

impl SchemaNode {
    /// A single value.
    pub fn scalar(format: FieldFormat) -> Self {
        Self::Scalar(format)
    }

    /// Exactly `count` elements, no count on the wire.
    pub fn array(element: impl Into<SchemaNode>, count: usize) -> Self {
        Self::FixedArray(Box::new(element.into()), count)
    }

    /// Elements preceded by a little-endian u32 count.
    pub fn list(element: impl Into<SchemaNode>) -> Self {
        Self::list_with_count(element, FieldFormat::u32())
    }

    /// Elements preceded by a count in the given format.
    pub fn list_with_count(element: impl Into<SchemaNode>, count: FieldFormat) -> Self {
        Self::PrefixedArray(Box::new(element.into()), count)
    }

    /// An ordered tuple.
    pub fn tuple(elements: impl IntoIterator<Item = SchemaNode>) -> Self {
        Self::Tuple(elements.into_iter().collect())
    }

    /// A named record. Iteration order is wire order.
    ///
    /// # Panics
    ///
    /// Panics if two fields share a name.
    pub fn record<N: Into<String>>(fields: impl IntoIterator<Item = (N, SchemaNode)>) -> Self {
        let mut record: Vec<(String, SchemaNode)> = Vec::new();
        for (name, node) in fields {
            let name = name.into();
            assert!(
                record.iter().all(|(existing, _)| *existing != name),
                "duplicate field {:?} in record schema",
                name
            );
            record.push((name, node));
        }
        Self::Record(record)
    }

    /// Look up a record field's node.
    pub fn field(&self, name: &str) -> Option<&SchemaNode> {
        match self {
            SchemaNode::Record(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, node)| node),
            _ => None,
        }
    }

    /// Whether every format in the tree can be written.
    pub fn is_writable(&self) -> bool {
        self.find_unwritable(&SchemaPath::root()).is_none()
    }

    /// Report the first branch that cannot be written, before any encoding.
    ///
    /// Encoding itself is lazy: a decode-only element under an empty list
    /// never fails an encode. This check is the strict, static form.
    pub fn check_writable(&self) -> Result<()> {
        match self.find_unwritable(&SchemaPath::root()) {
            Some((kind, path)) => Err(Error::new(kind, 0, path)),
            None => Ok(()),
        }
    }

    fn find_unwritable(&self, path: &SchemaPath) -> Option<(ErrorKind, SchemaPath)> {
        match self {
            SchemaNode::Scalar(format) => unwritable_format(format).map(|kind| (kind, path.clone())),
            SchemaNode::FixedArray(element, _) => element.find_unwritable(&path.index(0)),
            SchemaNode::PrefixedArray(element, count) => unwritable_format(count)
                .map(|kind| (kind, path.clone()))
                .or_else(|| element.find_unwritable(&path.index(0))),
            SchemaNode::Tuple(elements) => elements
                .iter()
                .enumerate()
                .find_map(|(i, node)| node.find_unwritable(&path.index(i))),
            SchemaNode::Record(fields) => fields
                .iter()
                .find_map(|(name, node)| node.find_unwritable(&path.field(name.as_str()))),
        }
    }
}

fn unwritable_format(format: &FieldFormat) -> Option<ErrorKind> {
    match format.codec() {
        Codec::Custom { encode: None, .. } => Some(ErrorKind::WriteIncapableFormat),
        Codec::Unimplemented(section) => Some(ErrorKind::UnimplementedSection(section.clone())),
        _ => None,
    }
}

impl From<FieldFormat> for SchemaNode {
    fn from(format: FieldFormat) -> Self {
        Self::Scalar(format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::LengthRule;
    use crate::value::Value;

    #[test]
    fn test_record_preserves_declaration_order() {
        let node = SchemaNode::record([
            ("zeta", FieldFormat::u8().into()),
            ("alpha", FieldFormat::u8().into()),
        ]);
        let SchemaNode::Record(fields) = &node else {
            panic!("expected record");
        };
        let names: Vec<_> = fields.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["zeta", "alpha"]);
        assert!(node.field("alpha").is_some());
        assert!(node.field("beta").is_none());
    }

    #[test]
    #[should_panic(expected = "duplicate field \"name\"")]
    fn test_record_rejects_duplicate_names() {
        SchemaNode::record([
            ("name", FieldFormat::string().into()),
            ("turn", FieldFormat::i32().into()),
            ("name", FieldFormat::string().into()),
        ]);
    }

    #[test]
    fn test_check_writable_reports_path() {
        let node = SchemaNode::record([
            ("id", FieldFormat::u32().into()),
            (
                "items",
                SchemaNode::list(SchemaNode::tuple([
                    FieldFormat::string().into(),
                    FieldFormat::decode_only("peek", LengthRule::Fixed(1), |b| {
                        Ok(Value::UInt(b[0].into()))
                    })
                    .into(),
                ])),
            ),
        ]);

        assert!(!node.is_writable());
        let err = node.check_writable().unwrap_err();
        assert!(matches!(err.kind, ErrorKind::WriteIncapableFormat));
        assert_eq!(err.path.to_string(), "$.items[0][1]");
    }

    #[test]
    fn test_unimplemented_section_is_unwritable() {
        let node = SchemaNode::record([("events", SchemaNode::list(FieldFormat::unimplemented("events")))]);
        let err = node.check_writable().unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UnimplementedSection(_)));
    }
}
