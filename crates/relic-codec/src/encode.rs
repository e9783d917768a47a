//! Schema-driven encoding.
//!
//! [`Encoder`] mirrors [`Decoder`](crate::Decoder) node for node, appending
//! to an owned buffer. Length prefixes are always written from the live
//! length of the collection being encoded, never from a count stored in the
//! tree, so edited trees repack correctly. There is no back-patching: every
//! byte is final when appended.

use crate::error::{Error, ErrorKind, Result};
use crate::format::FieldFormat;
use crate::path::Trail;
use crate::schema::SchemaNode;
use crate::value::Value;

/// Encode `value` with `schema` into a fresh buffer.
pub fn encode(schema: &SchemaNode, value: &Value) -> Result<Vec<u8>> {
    let mut encoder = Encoder::new();
    encoder.encode(schema, value)?;
    Ok(encoder.into_bytes())
}

/// An append-only encode sink.
///
/// A failed call leaves the sink exactly as it was before the call, so a
/// caller never sees a half-written value.
#[derive(Debug, Default)]
pub struct Encoder {
    output: Vec<u8>,
}

impl Encoder {
    /// Create an empty encoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an encoder with preallocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            output: Vec::with_capacity(capacity),
        }
    }

    /// Number of bytes written so far.
    #[inline]
    pub fn position(&self) -> usize {
        self.output.len()
    }

    /// The bytes written so far.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.output
    }

    /// Consume the encoder and return its buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.output
    }

    /// Encode one value.
    pub fn encode(&mut self, node: &SchemaNode, value: &Value) -> Result<()> {
        self.transaction(|encoder| encoder.encode_node(node, value, &Trail::Root))
    }

    /// Encode one element per hint, choosing each element's layout from its
    /// hint. The inverse of [`Decoder::decode_guided`](crate::Decoder::decode_guided).
    pub fn encode_guided<'s, F>(&mut self, value: &Value, hints: &[Value], mut select: F) -> Result<()>
    where
        F: FnMut(usize, &Value) -> std::result::Result<&'s SchemaNode, String>,
    {
        self.transaction(|encoder| {
            let root = Trail::Root;
            let items = encoder.expect_list(value, &root)?;
            if items.len() != hints.len() {
                return Err(encoder.error(
                    ErrorKind::ArityMismatch {
                        expected: hints.len(),
                        actual: items.len(),
                    },
                    &root,
                ));
            }

            for (index, (item, hint)) in items.iter().zip(hints).enumerate() {
                let trail = Trail::Index(&root, index);
                let node = select(index, hint).map_err(|msg| encoder.error(ErrorKind::Custom(msg), &trail))?;
                encoder.encode_node(node, item, &trail)?;
            }
            Ok(())
        })
    }

    fn transaction(&mut self, body: impl FnOnce(&mut Self) -> Result<()>) -> Result<()> {
        let start = self.output.len();
        let result = body(self);
        if result.is_err() {
            self.output.truncate(start);
        }
        result
    }

    fn encode_node(&mut self, node: &SchemaNode, value: &Value, trail: &Trail<'_>) -> Result<()> {
        match node {
            SchemaNode::Scalar(format) => self.write_scalar(format, value, trail),
            SchemaNode::FixedArray(element, count) => {
                let items = self.expect_list(value, trail)?;
                if items.len() != *count {
                    return Err(self.error(
                        ErrorKind::ArityMismatch {
                            expected: *count,
                            actual: items.len(),
                        },
                        trail,
                    ));
                }
                self.write_elements(element, items, trail)
            }
            SchemaNode::PrefixedArray(element, count_format) => {
                let items = self.expect_list(value, trail)?;
                self.write_scalar(count_format, &Value::UInt(items.len() as u64), trail)?;
                self.write_elements(element, items, trail)
            }
            SchemaNode::Tuple(elements) => {
                let items = self.expect_list(value, trail)?;
                if items.len() != elements.len() {
                    return Err(self.error(
                        ErrorKind::ArityMismatch {
                            expected: elements.len(),
                            actual: items.len(),
                        },
                        trail,
                    ));
                }
                for (index, (child, item)) in elements.iter().zip(items).enumerate() {
                    self.encode_node(child, item, &Trail::Index(trail, index))?;
                }
                Ok(())
            }
            SchemaNode::Record(fields) => {
                let Value::Record(values) = value else {
                    return Err(self.error(ErrorKind::mismatch("record", value.summary()), trail));
                };

                if let Some(extra) = values.keys().find(|key| !fields.iter().any(|(name, _)| name == *key)) {
                    return Err(self.error(ErrorKind::UnexpectedField(extra.clone()), trail));
                }

                for (name, child) in fields {
                    let child_trail = Trail::Field(trail, name);
                    let item = values
                        .get(name)
                        .ok_or_else(|| self.error(ErrorKind::MissingField(name.clone()), trail))?;
                    self.encode_node(child, item, &child_trail)?;
                }
                Ok(())
            }
        }
    }

    fn write_elements(&mut self, element: &SchemaNode, items: &[Value], trail: &Trail<'_>) -> Result<()> {
        for (index, item) in items.iter().enumerate() {
            self.encode_node(element, item, &Trail::Index(trail, index))?;
        }
        Ok(())
    }

    fn write_scalar(&mut self, format: &FieldFormat, value: &Value, trail: &Trail<'_>) -> Result<()> {
        let offset = self.output.len();
        format
            .encode_value(value, &mut self.output)
            .map_err(|kind| Error::new(kind, offset, trail.to_path()))
    }

    fn expect_list<'v>(&self, value: &'v Value, trail: &Trail<'_>) -> Result<&'v [Value]> {
        value
            .as_list()
            .ok_or_else(|| self.error(ErrorKind::mismatch("list", value.summary()), trail))
    }

    fn error(&self, kind: ErrorKind, trail: &Trail<'_>) -> Error {
        Error::new(kind, self.output.len(), trail.to_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{decode, decode_exact};
    use crate::format::LengthRule;
    use crate::value::Fields;
    use proptest::prelude::*;

    #[test]
    fn test_scalar_u32() {
        let schema: SchemaNode = FieldFormat::u32().into();
        assert_eq!(encode(&schema, &Value::UInt(1)).unwrap(), vec![0x01, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_prefixed_string_list_reproduces_input() {
        let schema = SchemaNode::list(FieldFormat::string());
        let data = b"\x02\x00\x00\x00a\0bb\0";

        let value = decode_exact(&schema, data).unwrap().value;
        assert_eq!(encode(&schema, &value).unwrap(), data);
    }

    #[test]
    fn test_fixed_array_arity_mismatch() {
        let schema = SchemaNode::array(FieldFormat::u8(), 3);
        let value = Value::List(vec![Value::UInt(1), Value::UInt(2)]);

        let err = encode(&schema, &value).unwrap_err();
        assert!(matches!(
            err.kind,
            ErrorKind::ArityMismatch {
                expected: 3,
                actual: 2
            }
        ));

        let too_many = Value::List(vec![Value::UInt(1); 4]);
        assert!(matches!(
            encode(&schema, &too_many).unwrap_err().kind,
            ErrorKind::ArityMismatch { expected: 3, actual: 4 }
        ));
    }

    #[test]
    fn test_prefixed_count_follows_live_length() {
        let schema = SchemaNode::list(FieldFormat::u16());
        let data = [3, 0, 0, 0, 10, 0, 20, 0, 30, 0];

        let mut value = decode_exact(&schema, &data).unwrap().value;
        value.as_list_mut().unwrap().push(Value::UInt(40));

        let encoded = encode(&schema, &value).unwrap();
        assert_eq!(&encoded[..4], &[4, 0, 0, 0]);
        assert_eq!(&encoded[4..], &[10, 0, 20, 0, 30, 0, 40, 0]);

        let reread = decode_exact(&schema, &encoded).unwrap().value;
        assert_eq!(reread.as_list().unwrap().len(), 4);
    }

    #[test]
    fn test_removed_elements_shrink_count() {
        let schema = SchemaNode::list_with_count(FieldFormat::string(), FieldFormat::u8());
        let mut value = decode_exact(&schema, b"\x02x\0y\0").unwrap().value;
        value.as_list_mut().unwrap().remove(0);

        assert_eq!(encode(&schema, &value).unwrap(), b"\x01y\0");
    }

    #[test]
    fn test_record_encodes_in_schema_order() {
        let schema = SchemaNode::record([
            ("a", FieldFormat::u8().into()),
            ("b", FieldFormat::u8().into()),
        ]);
        let mut fields = Fields::new();
        fields.insert("b".into(), Value::UInt(2));
        fields.insert("a".into(), Value::UInt(1));

        assert_eq!(encode(&schema, &Value::Record(fields)).unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_record_field_errors() {
        let schema = SchemaNode::record([("a", FieldFormat::u8().into())]);

        let err = encode(&schema, &Value::Record(Fields::new())).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::MissingField(ref n) if n == "a"));

        let mut fields = Fields::new();
        fields.insert("a".into(), Value::UInt(1));
        fields.insert("stale".into(), Value::UInt(1));
        let err = encode(&schema, &Value::Record(fields)).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UnexpectedField(ref n) if n == "stale"));
    }

    #[test]
    fn test_write_incapable_format_reported() {
        let schema = SchemaNode::record([
            ("id", FieldFormat::u32().into()),
            (
                "peek",
                FieldFormat::decode_only("peek", LengthRule::Fixed(1), |b| Ok(Value::UInt(b[0].into()))).into(),
            ),
        ]);
        let value = decode_exact(&schema, &[1, 0, 0, 0, 5]).unwrap().value;

        let mut encoder = Encoder::new();
        let err = encoder.encode(&schema, &value).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::WriteIncapableFormat));
        assert_eq!(err.path.to_string(), "$.peek");
        assert_eq!(err.offset, 4);
        // Nothing from the failed pass is left behind.
        assert!(encoder.as_bytes().is_empty());
    }

    #[test]
    fn test_value_shape_mismatch() {
        let schema = SchemaNode::list(FieldFormat::u8());
        let err = encode(&schema, &Value::UInt(1)).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::ValueMismatch { .. }));
    }

    #[test]
    fn test_empty_nz_string_cannot_shift_neighbours() {
        let schema = SchemaNode::tuple([FieldFormat::nz_string().into(), FieldFormat::string().into()]);
        let value = Value::List(vec!["".into(), "x".into()]);

        let err = encode(&schema, &value).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::ValueMismatch { .. }));
        assert_eq!(err.path.to_string(), "$[0]");
        assert_eq!(err.offset, 0);
    }

    #[test]
    fn test_pattern_value_with_early_match_rejected() {
        let regex = relic_common::Regex::new("X").unwrap();
        let schema = SchemaNode::tuple([FieldFormat::pattern(regex, false).into(), FieldFormat::rest().into()]);

        let good = Value::List(vec![b"ab".to_vec().into(), b"Xtail".to_vec().into()]);
        let bytes = encode(&schema, &good).unwrap();
        assert_eq!(decode_exact(&schema, &bytes).unwrap().value, good);

        let bad = Value::List(vec![b"aXb".to_vec().into(), b"Xtail".to_vec().into()]);
        let err = encode(&schema, &bad).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::ValueMismatch { .. }));
        assert_eq!(err.path.to_string(), "$[0]");
    }

    #[test]
    fn test_skipped_separators_are_not_rewritten() {
        let schema = SchemaNode::tuple([FieldFormat::nz_string().into(), FieldFormat::u8().into()]);
        let original = b"\0Units/Tau\0\x07";

        let decoded = decode_exact(&schema, original).unwrap();
        assert_eq!(decoded.warnings.len(), 1);
        let bytes = encode(&schema, &decoded.value).unwrap();
        assert_eq!(bytes, b"Units/Tau\0\x07");
        assert_eq!(bytes.len(), original.len() - 1);
    }

    fn pick<'s>(normal: &'s SchemaNode, weapon: &'s SchemaNode, hint: &Value) -> &'s SchemaNode {
        if hint.as_bool() == Some(true) {
            weapon
        } else {
            normal
        }
    }

    #[test]
    fn test_guided_encode_mirrors_decode() {
        let normal = SchemaNode::tuple([FieldFormat::i32().into()]);
        let weapon = SchemaNode::tuple([FieldFormat::i32().into(), FieldFormat::i32().into()]);
        let (normal, weapon) = (&normal, &weapon);
        let hints = vec![Value::Bool(false), Value::Bool(true)];

        let value = Value::List(vec![
            Value::List(vec![Value::Int(-1)]),
            Value::List(vec![Value::Int(3), Value::Int(7)]),
        ]);

        let mut encoder = Encoder::new();
        encoder
            .encode_guided(&value, &hints, |_, hint| Ok(pick(normal, weapon, hint)))
            .unwrap();
        let bytes = encoder.into_bytes();
        assert_eq!(bytes.len(), 12);

        let mut decoder = crate::Decoder::new(&bytes);
        let decoded = decoder
            .decode_guided(&hints, |_, hint| Ok(pick(normal, weapon, hint)))
            .unwrap();
        assert_eq!(decoded, value);

        let short = Value::List(vec![Value::List(vec![Value::Int(-1)])]);
        let err = Encoder::new()
            .encode_guided(&short, &hints, |_, hint| Ok(pick(normal, weapon, hint)))
            .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::ArityMismatch { expected: 2, actual: 1 }));
    }

    fn player_schema() -> SchemaNode {
        SchemaNode::record([
            ("id", FieldFormat::u32().into()),
            ("bin1", FieldFormat::bytes(3).into()),
            ("name", FieldFormat::string().into()),
            ("is_ai", FieldFormat::bool().into()),
            ("scores", SchemaNode::list(FieldFormat::f64())),
            (
                "buildings",
                SchemaNode::list(SchemaNode::tuple([
                    FieldFormat::nz_string().into(),
                    FieldFormat::i32().into(),
                ])),
            ),
            ("bin2", SchemaNode::array(FieldFormat::dword(), 2)),
        ])
    }

    fn arb_player() -> impl Strategy<Value = Value> {
        (
            any::<u32>(),
            any::<[u8; 3]>(),
            "[a-zA-Z ]{0,12}",
            any::<bool>(),
            proptest::collection::vec(-1.0e9f64..1.0e9, 0..4),
            proptest::collection::vec(("[A-Za-z/]{1,10}", any::<i32>()), 0..4),
            any::<[u8; 8]>(),
        )
            .prop_map(|(id, bin1, name, is_ai, scores, buildings, bin2)| {
                let mut fields = Fields::new();
                fields.insert("id".into(), id.into());
                fields.insert("bin1".into(), bin1.to_vec().into());
                fields.insert("name".into(), name.into());
                fields.insert("is_ai".into(), is_ai.into());
                fields.insert(
                    "scores".into(),
                    Value::List(scores.into_iter().map(Value::from).collect()),
                );
                fields.insert(
                    "buildings".into(),
                    Value::List(
                        buildings
                            .into_iter()
                            .map(|(n, c)| Value::List(vec![n.into(), c.into()]))
                            .collect(),
                    ),
                );
                fields.insert(
                    "bin2".into(),
                    Value::List(vec![bin2[..4].to_vec().into(), bin2[4..].to_vec().into()]),
                );
                Value::Record(fields)
            })
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(player in arb_player()) {
            let schema = player_schema();
            let bytes = encode(&schema, &player).unwrap();
            let decoded = decode(&schema, &bytes).unwrap();
            prop_assert_eq!(decoded.end, bytes.len());
            prop_assert!(decoded.warnings.is_empty());
            prop_assert_eq!(&decoded.value, &player);
            prop_assert_eq!(encode(&schema, &decoded.value).unwrap(), bytes);
        }
    }
}
