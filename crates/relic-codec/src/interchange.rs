//! JSON form of a value tree, for editing decoded payloads by hand.
//!
//! Byte runs become `{"bytes": "DE AD BE EF"}`; records keep their field
//! order. Output is indented by four spaces.

use std::io::Write;

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

use crate::value::Value;

/// Render a value tree as pretty-printed JSON.
pub fn to_json(value: &Value) -> serde_json::Result<String> {
    let mut output = Vec::new();
    write_json(value, &mut output)?;
    // serde_json only emits valid UTF-8.
    Ok(String::from_utf8_lossy(&output).into_owned())
}

/// Stream a value tree as pretty-printed JSON into `writer`.
pub fn write_json<W: Write>(value: &Value, writer: W) -> serde_json::Result<()> {
    let mut serializer = Serializer::with_formatter(writer, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut serializer)
}

/// Parse a value tree from JSON text.
pub fn from_json(text: &str) -> serde_json::Result<Value> {
    serde_json::from_str(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode_exact;
    use crate::encode::encode;
    use crate::format::FieldFormat;
    use crate::schema::SchemaNode;
    use crate::value::Fields;

    #[test]
    fn test_bytes_are_tagged_hex() {
        let json = to_json(&Value::Bytes(vec![0xDE, 0xAD, 0xBE, 0xEF])).unwrap();
        assert_eq!(json, "{\n    \"bytes\": \"DE AD BE EF\"\n}");
        assert_eq!(from_json(&json).unwrap(), Value::Bytes(vec![0xDE, 0xAD, 0xBE, 0xEF]));
    }

    #[test]
    fn test_record_order_survives() {
        let mut fields = Fields::new();
        fields.insert("zeta".into(), Value::UInt(1));
        fields.insert("alpha".into(), Value::List(vec![Value::from("x"), Value::Bool(true)]));
        fields.insert("raw".into(), Value::Bytes(vec![]));
        let value = Value::Record(fields);

        let json = to_json(&value).unwrap();
        assert!(json.find("zeta").unwrap() < json.find("alpha").unwrap());
        assert_eq!(from_json(&json).unwrap(), value);
    }

    #[test]
    fn test_bad_hex_is_rejected() {
        assert!(from_json(r#"{"bytes": "ZZ"}"#).is_err());
        // Two keys make it a record, not a byte run.
        let value = from_json(r#"{"bytes": "00", "extra": 1}"#).unwrap();
        assert!(value.as_record().is_some());
    }

    #[test]
    fn test_edit_through_json_repacks() {
        let schema = SchemaNode::record([
            ("name", FieldFormat::string().into()),
            ("hp", FieldFormat::f32().into()),
            ("flags", FieldFormat::dword().into()),
            ("delta", FieldFormat::i16().into()),
        ]);
        let mut data = b"Tau\0".to_vec();
        data.extend_from_slice(&12.5f32.to_le_bytes());
        data.extend_from_slice(&[1, 2, 3, 4]);
        data.extend_from_slice(&(-2i16).to_le_bytes());

        let value = decode_exact(&schema, &data).unwrap().value;
        let json = to_json(&value).unwrap();
        assert!(json.contains("\"01 02 03 04\""));

        // Round trip without edits is exact; JSON drops signedness, encoding restores it.
        let reread = from_json(&json).unwrap();
        assert_eq!(encode(&schema, &reread).unwrap(), data);

        let edited = json.replace("\"Tau\"", "\"Necron\"");
        let bytes = encode(&schema, &from_json(&edited).unwrap()).unwrap();
        assert!(bytes.starts_with(b"Necron\0"));
        assert_eq!(bytes.len(), data.len() + 3);
    }
}
