//! The decoded value tree.
//!
//! A [`Value`] mirrors the shape of the [`SchemaNode`](crate::SchemaNode)
//! that produced it: scalars at the leaves, [`Value::List`] for arrays and
//! tuples, and [`Value::Record`] for named records. The tree carries no game
//! meaning of its own.

use std::fmt;

use indexmap::IndexMap;

/// Ordered field map of a decoded record. Key order is wire order.
pub type Fields = IndexMap<String, Value>;

/// A node of a decoded value tree.
///
/// Integers compare by numeric value, so `Int(5) == UInt(5)`. This keeps a
/// tree equal to itself after a trip through JSON, where signedness is not
/// recorded.
#[derive(Debug, Clone)]
pub enum Value {
    /// Boolean value.
    Bool(bool),
    /// Signed integer of any width.
    Int(i64),
    /// Unsigned integer of any width.
    UInt(u64),
    /// Floating point of either width.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Opaque byte run.
    Bytes(Vec<u8>),
    /// Ordered sequence (arrays and tuples).
    List(Vec<Value>),
    /// Ordered name-keyed mapping (records).
    Record(Fields),
}

impl Value {
    /// Short name of the variant, used in mismatch errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) | Value::UInt(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Record(_) => "record",
        }
    }

    /// A one-line description for error messages.
    pub fn summary(&self) -> String {
        match self {
            Value::List(items) => format!("list of {}", items.len()),
            Value::Record(fields) => format!("record with {} fields", fields.len()),
            Value::Bytes(bytes) => format!("{} bytes", bytes.len()),
            Value::String(s) => format!("string {:?}", s),
            other => format!("{} {}", other.kind(), other),
        }
    }

    /// Try to get this value as a boolean.
    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get this value as an unsigned integer.
    #[inline]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt(v) => Some(*v),
            Value::Int(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Try to get this value as a signed integer.
    #[inline]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::UInt(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Try to get this value as a float. Integers convert.
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            Value::UInt(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Try to get this value as a string.
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as raw bytes.
    #[inline]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Try to get this value as a list.
    #[inline]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Try to get mutable access to a list.
    #[inline]
    pub fn as_list_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Try to get this value as a record.
    #[inline]
    pub fn as_record(&self) -> Option<&Fields> {
        match self {
            Value::Record(fields) => Some(fields),
            _ => None,
        }
    }

    /// Try to get mutable access to a record.
    #[inline]
    pub fn as_record_mut(&mut self) -> Option<&mut Fields> {
        match self {
            Value::Record(fields) => Some(fields),
            _ => None,
        }
    }

    /// Look up a record field by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.as_record().and_then(|fields| fields.get(name))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::UInt(a), Value::UInt(b)) => a == b,
            (Value::Int(a), Value::UInt(b)) | (Value::UInt(b), Value::Int(a)) => {
                u64::try_from(*a).is_ok_and(|a| a == *b)
            }
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x == y)
            }
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::UInt(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "{}", s),
            Value::Bytes(b) => write!(f, "<{}>", relic_common::hex::to_hex_pairs(b)),
            Value::List(items) => write!(f, "List[{}]", items.len()),
            Value::Record(fields) => write!(f, "Record[{}]", fields.len()),
        }
    }
}

macro_rules! impl_from {
    ($variant:ident, $($ty:ty),+) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v.into())
                }
            }
        )+
    };
}

impl_from!(Int, i8, i16, i32, i64);
impl_from!(UInt, u8, u16, u32, u64);
impl_from!(Float, f32, f64);
impl_from!(Bool, bool);
impl_from!(String, String, &str);
impl_from!(Bytes, Vec<u8>, &[u8]);
impl_from!(List, Vec<Value>);
impl_from!(Record, Fields);

#[cfg(feature = "serde")]
mod serde_impl {
    use std::fmt;

    use serde::de::{self, MapAccess, SeqAccess, Visitor};
    use serde::ser::{SerializeMap, SerializeSeq};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::{Fields, Value};

    /// Key of the single-entry object that tags a hex byte run.
    const BYTES_TAG: &str = "bytes";

    impl Serialize for Value {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            match self {
                Value::Bool(v) => serializer.serialize_bool(*v),
                Value::Int(v) => serializer.serialize_i64(*v),
                Value::UInt(v) => serializer.serialize_u64(*v),
                Value::Float(v) => serializer.serialize_f64(*v),
                Value::String(s) => serializer.serialize_str(s),
                Value::Bytes(b) => {
                    let mut map = serializer.serialize_map(Some(1))?;
                    map.serialize_entry(BYTES_TAG, &relic_common::hex::to_hex_pairs(b))?;
                    map.end()
                }
                Value::List(items) => {
                    let mut seq = serializer.serialize_seq(Some(items.len()))?;
                    for item in items {
                        seq.serialize_element(item)?;
                    }
                    seq.end()
                }
                Value::Record(fields) => {
                    let mut map = serializer.serialize_map(Some(fields.len()))?;
                    for (name, value) in fields {
                        map.serialize_entry(name, value)?;
                    }
                    map.end()
                }
            }
        }
    }

    struct ValueVisitor;

    impl<'de> Visitor<'de> for ValueVisitor {
        type Value = Value;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a decoded save value")
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
            Ok(Value::Bool(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
            Ok(Value::Int(v))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
            Ok(Value::UInt(v))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
            Ok(Value::Float(v))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
            Ok(Value::String(v.to_string()))
        }

        fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
            Ok(Value::String(v))
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
            let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
            while let Some(item) = seq.next_element()? {
                items.push(item);
            }
            Ok(Value::List(items))
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
            let mut fields = Fields::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((name, value)) = map.next_entry::<String, Value>()? {
                fields.insert(name, value);
            }

            if fields.len() == 1 {
                if let Some(Value::String(hex)) = fields.get(BYTES_TAG) {
                    let bytes =
                        relic_common::hex::from_hex_pairs(hex).map_err(de::Error::custom)?;
                    return Ok(Value::Bytes(bytes));
                }
            }
            Ok(Value::Record(fields))
        }
    }

    impl<'de> Deserialize<'de> for Value {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            deserializer.deserialize_any(ValueVisitor)
        }
    }
}
