use crate::common::Record;
use std::fmt::{Debug, Display, Formatter};

/// Represents a field value inside a [Record], or a raw value stored under a
/// key in the store.
///
/// # Purpose
/// Provides a unified representation for everything the engine persists:
/// record fields, the version marker, applied-migration records, backup
/// metadata and index entries.
///
/// # Variants
/// - Null: absence of a value
/// - Bool(bool): boolean true/false
/// - I64(i64): integer value
/// - F64(f64): floating point value
/// - String(String): text value
/// - Array(Vec<Value>): ordered collection of values
/// - Record(Record): nested record/object
/// - Bytes(Vec<u8>): binary data (not indexable)
///
/// # Characteristics
/// - **Comparable**: implements PartialEq for optimistic precondition checks
/// - **Serializable**: untagged serde representation, so declarative
///   migration files read as plain JSON values
/// - **Default**: defaults to Null
///
/// The untagged form has no JSON representation for `Bytes`: it serializes
/// as a number array and deserializes back as [`Value::Array`]. Do not use
/// `Bytes` in declarative migration files; it is an in-process value only.
#[derive(Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Represents a null value.
    #[default]
    Null,
    /// Represents a boolean value.
    Bool(bool),
    /// Represents a signed 64-bit integer value.
    I64(i64),
    /// Represents a 64-bit floating point value.
    F64(f64),
    /// Represents a string value.
    String(String),
    /// Represents an array value.
    Array(Vec<Value>),
    /// Represents a nested record value.
    Record(Record),
    /// Represents a byte array value. It cannot be indexed, and its JSON
    /// form is not round-trippable (see the type-level docs).
    Bytes(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b.as_slice()),
            _ => None,
        }
    }

    /// Name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::I64(_) => "i64",
            Value::F64(_) => "f64",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Record(_) => "record",
            Value::Bytes(_) => "bytes",
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::I64(i) => write!(f, "{}", i),
            Value::F64(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "{}", s),
            Value::Array(a) => {
                write!(f, "[")?;
                for (i, v) in a.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Record(r) => write!(f, "{}", r),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s),
            other => write!(f, "{}", other),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::I64(i as i64)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::I64(i)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::I64(i as i64)
    }
}

impl From<u64> for Value {
    fn from(i: u64) -> Self {
        Value::I64(i as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(a: Vec<Value>) -> Self {
        Value::Array(a)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Record(r)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// Convenience constructor for [Value].
///
/// # Examples
///
/// ```rust,ignore
/// use keyvolve::val;
///
/// let int_value = val!(42);
/// let string_value = val!("hello");
/// ```
#[macro_export]
macro_rules! val {
    ($value:expr) => {
        $crate::common::Value::from($value)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_null() {
        assert_eq!(Value::default(), Value::Null);
        assert!(Value::default().is_null());
    }

    #[test]
    fn test_from_conversions() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(42i32), Value::I64(42));
        assert_eq!(Value::from(42u32), Value::I64(42));
        assert_eq!(Value::from(1.5f64), Value::F64(1.5));
        assert_eq!(Value::from("hello"), Value::String("hello".to_string()));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(7i64)), Value::I64(7));
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Value::I64(5).as_i64(), Some(5));
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::from("s").as_str(), Some("s"));
        assert_eq!(Value::Null.as_i64(), None);
        assert_eq!(Value::I64(5).as_str(), None);
    }

    #[test]
    fn test_type_name() {
        assert_eq!(Value::Null.type_name(), "null");
        assert_eq!(Value::I64(1).type_name(), "i64");
        assert_eq!(Value::Bytes(vec![1]).type_name(), "bytes");
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Value::Null), "null");
        assert_eq!(format!("{}", Value::I64(3)), "3");
        assert_eq!(
            format!("{}", Value::Array(vec![Value::I64(1), Value::from("a")])),
            "[1, a]"
        );
    }

    #[test]
    fn test_val_macro() {
        assert_eq!(val!(42i64), Value::I64(42));
        assert_eq!(val!("hello"), Value::String("hello".to_string()));
    }

    #[test]
    fn test_json_round_trip_untagged() {
        let json = r#"{"name":"alice","age":30,"active":true,"tags":["a","b"]}"#;
        let value: Value = serde_json::from_str(json).unwrap();
        let record = value.as_record().expect("object parses as record");
        assert_eq!(record.get("name"), &Value::from("alice"));
        assert_eq!(record.get("age"), &Value::I64(30));
        assert_eq!(record.get("active"), &Value::Bool(true));

        let back = serde_json::to_string(&value).unwrap();
        let reparsed: Value = serde_json::from_str(&back).unwrap();
        assert_eq!(reparsed, value);
    }

    #[test]
    fn test_bytes_json_form_reparses_as_array() {
        // Documented limitation: Bytes has no untagged JSON representation
        // and comes back as a number array, so it must not be used in
        // declarative migration files.
        let json = serde_json::to_string(&Value::Bytes(vec![1, 2])).unwrap();
        assert_eq!(json, "[1,2]");
        let reparsed: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(reparsed, Value::Array(vec![Value::I64(1), Value::I64(2)]));
    }
}
