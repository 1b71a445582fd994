use crate::common::Value;
use crate::errors::{ErrorKind, KeyvolveError, KeyvolveResult};
use std::collections::BTreeMap;
use std::fmt::{Debug, Display, Formatter};

static NULL_VALUE: Value = Value::Null;

/// Represents one entity record: an ordered set of named fields.
///
/// Records are composed of field/value pairs. The field name is always a
/// [String] and the value is a [Value]. Migration bodies and the schema
/// utilities mutate records field by field; the engine never interprets
/// field contents beyond what an operation asks for.
///
/// # Examples
///
/// ```rust,ignore
/// let mut rec = Record::new();
/// rec.put("name", "Alice")?;
/// rec.put("age", 30i64)?;
/// assert_eq!(rec.get("age"), &Value::I64(30));
/// ```
#[derive(Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    /// Creates a new empty record.
    pub fn new() -> Self {
        Record {
            fields: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Associates the specified [Value] with the specified field.
    ///
    /// If the field already exists, its value is updated.
    ///
    /// # Errors
    ///
    /// Returns an error if the field name is empty.
    pub fn put<T: Into<Value>>(&mut self, field: &str, value: T) -> KeyvolveResult<()> {
        if field.is_empty() {
            log::error!("Record does not support an empty field name");
            return Err(KeyvolveError::new(
                "Record does not support an empty field name",
                ErrorKind::InvalidOperation,
            ));
        }
        self.fields.insert(field.to_string(), value.into());
        Ok(())
    }

    /// Returns the [Value] associated with the field, or [Value::Null] if
    /// the record contains no such field.
    pub fn get(&self, field: &str) -> &Value {
        self.fields.get(field).unwrap_or(&NULL_VALUE)
    }

    /// Removes a field, returning its previous value if it existed.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    pub fn contains_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Returns all field names in sorted order.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }
}

impl Display for Record {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, (field, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {:?}", field, value)?;
        }
        write!(f, "}}")
    }
}

impl Debug for Record {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Record {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Convenience constructor for [Record].
///
/// # Examples
///
/// ```rust,ignore
/// use keyvolve::record;
///
/// let rec = record! {
///     "name" => "Alice",
///     "age" => 30i64,
/// };
/// ```
#[macro_export]
macro_rules! record {
    () => {
        $crate::common::Record::new()
    };
    ($($field:expr => $value:expr),* $(,)?) => {
        {
            let mut rec = $crate::common::Record::new();
            $(
                rec.put($field, $crate::common::Value::from($value))
                    .expect("failed to put field in record");
            )*
            rec
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_is_empty() {
        let rec = Record::new();
        assert!(rec.is_empty());
        assert_eq!(rec.len(), 0);
    }

    #[test]
    fn test_put_and_get() {
        let mut rec = Record::new();
        rec.put("name", "Alice").unwrap();
        rec.put("age", 30i64).unwrap();
        assert_eq!(rec.get("name"), &Value::from("Alice"));
        assert_eq!(rec.get("age"), &Value::I64(30));
        assert_eq!(rec.get("missing"), &Value::Null);
    }

    #[test]
    fn test_put_empty_field_fails() {
        let mut rec = Record::new();
        let result = rec.put("", 1i64);
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().kind(), &ErrorKind::InvalidOperation);
    }

    #[test]
    fn test_put_overwrites_existing_field() {
        let mut rec = record! { "status" => "inactive" };
        rec.put("status", "active").unwrap();
        assert_eq!(rec.get("status"), &Value::from("active"));
        assert_eq!(rec.len(), 1);
    }

    #[test]
    fn test_remove() {
        let mut rec = record! { "a" => 1i64, "b" => 2i64 };
        assert_eq!(rec.remove("a"), Some(Value::I64(1)));
        assert_eq!(rec.remove("a"), None);
        assert!(!rec.contains_field("a"));
        assert!(rec.contains_field("b"));
    }

    #[test]
    fn test_field_names_sorted() {
        let rec = record! { "b" => 1i64, "a" => 2i64, "c" => 3i64 };
        assert_eq!(rec.field_names(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_record_macro_empty() {
        let rec = record! {};
        assert!(rec.is_empty());
    }

    #[test]
    fn test_display() {
        let rec = record! { "age" => 30i64, "name" => "Alice" };
        assert_eq!(format!("{}", rec), r#"{age: 30, name: "Alice"}"#);
    }

    #[test]
    fn test_serde_transparent() {
        let rec = record! { "name" => "Alice", "age" => 30i64 };
        let json = serde_json::to_string(&rec).unwrap();
        assert_eq!(json, r#"{"age":30,"name":"Alice"}"#);
        let back: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rec);
    }
}
