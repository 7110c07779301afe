//! Dynamically typed values carried in the per-request argument bag.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::ser::{Serialize, SerializeSeq, Serializer};

/// One decoded argument value.
///
/// `File` holds the path of a temp file that was materialized from the
/// request; the file itself is owned by the request context and removed
/// when the request finishes.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Bytes(Vec<u8>),
    File(PathBuf),
    Array(Vec<Value>),
    Null,
}

/// The argument bag: template variable name to decoded value.
pub type Arguments = HashMap<String, Value>;

/// Reserved argument name that carries the decoded request body.
pub const TEMPLATE_PARAM_BODY: &str = "body";

impl Value {
    /// Map a decoded JSON value into the bag representation.
    ///
    /// Integral JSON numbers become `Int`, everything else numeric
    /// becomes `Float`. JSON objects have no bag representation and are
    /// carried as their raw JSON text.
    pub fn from_json(value: serde_json::Value) -> Value {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from_json).collect())
            }
            object @ serde_json::Value::Object(_) => Value::Str(object.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Bytes(bytes) => f.write_str(&String::from_utf8_lossy(bytes)),
            Value::File(path) => write!(f, "{}", path.display()),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Null => f.write_str("null"),
        }
    }
}

// Template rendering sees files as their path and bytes as lossy text,
// so every bag value substitutes into a command line as a plain string
// or a sequence of them.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Str(s) => serializer.serialize_str(s),
            Value::Int(v) => serializer.serialize_i64(*v),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::Bytes(bytes) => serializer.serialize_str(&String::from_utf8_lossy(bytes)),
            Value::File(path) => serializer.serialize_str(&path.to_string_lossy()),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Null => serializer.serialize_unit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_maps_scalars() {
        assert_eq!(Value::from_json(json!(42)), Value::Int(42));
        assert_eq!(Value::from_json(json!(42.4)), Value::Float(42.4));
        assert_eq!(Value::from_json(json!("hi")), Value::Str("hi".into()));
        assert_eq!(Value::from_json(json!(true)), Value::Bool(true));
        assert_eq!(Value::from_json(json!(null)), Value::Null);
    }

    #[test]
    fn test_from_json_maps_arrays() {
        assert_eq!(
            Value::from_json(json!([23, 45])),
            Value::Array(vec![Value::Int(23), Value::Int(45)])
        );
    }

    #[test]
    fn test_display_for_diagnostics() {
        assert_eq!(Value::Int(201).to_string(), "201");
        assert_eq!(
            Value::Array(vec![Value::Int(1), Value::Str("a".into())]).to_string(),
            "[1, a]"
        );
    }
}
