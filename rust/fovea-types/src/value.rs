//! Runtime representation of a single column value.
//!
//! Rows cross the storage boundary as maps of [`Value`]; the storage
//! adapter maps them to native columnar representations, and the JSON
//! bridge below carries them through the sideband metadata documents.

use std::collections::BTreeMap;

use fovea_common::{Result, error::Error};

/// A dynamically typed column value.
///
/// `Bytes` is distinct from `List` so that binary payloads (compressed
/// mask counts, depth buffers, embedding vectors) map to binary columns
/// rather than integer lists.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Struct(BTreeMap<String, Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the numeric content as `f64`, accepting both `Float` and
    /// `Int` values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        self.as_f64().map(|v| v as f32)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Struct(v) => Some(v),
            _ => None,
        }
    }

    /// Reads a fixed-length float vector out of a `List` value.
    pub fn as_f32_array<const N: usize>(&self) -> Option<[f32; N]> {
        let list = self.as_list()?;
        if list.len() != N {
            return None;
        }
        let mut out = [0f32; N];
        for (slot, item) in out.iter_mut().zip(list) {
            *slot = item.as_f32()?;
        }
        Some(out)
    }

    /// Converts a JSON document into a `Value`.
    ///
    /// JSON arrays always become `List`; binary payloads only arise from
    /// typed constructors, never from JSON input.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(v) => Value::Bool(*v),
            serde_json::Value::Number(n) => {
                if let Some(v) = n.as_i64() {
                    Value::Int(v)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(v) => Value::Str(v.clone()),
            serde_json::Value::Array(items) => {
                Value::List(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Struct(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Converts the value into a JSON document. `Bytes` is emitted as an
    /// array of integers, which keeps the bridge lossless for documents
    /// that are read back through typed accessors.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(v) => serde_json::Value::Bool(*v),
            Value::Int(v) => serde_json::Value::from(*v),
            Value::Float(v) => serde_json::Value::from(*v),
            Value::Str(v) => serde_json::Value::String(v.clone()),
            Value::Bytes(v) => {
                serde_json::Value::Array(v.iter().map(|b| serde_json::Value::from(*b)).collect())
            }
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Struct(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Value {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Value {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Value {
        Value::Int(v as i64)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Value {
        Value::Float(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Value {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Value {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Value {
        Value::Str(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Value {
        Value::Bytes(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Value {
        Value::List(v)
    }
}

impl<const N: usize> From<[f32; N]> for Value {
    fn from(v: [f32; N]) -> Value {
        Value::List(v.iter().map(|f| Value::from(*f)).collect())
    }
}

/// Fetches a required struct member, reporting the composite type name on
/// failure. Shared by the `from_value` constructors of the value types.
pub(crate) fn struct_member<'a>(
    fields: &'a BTreeMap<String, Value>,
    type_name: &str,
    member: &str,
) -> Result<&'a Value> {
    fields
        .get(member)
        .ok_or_else(|| Error::invalid_format(type_name, format!("missing member '{member}'")))
}

/// Interprets a value as a struct, reporting the composite type name on
/// failure.
pub(crate) fn expect_struct<'a>(
    value: &'a Value,
    type_name: &str,
) -> Result<&'a BTreeMap<String, Value>> {
    value
        .as_struct()
        .ok_or_else(|| Error::invalid_format(type_name, "expected a struct value"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip() {
        let json: serde_json::Value = serde_json::from_str(
            r#"{"a": 1, "b": [1.5, true, "x"], "c": {"nested": null}}"#,
        )
        .unwrap();
        let value = Value::from_json(&json);
        assert_eq!(value.to_json(), json);
    }

    #[test]
    fn fixed_array_access() {
        let value = Value::from([1.0f32, 2.0, 3.0, 4.0]);
        assert_eq!(value.as_f32_array::<4>(), Some([1.0, 2.0, 3.0, 4.0]));
        assert_eq!(value.as_f32_array::<3>(), None);
    }

    #[test]
    fn numeric_coercion() {
        assert_eq!(Value::Int(7).as_f64(), Some(7.0));
        assert_eq!(Value::Float(7.5).as_i64(), None);
    }
}
