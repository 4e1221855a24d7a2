//! Logical values, driver wire values, and the column types that map
//! between them.
//!
//! A [`ColumnType`] is a closed set of column kinds, each carrying its own
//! encode/decode pair. Encoding happens once at render time (the Nth bound
//! value in tree order becomes the Nth placeholder); decoding happens when
//! driver rows are mapped back into results.

use compact_str::{CompactString, format_compact};
use serde::ser::{Serialize, Serializer};

use crate::error::{Error, Result};

/// A value as seen by the driver: the wire representation.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

/// A logical value as seen by callers, before column-type encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
    /// Unix timestamp in milliseconds.
    Timestamp(i64),
    /// Canonical hyphenated lowercase form.
    Uuid(String),
}

impl Value {
    /// The column type this value naturally binds as when no schema column
    /// is in play (ad-hoc expression operands).
    pub fn inferred_type(&self) -> ColumnType {
        match self {
            Value::Null | Value::Text(_) => ColumnType::Text,
            Value::Bool(_) => ColumnType::Boolean,
            Value::Int(_) => ColumnType::BigInt,
            Value::Float(_) => ColumnType::Real,
            Value::Bytes(_) => ColumnType::Blob,
            Value::Json(_) => ColumnType::Json,
            Value::Timestamp(_) => ColumnType::Timestamp,
            Value::Uuid(_) => ColumnType::Uuid,
        }
    }

    /// A stable token used to key hash maps by value during row stitching.
    pub(crate) fn key_token(&self) -> CompactString {
        match self {
            Value::Null => CompactString::const_new("n:"),
            Value::Bool(b) => format_compact!("b:{b}"),
            Value::Int(i) => format_compact!("i:{i}"),
            Value::Float(f) => format_compact!("f:{f}"),
            Value::Text(s) => format_compact!("t:{s}"),
            Value::Bytes(b) => format_compact!("x:{b:?}"),
            Value::Json(j) => format_compact!("j:{j}"),
            Value::Timestamp(t) => format_compact!("ts:{t}"),
            Value::Uuid(u) => format_compact!("u:{u}"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Bytes(b) => serializer.serialize_bytes(b),
            Value::Json(j) => j.serialize(serializer),
            Value::Timestamp(t) => serializer.serialize_i64(*t),
            Value::Uuid(u) => serializer.serialize_str(u),
        }
    }
}

/// Column kinds with their encode/decode rules.
///
/// A closed enumeration rather than an open trait: every kind the engine can
/// render or map back is listed here, and rendering a value whose kind has no
/// rule is unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Integer,
    BigInt,
    Real,
    Boolean,
    Text,
    Blob,
    Json,
    Timestamp,
    Uuid,
}

impl ColumnType {
    /// Encodes a logical value into its driver wire representation.
    ///
    /// `column` names the offending column in error messages.
    pub fn encode(&self, value: &Value, column: &str) -> Result<DriverValue> {
        match (self, value) {
            (_, Value::Null) => Ok(DriverValue::Null),
            (ColumnType::Integer | ColumnType::BigInt, Value::Int(i)) => {
                Ok(DriverValue::Integer(*i))
            }
            (ColumnType::Real, Value::Float(f)) => Ok(DriverValue::Real(*f)),
            (ColumnType::Boolean, Value::Bool(b)) => Ok(DriverValue::Integer(*b as i64)),
            (ColumnType::Text, Value::Text(s)) => Ok(DriverValue::Text(s.clone())),
            (ColumnType::Blob, Value::Bytes(b)) => Ok(DriverValue::Blob(b.clone())),
            (ColumnType::Json, Value::Json(j)) => match serde_json::to_string(j) {
                Ok(text) => Ok(DriverValue::Text(text)),
                Err(e) => Err(Error::encoding(column, e.to_string())),
            },
            (ColumnType::Timestamp, Value::Timestamp(t)) => Ok(DriverValue::Integer(*t)),
            (ColumnType::Uuid, Value::Uuid(u)) => {
                if is_canonical_uuid(u) {
                    Ok(DriverValue::Text(u.clone()))
                } else {
                    Err(Error::encoding(column, format!("malformed uuid {u:?}")))
                }
            }
            (ty, value) => Err(Error::encoding(
                column,
                format!("cannot encode {value:?} as {ty:?}"),
            )),
        }
    }

    /// Decodes a driver wire value back into a logical value.
    pub fn decode(&self, value: DriverValue, column: &str) -> Result<Value> {
        match (self, value) {
            (_, DriverValue::Null) => Ok(Value::Null),
            (ColumnType::Integer | ColumnType::BigInt, DriverValue::Integer(i)) => {
                Ok(Value::Int(i))
            }
            (ColumnType::Real, DriverValue::Real(f)) => Ok(Value::Float(f)),
            (ColumnType::Real, DriverValue::Integer(i)) => Ok(Value::Float(i as f64)),
            (ColumnType::Boolean, DriverValue::Integer(i)) => Ok(Value::Bool(i != 0)),
            (ColumnType::Text, DriverValue::Text(s)) => Ok(Value::Text(s)),
            (ColumnType::Blob, DriverValue::Blob(b)) => Ok(Value::Bytes(b)),
            (ColumnType::Json, DriverValue::Text(s)) => match serde_json::from_str(&s) {
                Ok(j) => Ok(Value::Json(j)),
                Err(e) => Err(Error::mapping(format!(
                    "column \"{column}\": invalid json: {e}"
                ))),
            },
            (ColumnType::Timestamp, DriverValue::Integer(t)) => Ok(Value::Timestamp(t)),
            (ColumnType::Uuid, DriverValue::Text(u)) => Ok(Value::Uuid(u)),
            (ty, value) => Err(Error::mapping(format!(
                "column \"{column}\": cannot decode {value:?} as {ty:?}"
            ))),
        }
    }

    /// Decodes a JSON scalar produced by a dialect's JSON-aggregation
    /// functions (the lateral relational strategy) into a logical value.
    pub fn decode_json(&self, value: &serde_json::Value, column: &str) -> Result<Value> {
        use serde_json::Value as Json;
        match (self, value) {
            (_, Json::Null) => Ok(Value::Null),
            (ColumnType::Integer | ColumnType::BigInt, Json::Number(n)) => n
                .as_i64()
                .map(Value::Int)
                .ok_or_else(|| Error::mapping(format!("column \"{column}\": non-integral {n}"))),
            (ColumnType::Real, Json::Number(n)) => n
                .as_f64()
                .map(Value::Float)
                .ok_or_else(|| Error::mapping(format!("column \"{column}\": bad number {n}"))),
            // SQLite's json_object renders booleans stored as integers 0/1;
            // PostgreSQL's json_build_object yields real booleans.
            (ColumnType::Boolean, Json::Bool(b)) => Ok(Value::Bool(*b)),
            (ColumnType::Boolean, Json::Number(n)) => Ok(Value::Bool(n.as_i64() == Some(1))),
            (ColumnType::Text, Json::String(s)) => Ok(Value::Text(s.clone())),
            (ColumnType::Json, v) => Ok(Value::Json(v.clone())),
            (ColumnType::Timestamp, Json::Number(n)) => n
                .as_i64()
                .map(Value::Timestamp)
                .ok_or_else(|| Error::mapping(format!("column \"{column}\": bad timestamp {n}"))),
            (ColumnType::Uuid, Json::String(s)) => Ok(Value::Uuid(s.clone())),
            (ColumnType::Blob, Json::String(s)) => Ok(Value::Bytes(s.as_bytes().to_vec())),
            (ty, v) => Err(Error::mapping(format!(
                "column \"{column}\": cannot decode json {v} as {ty:?}"
            ))),
        }
    }
}

fn is_canonical_uuid(text: &str) -> bool {
    let bytes = text.as_bytes();
    if bytes.len() != 36 {
        return false;
    }
    bytes.iter().enumerate().all(|(i, b)| match i {
        8 | 13 | 18 | 23 => *b == b'-',
        _ => b.is_ascii_hexdigit() && !b.is_ascii_uppercase(),
    })
}

impl std::fmt::Display for DriverValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriverValue::Null => write!(f, "NULL"),
            DriverValue::Integer(i) => write!(f, "{i}"),
            DriverValue::Real(r) => write!(f, "{r}"),
            DriverValue::Text(s) => write!(f, "{s}"),
            DriverValue::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}
