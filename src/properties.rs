//! Named scalar attributes attached to rows.
//!
//! A [`PropertyMap`] is the attribute bag of a header, event or
//! included-entity row. Names colliding with the row-level attributes
//! the backend owns ([`RESERVED_PROPERTY_NAMES`]) are silently dropped
//! on every construction path, so user metadata can never shadow the
//! partition key, row key, e-tag, timestamp or stream version.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Number;
use uuid::Uuid;

use crate::error::{Result, StreamError};

/// Property names owned by the backend or the library, never stored
/// from user input. The lowercase `etag` entry covers the wire-level
/// attribute some clients surface alongside `ETag`.
pub const RESERVED_PROPERTY_NAMES: &[&str] = &[
    "PartitionKey",
    "RowKey",
    "ETag",
    "etag",
    "Timestamp",
    "Version",
];

/// A scalar attribute value of the backend's supported types.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    I32(i32),
    I64(i64),
    F64(f64),
    String(String),
    Binary(Vec<u8>),
    Uuid(Uuid),
    DateTime(DateTime<Utc>),
}

impl Value {
    pub(crate) fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Bool(v) => serde_json::Value::Bool(*v),
            Value::I32(v) => serde_json::Value::Number((*v).into()),
            Value::I64(v) => serde_json::Value::Number((*v).into()),
            Value::F64(v) => Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(v) => serde_json::Value::String(v.clone()),
            Value::Binary(v) => {
                serde_json::Value::Array(v.iter().map(|b| (*b).into()).collect())
            }
            Value::Uuid(v) => serde_json::Value::String(v.to_string()),
            Value::DateTime(v) => serde_json::Value::String(v.to_rfc3339()),
        }
    }

    pub(crate) fn from_json(value: &serde_json::Value) -> Option<Value> {
        match value {
            serde_json::Value::Bool(v) => Some(Value::Bool(*v)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Value::I64(i))
                } else {
                    n.as_f64().map(Value::F64)
                }
            }
            serde_json::Value::String(v) => Some(Value::String(v.clone())),
            // null, arrays and nested objects are not scalar attributes
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::I64(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

/// An ordered bag of named scalar values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PropertyMap(BTreeMap<String, Value>);

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a map from the public scalar-typed fields of `value`.
    ///
    /// Non-scalar fields (nested structs, sequences, nulls) are not
    /// reflected; reserved names are dropped.
    pub fn from_object<T: Serialize>(value: &T) -> Result<Self> {
        let json = serde_json::to_value(value)
            .map_err(|e| StreamError::InvalidOperation(format!("properties: {e}")))?;

        let serde_json::Value::Object(fields) = json else {
            return Err(StreamError::InvalidOperation(
                "properties must serialize to an object".to_owned(),
            ));
        };

        Ok(fields
            .iter()
            .filter_map(|(name, value)| Value::from_json(value).map(|v| (name.clone(), v)))
            .collect())
    }

    /// Copies the map into a user type via its deserialize impl.
    pub fn to_object<T: DeserializeOwned>(&self) -> Result<T> {
        let fields = self
            .0
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();

        serde_json::from_value(serde_json::Value::Object(fields))
            .map_err(|e| StreamError::InvalidOperation(format!("properties: {e}")))
    }

    /// Inserts a value, silently dropping reserved names.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();

        if RESERVED_PROPERTY_NAMES.contains(&name.as_str()) {
            return;
        }

        self.0.insert(name, value);
    }

    // library-internal attributes bypass the reserved filter
    pub(crate) fn insert_raw(&mut self, name: impl Into<String>, value: Value) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    // the row-level stream position, as stored by the library
    pub(crate) fn version_attribute(&self) -> Option<i64> {
        match self.0.get("Version") {
            Some(Value::I64(v)) => Some(*v),
            Some(Value::I32(v)) => Some(i64::from(*v)),
            _ => None,
        }
    }

    /// The map with reserved attributes stripped, as stored rows carry
    /// `Version` and friends at the row level.
    pub(crate) fn user_view(&self) -> PropertyMap {
        self.0
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

impl FromIterator<(String, Value)> for PropertyMap {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut map = PropertyMap::new();

        for (name, value) in iter {
            map.insert(name, value);
        }

        map
    }
}

impl From<Vec<(&str, Value)>> for PropertyMap {
    fn from(entries: Vec<(&str, Value)>) -> Self {
        entries
            .into_iter()
            .map(|(name, value)| (name.to_owned(), value))
            .collect()
    }
}
