//! Untyped document values.
//!
//! Documents handed in and out of a store are plain key/value mappings. Absence
//! of a key ("undefined") is modelled with `Option<&Value>::None`, so `Value`
//! itself only covers what a store can actually hold, plus the two reference
//! shapes: a stored document handle and an in-memory model object.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Key used to encode a document reference in JSON/YAML.
pub const REF_KEY: &str = "$ref";

/// The fields of a document or nested map.
pub type Fields = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Map(Fields),
    /// Handle of a stored document.
    Reference(DocumentRef),
    /// An in-memory model object, lowered to its handle before writing.
    Model(ModelRef),
}

/// Slash-separated path of a document, e.g. `users/alice` or `orgs/acme/teams/core`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentRef {
    path: String,
}

impl DocumentRef {
    pub fn new(path: impl Into<String>) -> Self {
        let path: String = path.into();
        DocumentRef {
            path: path.trim_matches('/').to_string(),
        }
    }

    /// Build a reference from a collection path and a document id.
    pub fn from_parts(collection: &str, id: &str) -> Self {
        Self::new(format!("{}/{}", collection.trim_matches('/'), id))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last path segment.
    pub fn id(&self) -> &str {
        match self.path.rsplit_once('/') {
            Some((_, id)) => id,
            None => &self.path,
        }
    }

    /// Path of the collection containing this document.
    pub fn parent(&self) -> &str {
        match self.path.rsplit_once('/') {
            Some((parent, _)) => parent,
            None => "",
        }
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// A model object embedded in a payload: the model kind and the document it wraps.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRef {
    pub kind: String,
    pub reference: DocumentRef,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Fields> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Convert to JSON. Both reference shapes become `{"$ref": path}`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(fields) => serde_json::Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Reference(r) => reference_to_json(r),
            Value::Model(m) => reference_to_json(&m.reference),
        }
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        return serde_json::Value::from(n as i64);
    }
    serde_json::Number::from_f64(n)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

fn reference_to_json(reference: &DocumentRef) -> serde_json::Value {
    let mut obj = serde_json::Map::new();
    obj.insert(
        REF_KEY.to_string(),
        serde_json::Value::String(reference.path().to_string()),
    );
    serde_json::Value::Object(obj)
}

/// Human-readable name of a value's shape, for diagnostics.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Map(_) => "map",
        Value::Reference(_) => "reference",
        Value::Model(_) => "model",
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or_default()),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(obj) => {
                if obj.len() == 1 {
                    if let Some(serde_json::Value::String(path)) = obj.get(REF_KEY) {
                        return Value::Reference(DocumentRef::new(path.as_str()));
                    }
                }
                Value::Map(obj.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        value.to_json()
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
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
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Fields> for Value {
    fn from(fields: Fields) -> Self {
        Value::Map(fields)
    }
}

impl From<DocumentRef> for Value {
    fn from(reference: DocumentRef) -> Self {
        Value::Reference(reference)
    }
}

impl From<ModelRef> for Value {
    fn from(model: ModelRef) -> Self {
        Value::Model(model)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

/// Convert a JSON object into document fields. Non-objects yield `None`.
pub fn fields_from_json(json: serde_json::Value) -> Option<Fields> {
    match Value::from(json) {
        Value::Map(fields) => Some(fields),
        _ => None,
    }
}
