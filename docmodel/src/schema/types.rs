use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Top-level schema file: named schemas parsed from YAML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaFile {
    #[serde(default)]
    pub schemas: BTreeMap<String, SchemaDefinition>,
}

/// Definition of a single named schema
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaDefinition {
    /// Name of a schema whose fields this one inherits
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldDefinition>,
}

/// Definition of a single field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    #[serde(rename = "type")]
    pub field_type: TypeName,
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub updatable: Option<bool>,
    #[serde(default)]
    pub nullable: Option<bool>,
    #[serde(default)]
    pub default: Option<Value>,
    /// Labelled enum: label -> allowed value
    #[serde(rename = "enum", default)]
    pub enumeration: Option<BTreeMap<String, Value>>,
    #[serde(default)]
    pub enum_values: Option<Vec<Value>>,
    /// Model kind accepted by a reference field
    #[serde(default)]
    pub model: Option<String>,
    /// Nested fields of a map
    #[serde(default)]
    pub fields: BTreeMap<String, FieldDefinition>,
    /// Element alternatives of an array
    #[serde(default)]
    pub items: Vec<FieldDefinition>,
}

/// Field type name. Anything that is not a builtin names another schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeName {
    String,
    Number,
    #[serde(alias = "boolean")]
    Bool,
    Null,
    #[serde(alias = "ref")]
    Reference,
    #[serde(alias = "object")]
    Map,
    #[serde(alias = "list")]
    Array,
    #[serde(untagged)]
    Custom(std::string::String),
}
