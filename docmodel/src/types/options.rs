use super::FieldType;
use crate::error::{DocModelError, Result};
use crate::value::Value;
use std::collections::BTreeMap;

/// Nested structure carried by composite types.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldData {
    /// Map Types: field name -> field type.
    Map(BTreeMap<String, FieldType>),
    /// Array Types: allowed element alternatives.
    Array(Vec<FieldType>),
}

impl FieldData {
    pub(crate) fn shape(&self) -> &'static str {
        match self {
            FieldData::Map(_) => "map",
            FieldData::Array(_) => "array",
        }
    }
}

/// Configuration attached to every field type.
///
/// `Default` yields the normalised options: required, updatable, not nullable,
/// with no default value, no enum constraint and no nested data.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldOptions {
    pub required: bool,
    pub updatable: bool,
    pub nullable: bool,
    pub default: Option<Value>,
    /// Labelled enum; only the values take part in validation.
    pub enumeration: Option<BTreeMap<String, Value>>,
    pub enum_values: Option<Vec<Value>>,
    /// Reference Types: restrict in-memory model values to this model kind.
    pub model: Option<String>,
    pub data: Option<FieldData>,
}

impl Default for FieldOptions {
    fn default() -> Self {
        Self {
            required: true,
            updatable: true,
            nullable: false,
            default: None,
            enumeration: None,
            enum_values: None,
            model: None,
            data: None,
        }
    }
}

impl FieldOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Forbid the field from appearing in update payloads.
    pub fn immutable(mut self) -> Self {
        self.updatable = false;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_enum<K, V>(mut self, entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.enumeration = Some(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    pub fn with_enum_values<V: Into<Value>>(mut self, values: impl IntoIterator<Item = V>) -> Self {
        self.enum_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn for_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Whether `value` is a member of every configured enum constraint.
    pub fn allows(&self, value: &Value) -> bool {
        let in_enum = self
            .enumeration
            .as_ref()
            .map_or(true, |labels| labels.values().any(|v| v == value));
        let in_values = self
            .enum_values
            .as_ref()
            .map_or(true, |values| values.contains(value));
        in_enum && in_values
    }

    /// Merge `patch` into a copy of these options.
    ///
    /// Only `enum_values` and `data` may change; any other key present in the
    /// patch must equal the current value.
    pub(crate) fn merge(&self, patch: OptionsPatch, type_name: &'static str) -> Result<Self> {
        Ok(Self {
            required: fixed("required", type_name, self.required, patch.required)?,
            updatable: fixed("updatable", type_name, self.updatable, patch.updatable)?,
            nullable: fixed("nullable", type_name, self.nullable, patch.nullable)?,
            default: fixed(
                "default",
                type_name,
                self.default.clone(),
                patch.default.map(Some),
            )?,
            enumeration: fixed(
                "enum",
                type_name,
                self.enumeration.clone(),
                patch.enumeration.map(Some),
            )?,
            model: fixed("model", type_name, self.model.clone(), patch.model.map(Some))?,
            enum_values: patch.enum_values.or_else(|| self.enum_values.clone()),
            data: patch.data.or_else(|| self.data.clone()),
        })
    }
}

fn fixed<T: PartialEq>(
    option: &'static str,
    type_name: &'static str,
    current: T,
    patch: Option<T>,
) -> Result<T> {
    match patch {
        Some(value) if value != current => {
            Err(DocModelError::NonOverridableOption { option, type_name })
        }
        _ => Ok(current),
    }
}

/// A partial set of options to merge into a field type.
///
/// A `Some` field means the key is present in the patch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionsPatch {
    pub required: Option<bool>,
    pub updatable: Option<bool>,
    pub nullable: Option<bool>,
    pub default: Option<Value>,
    pub enumeration: Option<BTreeMap<String, Value>>,
    pub enum_values: Option<Vec<Value>>,
    pub model: Option<String>,
    pub data: Option<FieldData>,
}

impl OptionsPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }

    pub fn updatable(mut self, updatable: bool) -> Self {
        self.updatable = Some(updatable);
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = Some(nullable);
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn enum_values<V: Into<Value>>(mut self, values: impl IntoIterator<Item = V>) -> Self {
        self.enum_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn data(mut self, data: FieldData) -> Self {
        self.data = Some(data);
        self
    }
}

impl From<&FieldOptions> for OptionsPatch {
    fn from(options: &FieldOptions) -> Self {
        Self {
            required: Some(options.required),
            updatable: Some(options.updatable),
            nullable: Some(options.nullable),
            default: options.default.clone(),
            enumeration: options.enumeration.clone(),
            enum_values: options.enum_values.clone(),
            model: options.model.clone(),
            data: options.data.clone(),
        }
    }
}
