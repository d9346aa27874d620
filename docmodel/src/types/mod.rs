//! Composable field type descriptors.
//!
//! A [`FieldType`] pairs a concrete [`TypeKind`] with its [`FieldOptions`].
//! Scalars are leaves; Map and Array types carry their children in
//! `options.data`. Field types are values: every operation that "changes" one
//! (`override_options`, `extend`, `override_fields`, `override_alternatives`)
//! returns a new, independently owned instance.

pub mod options;

pub use options::{FieldData, FieldOptions, OptionsPatch};

use crate::error::{DocModelError, Result};
use crate::value::{Fields, Value};
use std::collections::BTreeMap;

/// The closed set of concrete field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    String,
    Number,
    Bool,
    Null,
    Reference,
    Map,
    Array,
}

impl TypeKind {
    pub fn name(self) -> &'static str {
        match self {
            TypeKind::String => "String",
            TypeKind::Number => "Number",
            TypeKind::Bool => "Bool",
            TypeKind::Null => "Null",
            TypeKind::Reference => "Reference",
            TypeKind::Map => "Map",
            TypeKind::Array => "Array",
        }
    }

    fn empty_data(self) -> Option<FieldData> {
        match self {
            TypeKind::Map => Some(FieldData::Map(BTreeMap::new())),
            TypeKind::Array => Some(FieldData::Array(Vec::new())),
            _ => None,
        }
    }
}

/// A validator for one value shape plus its options.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldType {
    kind: TypeKind,
    options: FieldOptions,
}

impl FieldType {
    /// Construct a field type, normalising `data` and checking the default.
    pub fn new(kind: TypeKind, mut options: FieldOptions) -> Result<Self> {
        if options.data.is_none() {
            options.data = kind.empty_data();
        }
        if let Some(data) = &options.data {
            let shape_matches = matches!(
                (data, kind),
                (FieldData::Map(_), TypeKind::Map) | (FieldData::Array(_), TypeKind::Array)
            );
            if !shape_matches {
                return Err(DocModelError::DataMismatch {
                    type_name: kind.name(),
                    data: data.shape(),
                });
            }
        }

        if kind == TypeKind::Map {
            if let Some(default) = options.default.take() {
                log::warn!(
                    "Map fields do not take a default value; ignoring {}",
                    default.to_json()
                );
            }
        }

        let field_type = FieldType { kind, options };
        if !field_type.default_is_compatible() {
            return Err(DocModelError::IncompatibleDefault {
                type_name: kind.name(),
                value: field_type
                    .options
                    .default
                    .as_ref()
                    .map(|v| v.to_json().to_string())
                    .unwrap_or_default(),
            });
        }
        Ok(field_type)
    }

    /// A field type with default options. Never fails.
    pub fn of(kind: TypeKind) -> Self {
        FieldType {
            kind,
            options: FieldOptions {
                data: kind.empty_data(),
                ..FieldOptions::default()
            },
        }
    }

    pub fn string(options: FieldOptions) -> Result<Self> {
        Self::new(TypeKind::String, options)
    }

    pub fn number(options: FieldOptions) -> Result<Self> {
        Self::new(TypeKind::Number, options)
    }

    pub fn bool(options: FieldOptions) -> Result<Self> {
        Self::new(TypeKind::Bool, options)
    }

    pub fn null(options: FieldOptions) -> Result<Self> {
        Self::new(TypeKind::Null, options)
    }

    pub fn reference(options: FieldOptions) -> Result<Self> {
        Self::new(TypeKind::Reference, options)
    }

    pub fn map<K: Into<String>>(
        fields: impl IntoIterator<Item = (K, FieldType)>,
        mut options: FieldOptions,
    ) -> Result<Self> {
        options.data = Some(FieldData::Map(
            fields.into_iter().map(|(k, t)| (k.into(), t)).collect(),
        ));
        Self::new(TypeKind::Map, options)
    }

    pub fn array(
        alternatives: impl IntoIterator<Item = FieldType>,
        mut options: FieldOptions,
    ) -> Result<Self> {
        options.data = Some(FieldData::Array(alternatives.into_iter().collect()));
        Self::new(TypeKind::Array, options)
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.name()
    }

    /// A copy of this type's options.
    pub fn options(&self) -> FieldOptions {
        self.options.clone()
    }

    pub fn is_required(&self) -> bool {
        self.options.required
    }

    pub fn is_updatable(&self) -> bool {
        self.options.updatable
    }

    pub fn is_nullable(&self) -> bool {
        self.options.nullable
    }

    /// Declared fields of a Map Type.
    pub fn fields(&self) -> Option<&BTreeMap<String, FieldType>> {
        match &self.options.data {
            Some(FieldData::Map(fields)) => Some(fields),
            _ => None,
        }
    }

    /// Allowed element types of an Array Type.
    pub fn alternatives(&self) -> Option<&[FieldType]> {
        match &self.options.data {
            Some(FieldData::Array(alternatives)) => Some(alternatives),
            _ => None,
        }
    }

    /// The default value. Map Types always default to an empty mapping.
    pub fn default_value(&self) -> Option<Value> {
        match self.kind {
            TypeKind::Map => Some(Value::Map(Fields::new())),
            _ => self.options.default.clone(),
        }
    }

    /// The concrete type predicate.
    pub fn is_type(&self, value: &Value) -> bool {
        match (self.kind, value) {
            (TypeKind::String, Value::String(_))
            | (TypeKind::Number, Value::Number(_))
            | (TypeKind::Bool, Value::Bool(_))
            | (TypeKind::Null, Value::Null)
            | (TypeKind::Reference, Value::Reference(_))
            | (TypeKind::Map, Value::Map(_))
            | (TypeKind::Array, Value::Array(_)) => true,
            (TypeKind::Reference, Value::Model(model)) => self
                .options
                .model
                .as_ref()
                .map_or(true, |kind| *kind == model.kind),
            _ => false,
        }
    }

    // Array Types accept any default.
    fn default_is_compatible(&self) -> bool {
        match (&self.options.default, self.kind) {
            (None, _) | (_, TypeKind::Array) => true,
            (Some(value), _) => self.is_type(value),
        }
    }

    /// Validate a value; `None` stands for an absent field.
    ///
    /// Runs the updatable, enum and value checks in that order. With
    /// `update == true`, maps are checked as partial payloads.
    pub fn validate<'v>(&self, value: impl Into<Option<&'v Value>>, update: bool) -> bool {
        let value = value.into();
        self.check_updatable(update) && self.check_enum(value) && self.check_value(value, update)
    }

    pub(crate) fn check_updatable(&self, update: bool) -> bool {
        !update || self.options.updatable
    }

    // Absent values are governed by `required`; null is still checked against the enum.
    pub(crate) fn check_enum(&self, value: Option<&Value>) -> bool {
        match value {
            Some(value) => self.options.allows(value),
            None => true,
        }
    }

    fn check_value(&self, value: Option<&Value>, update: bool) -> bool {
        match value {
            Some(Value::Map(fields)) if self.kind == TypeKind::Map => {
                self.validate_fields(fields, update)
            }
            Some(Value::Array(items)) if self.kind == TypeKind::Array => {
                self.validate_items(items)
            }
            Some(value) if self.is_type(value) => true,
            _ => self.accepts_missing(value),
        }
    }

    /// Absent when not required, or null when nullable. Maps and arrays
    /// only take the absent rule.
    pub(crate) fn accepts_missing(&self, value: Option<&Value>) -> bool {
        match value {
            None => !self.options.required,
            Some(Value::Null) => self.options.nullable && !self.is_composite(),
            Some(_) => false,
        }
    }

    fn is_composite(&self) -> bool {
        matches!(self.kind, TypeKind::Map | TypeKind::Array)
    }

    /// Map body validation.
    ///
    /// Updates check only the keys present in the payload. Full writes check
    /// every declared field and reject undeclared keys.
    pub(crate) fn validate_fields(&self, fields: &Fields, update: bool) -> bool {
        let Some(declared) = self.fields() else {
            return false;
        };

        if update {
            return fields.iter().all(|(key, value)| {
                declared
                    .get(key)
                    .map_or(false, |field_type| field_type.validate(value, true))
            });
        }

        declared
            .iter()
            .all(|(key, field_type)| field_type.validate(fields.get(key), false))
            && fields.keys().all(|key| declared.contains_key(key))
    }

    // Elements are always validated as full values.
    fn validate_items(&self, items: &[Value]) -> bool {
        let alternatives = self.alternatives().unwrap_or(&[]);
        items
            .iter()
            .all(|item| alternatives.iter().any(|alt| alt.validate(item, false)))
    }

    /// A new field type with `patch` merged into these options.
    pub fn override_options(&self, patch: OptionsPatch) -> Result<Self> {
        let merged = self.options.merge(patch, self.type_name())?;
        Self::new(self.kind, merged)
    }

    /// Map Types: a new map with `new_fields` added. Existing names may not be redeclared.
    pub fn extend<K: Into<String>>(
        &self,
        new_fields: impl IntoIterator<Item = (K, FieldType)>,
    ) -> Result<Self> {
        let mut fields = self.map_fields("extend")?.clone();
        for (key, field_type) in new_fields {
            let key = key.into();
            if fields.contains_key(&key) {
                return Err(DocModelError::DuplicateField(key));
            }
            fields.insert(key, field_type);
        }

        let mut options = self.options.clone();
        options.data = Some(FieldData::Map(fields));
        Self::new(TypeKind::Map, options)
    }

    /// Map Types: narrow existing fields, then apply `patch` to the map itself.
    ///
    /// Each replacement must name an existing field of the same concrete type;
    /// its options are merged into the current field's options.
    pub fn override_fields<K: Into<String>>(
        &self,
        replacements: impl IntoIterator<Item = (K, FieldType)>,
        patch: OptionsPatch,
    ) -> Result<Self> {
        let mut fields = self.map_fields("override_fields")?.clone();
        for (key, replacement) in replacements {
            let key = key.into();
            let current = fields
                .get(&key)
                .ok_or_else(|| DocModelError::UnknownField(key.clone()))?;
            if current.kind != replacement.kind {
                return Err(DocModelError::TypeMismatchOverride {
                    field: key,
                    current: current.type_name(),
                    replacement: replacement.type_name(),
                });
            }
            let overridden = current.override_options(OptionsPatch::from(&replacement.options))?;
            fields.insert(key, overridden);
        }

        self.override_options(OptionsPatch {
            data: Some(FieldData::Map(fields)),
            ..patch
        })
    }

    /// Array Types: replace the whole alternative list, then apply `patch`.
    pub fn override_alternatives(
        &self,
        alternatives: impl IntoIterator<Item = FieldType>,
        patch: OptionsPatch,
    ) -> Result<Self> {
        if self.kind != TypeKind::Array {
            return Err(DocModelError::NotComposite {
                operation: "override_alternatives",
                type_name: self.type_name(),
            });
        }
        self.override_options(OptionsPatch {
            data: Some(FieldData::Array(alternatives.into_iter().collect())),
            ..patch
        })
    }

    fn map_fields(&self, operation: &'static str) -> Result<&BTreeMap<String, FieldType>> {
        self.fields().ok_or(DocModelError::NotComposite {
            operation,
            type_name: self.type_name(),
        })
    }

    /// Lower a value to a shape the store can write.
    ///
    /// Model objects in Reference fields become their document handle. Map
    /// fields recurse by declared type; array elements use the first
    /// alternative that accepts them. Everything else is returned as is.
    pub fn safe_write_value(&self, value: &Value) -> Value {
        match (self.kind, value) {
            (TypeKind::Reference, Value::Model(model)) => {
                Value::Reference(model.reference.clone())
            }
            (TypeKind::Map, Value::Map(fields)) => Value::Map(
                fields
                    .iter()
                    .map(|(key, value)| {
                        let lowered = match self.fields().and_then(|f| f.get(key)) {
                            Some(field_type) => field_type.safe_write_value(value),
                            None => value.clone(),
                        };
                        (key.clone(), lowered)
                    })
                    .collect(),
            ),
            (TypeKind::Array, Value::Array(items)) => {
                let alternatives = self.alternatives().unwrap_or(&[]);
                Value::Array(
                    items
                        .iter()
                        .map(|item| {
                            match alternatives.iter().find(|alt| alt.validate(item, false)) {
                                Some(alt) => alt.safe_write_value(item),
                                None => item.clone(),
                            }
                        })
                        .collect(),
                )
            }
            _ => value.clone(),
        }
    }
}
