//! Named, reusable document schemas.

pub mod parser;
pub mod types;

pub use parser::{parse_schema, parse_schema_str, SchemaRegistry};
pub use types::{FieldDefinition, SchemaDefinition, SchemaFile, TypeName};

use crate::error::{DocModelError, Result};
use crate::types::{FieldOptions, FieldType, OptionsPatch};
use crate::validation::{self, ValidationReport};
use crate::value::{Fields, Value};
use std::collections::BTreeMap;

/// A named root Map Type used to validate whole documents.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    name: String,
    root: FieldType,
}

impl Schema {
    pub fn new<K: Into<String>>(
        name: impl Into<String>,
        fields: impl IntoIterator<Item = (K, FieldType)>,
    ) -> Result<Self> {
        Ok(Schema {
            name: name.into(),
            root: FieldType::map(fields, FieldOptions::default())?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The same schema under another name.
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Schema {
            name: name.into(),
            root: self.root.clone(),
        }
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldType> {
        static EMPTY: BTreeMap<String, FieldType> = BTreeMap::new();
        self.root.fields().unwrap_or(&EMPTY)
    }

    pub fn field(&self, name: &str) -> Option<&FieldType> {
        self.fields().get(name)
    }

    /// Validate a document body as a full write or as an update payload.
    pub fn validate(&self, data: &Fields, update: bool) -> bool {
        self.root.validate_fields(data, update)
    }

    /// Like [`Schema::validate`], but reports every failing field.
    pub fn explain(&self, data: &Fields, update: bool) -> ValidationReport {
        validation::explain_fields(&self.root, data, update)
    }

    /// A new schema with `new_fields` added. Existing names may not be redeclared.
    pub fn extend<K: Into<String>>(
        &self,
        new_fields: impl IntoIterator<Item = (K, FieldType)>,
    ) -> Result<Self> {
        Ok(Schema {
            name: self.name.clone(),
            root: self.root.extend(new_fields)?,
        })
    }

    /// The root map as a field type, for embedding inside another map.
    pub fn as_field_type(&self, patch: OptionsPatch) -> Result<FieldType> {
        self.root.override_options(patch)
    }

    /// Lower `value` for writing to the store using the named field's type.
    pub fn safe_write_value(&self, field_name: &str, value: &Value) -> Result<Value> {
        self.field(field_name)
            .map(|field_type| field_type.safe_write_value(value))
            .ok_or_else(|| DocModelError::UnknownField(field_name.to_string()))
    }

    /// Lower every top-level field of a document.
    pub fn safe_write_data(&self, data: &Fields) -> Result<Fields> {
        data.iter()
            .map(|(key, value)| Ok((key.clone(), self.safe_write_value(key, value)?)))
            .collect()
    }

    /// Fill absent fields with their explicit defaults.
    pub fn apply_defaults(&self, data: &mut Fields) {
        validation::apply_defaults(self.fields(), data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeKind;
    use crate::value::{DocumentRef, ModelRef};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn fields(json: serde_json::Value) -> Fields {
        crate::value::fields_from_json(json).unwrap()
    }

    fn base() -> Schema {
        Schema::new(
            "base",
            [
                ("uid", FieldType::string(FieldOptions::new().immutable()).unwrap()),
                ("created", FieldType::of(TypeKind::Number)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_validate_full_and_update() {
        let schema = base();
        assert!(schema.validate(&fields(json!({ "uid": "a", "created": 1 })), false));
        assert!(!schema.validate(&fields(json!({ "uid": "a" })), false));
        assert!(schema.validate(&fields(json!({ "created": 2 })), true));
        assert!(!schema.validate(&fields(json!({ "uid": "b" })), true));
        assert!(!schema.validate(&fields(json!({ "nope": 1 })), true));
    }

    #[test]
    fn test_explain_matches_validate() {
        let schema = base();
        let report = schema.explain(&fields(json!({ "uid": 3 })), false);
        assert_eq!(
            report.errors,
            vec![
                "created: required field is missing",
                "uid: expected String, got number",
            ]
        );
    }

    #[test]
    fn test_extend_keeps_name_and_fields() {
        let user = base()
            .extend([("name", FieldType::of(TypeKind::String))])
            .unwrap()
            .with_name("users");
        assert_eq!(user.name(), "users");
        assert_eq!(
            user.fields().keys().collect::<Vec<_>>(),
            vec!["created", "name", "uid"]
        );
        assert_eq!(base().fields().len(), 2);

        assert!(matches!(
            base().extend([("uid", FieldType::of(TypeKind::String))]),
            Err(DocModelError::DuplicateField(_))
        ));
    }

    #[test]
    fn test_as_field_type_embeds() {
        let meta = base().as_field_type(OptionsPatch::new()).unwrap();
        let doc = Schema::new(
            "doc",
            [("meta", meta), ("title", FieldType::of(TypeKind::String))],
        )
        .unwrap();
        assert!(doc.validate(
            &fields(json!({ "title": "t", "meta": { "uid": "a", "created": 1 } })),
            false
        ));
        assert!(!doc.validate(&fields(json!({ "title": "t", "meta": { "uid": "a" } })), false));

        // required is fixed on the root map
        assert!(base()
            .as_field_type(OptionsPatch::new().required(false))
            .is_err());
    }

    #[test]
    fn test_safe_write_value() {
        let schema = Schema::new(
            "posts",
            [
                ("title", FieldType::of(TypeKind::String)),
                ("author", FieldType::of(TypeKind::Reference)),
            ],
        )
        .unwrap();
        let author = Value::Model(ModelRef {
            kind: "users".into(),
            reference: DocumentRef::new("users/alice"),
        });

        assert_eq!(
            schema.safe_write_value("author", &author).unwrap(),
            Value::Reference(DocumentRef::new("users/alice"))
        );
        assert_eq!(
            schema.safe_write_value("title", &Value::from("t")).unwrap(),
            Value::from("t")
        );
        assert!(matches!(
            schema.safe_write_value("missing", &Value::Null),
            Err(DocModelError::UnknownField(_))
        ));

        let mut data = fields(json!({ "title": "t" }));
        data.insert("author".into(), author);
        let lowered = schema.safe_write_data(&data).unwrap();
        assert_eq!(lowered["author"], Value::Reference(DocumentRef::new("users/alice")));
    }

    #[test]
    fn test_apply_defaults() {
        let schema = Schema::new(
            "s",
            [(
                "status",
                FieldType::string(FieldOptions::new().with_default("draft")).unwrap(),
            )],
        )
        .unwrap();
        let mut data = Fields::new();
        assert!(!schema.validate(&data, false));
        schema.apply_defaults(&mut data);
        assert!(schema.validate(&data, false));
    }
}
