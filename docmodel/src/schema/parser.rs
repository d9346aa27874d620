use super::types::{FieldDefinition, SchemaDefinition, SchemaFile, TypeName};
use super::Schema;
use crate::error::{DocModelError, Result};
use crate::types::{FieldOptions, FieldType, TypeKind};
use std::collections::BTreeMap;
use std::path::Path;

/// Resolved schemas, by name.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, Schema>,
}

impl SchemaRegistry {
    pub fn get(&self, name: &str) -> Option<&Schema> {
        self.schemas.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Schema> {
        self.schemas.values()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

/// Parse a schema YAML file into a SchemaRegistry
pub fn parse_schema(path: &Path) -> Result<SchemaRegistry> {
    let content = std::fs::read_to_string(path)?;
    parse_schema_str(&content)
}

/// Parse a schema YAML string into a SchemaRegistry
pub fn parse_schema_str(content: &str) -> Result<SchemaRegistry> {
    let file: SchemaFile = serde_yaml::from_str(content)?;
    let mut resolver = Resolver {
        definitions: &file.schemas,
        resolved: BTreeMap::new(),
        stack: Vec::new(),
    };
    for name in file.schemas.keys() {
        resolver.resolve(name)?;
    }
    log::debug!("Loaded {} schemas", resolver.resolved.len());
    Ok(SchemaRegistry {
        schemas: resolver.resolved,
    })
}

struct Resolver<'a> {
    definitions: &'a BTreeMap<String, SchemaDefinition>,
    resolved: BTreeMap<String, Schema>,
    /// Schemas currently being resolved, outermost first
    stack: Vec<String>,
}

impl Resolver<'_> {
    fn resolve(&mut self, name: &str) -> Result<Schema> {
        if let Some(schema) = self.resolved.get(name) {
            return Ok(schema.clone());
        }
        if self.stack.iter().any(|n| n == name) {
            let mut cycle = self.stack.clone();
            cycle.push(name.to_string());
            return Err(DocModelError::Schema(format!(
                "circular schema reference: {}",
                cycle.join(" -> ")
            )));
        }
        let definitions = self.definitions;
        let definition = definitions
            .get(name)
            .ok_or_else(|| DocModelError::Schema(format!("unknown schema '{name}'")))?;

        self.stack.push(name.to_string());
        let schema = self.build(name, definition);
        self.stack.pop();
        let schema = schema?;

        self.resolved.insert(name.to_string(), schema.clone());
        Ok(schema)
    }

    fn build(&mut self, name: &str, definition: &SchemaDefinition) -> Result<Schema> {
        let mut fields = Vec::with_capacity(definition.fields.len());
        for (field_name, field_def) in &definition.fields {
            let field_type = self
                .field(field_def)
                .map_err(|e| in_field(name, field_name, e))?;
            fields.push((field_name.clone(), field_type));
        }

        match &definition.extends {
            Some(base) => Ok(self.resolve(base)?.with_name(name).extend(fields)?),
            None => Schema::new(name, fields),
        }
    }

    fn field(&mut self, def: &FieldDefinition) -> Result<FieldType> {
        let options = FieldOptions {
            required: def.required.unwrap_or(true),
            updatable: def.updatable.unwrap_or(true),
            nullable: def.nullable.unwrap_or(false),
            default: def.default.clone(),
            enumeration: def.enumeration.clone(),
            enum_values: def.enum_values.clone(),
            model: def.model.clone(),
            data: None,
        };

        let takes_fields = matches!(def.field_type, TypeName::Map);
        if !def.fields.is_empty() && !takes_fields {
            return Err(DocModelError::Schema(
                "'fields' is only allowed on map fields".into(),
            ));
        }
        if !def.items.is_empty() && def.field_type != TypeName::Array {
            return Err(DocModelError::Schema(
                "'items' is only allowed on array fields".into(),
            ));
        }

        match &def.field_type {
            TypeName::String => FieldType::new(TypeKind::String, options),
            TypeName::Number => FieldType::new(TypeKind::Number, options),
            TypeName::Bool => FieldType::new(TypeKind::Bool, options),
            TypeName::Null => FieldType::new(TypeKind::Null, options),
            TypeName::Reference => FieldType::new(TypeKind::Reference, options),
            TypeName::Map => {
                let mut fields = Vec::with_capacity(def.fields.len());
                for (name, nested) in &def.fields {
                    let nested = self
                        .field(nested)
                        .map_err(|e| in_field("map", name, e))?;
                    fields.push((name.clone(), nested));
                }
                FieldType::map(fields, options)
            }
            TypeName::Array => {
                let alternatives = def
                    .items
                    .iter()
                    .map(|item| self.field(item))
                    .collect::<Result<Vec<_>>>()?;
                FieldType::array(alternatives, options)
            }
            TypeName::Custom(schema_name) => {
                let embedded = self.resolve(schema_name)?;
                FieldType::map(embedded.fields().clone(), options)
            }
        }
    }
}

fn in_field(owner: &str, field: &str, err: DocModelError) -> DocModelError {
    match err {
        DocModelError::Schema(msg) => DocModelError::Schema(format!("{owner}.{field}: {msg}")),
        other => other,
    }
}
