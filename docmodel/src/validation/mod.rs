use crate::types::{FieldType, TypeKind};
use crate::value::{type_name, Fields, Value};
use std::collections::BTreeMap;

/// Result of explaining a validation: one message per failing location.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// All errors on one line each, prefixed for log output.
    pub fn summary(&self) -> String {
        format!("  - {}", self.errors.join("\n  - "))
    }

    fn push(&mut self, path: &str, message: impl AsRef<str>) {
        let location = if path.is_empty() { "value" } else { path };
        self.errors.push(format!("{location}: {}", message.as_ref()));
    }
}

/// Validate `value` against `field_type`, collecting a reason for every failure.
///
/// Follows the same pipeline as [`FieldType::validate`], so the report is
/// empty exactly when `validate` returns true.
pub fn explain<'v>(
    field_type: &FieldType,
    value: impl Into<Option<&'v Value>>,
    update: bool,
) -> ValidationReport {
    let mut report = ValidationReport::default();
    check(field_type, value.into(), update, "", &mut report);
    report
}

/// Explain a map body directly, as a schema root does.
pub(crate) fn explain_fields(map: &FieldType, fields: &Fields, update: bool) -> ValidationReport {
    let mut report = ValidationReport::default();
    check_fields(map, fields, update, "", &mut report);
    report
}

fn check(
    field_type: &FieldType,
    value: Option<&Value>,
    update: bool,
    path: &str,
    report: &mut ValidationReport,
) {
    if !field_type.check_updatable(update) {
        report.push(path, "field is not updatable");
        return;
    }
    if !field_type.check_enum(value) {
        let shown = value.map(|v| v.to_json().to_string()).unwrap_or_default();
        report.push(path, format!("{shown} is not an allowed value"));
        return;
    }

    match value {
        Some(Value::Map(fields)) if field_type.kind() == TypeKind::Map => {
            check_fields(field_type, fields, update, path, report)
        }
        Some(Value::Array(items)) if field_type.kind() == TypeKind::Array => {
            check_items(field_type, items, path, report)
        }
        Some(v) if field_type.is_type(v) => {}
        _ if field_type.accepts_missing(value) => {}
        None => report.push(path, "required field is missing"),
        Some(Value::Model(model)) if field_type.kind() == TypeKind::Reference => {
            let expected = field_type.options().model.unwrap_or_default();
            report.push(
                path,
                format!("expected a '{expected}' model, got '{}'", model.kind),
            );
        }
        Some(v) => report.push(
            path,
            format!("expected {}, got {}", field_type.type_name(), type_name(v)),
        ),
    }
}

fn check_fields(
    map: &FieldType,
    fields: &Fields,
    update: bool,
    path: &str,
    report: &mut ValidationReport,
) {
    let empty = BTreeMap::new();
    let declared = match map.fields() {
        Some(declared) => declared,
        None => {
            report.push(path, format!("expected Map, got {}", map.type_name()));
            &empty
        }
    };

    if !update {
        for (key, field_type) in declared {
            check(field_type, fields.get(key), false, &join(path, key), report);
        }
    }

    for (key, value) in fields {
        match declared.get(key) {
            Some(field_type) if update => check(field_type, Some(value), true, &join(path, key), report),
            Some(_) => {}
            None => report.push(&join(path, key), "unknown field"),
        }
    }
}

fn check_items(array: &FieldType, items: &[Value], path: &str, report: &mut ValidationReport) {
    let alternatives = array.alternatives().unwrap_or(&[]);
    for (index, item) in items.iter().enumerate() {
        if !alternatives.iter().any(|alt| alt.validate(item, false)) {
            let allowed: Vec<&str> = alternatives.iter().map(FieldType::type_name).collect();
            report.push(
                &format!("{path}[{index}]"),
                format!("{} matches none of [{}]", type_name(item), allowed.join(", ")),
            );
        }
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

/// Insert the explicit default of every declared field missing from `data`.
/// Map fields' implicit empty default is not applied.
pub fn apply_defaults(declared: &BTreeMap<String, FieldType>, data: &mut Fields) {
    for (field_name, field_type) in declared {
        if data.contains_key(field_name) {
            continue;
        }
        if let Some(default) = field_type.options().default {
            data.insert(field_name.clone(), default);
        }
    }
}
