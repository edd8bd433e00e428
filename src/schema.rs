use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

use crate::differ::json_type_name;

/// Closed set of schema type tags. Tags are matched exactly against the
/// runtime type, never coerced: "1" is not an int and true is not an int.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    Int,
    Str,
    Float,
    Bool,
    List,
    Dict,
    Null,
}

impl TypeTag {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "int" => Some(TypeTag::Int),
            "str" => Some(TypeTag::Str),
            "float" => Some(TypeTag::Float),
            "bool" => Some(TypeTag::Bool),
            "list" => Some(TypeTag::List),
            "dict" => Some(TypeTag::Dict),
            "null" => Some(TypeTag::Null),
            _ => None,
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        match self {
            TypeTag::Int => matches!(value, Value::Number(n) if !n.is_f64()),
            TypeTag::Str => value.is_string(),
            TypeTag::Float => matches!(value, Value::Number(n) if n.is_f64()),
            TypeTag::Bool => value.is_boolean(),
            TypeTag::List => value.is_array(),
            TypeTag::Dict => value.is_object(),
            TypeTag::Null => value.is_null(),
        }
    }
}

/// Shape-only validation of a response body against a flat field -> tag
/// schema. Every field is checked; errors accumulate so one run surfaces
/// all violations.
pub fn validate(actual: &Value, schema: &BTreeMap<String, String>) -> Vec<String> {
    let mut errors = Vec::new();

    let Value::Object(fields) = actual else {
        errors.push(format!("root: expected dict, got {}", json_type_name(actual)));
        return errors;
    };

    for (field, tag) in schema {
        let Some(value) = fields.get(field) else {
            errors.push(format!("root.{field}: missing field"));
            continue;
        };

        let Some(expected) = TypeTag::from_tag(tag) else {
            errors.push(format!("root.{field}: unknown type '{tag}'"));
            continue;
        };

        if !expected.matches(value) {
            errors.push(format!(
                "root.{field}: expected {tag}, got {}",
                json_type_name(value)
            ));
        }
    }

    errors
}

#[derive(Debug, Error)]
#[error("schema validation failed: {} error(s)", errors.len())]
pub struct SchemaMismatch {
    pub errors: Vec<String>,
}

pub fn assert_valid(actual: &Value, schema: &BTreeMap<String, String>) -> Result<(), SchemaMismatch> {
    let errors = validate(actual, schema);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(SchemaMismatch { errors })
    }
}
