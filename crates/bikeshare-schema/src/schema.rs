//! Declared field types for stored records.
//!
//! Flat key-value backends only hold text, so every stored field has a declared
//! type here and all text-to-value coercion goes through [`FieldType::coerce`].

use serde_json::{Number, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Integer,
    Float,
    Boolean,
    /// A positive integer or a non-empty string, kept in whichever shape it arrived.
    Identifier,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Text => write!(f, "text"),
            FieldType::Integer => write!(f, "integer"),
            FieldType::Float => write!(f, "float"),
            FieldType::Boolean => write!(f, "boolean"),
            FieldType::Identifier => write!(f, "identifier"),
        }
    }
}

impl FieldType {
    /// Whether a native JSON scalar is storable under this type.
    pub fn admits(self, value: &Value) -> bool {
        match (self, value) {
            (FieldType::Text, Value::String(_)) | (FieldType::Boolean, Value::Bool(_)) => true,
            (FieldType::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (FieldType::Float, Value::Number(_)) => true,
            (FieldType::Identifier, Value::String(s)) => !s.is_empty(),
            (FieldType::Identifier, Value::Number(n)) => n.is_u64(),
            _ => false,
        }
    }

    /// Coerce stored text back into a typed JSON value.
    pub fn coerce(self, text: &str) -> Option<Value> {
        match self {
            FieldType::Text => Some(Value::String(text.to_owned())),
            FieldType::Integer => parse_integer(text),
            FieldType::Float => text
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number),
            FieldType::Boolean => match text {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            FieldType::Identifier => {
                if text.is_empty() {
                    None
                } else {
                    Some(
                        text.parse::<u64>()
                            .map_or_else(|_| Value::String(text.to_owned()), Value::from),
                    )
                }
            }
        }
    }

    /// Equality between a stored value and caller-supplied text, compared in
    /// this type's domain (so `hourlyCost=5` matches a stored `5.0`).
    pub fn matches_text(self, stored: &Value, text: &str) -> bool {
        match self {
            FieldType::Float => match (stored.as_f64(), text.trim().parse::<f64>()) {
                (Some(a), Ok(b)) => a == b,
                _ => false,
            },
            FieldType::Identifier => match stored {
                Value::String(s) => s == text,
                Value::Number(n) => n.to_string() == text.trim(),
                _ => false,
            },
            _ => self.coerce(text.trim()).is_some_and(|v| &v == stored),
        }
    }
}

fn parse_integer(text: &str) -> Option<Value> {
    if let Ok(u) = text.parse::<u64>() {
        return Some(Value::from(u));
    }
    text.parse::<i64>().ok().map(Value::from)
}

/// One declared field: a dotted path and its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub path: &'static str,
    pub ty: FieldType,
}

impl FieldSpec {
    pub const fn new(path: &'static str, ty: FieldType) -> Self {
        Self { path, ty }
    }
}

/// The full set of fields a stored record carries. Every declared field is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSchema {
    fields: &'static [FieldSpec],
}

impl RecordSchema {
    pub const fn new(fields: &'static [FieldSpec]) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &'static [FieldSpec] {
        self.fields
    }

    pub fn field_type(&self, path: &str) -> Option<FieldType> {
        self.fields.iter().find(|f| f.path == path).map(|f| f.ty)
    }
}

/// Bike layout in flat hash stores: owners are numeric.
pub const BIKE_FLAT_SCHEMA: RecordSchema = RecordSchema::new(&[
    FieldSpec::new("id", FieldType::Text),
    FieldSpec::new("manufacturer", FieldType::Text),
    FieldSpec::new("model", FieldType::Text),
    FieldSpec::new("type", FieldType::Text),
    FieldSpec::new("hourlyCost", FieldType::Float),
    FieldSpec::new("ownerUserId", FieldType::Integer),
    FieldSpec::new("suitableHeightInMeters", FieldType::Float),
    FieldSpec::new("maximumWeightInKg", FieldType::Float),
    FieldSpec::new("available", FieldType::Boolean),
]);

/// Bike layout in the document store: owners may be any identifier.
pub const BIKE_DOCUMENT_SCHEMA: RecordSchema = RecordSchema::new(&[
    FieldSpec::new("id", FieldType::Text),
    FieldSpec::new("manufacturer", FieldType::Text),
    FieldSpec::new("model", FieldType::Text),
    FieldSpec::new("type", FieldType::Text),
    FieldSpec::new("hourlyCost", FieldType::Float),
    FieldSpec::new("ownerUserId", FieldType::Identifier),
    FieldSpec::new("suitableHeightInMeters", FieldType::Float),
    FieldSpec::new("maximumWeightInKg", FieldType::Float),
    FieldSpec::new("available", FieldType::Boolean),
]);
