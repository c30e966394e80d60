//! Conversion between nested records and the flat, dotted-path shape that
//! key-value backends store.
//!
//! [`flatten`] and [`unflatten`] are structural inverses for any object whose
//! leaves are scalars: `unflatten(&flatten(x)?)? == x`. [`encode_text`] and
//! [`decode_text`] add the text layer for stores that only hold strings,
//! checking and coercing every field against a [`RecordSchema`].

use crate::schema::{FieldType, RecordSchema};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

pub const PATH_SEPARATOR: char = '.';

/// Dotted path to native scalar.
pub type FlatRecord = BTreeMap<String, Value>;
/// Dotted path to stored text, as held by a flat hash.
pub type TextRecord = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("record must be a JSON object")]
    NotAnObject,
    #[error("unsupported {kind} value at '{path}'")]
    UnsupportedValue { path: String, kind: &'static str },
    #[error("invalid field name at '{0}'")]
    InvalidKey(String),
    #[error("conflicting paths at '{0}'")]
    PathConflict(String),
    #[error("missing field '{0}'")]
    MissingField(String),
    #[error("undeclared field '{0}'")]
    UnknownField(String),
    #[error("field '{path}' expected {expected}, found '{found}'")]
    Coercion {
        path: String,
        expected: FieldType,
        found: String,
    },
    #[error("record shape mismatch: {0}")]
    Shape(#[from] serde_json::Error),
}

/// Flatten a nested object into dotted-path keys.
///
/// Arrays, nulls and empty nested objects have no flat form and are rejected,
/// as are keys that are empty or contain the path separator.
pub fn flatten(value: &Value) -> Result<FlatRecord, CodecError> {
    let Value::Object(map) = value else {
        return Err(CodecError::NotAnObject);
    };
    let mut out = FlatRecord::new();
    flatten_into(map, "", &mut out)?;
    Ok(out)
}

fn flatten_into(map: &Map<String, Value>, prefix: &str, out: &mut FlatRecord) -> Result<(), CodecError> {
    for (key, value) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}{PATH_SEPARATOR}{key}")
        };
        if key.is_empty() || key.contains(PATH_SEPARATOR) {
            return Err(CodecError::InvalidKey(path));
        }
        match value {
            Value::Object(inner) if inner.is_empty() => {
                return Err(CodecError::UnsupportedValue {
                    path,
                    kind: "empty object",
                });
            }
            Value::Object(inner) => flatten_into(inner, &path, out)?,
            Value::Array(_) => {
                return Err(CodecError::UnsupportedValue {
                    path,
                    kind: "array",
                });
            }
            Value::Null => {
                return Err(CodecError::UnsupportedValue { path, kind: "null" });
            }
            scalar => {
                out.insert(path, scalar.clone());
            }
        }
    }
    Ok(())
}

/// Rebuild the nested object from dotted-path keys.
pub fn unflatten(flat: &FlatRecord) -> Result<Value, CodecError> {
    let mut root = Map::new();
    for (path, value) in flat {
        insert_path(&mut root, path, value.clone())?;
    }
    Ok(Value::Object(root))
}

fn insert_path(root: &mut Map<String, Value>, path: &str, value: Value) -> Result<(), CodecError> {
    let segments: Vec<&str> = path.split(PATH_SEPARATOR).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(CodecError::InvalidKey(path.to_owned()));
    }
    let (leaf, parents) = segments
        .split_last()
        .ok_or_else(|| CodecError::InvalidKey(path.to_owned()))?;

    let mut node = root;
    for segment in parents {
        let child = node
            .entry((*segment).to_owned())
            .or_insert_with(|| Value::Object(Map::new()));
        node = match child {
            Value::Object(inner) => inner,
            _ => return Err(CodecError::PathConflict(path.to_owned())),
        };
    }
    if node.contains_key(*leaf) {
        return Err(CodecError::PathConflict(path.to_owned()));
    }
    node.insert((*leaf).to_owned(), value);
    Ok(())
}

/// Render a flat record as text, checking every value against its declared type.
pub fn encode_text(flat: &FlatRecord, schema: &RecordSchema) -> Result<TextRecord, CodecError> {
    let mut out = TextRecord::new();
    for (path, value) in flat {
        let ty = schema
            .field_type(path)
            .ok_or_else(|| CodecError::UnknownField(path.clone()))?;
        if !ty.admits(value) {
            return Err(CodecError::Coercion {
                path: path.clone(),
                expected: ty,
                found: value.to_string(),
            });
        }
        out.insert(path.clone(), scalar_text(value));
    }
    for field in schema.fields() {
        if !out.contains_key(field.path) {
            return Err(CodecError::MissingField(field.path.to_owned()));
        }
    }
    Ok(out)
}

/// Coerce stored text back to typed values and rebuild the nested record.
///
/// A declared field that is absent is [`CodecError::MissingField`]; text that
/// does not parse as the declared type is [`CodecError::Coercion`].
pub fn decode_text(text: &TextRecord, schema: &RecordSchema) -> Result<Value, CodecError> {
    let mut flat = FlatRecord::new();
    for field in schema.fields() {
        let raw = text
            .get(field.path)
            .ok_or_else(|| CodecError::MissingField(field.path.to_owned()))?;
        let value = field.ty.coerce(raw).ok_or_else(|| CodecError::Coercion {
            path: field.path.to_owned(),
            expected: field.ty,
            found: raw.clone(),
        })?;
        flat.insert(field.path.to_owned(), value);
    }
    if let Some(extra) = text.keys().find(|k| schema.field_type(k).is_none()) {
        return Err(CodecError::UnknownField(extra.clone()));
    }
    unflatten(&flat)
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Look up a scalar by dotted path in a nested record.
pub fn get_path<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    path.split(PATH_SEPARATOR)
        .try_fold(record, |node, segment| node.get(segment))
}
