use crate::codec::get_path;
use crate::schema::RecordSchema;
use serde_json::Value;
use std::collections::BTreeMap;

/// Upper bound on records returned by an availability listing.
pub const LIST_LIMIT: usize = 10;

/// Caller-supplied equality criteria for an availability listing.
///
/// `available` is implied by the listing itself and never taken from the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    criteria: BTreeMap<String, String>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, field: &str, value: &str) -> Self {
        self.insert(field, value);
        self
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut filter = Self::new();
        for (k, v) in pairs {
            filter.insert(k.as_ref(), v.as_ref());
        }
        filter
    }

    fn insert(&mut self, field: &str, value: &str) {
        if field != "available" && !field.is_empty() {
            self.criteria.insert(field.to_owned(), value.to_owned());
        }
    }

    pub fn criteria(&self) -> &BTreeMap<String, String> {
        &self.criteria
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    /// Whether a decoded record satisfies every criterion. Fields the schema
    /// does not declare never match.
    pub fn matches(&self, record: &Value, schema: &RecordSchema) -> bool {
        self.criteria.iter().all(|(field, expected)| {
            match (schema.field_type(field), get_path(record, field)) {
                (Some(ty), Some(stored)) => ty.matches_text(stored, expected),
                _ => false,
            }
        })
    }
}
