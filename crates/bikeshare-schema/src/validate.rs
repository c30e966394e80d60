//! Validation gate for client payloads.
//!
//! Every rule in the table is evaluated and every violation is reported; a
//! payload either converts cleanly into [`BikeFields`] or nothing happens.

use crate::bike::{BikeFields, BikeType};
use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Create => write!(f, "create"),
            Operation::Update => write!(f, "update"),
        }
    }
}

/// How numeric fields may arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberPolicy {
    /// Only native JSON numbers.
    Native,
    /// Native numbers, or text that parses as one.
    AcceptText,
}

/// What `ownerUserId` may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerPolicy {
    PositiveInteger,
    AnyIdentifier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationProfile {
    pub numbers: NumberPolicy,
    pub owner: OwnerPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    /// Set by the server; a client must not send it.
    ServerAssigned,
    NonEmptyText,
    PositiveNumber,
    OneOf(&'static [&'static str]),
    PositiveInteger,
    Identifier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    pub field: &'static str,
    pub constraint: Constraint,
}

const fn rule(field: &'static str, constraint: Constraint) -> FieldRule {
    FieldRule { field, constraint }
}

impl ValidationProfile {
    pub fn rules(&self) -> [FieldRule; 9] {
        let owner = match self.owner {
            OwnerPolicy::PositiveInteger => Constraint::PositiveInteger,
            OwnerPolicy::AnyIdentifier => Constraint::Identifier,
        };
        [
            rule("id", Constraint::ServerAssigned),
            rule("available", Constraint::ServerAssigned),
            rule("manufacturer", Constraint::NonEmptyText),
            rule("model", Constraint::NonEmptyText),
            rule("type", Constraint::OneOf(BikeType::NAMES)),
            rule("hourlyCost", Constraint::PositiveNumber),
            rule("ownerUserId", owner),
            rule("suitableHeightInMeters", Constraint::PositiveNumber),
            rule("maximumWeightInKg", Constraint::PositiveNumber),
        ]
    }

    /// Check a raw payload and, if it passes, convert it.
    pub fn validate(
        &self,
        payload: &Map<String, Value>,
        operation: Operation,
    ) -> Result<BikeFields, ValidationError> {
        let rules = self.rules();
        let mut violations = Vec::new();
        let mut accepted = Map::new();

        for r in &rules {
            match self.check(r.constraint, payload.get(r.field)) {
                Ok(Some(value)) => {
                    accepted.insert(r.field.to_owned(), value);
                }
                Ok(None) => {}
                Err(reason) => violations.push(Violation::new(r.field, reason)),
            }
        }
        for key in payload.keys() {
            if !rules.iter().any(|r| r.field == key.as_str()) {
                violations.push(Violation::new(key, "is not allowed"));
            }
        }

        if !violations.is_empty() {
            return Err(ValidationError {
                operation,
                violations,
            });
        }

        serde_json::from_value(Value::Object(accepted)).map_err(|e| ValidationError {
            operation,
            violations: vec![Violation::new("body", e.to_string())],
        })
    }

    fn check(&self, constraint: Constraint, value: Option<&Value>) -> Result<Option<Value>, String> {
        if constraint == Constraint::ServerAssigned {
            return match value {
                Some(_) => Err("cannot be provided".to_owned()),
                None => Ok(None),
            };
        }
        let Some(value) = value else {
            return Err("is required".to_owned());
        };

        match constraint {
            Constraint::ServerAssigned => Ok(None),
            Constraint::NonEmptyText => match value {
                Value::String(s) if s.trim().is_empty() => Err("must not be empty".to_owned()),
                Value::String(_) => Ok(Some(value.clone())),
                _ => Err("must be a string".to_owned()),
            },
            Constraint::OneOf(allowed) => match value.as_str() {
                Some(s) if allowed.iter().any(|a| *a == s) => Ok(Some(value.clone())),
                _ => Err(format!("must be one of [{}]", allowed.join(", "))),
            },
            Constraint::PositiveNumber => {
                let n = self
                    .number(value)
                    .ok_or_else(|| "must be a number".to_owned())?;
                if n > 0.0 {
                    Number::from_f64(n)
                        .map(|n| Some(Value::Number(n)))
                        .ok_or_else(|| "must be a finite number".to_owned())
                } else {
                    Err("must be greater than 0".to_owned())
                }
            }
            Constraint::PositiveInteger => match self.integer(value) {
                Some(n) if n > 0 => Ok(Some(Value::from(n))),
                _ => Err("must be a positive integer".to_owned()),
            },
            Constraint::Identifier => match value {
                Value::String(s) if !s.trim().is_empty() => Ok(Some(value.clone())),
                Value::Number(n) if n.as_u64().is_some_and(|n| n > 0) => Ok(Some(value.clone())),
                _ => Err("must be a non-empty identifier".to_owned()),
            },
        }
    }

    fn number(&self, value: &Value) -> Option<f64> {
        match (value, self.numbers) {
            (Value::Number(n), _) => n.as_f64(),
            (Value::String(s), NumberPolicy::AcceptText) => {
                s.trim().parse::<f64>().ok().filter(|n| n.is_finite())
            }
            _ => None,
        }
    }

    fn integer(&self, value: &Value) -> Option<i64> {
        match (value, self.numbers) {
            (Value::Number(n), _) => n.as_i64(),
            (Value::String(s), NumberPolicy::AcceptText) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }
}

/// One rejected field and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub field: String,
    pub reason: String,
}

impl Violation {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.reason)
    }
}

#[derive(Debug, Clone, Error)]
#[error("invalid bike for {operation}: {}", summarize(.violations))]
pub struct ValidationError {
    pub operation: Operation,
    pub violations: Vec<Violation>,
}

impl ValidationError {
    /// A payload that is not a JSON object at all.
    pub fn malformed_body(operation: Operation, reason: impl Into<String>) -> Self {
        Self {
            operation,
            violations: vec![Violation::new("body", reason)],
        }
    }

    pub fn mentions(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }
}

fn summarize(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OwnerId;
    use serde_json::json;

    const LENIENT: ValidationProfile = ValidationProfile {
        numbers: NumberPolicy::AcceptText,
        owner: OwnerPolicy::PositiveInteger,
    };
    const STRICT: ValidationProfile = ValidationProfile {
        numbers: NumberPolicy::Native,
        owner: OwnerPolicy::PositiveInteger,
    };
    const DOCUMENT: ValidationProfile = ValidationProfile {
        numbers: NumberPolicy::Native,
        owner: OwnerPolicy::AnyIdentifier,
    };

    fn payload(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("test payload must be an object"),
        }
    }

    fn trek() -> Map<String, Value> {
        payload(json!({
            "manufacturer": "Trek",
            "model": "X1",
            "hourlyCost": 5,
            "type": "mountain",
            "ownerUserId": 1,
            "suitableHeightInMeters": 1.7,
            "maximumWeightInKg": 100
        }))
    }

    #[test]
    fn valid_payload_converts() {
        let fields = STRICT.validate(&trek(), Operation::Create).unwrap();
        assert_eq!(fields.manufacturer, "Trek");
        assert_eq!(fields.bike_type, BikeType::Mountain);
        assert!((fields.hourly_cost - 5.0).abs() < f64::EPSILON);
        assert_eq!(fields.owner_user_id, OwnerId::Numeric(1));
    }

    #[test]
    fn negative_cost_names_the_field() {
        let mut body = trek();
        body.insert("hourlyCost".to_owned(), json!(-1));
        let err = STRICT.validate(&body, Operation::Create).unwrap_err();
        assert_eq!(err.violations.len(), 1);
        assert_eq!(err.violations[0].field, "hourlyCost");
        assert_eq!(err.violations[0].reason, "must be greater than 0");
    }

    #[test]
    fn all_violations_are_collected() {
        let body = payload(json!({
            "id": 4,
            "available": false,
            "manufacturer": "  ",
            "type": "bmx",
            "hourlyCost": 0,
            "ownerUserId": -2,
            "suitableHeightInMeters": "tall",
            "color": "red"
        }));
        let err = STRICT.validate(&body, Operation::Update).unwrap_err();
        for field in [
            "id",
            "available",
            "manufacturer",
            "model",
            "type",
            "hourlyCost",
            "ownerUserId",
            "suitableHeightInMeters",
            "maximumWeightInKg",
            "color",
        ] {
            assert!(err.mentions(field), "missing violation for {field}: {err}");
        }
        assert_eq!(err.operation, Operation::Update);
    }

    #[test]
    fn server_fields_cannot_be_provided() {
        let mut body = trek();
        body.insert("id".to_owned(), json!("1"));
        body.insert("available".to_owned(), json!(true));
        let err = DOCUMENT.validate(&body, Operation::Update).unwrap_err();
        assert_eq!(
            err.violations,
            vec![
                Violation::new("id", "cannot be provided"),
                Violation::new("available", "cannot be provided"),
            ]
        );
    }

    #[test]
    fn numeric_text_depends_on_profile() {
        let mut body = trek();
        body.insert("hourlyCost".to_owned(), json!("5"));
        body.insert("ownerUserId".to_owned(), json!("3"));

        let fields = LENIENT.validate(&body, Operation::Create).unwrap();
        assert!((fields.hourly_cost - 5.0).abs() < f64::EPSILON);
        assert_eq!(fields.owner_user_id, OwnerId::Numeric(3));

        let err = STRICT.validate(&body, Operation::Create).unwrap_err();
        assert!(err.mentions("hourlyCost"));
        assert!(err.mentions("ownerUserId"));
    }

    #[test]
    fn document_profile_accepts_opaque_owner() {
        let mut body = trek();
        body.insert("ownerUserId".to_owned(), json!("user-17"));
        let fields = DOCUMENT.validate(&body, Operation::Create).unwrap();
        assert_eq!(fields.owner_user_id, OwnerId::Opaque("user-17".to_owned()));

        assert!(STRICT.validate(&body, Operation::Create).is_err());

        body.insert("ownerUserId".to_owned(), json!(""));
        assert!(DOCUMENT.validate(&body, Operation::Create).is_err());
    }

    #[test]
    fn text_fields_are_kept_as_sent() {
        let mut body = trek();
        body.insert("manufacturer".to_owned(), json!(" Trek "));
        body.insert("model".to_owned(), json!("  X1  "));
        let fields = STRICT.validate(&body, Operation::Create).unwrap();
        assert_eq!(fields.manufacturer, " Trek ");
        assert_eq!(fields.model, "  X1  ");

        body.insert("ownerUserId".to_owned(), json!(" u-1"));
        let fields = DOCUMENT.validate(&body, Operation::Create).unwrap();
        assert_eq!(fields.owner_user_id, OwnerId::Opaque(" u-1".to_owned()));

        body.insert("model".to_owned(), json!("   "));
        let err = STRICT.validate(&body, Operation::Create).unwrap_err();
        assert!(err.mentions("model"));
    }

    #[test]
    fn error_display_lists_fields() {
        let err = ValidationError::malformed_body(Operation::Create, "expected a JSON object");
        assert_eq!(
            err.to_string(),
            "invalid bike for create: body expected a JSON object"
        );
    }
}
