//! Newtype wrappers for identifiers, providing compile-time type safety.
//!
//! Identifiers serialize as their plain inner value so the wire shape stays flat.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

/// Store-assigned bike identifier. Decimal counter values in the hash store,
/// 24-hex object ids in the document store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BikeId(String);

impl BikeId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for BikeId {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BikeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<&str> for BikeId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Identifier of the user owning a bike.
///
/// Flat-store variants only admit [`OwnerId::Numeric`]; the document variant
/// also keeps opaque string identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OwnerId {
    Numeric(u64),
    Opaque(String),
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OwnerId::Numeric(n) => write!(f, "{n}"),
            OwnerId::Opaque(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bike_id_displays_and_compares_as_text() {
        let id = BikeId::new("42");
        assert_eq!(id.to_string(), "42");
        assert_eq!(id.as_str(), "42");
        assert_eq!(id, "42");
        assert_eq!(id.len(), 2);
    }

    #[test]
    fn bike_id_serializes_as_plain_string() {
        let id = BikeId::new("65f0c0ffee0000000000002a");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"65f0c0ffee0000000000002a\"");
        let back: BikeId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn owner_id_keeps_native_shape() {
        assert_eq!(serde_json::to_string(&OwnerId::Numeric(7)).unwrap(), "7");
        assert_eq!(
            serde_json::to_string(&OwnerId::Opaque("u-7".to_owned())).unwrap(),
            "\"u-7\""
        );
        let n: OwnerId = serde_json::from_str("7").unwrap();
        assert_eq!(n, OwnerId::Numeric(7));
        let s: OwnerId = serde_json::from_str("\"u-7\"").unwrap();
        assert_eq!(s, OwnerId::Opaque("u-7".to_owned()));
    }
}
