use crate::schema::{RecordSchema, BIKE_DOCUMENT_SCHEMA, BIKE_FLAT_SCHEMA};
use crate::validate::{NumberPolicy, OwnerPolicy, ValidationProfile};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which storage backend and validation profile a deployment runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    /// Flat hashes, lenient numeric input.
    Hash,
    /// Flat hashes, native numbers only.
    ValidatedHash,
    /// Native documents, any owner identifier.
    Document,
}

impl Variant {
    pub const ALL: [Variant; 3] = [Variant::Hash, Variant::ValidatedHash, Variant::Document];

    pub fn as_str(self) -> &'static str {
        match self {
            Variant::Hash => "hash",
            Variant::ValidatedHash => "validated-hash",
            Variant::Document => "document",
        }
    }

    /// Whether records are stored as flat text hashes.
    pub fn is_flat(self) -> bool {
        matches!(self, Variant::Hash | Variant::ValidatedHash)
    }

    pub fn schema(self) -> &'static RecordSchema {
        if self.is_flat() {
            &BIKE_FLAT_SCHEMA
        } else {
            &BIKE_DOCUMENT_SCHEMA
        }
    }

    pub fn profile(self) -> ValidationProfile {
        match self {
            Variant::Hash => ValidationProfile {
                numbers: NumberPolicy::AcceptText,
                owner: OwnerPolicy::PositiveInteger,
            },
            Variant::ValidatedHash => ValidationProfile {
                numbers: NumberPolicy::Native,
                owner: OwnerPolicy::PositiveInteger,
            },
            Variant::Document => ValidationProfile {
                numbers: NumberPolicy::Native,
                owner: OwnerPolicy::AnyIdentifier,
            },
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Variant::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| format!("unknown variant '{s}', expected hash, validated-hash or document"))
    }
}
