use crate::types::{BikeId, OwnerId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of bike. Serialized lowercase: `mountain`, `road`, `tandem`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BikeType {
    Mountain,
    Road,
    Tandem,
}

impl BikeType {
    pub const ALL: [BikeType; 3] = [BikeType::Mountain, BikeType::Road, BikeType::Tandem];
    pub const NAMES: &'static [&'static str] = &["mountain", "road", "tandem"];

    pub fn as_str(self) -> &'static str {
        match self {
            BikeType::Mountain => "mountain",
            BikeType::Road => "road",
            BikeType::Tandem => "tandem",
        }
    }
}

impl fmt::Display for BikeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BikeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BikeType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown bike type '{s}'"))
    }
}

/// The client-writable part of a bike: everything except `id` and `available`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BikeFields {
    pub manufacturer: String,
    pub model: String,
    #[serde(rename = "type")]
    pub bike_type: BikeType,
    pub hourly_cost: f64,
    pub owner_user_id: OwnerId,
    pub suitable_height_in_meters: f64,
    pub maximum_weight_in_kg: f64,
}

/// A stored bike. `id` and `available` are owned by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bike {
    pub id: BikeId,
    #[serde(flatten)]
    pub fields: BikeFields,
    pub available: bool,
}

impl Bike {
    /// A freshly created bike is always available.
    pub fn new(id: BikeId, fields: BikeFields) -> Self {
        Self {
            id,
            fields,
            available: true,
        }
    }

    /// Full replace of the client-writable fields; `id` and `available` carry over.
    #[must_use]
    pub fn replaced(&self, fields: BikeFields) -> Self {
        Self {
            id: self.id.clone(),
            fields,
            available: self.available,
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_fields() -> BikeFields {
    BikeFields {
        manufacturer: "Trek".to_owned(),
        model: "X1".to_owned(),
        bike_type: BikeType::Mountain,
        hourly_cost: 5.0,
        owner_user_id: OwnerId::Numeric(1),
        suitable_height_in_meters: 1.7,
        maximum_weight_in_kg: 100.0,
    }
}
