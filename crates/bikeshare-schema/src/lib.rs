//! Bike record model, field schema, record codec, and validation gate for bikeshare.
//!
//! This crate defines the schema layer: the `Bike` record and its identifier
//! newtypes, declared field types (`RecordSchema`), the flatten/unflatten codec
//! used by flat key-value backends, the rule-table `ValidationProfile` that
//! gates client payloads, and equality `Filter`s for availability listings.

pub mod bike;
pub mod codec;
pub mod filter;
pub mod schema;
pub mod types;
pub mod validate;
pub mod variant;

pub use bike::{Bike, BikeFields, BikeType};
pub use codec::{
    decode_text, encode_text, flatten, unflatten, CodecError, FlatRecord, TextRecord,
};
pub use filter::{Filter, LIST_LIMIT};
pub use schema::{FieldSpec, FieldType, RecordSchema, BIKE_DOCUMENT_SCHEMA, BIKE_FLAT_SCHEMA};
pub use types::{BikeId, OwnerId};
pub use validate::{
    Constraint, FieldRule, NumberPolicy, Operation, OwnerPolicy, ValidationError,
    ValidationProfile, Violation,
};
pub use variant::Variant;
