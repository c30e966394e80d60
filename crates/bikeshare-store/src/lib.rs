//! Resource store adapter for bikeshare.
//!
//! This crate provides the storage layer behind the [`ResourceStore`] trait:
//! `HashStore` keeps each bike as a flat hash of text fields with a counter for
//! identifiers, `DocumentStore` keeps native JSON documents with object ids.
//! Both hold their working set in memory and, when given a data directory,
//! write every mutation through to disk atomically under an exclusive
//! directory lock (`StoreLayout`, `DataDirLock`).

pub mod disk;
pub mod document;
pub mod hash;
pub mod layout;
pub mod lock;
mod query;

pub use document::DocumentStore;
pub use hash::HashStore;
pub use layout::{BackendKind, StoreLayout, STORE_FORMAT_VERSION};
pub use lock::DataDirLock;

use bikeshare_schema::{Bike, BikeFields, BikeId, CodecError, Filter, Variant};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Fsync a directory so that a preceding `rename()` is durable.
pub(crate) fn fsync_dir(dir: &Path) -> Result<(), std::io::Error> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("bike not found: {0}")]
    NotFound(BikeId),
    /// The backend can no longer be trusted to hold writes. Fatal to the process.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("stored record is unreadable: {0}")]
    Codec(#[from] CodecError),
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("data directory is locked by another process: {0}")]
    Locked(PathBuf),
    #[error("store format version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("data directory holds a {found} store, expected {expected}")]
    BackendMismatch {
        expected: BackendKind,
        found: BackendKind,
    },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result of a conditional write on the `available` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    Applied,
    /// No record matched: either it does not exist or its flag differed.
    NoMatch,
}

/// Uniform create/read/update/delete over a configured backend.
///
/// Implementations are shared across request threads; every method is atomic
/// with respect to the others on the same store.
pub trait ResourceStore: Send + Sync {
    fn backend(&self) -> BackendKind;

    /// Persist a new bike under a fresh identifier, `available = true`.
    fn create(&self, fields: &BikeFields) -> Result<BikeId, StoreError>;

    fn read(&self, id: &BikeId) -> Result<Bike, StoreError>;

    fn exists(&self, id: &BikeId) -> Result<bool, StoreError>;

    /// Replace every client-writable field. `id` and `available` are kept as stored.
    fn replace(&self, id: &BikeId, fields: &BikeFields) -> Result<Bike, StoreError>;

    fn delete(&self, id: &BikeId) -> Result<(), StoreError>;

    /// Up to [`bikeshare_schema::LIST_LIMIT`] available bikes matching `filter`,
    /// cheapest first.
    fn find_available(&self, filter: &Filter) -> Result<Vec<Bike>, StoreError>;

    /// Set `available` to `new` only if it currently equals `expected`, as one
    /// atomic step.
    fn set_available_if(
        &self,
        id: &BikeId,
        expected: bool,
        new: bool,
    ) -> Result<CasOutcome, StoreError>;
}

/// Open the backend a variant runs on. `None` keeps everything in memory.
pub fn open_store(
    variant: Variant,
    data_dir: Option<&Path>,
) -> Result<Arc<dyn ResourceStore>, StoreError> {
    let store: Arc<dyn ResourceStore> = match (BackendKind::for_variant(variant), data_dir) {
        (BackendKind::Hash, Some(dir)) => Arc::new(HashStore::open(dir)?),
        (BackendKind::Hash, None) => Arc::new(HashStore::in_memory()),
        (BackendKind::Document, Some(dir)) => Arc::new(DocumentStore::open(dir)?),
        (BackendKind::Document, None) => Arc::new(DocumentStore::in_memory()),
    };
    Ok(store)
}

#[cfg(test)]
pub(crate) fn sample_fields(cost: f64) -> BikeFields {
    BikeFields {
        manufacturer: "Trek".to_owned(),
        model: "X1".to_owned(),
        bike_type: bikeshare_schema::BikeType::Road,
        hourly_cost: cost,
        owner_user_id: bikeshare_schema::OwnerId::Numeric(1),
        suitable_height_in_meters: 1.7,
        maximum_weight_in_kg: 100.0,
    }
}
