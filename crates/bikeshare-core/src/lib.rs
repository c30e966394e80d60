//! Service layer for the bikeshare catalog.
//!
//! This crate ties the schema and store crates together into `BikeService`,
//! the API the request surface calls: validated create and replace, reads,
//! deletes, availability listings, and the reserve/clear state machine built
//! on the store's conditional write. It also maps every failure onto the
//! `CoreError` kinds callers act on, and provides shutdown signal handling.

pub mod lifecycle;
pub mod reservation;
pub mod service;
pub mod shutdown;

pub use lifecycle::{validate_transition, Availability, Transition};
pub use reservation::apply_transition;
pub use service::BikeService;
pub use shutdown::ShutdownSignal;

use bikeshare_schema::{BikeId, CodecError, ValidationError};
use bikeshare_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("bike not found: {0}")]
    NotFound(BikeId),
    #[error("cannot {transition} bike {id}: it is already {state}")]
    InvalidTransition {
        id: BikeId,
        transition: Transition,
        state: Availability,
    },
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("stored record is unreadable: {0}")]
    Codec(#[from] CodecError),
    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for CoreError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => CoreError::NotFound(id),
            StoreError::Unavailable(reason) => CoreError::StoreUnavailable(reason),
            StoreError::Codec(c) => CoreError::Codec(c),
            other => CoreError::Store(other),
        }
    }
}

impl CoreError {
    /// HTTP status for this outcome.
    pub fn status_code(&self) -> u16 {
        match self {
            CoreError::Validation(_) | CoreError::InvalidTransition { .. } => 400,
            CoreError::NotFound(_) => 404,
            CoreError::Codec(_) | CoreError::Store(_) => 500,
            CoreError::StoreUnavailable(_) => 503,
        }
    }

    /// Short machine-readable kind, used as the `error` field of responses.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::Validation(_) => "validation",
            CoreError::NotFound(_) => "not_found",
            CoreError::InvalidTransition { .. } => "invalid_transition",
            CoreError::StoreUnavailable(_) => "store_unavailable",
            CoreError::Codec(_) => "codec",
            CoreError::Store(_) => "store",
        }
    }

    /// The store can no longer be trusted; the process must stop serving.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CoreError::StoreUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bikeshare_schema::{Operation, Violation};

    #[test]
    fn store_errors_map_onto_core_kinds() {
        let e: CoreError = StoreError::NotFound(BikeId::new("3")).into();
        assert!(matches!(e, CoreError::NotFound(_)));

        let e: CoreError = StoreError::Unavailable("disk gone".to_owned()).into();
        assert!(e.is_fatal());
        assert_eq!(e.status_code(), 503);

        let e: CoreError = StoreError::Codec(CodecError::MissingField("model".to_owned())).into();
        assert_eq!(e.kind(), "codec");
        assert_eq!(e.status_code(), 500);
    }

    #[test]
    fn client_errors_are_4xx() {
        let e = CoreError::Validation(ValidationError {
            operation: Operation::Create,
            violations: vec![Violation::new("hourlyCost", "must be greater than 0")],
        });
        assert_eq!(e.status_code(), 400);
        assert!(e.to_string().contains("hourlyCost"));

        let e = CoreError::InvalidTransition {
            id: BikeId::new("5"),
            transition: Transition::Reserve,
            state: Availability::Reserved,
        };
        assert_eq!(e.status_code(), 400);
        assert_eq!(e.to_string(), "cannot reserve bike 5: it is already reserved");
        assert!(!e.is_fatal());

        assert_eq!(CoreError::NotFound(BikeId::new("5")).status_code(), 404);
    }
}
