//! The reserve/clear protocol on top of the store's conditional write.

use crate::lifecycle::{validate_transition, Transition};
use crate::CoreError;
use bikeshare_schema::BikeId;
use bikeshare_store::{CasOutcome, ResourceStore};
use tracing::debug;

/// Apply `transition` to one bike as a single conditional write.
///
/// When the write matches nothing, a separate existence check tells a missing
/// bike (`NotFound`) from one already in the target state
/// (`InvalidTransition`). That check is not atomic with the write: a bike
/// deleted in between is reported as not found.
pub fn apply_transition(
    store: &dyn ResourceStore,
    id: &BikeId,
    transition: Transition,
) -> Result<(), CoreError> {
    let from = transition.from_state();
    let to = transition.to_state();

    match store.set_available_if(id, from.flag(), to.flag())? {
        CasOutcome::Applied => {
            debug!("{transition} {id}: {from} -> {to}");
            Ok(())
        }
        CasOutcome::NoMatch => {
            if !store.exists(id)? {
                return Err(CoreError::NotFound(id.clone()));
            }
            // With two states, a failed precondition means the bike is already at `to`.
            validate_transition(id, to, transition).map(drop)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Availability;
    use bikeshare_schema::{Bike, BikeFields, BikeType, Filter, OwnerId};
    use bikeshare_store::{BackendKind, HashStore, StoreError};

    fn fields() -> BikeFields {
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

    /// Deletes the bike right after its conditional write misses, landing in
    /// the window between the write and the existence check.
    struct DeletingStore {
        inner: HashStore,
    }

    impl ResourceStore for DeletingStore {
        fn backend(&self) -> BackendKind {
            self.inner.backend()
        }
        fn create(&self, fields: &BikeFields) -> Result<BikeId, StoreError> {
            self.inner.create(fields)
        }
        fn read(&self, id: &BikeId) -> Result<Bike, StoreError> {
            self.inner.read(id)
        }
        fn exists(&self, id: &BikeId) -> Result<bool, StoreError> {
            self.inner.exists(id)
        }
        fn replace(&self, id: &BikeId, fields: &BikeFields) -> Result<Bike, StoreError> {
            self.inner.replace(id, fields)
        }
        fn delete(&self, id: &BikeId) -> Result<(), StoreError> {
            self.inner.delete(id)
        }
        fn find_available(&self, filter: &Filter) -> Result<Vec<Bike>, StoreError> {
            self.inner.find_available(filter)
        }
        fn set_available_if(
            &self,
            id: &BikeId,
            expected: bool,
            new: bool,
        ) -> Result<CasOutcome, StoreError> {
            let outcome = self.inner.set_available_if(id, expected, new)?;
            if outcome == CasOutcome::NoMatch {
                let _ = self.inner.delete(id);
            }
            Ok(outcome)
        }
    }

    #[test]
    fn reserve_then_clear() {
        let store = HashStore::in_memory();
        let id = store.create(&fields()).unwrap();

        apply_transition(&store, &id, Transition::Reserve).unwrap();
        assert!(!store.read(&id).unwrap().available);
        apply_transition(&store, &id, Transition::Clear).unwrap();
        assert!(store.read(&id).unwrap().available);
    }

    #[test]
    fn repeated_transition_is_invalid() {
        let store = HashStore::in_memory();
        let id = store.create(&fields()).unwrap();

        let err = apply_transition(&store, &id, Transition::Clear).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidTransition {
                transition: Transition::Clear,
                state: Availability::Available,
                ..
            }
        ));
    }

    #[test]
    fn missing_bike_is_not_found_never_invalid() {
        let store = HashStore::in_memory();
        let err = apply_transition(&store, &BikeId::new("404"), Transition::Reserve).unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[test]
    fn delete_inside_the_window_reports_not_found() {
        let store = DeletingStore {
            inner: HashStore::in_memory(),
        };
        let id = store.create(&fields()).unwrap();
        apply_transition(&store, &id, Transition::Reserve).unwrap();

        let err = apply_transition(&store, &id, Transition::Reserve).unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }
}
