use crate::lifecycle::Transition;
use crate::reservation::apply_transition;
use crate::CoreError;
use bikeshare_schema::{Bike, BikeFields, BikeId, Filter, Operation, ValidationError, Variant};
use bikeshare_store::{open_store, ResourceStore};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// The bike catalog: validation gate, store adapter, and reservation protocol
/// behind one handle.
///
/// Constructed explicitly and shared by reference; the store handle inside is
/// safe for concurrent use, so the service adds no locking of its own.
pub struct BikeService {
    store: Arc<dyn ResourceStore>,
    variant: Variant,
}

impl BikeService {
    pub fn new(store: Arc<dyn ResourceStore>, variant: Variant) -> Self {
        Self { store, variant }
    }

    /// Open the backend for `variant`, in memory when `data_dir` is `None`.
    pub fn open(variant: Variant, data_dir: Option<&Path>) -> Result<Self, CoreError> {
        let store = open_store(variant, data_dir)?;
        info!(
            "bike service ready: variant {variant}, backend {}",
            store.backend()
        );
        Ok(Self::new(store, variant))
    }

    fn gate(&self, payload: &Value, operation: Operation) -> Result<BikeFields, CoreError> {
        let Value::Object(map) = payload else {
            return Err(ValidationError::malformed_body(operation, "must be a JSON object").into());
        };
        Ok(self.variant.profile().validate(map, operation)?)
    }

    pub fn create(&self, payload: &Value) -> Result<Bike, CoreError> {
        let fields = self.gate(payload, Operation::Create)?;
        let id = self.store.create(&fields)?;
        info!("created bike {id}");
        Ok(Bike::new(id, fields))
    }

    pub fn get(&self, id: &BikeId) -> Result<Bike, CoreError> {
        debug!("get bike {id}");
        Ok(self.store.read(id)?)
    }

    /// Full replace. Validation runs first, so a bad body never touches the store.
    pub fn replace(&self, id: &BikeId, payload: &Value) -> Result<Bike, CoreError> {
        let fields = self.gate(payload, Operation::Update)?;
        let bike = self.store.replace(id, &fields)?;
        info!("replaced bike {id}");
        Ok(bike)
    }

    pub fn delete(&self, id: &BikeId) -> Result<(), CoreError> {
        self.store.delete(id)?;
        info!("deleted bike {id}");
        Ok(())
    }

    pub fn reserve(&self, id: &BikeId) -> Result<(), CoreError> {
        apply_transition(self.store.as_ref(), id, Transition::Reserve)?;
        info!("reserved bike {id}");
        Ok(())
    }

    pub fn clear(&self, id: &BikeId) -> Result<(), CoreError> {
        apply_transition(self.store.as_ref(), id, Transition::Clear)?;
        info!("cleared reservation on bike {id}");
        Ok(())
    }

    pub fn list_available(&self, filter: &Filter) -> Result<Vec<Bike>, CoreError> {
        debug!("list available bikes with {} criteria", filter.criteria().len());
        Ok(self.store.find_available(filter)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bikeshare_schema::OwnerId;
    use serde_json::json;

    fn trek() -> Value {
        json!({
            "manufacturer": "Trek",
            "model": "X1",
            "hourlyCost": 5,
            "type": "mountain",
            "ownerUserId": 1,
            "suitableHeightInMeters": 1.7,
            "maximumWeightInKg": 100
        })
    }

    #[test]
    fn create_then_get_matches_input() {
        for variant in Variant::ALL {
            let svc = BikeService::open(variant, None).unwrap();
            let created = svc.create(&trek()).unwrap();
            assert!(created.available);
            assert_eq!(svc.get(&created.id).unwrap(), created, "{variant}");
            assert_eq!(created.fields.owner_user_id, OwnerId::Numeric(1));
        }
    }

    #[test]
    fn non_object_body_is_a_validation_error() {
        let svc = BikeService::open(Variant::Document, None).unwrap();
        let err = svc.create(&json!([1, 2])).unwrap_err();
        assert!(matches!(err, CoreError::Validation(ref v) if v.mentions("body")));
    }

    #[test]
    fn invalid_replace_leaves_record_untouched() {
        let svc = BikeService::open(Variant::ValidatedHash, None).unwrap();
        let created = svc.create(&trek()).unwrap();
        let mut body = trek();
        body["hourlyCost"] = json!(0);
        assert!(matches!(
            svc.replace(&created.id, &body),
            Err(CoreError::Validation(_))
        ));
        assert_eq!(svc.get(&created.id).unwrap(), created);
    }

    #[test]
    fn replace_missing_is_not_found() {
        let svc = BikeService::open(Variant::Hash, None).unwrap();
        assert!(matches!(
            svc.replace(&BikeId::new("12"), &trek()),
            Err(CoreError::NotFound(_))
        ));
    }
}
