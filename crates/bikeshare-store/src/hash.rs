use crate::disk::{write_atomic, DiskTable};
use crate::layout::{BackendKind, StoreLayout};
use crate::lock::DataDirLock;
use crate::query::cheapest;
use crate::{CasOutcome, ResourceStore, StoreError};
use bikeshare_schema::{
    decode_text, encode_text, flatten, Bike, BikeFields, BikeId, CodecError, FieldType, Filter,
    TextRecord, BIKE_FLAT_SCHEMA,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

const AVAILABLE: &str = "available";

/// Flat key-value backend: each bike is a hash of text fields keyed by a
/// decimal identifier drawn from a monotonically increasing counter.
///
/// All operations take the state lock, so a conditional write is one atomic
/// step with respect to every other request on the same store.
pub struct HashStore {
    state: RwLock<HashState>,
    persistence: Option<Persistence>,
}

struct HashState {
    last_id: u64,
    hashes: BTreeMap<String, TextRecord>,
}

struct Persistence {
    layout: StoreLayout,
    table: DiskTable,
    _lock: DataDirLock,
}

#[derive(Debug, Serialize, Deserialize)]
struct Counter {
    last_id: u64,
}

impl HashStore {
    pub fn in_memory() -> Self {
        Self {
            state: RwLock::new(HashState {
                last_id: 0,
                hashes: BTreeMap::new(),
            }),
            persistence: None,
        }
    }

    /// Open (or create) a hash store rooted at `root`, holding its directory lock.
    pub fn open(root: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(root)?;
        let layout = StoreLayout::new(root);
        let lock = DataDirLock::acquire(&layout.lock_file())?;
        layout.initialize(BackendKind::Hash)?;

        let table = DiskTable::new(layout.records_dir());
        let report = table.load_all::<TextRecord>()?;
        let mut last_id = read_counter(&layout)?;
        let mut hashes = BTreeMap::new();
        for (key, hash) in report.records {
            if let Ok(n) = key.parse::<u64>() {
                last_id = last_id.max(n);
            }
            hashes.insert(key, hash);
        }
        info!(
            "opened hash store at {}: {} records, {} skipped, last id {last_id}",
            root.display(),
            hashes.len(),
            report.skipped.len()
        );

        Ok(Self {
            state: RwLock::new(HashState { last_id, hashes }),
            persistence: Some(Persistence {
                layout,
                table,
                _lock: lock,
            }),
        })
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, HashState>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Unavailable("hash store lock poisoned".to_owned()))
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, HashState>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Unavailable("hash store lock poisoned".to_owned()))
    }

    fn persist_hash(&self, key: &str, hash: &TextRecord) -> Result<(), StoreError> {
        match &self.persistence {
            Some(p) => p.table.write(key, hash),
            None => Ok(()),
        }
    }

    fn persist_counter(&self, last_id: u64) -> Result<(), StoreError> {
        let Some(p) = &self.persistence else {
            return Ok(());
        };
        let content = serde_json::to_vec(&Counter { last_id })?;
        write_atomic(p.layout.root(), &p.layout.counter_file(), &content)
            .map_err(|e| StoreError::Unavailable(format!("writing counter: {e}")))
    }
}

fn read_counter(layout: &StoreLayout) -> Result<u64, StoreError> {
    let path = layout.counter_file();
    if !path.exists() {
        return Ok(0);
    }
    let counter: Counter = serde_json::from_str(&fs::read_to_string(path)?)?;
    Ok(counter.last_id)
}

fn encode(bike: &Bike) -> Result<TextRecord, StoreError> {
    let value = serde_json::to_value(bike).map_err(CodecError::from)?;
    Ok(encode_text(&flatten(&value)?, &BIKE_FLAT_SCHEMA)?)
}

fn decode(hash: &TextRecord) -> Result<Bike, StoreError> {
    let value = decode_text(hash, &BIKE_FLAT_SCHEMA)?;
    Ok(serde_json::from_value(value).map_err(CodecError::from)?)
}

fn available_flag(hash: &TextRecord) -> Result<bool, CodecError> {
    let raw = hash
        .get(AVAILABLE)
        .ok_or_else(|| CodecError::MissingField(AVAILABLE.to_owned()))?;
    match FieldType::Boolean.coerce(raw) {
        Some(serde_json::Value::Bool(b)) => Ok(b),
        _ => Err(CodecError::Coercion {
            path: AVAILABLE.to_owned(),
            expected: FieldType::Boolean,
            found: raw.clone(),
        }),
    }
}

impl ResourceStore for HashStore {
    fn backend(&self) -> BackendKind {
        BackendKind::Hash
    }

    fn create(&self, fields: &BikeFields) -> Result<BikeId, StoreError> {
        let mut state = self.write_state()?;
        let next = state.last_id + 1;
        let id = BikeId::new(next.to_string());
        let hash = encode(&Bike::new(id.clone(), fields.clone()))?;

        // The counter moves first: an id is never reissued even if the record write fails.
        self.persist_counter(next)?;
        state.last_id = next;
        self.persist_hash(&id, &hash)?;
        state.hashes.insert(id.as_str().to_owned(), hash);
        debug!("hash store: created {id}");
        Ok(id)
    }

    fn read(&self, id: &BikeId) -> Result<Bike, StoreError> {
        let state = self.read_state()?;
        let hash = state
            .hashes
            .get(id.as_str())
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        decode(hash)
    }

    fn exists(&self, id: &BikeId) -> Result<bool, StoreError> {
        Ok(self.read_state()?.hashes.contains_key(id.as_str()))
    }

    fn replace(&self, id: &BikeId, fields: &BikeFields) -> Result<Bike, StoreError> {
        let mut state = self.write_state()?;
        let existing = state
            .hashes
            .get(id.as_str())
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        let updated = decode(existing)?.replaced(fields.clone());
        let hash = encode(&updated)?;
        self.persist_hash(id, &hash)?;
        state.hashes.insert(id.as_str().to_owned(), hash);
        Ok(updated)
    }

    fn delete(&self, id: &BikeId) -> Result<(), StoreError> {
        let mut state = self.write_state()?;
        if !state.hashes.contains_key(id.as_str()) {
            return Err(StoreError::NotFound(id.clone()));
        }
        if let Some(p) = &self.persistence {
            p.table.remove(id)?;
        }
        state.hashes.remove(id.as_str());
        Ok(())
    }

    fn find_available(&self, filter: &Filter) -> Result<Vec<Bike>, StoreError> {
        let state = self.read_state()?;
        let mut candidates = Vec::new();
        for hash in state.hashes.values() {
            let value = decode_text(hash, &BIKE_FLAT_SCHEMA)?;
            if value.get(AVAILABLE) != Some(&serde_json::Value::Bool(true))
                || !filter.matches(&value, &BIKE_FLAT_SCHEMA)
            {
                continue;
            }
            candidates.push(serde_json::from_value(value).map_err(CodecError::from)?);
        }
        Ok(cheapest(candidates))
    }

    fn set_available_if(
        &self,
        id: &BikeId,
        expected: bool,
        new: bool,
    ) -> Result<CasOutcome, StoreError> {
        let mut state = self.write_state()?;
        let Some(hash) = state.hashes.get(id.as_str()) else {
            return Ok(CasOutcome::NoMatch);
        };
        if available_flag(hash)? != expected {
            return Ok(CasOutcome::NoMatch);
        }
        let mut updated = hash.clone();
        updated.insert(AVAILABLE.to_owned(), new.to_string());
        self.persist_hash(id, &updated)?;
        state.hashes.insert(id.as_str().to_owned(), updated);
        Ok(CasOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample_fields;
    use bikeshare_schema::OwnerId;

    #[test]
    fn ids_count_up_from_one() {
        let store = HashStore::in_memory();
        assert_eq!(store.create(&sample_fields(5.0)).unwrap(), "1");
        assert_eq!(store.create(&sample_fields(5.0)).unwrap(), "2");
    }

    #[test]
    fn create_then_read_is_available() {
        let store = HashStore::in_memory();
        let fields = sample_fields(5.0);
        let id = store.create(&fields).unwrap();
        let bike = store.read(&id).unwrap();
        assert_eq!(bike, Bike::new(id, fields));
    }

    #[test]
    fn hashes_hold_text_fields() {
        let store = HashStore::in_memory();
        let id = store.create(&sample_fields(5.0)).unwrap();
        let state = store.read_state().unwrap();
        let hash = &state.hashes[id.as_str()];
        assert_eq!(hash["available"], "true");
        assert_eq!(hash["hourlyCost"], "5.0");
        assert_eq!(hash["ownerUserId"], "1");
        assert_eq!(hash["type"], "road");
    }

    #[test]
    fn opaque_owner_is_rejected_before_write() {
        let store = HashStore::in_memory();
        let mut fields = sample_fields(5.0);
        fields.owner_user_id = OwnerId::Opaque("u1".to_owned());
        assert!(matches!(
            store.create(&fields),
            Err(StoreError::Codec(CodecError::Coercion { .. }))
        ));
        assert!(store.read_state().unwrap().hashes.is_empty());
    }

    #[test]
    fn corrupted_flag_is_a_codec_error() {
        let store = HashStore::in_memory();
        let id = store.create(&sample_fields(5.0)).unwrap();
        store
            .write_state()
            .unwrap()
            .hashes
            .get_mut(id.as_str())
            .unwrap()
            .insert("available".to_owned(), "yes".to_owned());

        assert!(matches!(store.read(&id), Err(StoreError::Codec(_))));
        assert!(matches!(
            store.set_available_if(&id, true, false),
            Err(StoreError::Codec(_))
        ));
    }

    #[test]
    fn conditional_write_checks_current_flag() {
        let store = HashStore::in_memory();
        let id = store.create(&sample_fields(5.0)).unwrap();
        assert_eq!(
            store.set_available_if(&id, false, true).unwrap(),
            CasOutcome::NoMatch
        );
        assert_eq!(
            store.set_available_if(&id, true, false).unwrap(),
            CasOutcome::Applied
        );
        assert!(!store.read(&id).unwrap().available);
        assert_eq!(
            store
                .set_available_if(&BikeId::new("99"), true, false)
                .unwrap(),
            CasOutcome::NoMatch
        );
    }

    #[test]
    fn replace_keeps_reservation_state() {
        let store = HashStore::in_memory();
        let id = store.create(&sample_fields(5.0)).unwrap();
        store.set_available_if(&id, true, false).unwrap();

        let updated = store.replace(&id, &sample_fields(9.0)).unwrap();
        assert_eq!(updated.id, id);
        assert!(!updated.available);
        assert_eq!(store.read(&id).unwrap(), updated);
    }

    #[test]
    fn persisted_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let store = HashStore::open(dir.path()).unwrap();
            let id = store.create(&sample_fields(5.0)).unwrap();
            store.set_available_if(&id, true, false).unwrap();
            let gone = store.create(&sample_fields(6.0)).unwrap();
            store.delete(&gone).unwrap();
            id
        };

        let store = HashStore::open(dir.path()).unwrap();
        assert!(!store.read(&id).unwrap().available);
        // Deleted id 2 must not be handed out again.
        assert_eq!(store.create(&sample_fields(7.0)).unwrap(), "3");
    }

    #[test]
    fn open_is_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let _first = HashStore::open(dir.path()).unwrap();
        assert!(matches!(
            HashStore::open(dir.path()),
            Err(StoreError::Locked(_))
        ));
    }
}
