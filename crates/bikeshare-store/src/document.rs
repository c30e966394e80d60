use crate::disk::DiskTable;
use crate::layout::{BackendKind, StoreLayout};
use crate::lock::DataDirLock;
use crate::query::cheapest;
use crate::{CasOutcome, ResourceStore, StoreError};
use bikeshare_schema::{
    Bike, BikeFields, BikeId, CodecError, FieldType, Filter, BIKE_DOCUMENT_SCHEMA,
};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

const AVAILABLE: &str = "available";

/// Generator for 12-byte object ids rendered as 24 hex characters:
/// 4 bytes of seconds since the epoch, 5 bytes fixed per process, 3 bytes of
/// a wrapping counter.
struct ObjectIdGenerator {
    process: [u8; 5],
    counter: AtomicU32,
}

impl ObjectIdGenerator {
    fn new() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos());
        let seed = blake3::hash(format!("{}:{nanos}", std::process::id()).as_bytes());
        let bytes = seed.as_bytes();
        let mut process = [0u8; 5];
        process.copy_from_slice(&bytes[..5]);
        let start = u32::from_be_bytes([0, bytes[5], bytes[6], bytes[7]]);
        Self {
            process,
            counter: AtomicU32::new(start),
        }
    }

    fn next(&self) -> BikeId {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs() as u32);
        let count = self.counter.fetch_add(1, Ordering::Relaxed) & 0x00ff_ffff;

        let mut raw = [0u8; 12];
        raw[..4].copy_from_slice(&secs.to_be_bytes());
        raw[4..9].copy_from_slice(&self.process);
        raw[9..].copy_from_slice(&count.to_be_bytes()[1..]);

        let mut hex = String::with_capacity(24);
        for b in raw {
            let _ = write!(hex, "{b:02x}");
        }
        BikeId::new(hex)
    }
}

/// Document backend: bikes are native JSON documents keyed by object id.
///
/// Values keep their JSON types, so reads need no coercion. Listings run as a
/// query over the documents: filter, sort by cost, limit.
pub struct DocumentStore {
    docs: RwLock<BTreeMap<String, Value>>,
    ids: ObjectIdGenerator,
    persistence: Option<(DiskTable, DataDirLock)>,
}

impl DocumentStore {
    pub fn in_memory() -> Self {
        Self {
            docs: RwLock::new(BTreeMap::new()),
            ids: ObjectIdGenerator::new(),
            persistence: None,
        }
    }

    /// Open (or create) a document store rooted at `root`, holding its directory lock.
    pub fn open(root: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(root)?;
        let layout = StoreLayout::new(root);
        let lock = DataDirLock::acquire(&layout.lock_file())?;
        layout.initialize(BackendKind::Document)?;

        let table = DiskTable::new(layout.records_dir());
        let report = table.load_all::<Value>()?;
        let docs: BTreeMap<String, Value> = report.records.into_iter().collect();
        info!(
            "opened document store at {}: {} documents, {} skipped",
            root.display(),
            docs.len(),
            report.skipped.len()
        );

        Ok(Self {
            docs: RwLock::new(docs),
            ids: ObjectIdGenerator::new(),
            persistence: Some((table, lock)),
        })
    }

    fn read_docs(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, Value>>, StoreError> {
        self.docs
            .read()
            .map_err(|_| StoreError::Unavailable("document store lock poisoned".to_owned()))
    }

    fn write_docs(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, Value>>, StoreError> {
        self.docs
            .write()
            .map_err(|_| StoreError::Unavailable("document store lock poisoned".to_owned()))
    }

    fn persist(&self, key: &str, doc: &Value) -> Result<(), StoreError> {
        match &self.persistence {
            Some((table, _)) => table.write(key, doc),
            None => Ok(()),
        }
    }
}

fn to_document(bike: &Bike) -> Result<Value, StoreError> {
    Ok(serde_json::to_value(bike).map_err(CodecError::from)?)
}

fn from_document(doc: &Value) -> Result<Bike, StoreError> {
    Ok(Bike::deserialize(doc).map_err(CodecError::from)?)
}

fn available_flag(doc: &Value) -> Result<bool, CodecError> {
    match doc.get(AVAILABLE) {
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(CodecError::Coercion {
            path: AVAILABLE.to_owned(),
            expected: FieldType::Boolean,
            found: other.to_string(),
        }),
        None => Err(CodecError::MissingField(AVAILABLE.to_owned())),
    }
}

impl ResourceStore for DocumentStore {
    fn backend(&self) -> BackendKind {
        BackendKind::Document
    }

    fn create(&self, fields: &BikeFields) -> Result<BikeId, StoreError> {
        let mut docs = self.write_docs()?;
        let mut id = self.ids.next();
        while docs.contains_key(id.as_str()) {
            id = self.ids.next();
        }
        let doc = to_document(&Bike::new(id.clone(), fields.clone()))?;
        self.persist(&id, &doc)?;
        docs.insert(id.as_str().to_owned(), doc);
        debug!("document store: created {id}");
        Ok(id)
    }

    fn read(&self, id: &BikeId) -> Result<Bike, StoreError> {
        let docs = self.read_docs()?;
        let doc = docs
            .get(id.as_str())
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        from_document(doc)
    }

    fn exists(&self, id: &BikeId) -> Result<bool, StoreError> {
        Ok(self.read_docs()?.contains_key(id.as_str()))
    }

    fn replace(&self, id: &BikeId, fields: &BikeFields) -> Result<Bike, StoreError> {
        let mut docs = self.write_docs()?;
        let existing = docs
            .get(id.as_str())
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        let updated = from_document(existing)?.replaced(fields.clone());
        let doc = to_document(&updated)?;
        self.persist(id, &doc)?;
        docs.insert(id.as_str().to_owned(), doc);
        Ok(updated)
    }

    fn delete(&self, id: &BikeId) -> Result<(), StoreError> {
        let mut docs = self.write_docs()?;
        if !docs.contains_key(id.as_str()) {
            return Err(StoreError::NotFound(id.clone()));
        }
        if let Some((table, _)) = &self.persistence {
            table.remove(id)?;
        }
        docs.remove(id.as_str());
        Ok(())
    }

    fn find_available(&self, filter: &Filter) -> Result<Vec<Bike>, StoreError> {
        let docs = self.read_docs()?;
        let candidates = docs
            .values()
            .filter(|doc| doc.get(AVAILABLE) == Some(&Value::Bool(true)))
            .filter(|doc| filter.matches(doc, &BIKE_DOCUMENT_SCHEMA))
            .map(from_document)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(cheapest(candidates))
    }

    fn set_available_if(
        &self,
        id: &BikeId,
        expected: bool,
        new: bool,
    ) -> Result<CasOutcome, StoreError> {
        let mut docs = self.write_docs()?;
        let Some(doc) = docs.get(id.as_str()) else {
            return Ok(CasOutcome::NoMatch);
        };
        if available_flag(doc)? != expected {
            return Ok(CasOutcome::NoMatch);
        }
        let mut updated = doc.clone();
        updated[AVAILABLE] = Value::Bool(new);
        self.persist(id, &updated)?;
        docs.insert(id.as_str().to_owned(), updated);
        Ok(CasOutcome::Applied)
    }
}
