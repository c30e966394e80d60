//! One-file-per-record persistence with atomic replacement and checksums.

use crate::{fsync_dir, StoreError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::warn;

#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    body: T,
    /// blake3 over the compact JSON of `body`.
    checksum: String,
}

fn checksum<T: Serialize>(body: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(body)?;
    Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
}

/// Write `content` to `dest` via a synced temp file and rename.
pub(crate) fn write_atomic(dir: &Path, dest: &Path, content: &[u8]) -> Result<(), std::io::Error> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| e.error)?;
    fsync_dir(dir)
}

/// Records loaded from disk, plus the names of files that failed verification.
#[derive(Debug)]
pub struct LoadReport<T> {
    pub records: Vec<(String, T)>,
    pub skipped: Vec<String>,
}

/// A directory of checksummed JSON records keyed by file name.
///
/// Write failures surface as [`StoreError::Unavailable`]: once the disk refuses
/// a write the store can no longer promise durability.
#[derive(Debug, Clone)]
pub struct DiskTable {
    dir: PathBuf,
}

impl DiskTable {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    pub fn write<T: Serialize>(&self, key: &str, body: &T) -> Result<(), StoreError> {
        let envelope = Envelope {
            checksum: checksum(body)?,
            body,
        };
        let content = serde_json::to_vec_pretty(&envelope)?;
        write_atomic(&self.dir, &self.path(key), &content)
            .map_err(|e| StoreError::Unavailable(format!("writing record {key}: {e}")))
    }

    pub fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path(key);
        if path.exists() {
            fs::remove_file(&path)
                .and_then(|()| fsync_dir(&self.dir))
                .map_err(|e| StoreError::Unavailable(format!("removing record {key}: {e}")))?;
        }
        Ok(())
    }

    /// Read every record. Files that do not parse or whose checksum does not
    /// match are skipped with a warning and reported, never served.
    pub fn load_all<T: Serialize + DeserializeOwned>(&self) -> Result<LoadReport<T>, StoreError> {
        let mut report = LoadReport {
            records: Vec::new(),
            skipped: Vec::new(),
        };
        if !self.dir.exists() {
            return Ok(report);
        }
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(key) = name.strip_suffix(".json") else {
                continue;
            };
            match Self::load_one::<T>(&entry.path()) {
                Ok(body) => report.records.push((key.to_owned(), body)),
                Err(reason) => {
                    warn!("skipping unreadable record '{name}': {reason}");
                    report.skipped.push(name.clone());
                }
            }
        }
        report.records.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(report)
    }

    fn load_one<T: Serialize + DeserializeOwned>(path: &Path) -> Result<T, String> {
        let content = fs::read_to_string(path).map_err(|e| e.to_string())?;
        let envelope: Envelope<T> = serde_json::from_str(&content).map_err(|e| e.to_string())?;
        let actual = checksum(&envelope.body).map_err(|e| e.to_string())?;
        if actual != envelope.checksum {
            return Err(format!(
                "checksum mismatch: expected {}, got {actual}",
                envelope.checksum
            ));
        }
        Ok(envelope.body)
    }
}
