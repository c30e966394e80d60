use crate::disk::write_atomic;
use crate::StoreError;
use bikeshare_schema::Variant;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Current on-disk format version. Incremented on incompatible layout changes.
pub const STORE_FORMAT_VERSION: u32 = 1;
const VERSION_FILE: &str = "version";

/// Storage shape of a data directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Hash,
    Document,
}

impl BackendKind {
    pub fn for_variant(variant: Variant) -> Self {
        if variant.is_flat() {
            BackendKind::Hash
        } else {
            BackendKind::Document
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Hash => write!(f, "hash"),
            BackendKind::Document => write!(f, "document"),
        }
    }
}

/// Directory layout of a bikeshare data directory.
///
/// Records live one file each under `records/`, the hash store's identifier
/// counter in `counter`. Subdirectories are created on [`initialize`](Self::initialize).
#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreVersion {
    format_version: u32,
    backend: BackendKind,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn records_dir(&self) -> PathBuf {
        self.root.join("records")
    }

    #[inline]
    pub fn counter_file(&self) -> PathBuf {
        self.root.join("counter")
    }

    #[inline]
    pub fn lock_file(&self) -> PathBuf {
        self.root.join(".lock")
    }

    pub fn initialize(&self, backend: BackendKind) -> Result<(), StoreError> {
        fs::create_dir_all(self.records_dir())?;

        let version_path = self.root.join(VERSION_FILE);
        if version_path.exists() {
            self.verify_version(backend)?;
        } else {
            let ver = StoreVersion {
                format_version: STORE_FORMAT_VERSION,
                backend,
            };
            let content = serde_json::to_vec_pretty(&ver)?;
            write_atomic(&self.root, &version_path, &content)?;
        }

        Ok(())
    }

    pub fn verify_version(&self, backend: BackendKind) -> Result<(), StoreError> {
        let version_path = self.root.join(VERSION_FILE);
        let content = fs::read_to_string(&version_path)?;
        let ver: StoreVersion = serde_json::from_str(&content)?;

        if ver.format_version != STORE_FORMAT_VERSION {
            return Err(StoreError::VersionMismatch {
                expected: STORE_FORMAT_VERSION,
                found: ver.format_version,
            });
        }
        if ver.backend != backend {
            return Err(StoreError::BackendMismatch {
                expected: backend,
                found: ver.backend,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths_are_correct() {
        let layout = StoreLayout::new("/tmp/bikeshare-test");
        assert_eq!(
            layout.records_dir(),
            PathBuf::from("/tmp/bikeshare-test/records")
        );
        assert_eq!(
            layout.counter_file(),
            PathBuf::from("/tmp/bikeshare-test/counter")
        );
        assert_eq!(layout.lock_file(), PathBuf::from("/tmp/bikeshare-test/.lock"));
    }

    #[test]
    fn initialize_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        layout.initialize(BackendKind::Hash).unwrap();
        layout.initialize(BackendKind::Hash).unwrap();
        assert!(layout.records_dir().is_dir());
        layout.verify_version(BackendKind::Hash).unwrap();
    }

    #[test]
    fn initialize_writes_version_marker_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        layout.initialize(BackendKind::Document).unwrap();

        let content = fs::read_to_string(dir.path().join(VERSION_FILE)).unwrap();
        let ver: StoreVersion = serde_json::from_str(&content).unwrap();
        assert_eq!(ver.format_version, STORE_FORMAT_VERSION);
        assert_eq!(ver.backend, BackendKind::Document);

        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["records".to_owned(), VERSION_FILE.to_owned()]);
    }

    #[test]
    fn initialize_rejects_other_backend() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        layout.initialize(BackendKind::Document).unwrap();
        assert!(matches!(
            layout.initialize(BackendKind::Hash),
            Err(StoreError::BackendMismatch { .. })
        ));
    }

    #[test]
    fn variants_share_hash_backend() {
        assert_eq!(BackendKind::for_variant(Variant::Hash), BackendKind::Hash);
        assert_eq!(
            BackendKind::for_variant(Variant::ValidatedHash),
            BackendKind::Hash
        );
        assert_eq!(
            BackendKind::for_variant(Variant::Document),
            BackendKind::Document
        );
    }
}
