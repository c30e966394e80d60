use crate::StoreError;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;

/// Exclusive advisory lock on a data directory, held for the life of a store.
pub struct DataDirLock {
    lock_file: File,
}

impl DataDirLock {
    /// Take the lock without waiting; a held lock is [`StoreError::Locked`].
    pub fn acquire(lock_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(lock_path)?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self { lock_file: file }),
            Err(_) => Err(StoreError::Locked(lock_path.to_path_buf())),
        }
    }
}

impl Drop for DataDirLock {
    fn drop(&mut self) {
        let _ = self.lock_file.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_acquire_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("test.lock");

        {
            let _lock = DataDirLock::acquire(&lock_path).unwrap();
            assert!(lock_path.exists());
        }
    }

    #[test]
    fn second_acquire_fails_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("test.lock");

        let _lock = DataDirLock::acquire(&lock_path).unwrap();
        assert!(matches!(
            DataDirLock::acquire(&lock_path),
            Err(StoreError::Locked(_))
        ));
    }

    #[test]
    fn lock_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("test.lock");

        {
            let _lock = DataDirLock::acquire(&lock_path).unwrap();
        }

        assert!(DataDirLock::acquire(&lock_path).is_ok());
    }
}
