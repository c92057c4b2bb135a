// pixform/src/batch/storage.rs
use crate::core::{PipelineError, Result};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use walkdir::WalkDir;

/// Location layer used by the batch coordinator.
///
/// Locations are opaque strings. Keys are relative to their location and use
/// `/` as the separator.
pub trait Storage: Send + Sync {
    fn list(&self, location: &str) -> Result<Vec<String>>;
    fn get(&self, location: &str, key: &str) -> Result<Vec<u8>>;
    fn put(&self, location: &str, key: &str, data: &[u8]) -> Result<()>;
}

/// Local filesystem storage. Locations are directories, optionally written
/// as `file://` URLs.
#[derive(Debug, Default, Clone)]
pub struct FsStorage;

impl FsStorage {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(&self, location: &str) -> PathBuf {
        PathBuf::from(location.strip_prefix("file://").unwrap_or(location))
    }

    fn key_path(&self, location: &str, key: &str) -> Result<PathBuf> {
        if key.split('/').any(|part| part == "..") || Path::new(key).is_absolute() {
            return Err(PipelineError::InvalidLocation(format!(
                "Path traversal detected in key: {}",
                key
            )));
        }
        Ok(self.resolve(location).join(key))
    }
}

impl Storage for FsStorage {
    fn list(&self, location: &str) -> Result<Vec<String>> {
        let root = self.resolve(location);
        if !root.is_dir() {
            return Err(PipelineError::StorageUnavailable(format!(
                "Input directory does not exist: {}",
                root.display()
            )));
        }

        let mut keys = Vec::new();
        for entry in WalkDir::new(&root).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                PipelineError::StorageUnavailable(format!("Failed to list {}: {}", root.display(), e))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(&root) else {
                continue;
            };
            let key: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            keys.push(key.join("/"));
        }

        Ok(keys)
    }

    fn get(&self, location: &str, key: &str) -> Result<Vec<u8>> {
        let path = self.key_path(location, key)?;
        std::fs::read(&path).map_err(|e| {
            PipelineError::StorageUnavailable(format!("Failed to read {}: {}", path.display(), e))
        })
    }

    fn put(&self, location: &str, key: &str, data: &[u8]) -> Result<()> {
        let path = self.key_path(location, key)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, data).map_err(|e| {
            PipelineError::StorageUnavailable(format!("Failed to write {}: {}", path.display(), e))
        })
    }
}

/// In-process storage with fault injection, keyed by `(location, key)`.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    objects: Mutex<BTreeMap<(String, String), Vec<u8>>>,
    unreachable: Mutex<HashSet<String>>,
    failing_keys: Mutex<HashSet<String>>,
    read_delay: Mutex<Option<Duration>>,
    write_delay: Mutex<Option<Duration>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, location: &str, key: &str, data: Vec<u8>) {
        lock(&self.objects).insert((location.to_string(), key.to_string()), data);
    }

    pub fn object(&self, location: &str, key: &str) -> Option<Vec<u8>> {
        lock(&self.objects)
            .get(&(location.to_string(), key.to_string()))
            .cloned()
    }

    /// Makes `list` on `location` fail.
    pub fn make_unreachable(&self, location: &str) {
        lock(&self.unreachable).insert(location.to_string());
    }

    /// Makes `get` and `put` fail for `key` in every location.
    pub fn fail_key(&self, key: &str) {
        lock(&self.failing_keys).insert(key.to_string());
    }

    /// Every `get` sleeps this long before answering.
    pub fn set_read_delay(&self, delay: Duration) {
        *lock(&self.read_delay) = Some(delay);
    }

    /// Every `put` sleeps this long before storing.
    pub fn set_write_delay(&self, delay: Duration) {
        *lock(&self.write_delay) = Some(delay);
    }

    fn check_key(&self, key: &str) -> Result<()> {
        if lock(&self.failing_keys).contains(key) {
            return Err(PipelineError::StorageUnavailable(format!(
                "injected failure for {}",
                key
            )));
        }
        Ok(())
    }
}

impl Storage for MemoryStorage {
    fn list(&self, location: &str) -> Result<Vec<String>> {
        if lock(&self.unreachable).contains(location) {
            return Err(PipelineError::StorageUnavailable(format!(
                "location unreachable: {}",
                location
            )));
        }

        Ok(lock(&self.objects)
            .keys()
            .filter(|(loc, _)| loc == location)
            .map(|(_, key)| key.clone())
            .collect())
    }

    fn get(&self, location: &str, key: &str) -> Result<Vec<u8>> {
        let delay = *lock(&self.read_delay);
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        self.check_key(key)?;

        self.object(location, key).ok_or_else(|| {
            PipelineError::StorageUnavailable(format!("no object {} in {}", key, location))
        })
    }

    fn put(&self, location: &str, key: &str, data: &[u8]) -> Result<()> {
        let delay = *lock(&self.write_delay);
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        self.check_key(key)?;
        self.insert(location, key, data.to_vec());
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fs_storage_lists_relative_keys_in_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("b.png"), b"b").unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"a").unwrap();
        std::fs::write(dir.path().join("nested/c.png"), b"c").unwrap();

        let storage = FsStorage::new();
        let location = format!("file://{}", dir.path().display());
        let keys = storage.list(&location).unwrap();

        assert_eq!(keys, vec!["a.jpg", "b.png", "nested/c.png"]);
        assert_eq!(storage.get(&location, "nested/c.png").unwrap(), b"c");
    }

    #[test]
    fn test_fs_storage_put_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsStorage::new();
        let location = dir.path().to_string_lossy().into_owned();

        storage.put(&location, "deep/er/out.png", b"data").unwrap();
        assert_eq!(std::fs::read(dir.path().join("deep/er/out.png")).unwrap(), b"data");
    }

    #[test]
    fn test_fs_storage_rejects_traversal_and_missing_dirs() {
        let storage = FsStorage::new();
        assert!(matches!(
            storage.get("/tmp", "../etc/passwd"),
            Err(PipelineError::InvalidLocation(_))
        ));
        assert!(matches!(
            storage.list("/definitely/not/here"),
            Err(PipelineError::StorageUnavailable(_))
        ));
    }

    #[test]
    fn test_memory_storage_faults() {
        let storage = MemoryStorage::new();
        storage.insert("in", "x.png", vec![1]);
        storage.insert("other", "y.png", vec![2]);

        assert_eq!(storage.list("in").unwrap(), vec!["x.png"]);

        storage.fail_key("x.png");
        assert!(storage.get("in", "x.png").is_err());

        storage.make_unreachable("in");
        assert!(matches!(
            storage.list("in"),
            Err(PipelineError::StorageUnavailable(_))
        ));
    }
}
