//! Key-value storage backends for the scan record store.
//!
//! Values are opaque strings. [`MemoryBackend`] serves tests and
//! ephemeral sessions; [`FileBackend`] keeps one JSON file per key in a
//! directory.

use std::collections::HashMap;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

pub trait StorageBackend: Send + Sync {
    /// Value under `key`, or `None` when absent.
    fn get(&self, key: &str) -> io::Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> io::Result<()>;

    /// Removing an absent key is not an error.
    fn remove(&self, key: &str) -> io::Result<()>;

    /// Write `value` only if the current value equals `expected`
    /// (`None` meaning absent). Returns whether the write happened.
    fn compare_and_set(&self, key: &str, expected: Option<&str>, value: &str) -> io::Result<bool>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryBackend {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        Ok(lock(&self.values).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        lock(&self.values).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        lock(&self.values).remove(key);
        Ok(())
    }

    fn compare_and_set(&self, key: &str, expected: Option<&str>, value: &str) -> io::Result<bool> {
        let mut values = lock(&self.values);
        if values.get(key).map(String::as_str) != expected {
            return Ok(false);
        }
        values.insert(key.to_string(), value.to_string());
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

/// One `<key>.json` file per key under `dir`.
///
/// Writes go to a temporary file that is renamed into place, so readers
/// never observe a partial value. Compare-and-set is atomic among users of
/// the same `FileBackend`.
#[derive(Debug)]
pub struct FileBackend {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileBackend {
    /// Open (creating if needed) the directory at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        tracing::debug!(dir = %dir.display(), "Opened file storage backend");
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> io::Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!("invalid storage key '{key}'"),
            ));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }

    fn read(&self, path: &Path) -> io::Result<Option<String>> {
        match fs::read_to_string(path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, path: &Path, value: &str) -> io::Result<()> {
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, path)
    }
}

impl StorageBackend for FileBackend {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        self.read(&self.path(key)?)
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        let path = self.path(key)?;
        let _guard = lock(&self.write_lock);
        self.write(&path, value)
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        let path = self.path(key)?;
        let _guard = lock(&self.write_lock);
        match fs::remove_file(path) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    fn compare_and_set(&self, key: &str, expected: Option<&str>, value: &str) -> io::Result<bool> {
        let path = self.path(key)?;
        let _guard = lock(&self.write_lock);
        if self.read(&path)?.as_deref() != expected {
            return Ok(false);
        }
        self.write(&path, value)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(backend: &dyn StorageBackend) {
        assert_eq!(backend.get("history").unwrap(), None);

        backend.set("history", "[1]").unwrap();
        assert_eq!(backend.get("history").unwrap().as_deref(), Some("[1]"));

        assert!(!backend.compare_and_set("history", Some("[0]"), "[2]").unwrap());
        assert!(!backend.compare_and_set("history", None, "[2]").unwrap());
        assert!(backend.compare_and_set("history", Some("[1]"), "[2]").unwrap());
        assert_eq!(backend.get("history").unwrap().as_deref(), Some("[2]"));

        backend.remove("history").unwrap();
        backend.remove("history").unwrap();
        assert_eq!(backend.get("history").unwrap(), None);
        assert!(backend.compare_and_set("history", None, "[3]").unwrap());
    }

    #[test]
    fn memory_backend_semantics() {
        exercise(&MemoryBackend::new());
    }

    #[test]
    fn file_backend_semantics() {
        let dir = tempfile::tempdir().unwrap();
        exercise(&FileBackend::new(dir.path()).unwrap());
    }

    #[test]
    fn file_backend_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        FileBackend::new(dir.path())
            .unwrap()
            .set("skinscan_current", "{}")
            .unwrap();

        let reopened = FileBackend::new(dir.path()).unwrap();
        assert_eq!(reopened.get("skinscan_current").unwrap().as_deref(), Some("{}"));
        assert!(dir.path().join("skinscan_current.json").exists());
    }

    #[test]
    fn file_backend_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path()).unwrap();
        for key in ["", "../escape", "a/b", "x.json"] {
            let err = backend.set(key, "v").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput, "key {key:?}");
        }
    }
}
