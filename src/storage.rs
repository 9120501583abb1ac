use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

pub const TASKS_KEY: &str = "tasks-app-tasks";
pub const ACTIVITY_KEY: &str = "tasks-app-activity";
pub const SETTINGS_KEY: &str = "tasks-app-settings";

const ITEM_EXTENSION: &str = "json";

#[derive(Debug)]
pub enum StorageError {
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Io(err) => write!(f, "io error: {err}"),
            StorageError::Json(err) => write!(f, "json error: {err}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(value: std::io::Error) -> Self {
        StorageError::Io(value)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(value: serde_json::Error) -> Self {
        StorageError::Json(value)
    }
}

/// Key/value persistence over a directory: each key is one JSON document.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ensure_dirs(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    /// Reads `key`, falling back to `default` when it is missing or unreadable.
    pub fn get_item<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        let path = self.item_path(key);
        if !path.exists() {
            return default;
        }
        match self.load_json(&path) {
            Ok(value) => value,
            Err(error) => {
                log::warn!("storage read failed key={key} error={error}");
                default
            }
        }
    }

    pub fn has_item(&self, key: &str) -> bool {
        self.item_path(key).is_file()
    }

    pub fn set_item<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        self.ensure_dirs()?;
        self.write_atomic(self.item_path(key), value)
            .inspect_err(|error| log::error!("storage write failed key={key} error={error}"))
    }

    pub fn remove_item(&self, key: &str) {
        let path = self.item_path(key);
        if !path.exists() {
            return;
        }
        if let Err(error) = fs::remove_file(&path) {
            log::warn!("storage remove failed key={key} error={error}");
        }
    }

    /// Removes every stored item; unrelated files in the directory are left alone.
    pub fn clear(&self) {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return,
            Err(error) => {
                log::warn!("storage clear failed error={error}");
                return;
            }
        };
        for entry in entries.filter_map(|entry| entry.ok()) {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(ITEM_EXTENSION) {
                continue;
            }
            if let Err(error) = fs::remove_file(&path) {
                log::warn!("storage clear failed path={} error={error}", path.display());
            }
        }
    }

    fn item_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.{ITEM_EXTENSION}"))
    }

    fn load_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T, StorageError> {
        let mut file = File::open(path)?;
        let mut buf = String::new();
        file.read_to_string(&mut buf)?;
        Ok(serde_json::from_str(&buf)?)
    }

    fn write_atomic<T: Serialize>(&self, path: PathBuf, data: &T) -> Result<(), StorageError> {
        let temp_path = path.with_extension("tmp");
        let json = serde_json::to_vec_pretty(data)?;
        {
            let mut file = File::create(&temp_path)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(temp_path, path)?;
        Ok(())
    }
}

/// Writes raw bytes next to their final location and renames them into place.
pub fn write_atomic_bytes(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let tmp = path.with_extension("tmp");
    fs::create_dir_all(
        path.parent()
            .ok_or_else(|| StorageError::Io(std::io::Error::other("invalid output path")))?,
    )?;
    fs::write(&tmp, bytes)?;
    fs::rename(tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    fn sample() -> Sample {
        Sample {
            name: "a".to_string(),
            count: 3,
        }
    }

    #[test]
    fn get_item_returns_default_for_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().to_path_buf());
        let value: Vec<u32> = storage.get_item(TASKS_KEY, vec![1, 2]);
        assert_eq!(value, vec![1, 2]);
        assert!(!storage.has_item(TASKS_KEY));
    }

    #[test]
    fn set_then_get_returns_stored_value() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().join("nested"));
        storage.set_item(SETTINGS_KEY, &sample()).unwrap();
        assert!(storage.has_item(SETTINGS_KEY));
        let loaded: Sample = storage.get_item(
            SETTINGS_KEY,
            Sample {
                name: String::new(),
                count: 0,
            },
        );
        assert_eq!(loaded, sample());
        // No temp file is left behind.
        assert!(!dir.path().join("nested").join("tasks-app-settings.tmp").exists());
    }

    #[test]
    fn get_item_falls_back_to_default_on_parse_failure() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().to_path_buf());
        fs::write(dir.path().join("tasks-app-tasks.json"), b"{not json").unwrap();
        let value: Vec<u32> = storage.get_item(TASKS_KEY, Vec::new());
        assert!(value.is_empty());
        // The key still exists even though it could not be parsed.
        assert!(storage.has_item(TASKS_KEY));
    }

    #[test]
    fn set_item_propagates_write_failures() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().to_path_buf());
        // A directory in place of the target file makes the final rename fail.
        fs::create_dir_all(dir.path().join("tasks-app-tasks.json")).unwrap();
        let result = storage.set_item(TASKS_KEY, &vec![1u32]);
        assert!(matches!(result, Err(StorageError::Io(_))));

        let blocked = tempfile::tempdir().unwrap();
        let file_root = blocked.path().join("file");
        fs::write(&file_root, b"x").unwrap();
        let storage = Storage::new(file_root);
        assert!(storage.set_item(TASKS_KEY, &vec![1u32]).is_err());
    }

    #[test]
    fn remove_item_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().to_path_buf());
        storage.set_item(TASKS_KEY, &vec![1u32]).unwrap();
        storage.set_item(ACTIVITY_KEY, &vec![2u32]).unwrap();
        storage.set_item(SETTINGS_KEY, &sample()).unwrap();
        fs::write(dir.path().join("taskboard.log"), b"keep").unwrap();

        storage.remove_item(TASKS_KEY);
        assert!(!storage.has_item(TASKS_KEY));
        // Removing a missing key is a no-op.
        storage.remove_item(TASKS_KEY);

        storage.clear();
        assert!(!storage.has_item(ACTIVITY_KEY));
        assert!(!storage.has_item(SETTINGS_KEY));
        assert!(dir.path().join("taskboard.log").exists());

        // Clearing a directory that does not exist is a no-op.
        Storage::new(dir.path().join("missing")).clear();
    }

    #[test]
    fn write_atomic_bytes_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exports").join("out.csv");
        write_atomic_bytes(&path, b"a;b").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"a;b");
    }
}
