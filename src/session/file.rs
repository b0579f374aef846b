//! JSON-file backend: one flat JSON object per store file.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::{KvBackend, SessionError};

/// Durable backend persisting the whole map to a single JSON file,
/// written through on every mutation.
pub struct FileBackend {
    path: PathBuf,
    map: BTreeMap<String, String>,
}

impl FileBackend {
    /// Open (or create) the store file at `path`.
    ///
    /// Unreadable or corrupt files start the session empty rather than
    /// failing - the store is a cache of editing state, not a database.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let map = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(map) => map,
                Err(e) => {
                    crate::debug!("session"; "ignoring corrupt store {}: {}", path.display(), e);
                    BTreeMap::new()
                }
            },
            Err(_) => BTreeMap::new(),
        };

        Ok(Self { path, map })
    }

    fn flush(&self) -> Result<(), SessionError> {
        let json = serde_json::to_string_pretty(&self.map)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

impl KvBackend for FileBackend {
    fn get(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), SessionError> {
        self.map.insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<(), SessionError> {
        if self.map.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.map
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect()
    }

    fn snapshot(&self) -> Vec<(String, String)> {
        self.map
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
