use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use tandem_core::{Error, Result};

use crate::store::SettingsStore;

/// Settings persisted as JSON files under a base directory: `global.json`
/// for the global scope, `<client_id>.json` for the local scope.
pub struct JsonFileStore {
    base_dir: PathBuf,
    client_id: String,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(base_dir: impl Into<PathBuf>, client_id: &str) -> Self {
        Self {
            base_dir: base_dir.into(),
            client_id: client_id.to_string(),
            write_lock: Mutex::new(()),
        }
    }

    /// Store rooted in the user data directory, the usual place for a real
    /// client; falls back to the current directory when none exists.
    pub fn in_user_dir(client_id: &str) -> Self {
        let base = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tandem");
        Self::new(base, client_id)
    }

    fn scope_path(&self, global: bool) -> PathBuf {
        if global {
            self.base_dir.join("global.json")
        } else {
            self.base_dir.join(format!("{}.json", self.client_id))
        }
    }

    fn load(path: &Path) -> HashMap<String, Value> {
        match fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(map) => map,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "settings file unreadable, starting empty");
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        }
    }
}

#[async_trait]
impl SettingsStore for JsonFileStore {
    async fn get(&self, key: &str, global: bool) -> Result<Option<Value>> {
        let path = self.scope_path(global);
        Ok(Self::load(&path).remove(key))
    }

    async fn set(&self, key: &str, value: Value, global: bool) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| Error::Storage("settings write lock poisoned".to_string()))?;
        let path = self.scope_path(global);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut map = Self::load(&path);
        map.insert(key.to_string(), value);
        fs::write(&path, serde_json::to_string_pretty(&map)?)?;
        Ok(())
    }
}
