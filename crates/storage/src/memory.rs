use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use tandem_core::Result;

use crate::store::SettingsStore;

/// In-memory settings store, for tests and throwaway sessions.
#[derive(Default)]
pub struct MemoryStore {
    global: Mutex<HashMap<String, Value>>,
    local: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get(&self, key: &str, global: bool) -> Result<Option<Value>> {
        let map = if global { &self.global } else { &self.local };
        Ok(map.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value, global: bool) -> Result<()> {
        let map = if global { &self.global } else { &self.local };
        map.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }
}
