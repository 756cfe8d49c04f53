use async_trait::async_trait;
use serde_json::Value;

use tandem_core::Result;

/// Key-value settings persistence for one client identity.
///
/// The global scope survives reconnects and page reloads and holds the
/// session-relevant settings (`isMaster`, `maxDelayMs`); the local scope is
/// free for collaborator modules. Persistence is eventual: a crash between a
/// state mutation and `set` completing loses the update, which is acceptable
/// because settings are re-broadcast opportunistically.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, key: &str, global: bool) -> Result<Option<Value>>;

    async fn set(&self, key: &str, value: Value, global: bool) -> Result<()>;

    /// `get` with a default, swallowing storage errors: a client must come
    /// up even when its settings file is unreadable.
    async fn get_or(&self, key: &str, default: Value, global: bool) -> Value {
        match self.get(key, global).await {
            Ok(Some(value)) => value,
            Ok(None) => default,
            Err(e) => {
                tracing::warn!(key, error = %e, "settings read failed, using default");
                default
            }
        }
    }
}
