use serde::{Deserialize, Serialize};

/// Default replay delay bound when no persisted value exists.
pub const DEFAULT_MAX_DELAY_MS: u64 = 1000;

/// Upper bound for the jitter applied to navigation/reload commands, so a
/// fleet of followers does not hit the target server in the same instant.
pub const NAVIGATION_JITTER_MS: u64 = 7000;

/// Storage key for the persisted master flag (global scope).
pub const KEY_IS_MASTER: &str = "isMaster";

/// Storage key for the persisted replay delay bound (global scope).
pub const KEY_MAX_DELAY: &str = "maxDelayMs";

/// Static configuration for one client joining a replication session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// Module namespace the pub/sub event names are scoped by.
    #[serde(default = "default_module")]
    pub module: String,
    /// Replay delay bound used until a persisted or broadcast value arrives.
    #[serde(default = "default_max_delay_ms")]
    pub default_max_delay_ms: u64,
}

fn default_module() -> String {
    "TOOLS".to_string()
}

fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            module: default_module(),
            default_max_delay_ms: default_max_delay_ms(),
        }
    }
}
