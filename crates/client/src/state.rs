use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Whether this client drives the session or follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Master,
    Follower,
}

impl Role {
    pub fn is_master(self) -> bool {
        matches!(self, Role::Master)
    }

    pub fn from_is_master(is_master: bool) -> Self {
        if is_master {
            Role::Master
        } else {
            Role::Follower
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Master => "master",
            Role::Follower => "follower",
        }
    }
}

/// Session-scoped mutable state for one client, injected into every
/// component that needs it instead of living in ambient globals.
///
/// The atomics are for Send-across-await, not for cross-client concurrency:
/// all mutation happens on this client's own dispatcher and drain loop.
pub struct SessionState {
    client_id: String,
    master: AtomicBool,
    max_delay_ms: AtomicU64,
    /// Set while the replay queue is applying an action; the capture
    /// filter's defense-in-depth discard.
    replay_executing: AtomicBool,
}

impl SessionState {
    pub fn new(client_id: &str, default_max_delay_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            client_id: client_id.to_string(),
            master: AtomicBool::new(false),
            max_delay_ms: AtomicU64::new(default_max_delay_ms),
            replay_executing: AtomicBool::new(false),
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn role(&self) -> Role {
        Role::from_is_master(self.is_master())
    }

    pub fn set_role(&self, role: Role) {
        self.master.store(role.is_master(), Ordering::SeqCst);
    }

    pub fn is_master(&self) -> bool {
        self.master.load(Ordering::SeqCst)
    }

    pub fn max_delay_ms(&self) -> u64 {
        self.max_delay_ms.load(Ordering::SeqCst)
    }

    pub fn set_max_delay_ms(&self, ms: u64) {
        self.max_delay_ms.store(ms, Ordering::SeqCst);
    }

    pub fn replay_executing(&self) -> bool {
        self.replay_executing.load(Ordering::SeqCst)
    }

    pub fn set_replay_executing(&self, executing: bool) {
        self.replay_executing.store(executing, Ordering::SeqCst);
    }
}
