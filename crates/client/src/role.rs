use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use tandem_core::config::{KEY_IS_MASTER, KEY_MAX_DELAY};
use tandem_storage::SettingsStore;

use crate::state::{Role, SessionState};
use crate::ui::UiHandle;

/// Master-role arbitration for one client: explicit toggles plus the
/// restore-on-connect path. Persistence is best effort — a failed write
/// leaves the in-memory role authoritative until the next write.
pub struct RoleController {
    state: Arc<SessionState>,
    storage: Arc<dyn SettingsStore>,
    ui: Arc<dyn UiHandle>,
}

impl RoleController {
    pub fn new(
        state: Arc<SessionState>,
        storage: Arc<dyn SettingsStore>,
        ui: Arc<dyn UiHandle>,
    ) -> Self {
        Self { state, storage, ui }
    }

    /// Flip the local role, persist it, and let the UI react.
    pub async fn toggle(&self) -> Role {
        let new_role = match self.state.role() {
            Role::Master => Role::Follower,
            Role::Follower => Role::Master,
        };
        self.state.set_role(new_role);
        if let Err(e) = self
            .storage
            .set(KEY_IS_MASTER, json!(new_role.is_master()), true)
            .await
        {
            warn!(error = %e, "failed to persist role");
        }
        info!(
            client_id = %self.state.client_id(),
            role = new_role.as_str(),
            "role toggled"
        );
        self.ui.role_changed(new_role).await;
        match new_role {
            Role::Master => self.ui.notify("Master", "This client is now the master.").await,
            Role::Follower => {
                self.ui
                    .notify("Master", "This client is no longer the master.")
                    .await
            }
        }
        new_role
    }

    /// On channel connect: restore the persisted role and delay bound for
    /// this client identity.
    pub async fn restore(&self) -> Role {
        let is_master = self
            .storage
            .get_or(KEY_IS_MASTER, json!(false), true)
            .await
            .as_bool()
            .unwrap_or(false);
        let role = Role::from_is_master(is_master);
        self.state.set_role(role);

        let max_delay = self
            .storage
            .get_or(KEY_MAX_DELAY, json!(self.state.max_delay_ms()), true)
            .await
            .as_u64()
            .filter(|ms| *ms > 0)
            .unwrap_or(self.state.max_delay_ms());
        self.state.set_max_delay_ms(max_delay);

        self.ui.role_changed(role).await;
        info!(
            client_id = %self.state.client_id(),
            role = role.as_str(),
            max_delay_ms = max_delay,
            "restored persisted session state"
        );
        role
    }
}
