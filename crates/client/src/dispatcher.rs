use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use tandem_core::config::{KEY_MAX_DELAY, NAVIGATION_JITTER_MS};
use tandem_core::{Command, CommandEnvelope, Result};
use tandem_dom::PageHandle;
use tandem_storage::SettingsStore;
use tandem_transport::Transport;

use crate::jitter::Jitter;
use crate::queue::ReplayQueue;
use crate::state::SessionState;
use crate::ui::UiHandle;

/// Routes commands in both directions: outbound broadcasts (master-gated)
/// and inbound envelopes from the session channel.
pub struct CommandDispatcher {
    state: Arc<SessionState>,
    transport: Arc<dyn Transport>,
    storage: Arc<dyn SettingsStore>,
    page: PageHandle,
    queue: ReplayQueue,
    ui: Arc<dyn UiHandle>,
    jitter: Arc<dyn Jitter>,
}

impl CommandDispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        state: Arc<SessionState>,
        transport: Arc<dyn Transport>,
        storage: Arc<dyn SettingsStore>,
        page: PageHandle,
        queue: ReplayQueue,
        ui: Arc<dyn UiHandle>,
        jitter: Arc<dyn Jitter>,
    ) -> Self {
        Self {
            state,
            transport,
            storage,
            page,
            queue,
            ui,
            jitter,
        }
    }

    pub fn queue(&self) -> &ReplayQueue {
        &self.queue
    }

    /// Broadcast a command to the session. Only effective on the master; a
    /// follower's attempt is a logged no-op. A disconnected channel is an
    /// error — commands are never buffered.
    pub async fn send(&self, command: Command) -> Result<()> {
        if !self.state.is_master() {
            warn!(
                client_id = %self.state.client_id(),
                command = command.name(),
                "not the master, command not sent"
            );
            return Ok(());
        }
        self.transport.emit(command.into_envelope()).await
    }

    /// Handle one inbound envelope. Malformed commands are logged and
    /// ignored; nothing here is fatal to the client.
    pub async fn handle(&self, envelope: CommandEnvelope) {
        let command = match Command::try_from(envelope) {
            Ok(command) => command,
            Err(e) => {
                warn!(client_id = %self.state.client_id(), error = %e, "ignoring inbound command");
                return;
            }
        };
        match command {
            Command::OpenPage { url } => {
                self.deferred_navigation(Some(url));
            }
            Command::ReloadPage => {
                self.deferred_navigation(None);
            }
            Command::GlobalControl { value } => {
                let filled = self.page.fill_text_inputs(value.as_deref());
                info!(client_id = %self.state.client_id(), filled, "global control applied");
            }
            Command::ButtonClick { selector } => match self.page.select_first(&selector) {
                Some(id) => {
                    debug!(client_id = %self.state.client_id(), selector, "clicking button");
                    self.page.click(id);
                }
                None => {
                    debug!(client_id = %self.state.client_id(), selector, "no element matches selector");
                }
            },
            Command::ReplicateAction(record) => {
                // The master also receives its own broadcasts; only
                // followers replay.
                if self.state.is_master() {
                    return;
                }
                self.queue.enqueue(record);
            }
            Command::SetMaxDelay { max_delay_ms } => {
                self.state.set_max_delay_ms(max_delay_ms);
                if let Err(e) = self
                    .storage
                    .set(KEY_MAX_DELAY, json!(max_delay_ms), true)
                    .await
                {
                    warn!(error = %e, "failed to persist max delay");
                }
                self.ui
                    .notify(
                        "Updated",
                        &format!("Replay delay bound set to {max_delay_ms} ms."),
                    )
                    .await;
            }
        }
    }

    /// Navigation and reload fire after a jittered delay so a fleet of
    /// followers does not hit the target server in the same instant. The
    /// timer runs detached: later inbound commands are not held up behind it.
    fn deferred_navigation(&self, url: Option<String>) {
        let page = self.page.clone();
        let queue = self.queue.clone();
        let state = Arc::clone(&self.state);
        let delay = self.jitter.delay(NAVIGATION_JITTER_MS);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Page teardown: pending replays do not survive.
            queue.clear();
            match url {
                Some(url) => {
                    info!(client_id = %state.client_id(), url = %url, "navigating");
                    page.navigate(&url);
                }
                None => {
                    info!(client_id = %state.client_id(), "reloading");
                    page.reload();
                }
            }
        });
    }
}
