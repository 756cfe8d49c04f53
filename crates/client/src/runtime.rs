use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use tandem_core::config::KEY_MAX_DELAY;
use tandem_core::{Command, Result, SessionConfig};
use tandem_dom::PageHandle;
use tandem_storage::SettingsStore;
use tandem_transport::Transport;

use crate::capture::CaptureFilter;
use crate::dispatcher::CommandDispatcher;
use crate::jitter::Jitter;
use crate::queue::ReplayQueue;
use crate::role::RoleController;
use crate::state::{Role, SessionState};
use crate::ui::UiHandle;

/// Core-relevant keyboard entry points. The delay prompt and the
/// button-click demo belong to the UI collaborator, which calls the
/// corresponding broadcast methods directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    /// Ctrl+M — toggle the master role.
    ToggleMaster,
    /// Ctrl+Enter — broadcast the `global:control` demo fill (master only).
    GlobalControlDemo,
}

/// Chord descriptor for a shortcut, for the UI layer to register.
pub struct ShortcutSpec {
    pub shortcut: Shortcut,
    pub keys: &'static [&'static str],
    pub description: &'static str,
}

pub fn shortcut_specs() -> &'static [ShortcutSpec] {
    &[
        ShortcutSpec {
            shortcut: Shortcut::ToggleMaster,
            keys: &["control", "m"],
            description: "Toggle master session",
        },
        ShortcutSpec {
            shortcut: Shortcut::GlobalControlDemo,
            keys: &["control", "enter"],
            description: "Fill all text fields on every follower",
        },
    ]
}

/// One client of a replication session: owns the shared state, the replay
/// queue, the capture filter and the dispatcher, and runs the connect
/// lifecycle.
pub struct Runtime {
    state: Arc<SessionState>,
    page: PageHandle,
    storage: Arc<dyn SettingsStore>,
    ui: Arc<dyn UiHandle>,
    dispatcher: Arc<CommandDispatcher>,
    role: RoleController,
    transport: Arc<dyn Transport>,
}

impl Runtime {
    pub fn new(
        config: &SessionConfig,
        client_id: &str,
        page: PageHandle,
        transport: Arc<dyn Transport>,
        storage: Arc<dyn SettingsStore>,
        ui: Arc<dyn UiHandle>,
        jitter: Arc<dyn Jitter>,
    ) -> Self {
        let state = SessionState::new(client_id, config.default_max_delay_ms);
        let queue = ReplayQueue::new(Arc::clone(&state), page.clone(), Arc::clone(&jitter));
        let dispatcher = Arc::new(CommandDispatcher::new(
            Arc::clone(&state),
            Arc::clone(&transport),
            Arc::clone(&storage),
            page.clone(),
            queue,
            Arc::clone(&ui),
            jitter,
        ));
        let role = RoleController::new(Arc::clone(&state), Arc::clone(&storage), Arc::clone(&ui));
        Self {
            state,
            page,
            storage,
            ui,
            dispatcher,
            role,
            transport,
        }
    }

    pub fn state(&self) -> &Arc<SessionState> {
        &self.state
    }

    pub fn page(&self) -> &PageHandle {
        &self.page
    }

    pub fn dispatcher(&self) -> &Arc<CommandDispatcher> {
        &self.dispatcher
    }

    /// Connect to the session channel: restore persisted role and delay,
    /// install the capture filter, and spawn the broadcast and inbound
    /// loops. Returns the restored role.
    pub async fn connect(&self) -> Role {
        let role = self.role.restore().await;

        let (outbox_tx, mut outbox_rx) = mpsc::unbounded_channel();
        CaptureFilter::install(&self.page, Arc::clone(&self.state), outbox_tx);

        let dispatcher = Arc::clone(&self.dispatcher);
        tokio::spawn(async move {
            while let Some(record) = outbox_rx.recv().await {
                if let Err(e) = dispatcher.send(Command::ReplicateAction(record)).await {
                    warn!(error = %e, "captured action not broadcast");
                }
            }
        });

        let mut inbound = self.transport.subscribe();
        let dispatcher = Arc::clone(&self.dispatcher);
        let client_id = self.state.client_id().to_string();
        tokio::spawn(async move {
            while let Some(envelope) = inbound.recv().await {
                dispatcher.handle(envelope).await;
            }
            info!(client_id, "session channel closed");
        });

        info!(
            client_id = %self.state.client_id(),
            role = role.as_str(),
            "connected to session channel"
        );
        role
    }

    pub async fn toggle_master(&self) -> Role {
        self.role.toggle().await
    }

    pub async fn handle_shortcut(&self, shortcut: Shortcut) {
        match shortcut {
            Shortcut::ToggleMaster => {
                self.toggle_master().await;
            }
            Shortcut::GlobalControlDemo => {
                if let Err(e) = self
                    .dispatcher
                    .send(Command::GlobalControl {
                        value: Some("sample value".to_string()),
                    })
                    .await
                {
                    warn!(error = %e, "global control demo not sent");
                }
            }
        }
    }

    /// Update the local delay bound, persist it, and broadcast it so replay
    /// timing stays consistent session-wide.
    pub async fn broadcast_max_delay(&self, max_delay_ms: u64) -> Result<()> {
        if max_delay_ms == 0 {
            return Err(tandem_core::Error::MalformedCommand(
                "max delay must be positive".to_string(),
            ));
        }
        self.state.set_max_delay_ms(max_delay_ms);
        if let Err(e) = self
            .storage
            .set(KEY_MAX_DELAY, serde_json::json!(max_delay_ms), true)
            .await
        {
            warn!(error = %e, "failed to persist max delay");
        }
        self.dispatcher
            .send(Command::SetMaxDelay { max_delay_ms })
            .await
    }

    /// Entry point for the UI collaborator's delay dialog.
    pub async fn prompt_max_delay(&self) -> Result<()> {
        let current = self.state.max_delay_ms();
        match self.ui.prompt_number("Replay delay bound (ms)", current).await {
            Some(ms) => self.broadcast_max_delay(ms).await,
            None => Ok(()),
        }
    }

    /// Entry point for the UI collaborator's open-page dialog: prompt for a
    /// URL and broadcast it. Cancelled or empty input sends nothing.
    pub async fn prompt_open_page(&self) -> Result<()> {
        match self.ui.prompt_text("Open URL on every client").await {
            Some(url) if !url.trim().is_empty() => self.broadcast_open_page(url.trim()).await,
            _ => Ok(()),
        }
    }

    /// Entry point for the UI collaborator's reload control. Confirmed
    /// first: every client reloads and drops its pending replays.
    pub async fn prompt_reload(&self) -> Result<()> {
        if !self.ui.confirm("Reload the page on every client?").await {
            return Ok(());
        }
        self.broadcast_reload().await
    }

    pub async fn broadcast_open_page(&self, url: &str) -> Result<()> {
        self.dispatcher
            .send(Command::OpenPage {
                url: url.to_string(),
            })
            .await
    }

    pub async fn broadcast_reload(&self) -> Result<()> {
        self.dispatcher.send(Command::ReloadPage).await
    }

    pub async fn broadcast_button_click(&self, selector: &str) -> Result<()> {
        self.dispatcher
            .send(Command::ButtonClick {
                selector: selector.to_string(),
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tandem_core::{ActionKind, config::KEY_IS_MASTER};
    use tandem_storage::MemoryStore;
    use tandem_transport::SessionHub;
    use crate::jitter::ZeroJitter;
    use crate::ui::NullUi;

    const PAGE: &str = r#"
        <html><body>
            <input type="text" id="user">
            <button id="one">one</button>
            <button id="two">two</button>
        </body></html>
    "#;

    struct Client {
        runtime: Runtime,
        storage: Arc<MemoryStore>,
    }

    fn client(hub: &Arc<SessionHub>, id: &str) -> Client {
        client_with_ui(hub, id, Arc::new(NullUi))
    }

    fn client_with_ui(hub: &Arc<SessionHub>, id: &str, ui: Arc<dyn UiHandle>) -> Client {
        let storage = Arc::new(MemoryStore::new());
        let runtime = Runtime::new(
            &SessionConfig::default(),
            id,
            PageHandle::parse(PAGE),
            Arc::new(hub.join(id)),
            Arc::clone(&storage) as Arc<dyn SettingsStore>,
            ui,
            Arc::new(ZeroJitter),
        );
        Client { runtime, storage }
    }

    /// UI double with canned dialog answers.
    struct ScriptedUi {
        url: Option<String>,
    }

    #[async_trait::async_trait]
    impl UiHandle for ScriptedUi {
        async fn notify(&self, _title: &str, _message: &str) {}

        async fn confirm(&self, _message: &str) -> bool {
            true
        }

        async fn prompt_text(&self, _label: &str) -> Option<String> {
            self.url.clone()
        }

        async fn prompt_number(&self, _label: &str, _current: u64) -> Option<u64> {
            None
        }

        async fn role_changed(&self, _role: Role) {}
    }

    async fn eventually<F: Fn() -> bool>(what: &str, check: F) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !check() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {what}"));
    }

    #[tokio::test]
    async fn test_master_click_replays_on_follower() {
        let hub = SessionHub::new("TOOLS");
        let master = client(&hub, "master");
        let follower = client(&hub, "follower");
        master.runtime.connect().await;
        follower.runtime.connect().await;
        master.runtime.toggle_master().await;

        let follower_page = follower.runtime.page().clone();
        let mut follower_events = follower_page.subscribe();

        // The master clicks the second button: path /html/body/button[2].
        let master_page = master.runtime.page();
        let button = master_page.select_first("#two").unwrap();
        assert_eq!(master_page.locate(button).unwrap(), "/html/body/button[2]");
        master_page.click(button);

        let event = tokio::time::timeout(Duration::from_secs(5), follower_events.recv())
            .await
            .expect("no replay observed")
            .unwrap();
        assert_eq!(event.kind, ActionKind::Click);
        let clicked = follower_page.locate(event.target).unwrap();
        assert_eq!(clicked, "/html/body/button[2]");
    }

    #[tokio::test]
    async fn test_typed_text_propagates_to_follower() {
        let hub = SessionHub::new("TOOLS");
        let master = client(&hub, "master");
        let follower = client(&hub, "follower");
        master.runtime.connect().await;
        follower.runtime.connect().await;
        master.runtime.toggle_master().await;

        let field = master.runtime.page().select_first("#user").unwrap();
        master.runtime.page().user_input(field, "alice", ActionKind::Input);

        let follower_page = follower.runtime.page().clone();
        eventually("follower field update", || {
            let field = follower_page.select_first("#user").unwrap();
            follower_page.value_of(field).as_deref() == Some("alice")
        })
        .await;
    }

    #[tokio::test]
    async fn test_replay_is_never_rebroadcast() {
        let hub = SessionHub::new("TOOLS");
        let master = client(&hub, "master");
        let follower = client(&hub, "follower");
        let witness = hub.join("witness");
        let mut wire = witness.subscribe();

        master.runtime.connect().await;
        follower.runtime.connect().await;
        master.runtime.toggle_master().await;

        let field = master.runtime.page().select_first("#user").unwrap();
        master.runtime.page().user_input(field, "once", ActionKind::Change);

        let follower_page = follower.runtime.page().clone();
        eventually("replay on follower", || {
            let field = follower_page.select_first("#user").unwrap();
            follower_page.value_of(field).as_deref() == Some("once")
        })
        .await;

        // Promote the follower afterwards: the consumed marker and the
        // executing flag must have kept the replay out of its capture path,
        // so exactly one replicateAction ever crossed the wire.
        follower.runtime.toggle_master().await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut replicate_count = 0;
        while let Ok(env) = wire.try_recv() {
            if env.command == "replicateAction" {
                replicate_count += 1;
            }
        }
        assert_eq!(replicate_count, 1);
    }

    #[tokio::test]
    async fn test_set_max_delay_survives_reconnect() {
        let hub = SessionHub::new("TOOLS");
        let master = client(&hub, "master");
        let follower = client(&hub, "follower");
        master.runtime.connect().await;
        follower.runtime.connect().await;
        master.runtime.toggle_master().await;

        master.runtime.broadcast_max_delay(500).await.unwrap();
        let follower_state = Arc::clone(follower.runtime.state());
        eventually("delay propagation", || follower_state.max_delay_ms() == 500).await;

        // Same storage, fresh runtime: a reconnected client.
        let reconnected = Runtime::new(
            &SessionConfig::default(),
            "follower",
            PageHandle::parse(PAGE),
            Arc::new(hub.join("follower")),
            Arc::clone(&follower.storage) as Arc<dyn SettingsStore>,
            Arc::new(NullUi),
            Arc::new(ZeroJitter),
        );
        reconnected.connect().await;
        assert_eq!(reconnected.state().max_delay_ms(), 500);
    }

    #[tokio::test]
    async fn test_role_survives_reconnect() {
        let hub = SessionHub::new("TOOLS");
        let master = client(&hub, "m1");
        master.runtime.connect().await;
        assert_eq!(master.runtime.toggle_master().await, Role::Master);
        assert_eq!(
            master.storage.get(KEY_IS_MASTER, true).await.unwrap(),
            Some(serde_json::json!(true))
        );

        let reconnected = Runtime::new(
            &SessionConfig::default(),
            "m1",
            PageHandle::parse(PAGE),
            Arc::new(hub.join("m1")),
            Arc::clone(&master.storage) as Arc<dyn SettingsStore>,
            Arc::new(NullUi),
            Arc::new(ZeroJitter),
        );
        assert_eq!(reconnected.connect().await, Role::Master);
    }

    #[tokio::test]
    async fn test_global_control_shortcut_is_role_gated() {
        let hub = SessionHub::new("TOOLS");
        let a = client(&hub, "a");
        let b = client(&hub, "b");
        a.runtime.connect().await;
        b.runtime.connect().await;

        // Still a follower: the demo shortcut must not reach the wire.
        a.runtime.handle_shortcut(Shortcut::GlobalControlDemo).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        let b_field = b.runtime.page().select_first("#user").unwrap();
        assert_eq!(b.runtime.page().value_of(b_field).as_deref(), Some(""));

        a.runtime.handle_shortcut(Shortcut::ToggleMaster).await;
        a.runtime.handle_shortcut(Shortcut::GlobalControlDemo).await;
        let b_page = b.runtime.page().clone();
        eventually("global control on b", || {
            let field = b_page.select_first("#user").unwrap();
            b_page.value_of(field).as_deref() == Some("sample value")
        })
        .await;
    }

    #[tokio::test]
    async fn test_open_page_broadcast_navigates_followers() {
        let hub = SessionHub::new("TOOLS");
        let master = client(&hub, "master");
        let follower = client(&hub, "follower");
        master.runtime.connect().await;
        follower.runtime.connect().await;
        master.runtime.toggle_master().await;

        master
            .runtime
            .broadcast_open_page("https://example.com/step2")
            .await
            .unwrap();

        let follower_page = follower.runtime.page().clone();
        eventually("follower navigation", || {
            follower_page.location().as_deref() == Some("https://example.com/step2")
        })
        .await;
        // The master navigates too: it receives its own broadcast.
        let master_page = master.runtime.page().clone();
        eventually("master navigation", || {
            master_page.location().as_deref() == Some("https://example.com/step2")
        })
        .await;
    }

    #[tokio::test]
    async fn test_prompt_open_page_broadcasts_prompted_url() {
        let hub = SessionHub::new("TOOLS");
        let master = client_with_ui(
            &hub,
            "master",
            Arc::new(ScriptedUi {
                url: Some("  https://example.com/prompted ".to_string()),
            }),
        );
        let follower = client(&hub, "follower");
        master.runtime.connect().await;
        follower.runtime.connect().await;
        master.runtime.toggle_master().await;

        master.runtime.prompt_open_page().await.unwrap();

        let follower_page = follower.runtime.page().clone();
        eventually("follower navigation", || {
            follower_page.location().as_deref() == Some("https://example.com/prompted")
        })
        .await;
    }

    #[tokio::test]
    async fn test_prompt_reload_is_confirm_gated() {
        let hub = SessionHub::new("TOOLS");
        let witness = hub.join("witness");
        let mut wire = witness.subscribe();

        // NullUi cancels every dialog: nothing may reach the wire.
        let declined = client(&hub, "declined");
        declined.runtime.connect().await;
        declined.runtime.toggle_master().await;
        declined.runtime.prompt_reload().await.unwrap();
        declined.runtime.prompt_open_page().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        while let Ok(env) = wire.try_recv() {
            assert_ne!(env.command, "browser:reloadPage");
            assert_ne!(env.command, "browser:openPage");
        }

        let confirmed = client_with_ui(&hub, "confirmed", Arc::new(ScriptedUi { url: None }));
        confirmed.runtime.connect().await;
        confirmed.runtime.toggle_master().await;
        confirmed.runtime.prompt_reload().await.unwrap();
        let reload = tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                let env = wire.recv().await.unwrap();
                if env.command == "browser:reloadPage" {
                    break env;
                }
            }
        })
        .await
        .expect("confirmed reload never broadcast");
        assert_eq!(reload.command, "browser:reloadPage");
    }

    #[test]
    fn test_shortcut_specs_cover_core_surface() {
        let specs = shortcut_specs();
        assert!(specs.iter().any(|s| s.shortcut == Shortcut::ToggleMaster));
        assert!(specs
            .iter()
            .any(|s| s.shortcut == Shortcut::GlobalControlDemo));
    }
}
