use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;

use tandem_client::{Jitter, Runtime, TracingUi, UniformJitter, ZeroJitter};
use tandem_core::{ActionKind, SessionConfig};
use tandem_dom::PageHandle;
use tandem_storage::{MemoryStore, SettingsStore};
use tandem_transport::SessionHub;

const DEMO_PAGE: &str = r#"
<html>
  <body>
    <form>
      <input type="text" id="username">
      <input type="password" id="password">
    </form>
    <button id="cancel">Cancel</button>
    <button id="login" class="submit">Log in</button>
  </body>
</html>
"#;

/// Drive a whole session in-process: a master and `followers` followers on
/// structurally identical pages, with the master's input replicated through
/// the session hub.
pub async fn run(followers: usize, max_delay_ms: u64, seed: Option<u64>) -> anyhow::Result<()> {
    let config = SessionConfig::default();
    let hub = SessionHub::new(&config.module);

    let jitter: Arc<dyn Jitter> = match seed {
        Some(0) => Arc::new(ZeroJitter),
        Some(seed) => Arc::new(UniformJitter::seeded(seed)),
        None => Arc::new(UniformJitter::new()),
    };

    let master = client(&hub, "master", &config, &jitter);
    master.connect().await;
    master.toggle_master().await;

    let mut fleet = Vec::new();
    for i in 0..followers {
        let follower = client(&hub, &format!("follower-{i}"), &config, &jitter);
        follower.connect().await;
        fleet.push(follower);
    }

    master
        .broadcast_max_delay(max_delay_ms)
        .await
        .context("failed to broadcast delay bound")?;

    // Scripted master input: fill the form, then log in.
    let page = master.page();
    let username = page.select_first("#username").context("demo page has no username field")?;
    let password = page.select_first("#password").context("demo page has no password field")?;
    let login = page.select_first("button.submit").context("demo page has no login button")?;
    page.user_input(username, "alice", ActionKind::Input);
    page.user_input(password, "hunter2", ActionKind::Change);
    page.click(login);
    info!("master input done, waiting for replication");

    // Three actions, each delayed below the bound; allow generous slack.
    let deadline = Duration::from_millis(3 * max_delay_ms + 2000);
    tokio::time::timeout(deadline, async {
        loop {
            if fleet.iter().all(|f| {
                let page = f.page();
                page.select_first("#password")
                    .and_then(|id| page.value_of(id))
                    .as_deref()
                    == Some("hunter2")
            }) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    })
    .await
    .context("followers did not converge in time")?;

    for follower in &fleet {
        let page = follower.page();
        let user = page
            .select_first("#username")
            .and_then(|id| page.value_of(id))
            .unwrap_or_default();
        info!(
            client_id = %follower.state().client_id(),
            username = %user,
            "follower converged"
        );
    }
    info!(followers, max_delay_ms, "demo session complete");
    Ok(())
}

fn client(
    hub: &Arc<SessionHub>,
    id: &str,
    config: &SessionConfig,
    jitter: &Arc<dyn Jitter>,
) -> Runtime {
    Runtime::new(
        config,
        id,
        PageHandle::parse(DEMO_PAGE),
        Arc::new(hub.join(id)),
        Arc::new(MemoryStore::new()) as Arc<dyn SettingsStore>,
        Arc::new(TracingUi),
        Arc::clone(jitter),
    )
}
