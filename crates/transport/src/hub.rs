use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use tandem_core::{client_event, master_event, CommandEnvelope, Error, Result};

use crate::transport::Transport;

/// In-process pub/sub hub for one session.
///
/// Mirrors the behavior of the real socket server: a command published on
/// the master-scoped event is rebroadcast on the client-scoped event to
/// every joined client, the publisher included.
pub struct SessionHub {
    module: String,
    tx: broadcast::Sender<CommandEnvelope>,
}

impl SessionHub {
    pub fn new(module: &str) -> Arc<Self> {
        let (tx, _) = broadcast::channel(256);
        Arc::new(Self {
            module: module.to_string(),
            tx,
        })
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    /// Attach one client to the session.
    pub fn join(self: &Arc<Self>, client_id: &str) -> HubTransport {
        debug!(client_id, module = %self.module, "client joined session hub");
        HubTransport {
            hub: Arc::clone(self),
            client_id: client_id.to_string(),
            connected: AtomicBool::new(true),
        }
    }
}

/// One client's endpoint on the [`SessionHub`].
pub struct HubTransport {
    hub: Arc<SessionHub>,
    client_id: String,
    connected: AtomicBool,
}

impl HubTransport {
    /// Simulate a channel drop/restore for this client.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for HubTransport {
    async fn emit(&self, envelope: CommandEnvelope) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::Transport(format!(
                "client {} is not connected",
                self.client_id
            )));
        }
        debug!(
            client_id = %self.client_id,
            event = %master_event(self.hub.module()),
            command = %envelope.command,
            "emit"
        );
        self.hub
            .tx
            .send(envelope)
            .map_err(|_| Error::Transport("no subscribers on session hub".to_string()))?;
        Ok(())
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<CommandEnvelope> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut source = self.hub.tx.subscribe();
        let client_id = self.client_id.clone();
        let event = client_event(self.hub.module());
        tokio::spawn(async move {
            loop {
                match source.recv().await {
                    Ok(envelope) => {
                        if tx.send(envelope).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(client_id = %client_id, event = %event, missed, "subscriber lagged, commands lost");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        rx
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
