use async_trait::async_trait;
use tokio::sync::mpsc;

use tandem_core::{CommandEnvelope, Result};

/// Pub/sub channel connecting every client of one logical session.
///
/// `emit` publishes on the master-scoped event of the session's module
/// namespace; `subscribe` yields the client-scoped stream every client
/// listens on. There is no buffering: an emit while disconnected fails and
/// the command is simply lost.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn emit(&self, envelope: CommandEnvelope) -> Result<()>;

    fn subscribe(&self) -> mpsc::UnboundedReceiver<CommandEnvelope>;

    fn is_connected(&self) -> bool;
}
