use async_trait::async_trait;
use tracing::info;

use crate::state::Role;

/// Abstract prompt/notify surface the core drives instead of rendering UI.
///
/// Implemented by the UI collaborator (dialogs, banners, badges); the core
/// only calls through this trait and never owns a widget.
#[async_trait]
pub trait UiHandle: Send + Sync {
    /// Transient status notification.
    async fn notify(&self, title: &str, message: &str);

    /// Yes/no confirmation dialog.
    async fn confirm(&self, message: &str) -> bool;

    /// Free-text prompt; `None` when cancelled.
    async fn prompt_text(&self, label: &str) -> Option<String>;

    /// Numeric prompt pre-filled with the current value; `None` when
    /// cancelled or invalid.
    async fn prompt_number(&self, label: &str, current: u64) -> Option<u64>;

    /// The role badge ("master"/"follower") should update.
    async fn role_changed(&self, role: Role);
}

/// UI that swallows everything; prompts are always cancelled.
pub struct NullUi;

#[async_trait]
impl UiHandle for NullUi {
    async fn notify(&self, _title: &str, _message: &str) {}

    async fn confirm(&self, _message: &str) -> bool {
        false
    }

    async fn prompt_text(&self, _label: &str) -> Option<String> {
        None
    }

    async fn prompt_number(&self, _label: &str, _current: u64) -> Option<u64> {
        None
    }

    async fn role_changed(&self, _role: Role) {}
}

/// UI backed by the log, used by the demo binary.
pub struct TracingUi;

#[async_trait]
impl UiHandle for TracingUi {
    async fn notify(&self, title: &str, message: &str) {
        info!(title, "{message}");
    }

    async fn confirm(&self, message: &str) -> bool {
        info!("auto-confirming: {message}");
        true
    }

    async fn prompt_text(&self, _label: &str) -> Option<String> {
        None
    }

    async fn prompt_number(&self, _label: &str, current: u64) -> Option<u64> {
        Some(current)
    }

    async fn role_changed(&self, role: Role) {
        info!(role = role.as_str(), "role badge updated");
    }
}
