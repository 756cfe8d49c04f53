pub mod capture;
pub mod dispatcher;
pub mod jitter;
pub mod queue;
pub mod role;
pub mod runtime;
pub mod state;
pub mod ui;

pub use capture::CaptureFilter;
pub use dispatcher::CommandDispatcher;
pub use jitter::{Jitter, UniformJitter, ZeroJitter};
pub use queue::{QueuedAction, ReplayQueue};
pub use role::RoleController;
pub use runtime::{shortcut_specs, Runtime, Shortcut, ShortcutSpec};
pub use state::{Role, SessionState};
pub use ui::{NullUi, TracingUi, UiHandle};
