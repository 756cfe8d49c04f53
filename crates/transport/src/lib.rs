pub mod hub;
pub mod transport;

pub use hub::{HubTransport, SessionHub};
pub use transport::Transport;
