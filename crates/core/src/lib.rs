pub mod action;
pub mod command;
pub mod config;
pub mod error;

pub use action::{ActionKind, ActionRecord};
pub use command::{client_event, master_event, Command, CommandEnvelope};
pub use config::SessionConfig;
pub use error::{Error, Result};
