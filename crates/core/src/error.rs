use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Address resolution failed: {0}")]
    AddressResolution(String),

    #[error("Malformed command: {0}")]
    MalformedCommand(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
