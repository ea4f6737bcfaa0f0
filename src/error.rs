//! Error types for MagicFolder

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FolderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Brain IPC error: {0}")]
    Ipc(String),

    #[error("Malformed brain response: {0}")]
    Response(#[from] serde_json::Error),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("State error: {0}")]
    State(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, FolderError>;
