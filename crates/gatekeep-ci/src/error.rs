//! Error types for job execution

use gatekeep_core::GatekeepError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("Empty command")]
    EmptyCommand,

    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' timed out after {secs} seconds")]
    Timeout { command: String, secs: u64 },

    #[error("Provisioning failed: {0}")]
    Provisioning(String),

    #[error("Checkout failed: {0}")]
    Checkout(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Domain(#[from] GatekeepError),
}

/// Result type for job execution
pub type Result<T> = std::result::Result<T, ExecError>;
