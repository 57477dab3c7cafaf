//! Error types for pipeline domain operations

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatekeepError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid pipeline definition: {0}")]
    InvalidDefinition(String),

    #[error("Duplicate job name: {0}")]
    DuplicateJobName(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config render error: {0}")]
    ConfigRender(#[from] toml::ser::Error),

    #[error("Unsupported event: {0}")]
    UnsupportedEvent(String),

    #[error("Missing event field: {0}")]
    MissingEventField(String),

    #[error("Incomplete run: no result for job(s) {0}")]
    IncompleteRun(String),

    #[error("Unexpected job result: {0}")]
    UnexpectedJobResult(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for pipeline domain operations
pub type Result<T> = std::result::Result<T, GatekeepError>;
