use thiserror::Error;

/// Errors that abort a generation run.
///
/// Only setup failures surface here. Failures of individual schema
/// statements or data files are recorded in the run reports instead.
#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("Store error: {0}")]
    Store(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Discovery error: {0}")]
    Discovery(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GeneratorError>;
