use thiserror::Error;

/// Harness-level errors
///
/// Per-event and per-session failures are recorded on outcomes and never
/// surface here; these are failures of the harness itself.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {field}")]
    InvalidConfig { field: String },
}

impl Error {
    pub fn invalid_config(field: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
