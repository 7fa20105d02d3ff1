use thiserror::Error;

/// Top-level error type for the medical chat client.
///
/// Subsystem crates define their own error types and implement
/// `From<SubsystemError> for MedchatError` so that `?` works across crate
/// boundaries at the composition root.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MedchatError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for MedchatError {
    fn from(err: toml::de::Error) -> Self {
        MedchatError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for MedchatError {
    fn from(err: toml::ser::Error) -> Self {
        MedchatError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for MedchatError {
    fn from(err: serde_json::Error) -> Self {
        MedchatError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for client operations.
pub type Result<T> = std::result::Result<T, MedchatError>;
