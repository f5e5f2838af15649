use thiserror::Error;

/// Result type for infra-common operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the infrastructure layer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// The global tracing subscriber could not be installed
    #[error("Logging setup failed: {0}")]
    Logging(String),
}
