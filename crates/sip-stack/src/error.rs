use thiserror::Error;

/// Result type for stack operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the stack facade
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The logging subscriber could not be installed
    #[error("Logging error: {0}")]
    Logging(#[from] sipwire_infra_common::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] sipwire_sip_transport::Error),

    #[error("Transaction error: {0}")]
    Transaction(#[from] sipwire_transaction_core::Error),

    /// The stack thread has stopped or could not be joined
    #[error("Stack is shut down")]
    Shutdown,
}
