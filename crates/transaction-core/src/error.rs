use sipwire_sip_core::TransportType;
use thiserror::Error;

/// Errors raised by the transaction layer
#[derive(Error, Debug)]
pub enum Error {
    /// No usable destination could be derived for a message
    #[error("No destination for message: {0}")]
    NoDestination(String),

    /// The message carries no transaction identity
    #[error("Invalid transaction id: {0}")]
    InvalidTransactionId(String),

    /// Timer base values that cannot drive retransmissions
    #[error("Invalid timer settings: {0}")]
    InvalidTimerSettings(String),

    /// No transport of the type the destination needs
    #[error("No transport for {0}")]
    NoTransport(TransportType),

    /// Transport error
    #[error("Transport error: {0}")]
    Transport(#[from] sipwire_sip_transport::Error),

    /// Message model error
    #[error("SIP error: {0}")]
    SipCore(#[from] sipwire_sip_core::Error),
}

/// Result type for transaction operations
pub type Result<T> = std::result::Result<T, Error>;
