use std::net::SocketAddr;

use sipwire_sip_core::TransportType;
use thiserror::Error;

/// Errors raised at the transport boundary
#[derive(Error, Debug)]
pub enum Error {
    /// Binding the socket failed; the transport cannot be constructed
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// I/O error on an established socket
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport has been shut down
    #[error("Transport closed")]
    TransportClosed,

    /// No transport of the requested type has been added
    #[error("No transport available for {0}")]
    NoTransport(TransportType),

    /// A received datagram could not be framed
    #[error("Parse error: {0}")]
    Parse(#[from] sipwire_sip_core::Error),
}

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, Error>;
