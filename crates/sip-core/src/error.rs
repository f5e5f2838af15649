use thiserror::Error;

use crate::types::header_type::HeaderType;

/// Errors raised by the SIP message model.
///
/// Grammar errors are only produced when a header is first accessed through
/// a typed accessor. Framing errors are produced by [`crate::SipMessage::parse`]
/// and mean the datagram must be discarded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A grammar failed while scanning a header, URI or start line
    #[error("Parse error in {context} at offset {position}: {detail}")]
    Parse {
        context: String,
        position: usize,
        detail: String,
    },

    /// A const accessor found no value for the header
    #[error("Header not present: {0}")]
    HeaderMissing(HeaderType),

    /// The cached value of a header is not of the requested category
    #[error("Header {0} does not hold the requested category")]
    WrongCategory(HeaderType),

    /// The message lacks something required for the requested operation
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// The raw bytes do not frame a SIP message
    #[error("Framing error: {0}")]
    Framing(String),

    /// Bytes that must be text were not valid UTF-8
    #[error("Invalid UTF-8 in {0}")]
    Utf8(String),
}

/// A specialized Result type for SIP message operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn is_parse(&self) -> bool {
        matches!(self, Error::Parse { .. })
    }
}
