//! # sipwire-sip-core
//!
//! SIP message model for the sipwire stack.
//!
//! A received datagram is framed into a [`SipMessage`] without interpreting
//! header values. Each value is kept as a [`HeaderFieldValue`] holding raw
//! bytes, and is parsed by its header's grammar the first time it is
//! accessed through a typed accessor:
//!
//! ```
//! use sipwire_sip_core::prelude::*;
//!
//! let text = "OPTIONS sip:carol@chicago.com SIP/2.0\r\n\
//!             Via: SIP/2.0/UDP pc33.atlanta.com;branch=z9hG4bKhjhs8ass877\r\n\
//!             CSeq: 63104 OPTIONS\r\n\
//!             Content-Length: 0\r\n\r\n";
//! let mut msg: SipMessage = text.parse().unwrap();
//!
//! // parsed on first access, cached afterwards
//! assert_eq!(msg.const_header::<h::CSeq>().unwrap().sequence, 63104);
//! assert_eq!(msg.transaction_id().unwrap(), "hjhs8ass877");
//!
//! // absent headers are created on access
//! msg.header::<h::Subject>().unwrap().0 = "lunch?".to_string();
//! assert!(msg.exists::<h::Subject>());
//! ```
//!
//! Grammar errors surface only at the access site, as [`Error::Parse`].
//! Framing errors from [`SipMessage::parse`] mean the datagram is unusable.

pub mod contents;
pub mod error;
pub mod header_field_value;
pub mod header_field_value_list;
pub mod headers;
pub mod helper;
pub mod message;
pub mod parse_buffer;
pub mod parser;
pub mod tuple;
pub mod types;

pub use contents::{MultipartMixedContents, MultipartPart};
pub use error::{Error, Result};
pub use header_field_value::HeaderFieldValue;
pub use header_field_value_list::HeaderFieldValueList;
pub use headers::{h, Header};
pub use message::{ParserContainer, SipMessage, StartLine};
pub use parse_buffer::ParseBuffer;
pub use tuple::{TransportType, Tuple};
pub use types::{
    BranchParameter, CSeqCategory, CallId, ExpiresCategory, Grammar, HeaderType, Method, Mime,
    NameAddr, Param, Params, ParserCategory, RequestLine, StatusLine, StringCategory, Token,
    UInt32Category, Uri, Via,
};

/// Common imports for users of the message model.
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::headers::{h, Header};
    pub use crate::helper::{make_cancel, make_failure_ack, make_request, make_response};
    pub use crate::message::{SipMessage, StartLine};
    pub use crate::tuple::{TransportType, Tuple};
    pub use crate::types::{
        BranchParameter, CSeqCategory, CallId, Method, Mime, NameAddr, ParserCategory, Uri, Via,
    };
}
