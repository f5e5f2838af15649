//! Typed header values and the grammars that produce them.

pub mod branch;
pub mod call_id;
pub mod category;
pub mod cseq;
pub mod expires;
pub mod header_type;
pub mod integer;
pub mod method;
pub mod mime;
pub mod name_addr;
pub mod param;
pub mod request_line;
pub mod status_line;
pub mod string_category;
pub mod token;
pub mod uri;
pub mod via;

pub use branch::BranchParameter;
pub use call_id::CallId;
pub use category::{HeaderCategory, ParsedHeader, ParserCategory};
pub use cseq::CSeqCategory;
pub use expires::ExpiresCategory;
pub use header_type::{Grammar, HeaderType};
pub use integer::UInt32Category;
pub use method::Method;
pub use mime::Mime;
pub use name_addr::NameAddr;
pub use param::{Param, Params};
pub use request_line::RequestLine;
pub use status_line::StatusLine;
pub use string_category::StringCategory;
pub use token::Token;
pub use uri::Uri;
pub use via::Via;

/// RFC 3261 `token` characters.
pub fn is_token_char(c: u8) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            b'-' | b'.' | b'!' | b'%' | b'*' | b'_' | b'+' | b'`' | b'\'' | b'~'
        )
}
