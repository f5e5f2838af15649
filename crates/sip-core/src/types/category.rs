//! Parser categories: the typed views a raw header can be turned into.
//!
//! [`ParsedHeader`] is the tagged union cached on a
//! [`crate::HeaderFieldValue`] after its first typed access. The grammar to
//! run is chosen from [`Grammar`] by a single match, so adding a header name
//! only needs a registry entry.

use std::fmt;

use crate::error::Result;
use crate::parse_buffer::ParseBuffer;
use crate::types::header_type::Grammar;
use crate::types::{
    CSeqCategory, CallId, ExpiresCategory, Mime, NameAddr, StringCategory, Token, UInt32Category,
    Via,
};

/// A grammar that can be run over a [`ParseBuffer`] and written back out.
pub trait ParserCategory: Sized + Clone + Default + fmt::Debug + fmt::Display {
    fn parse(pb: &mut ParseBuffer<'_>) -> Result<Self>;

    /// Parse all of `bytes`, rejecting anything left over besides whitespace.
    fn parse_bytes(bytes: &[u8], context: &str) -> Result<Self> {
        let mut pb = ParseBuffer::new(bytes, context);
        let value = Self::parse(&mut pb)?;
        pb.skip_lws();
        if !pb.eof() {
            return Err(pb.fail("unexpected trailing characters"));
        }
        Ok(value)
    }

    fn encode(&self) -> String {
        self.to_string()
    }
}

/// A category that can be cached in a [`ParsedHeader`].
pub trait HeaderCategory: ParserCategory {
    const GRAMMAR: Grammar;

    fn into_parsed(self) -> ParsedHeader;
    fn from_parsed(parsed: &ParsedHeader) -> Option<&Self>;
    fn from_parsed_mut(parsed: &mut ParsedHeader) -> Option<&mut Self>;
    fn from_parsed_owned(parsed: ParsedHeader) -> Option<Self>;
}

macro_rules! parsed_header {
    ($( $variant:ident($ty:ty) ),* $(,)?) => {
        /// Cached typed value of one header occurrence.
        #[derive(Debug, Clone, PartialEq)]
        pub enum ParsedHeader {
            $( $variant($ty), )*
        }

        impl ParsedHeader {
            /// Run the grammar for `grammar` over exactly `bytes`.
            pub fn parse(grammar: Grammar, bytes: &[u8], context: &str) -> Result<ParsedHeader> {
                match grammar {
                    $( Grammar::$variant => <$ty>::parse_bytes(bytes, context).map(ParsedHeader::$variant), )*
                }
            }

            pub fn grammar(&self) -> Grammar {
                match self {
                    $( ParsedHeader::$variant(_) => Grammar::$variant, )*
                }
            }

            /// Default-constructed value for a header slot created on access.
            pub fn empty(grammar: Grammar) -> ParsedHeader {
                match grammar {
                    $( Grammar::$variant => ParsedHeader::$variant(<$ty>::default()), )*
                }
            }
        }

        impl fmt::Display for ParsedHeader {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $( ParsedHeader::$variant(v) => fmt::Display::fmt(v, f), )*
                }
            }
        }

        $(
            impl HeaderCategory for $ty {
                const GRAMMAR: Grammar = Grammar::$variant;

                fn into_parsed(self) -> ParsedHeader {
                    ParsedHeader::$variant(self)
                }

                fn from_parsed(parsed: &ParsedHeader) -> Option<&Self> {
                    match parsed {
                        ParsedHeader::$variant(v) => Some(v),
                        #[allow(unreachable_patterns)]
                        _ => None,
                    }
                }

                fn from_parsed_mut(parsed: &mut ParsedHeader) -> Option<&mut Self> {
                    match parsed {
                        ParsedHeader::$variant(v) => Some(v),
                        #[allow(unreachable_patterns)]
                        _ => None,
                    }
                }

                fn from_parsed_owned(parsed: ParsedHeader) -> Option<Self> {
                    match parsed {
                        ParsedHeader::$variant(v) => Some(v),
                        #[allow(unreachable_patterns)]
                        _ => None,
                    }
                }
            }
        )*
    };
}

parsed_header! {
    Via(Via),
    NameAddr(NameAddr),
    CSeq(CSeqCategory),
    CallId(CallId),
    UInt32(UInt32Category),
    Expires(ExpiresCategory),
    Token(Token),
    Mime(Mime),
    Text(StringCategory),
}
