//! Known header names and the grammar each one is parsed with.
//!
//! Lookup from wire name to [`HeaderType`] goes through a table built once on
//! first use. Both long and compact forms are registered, and matching is
//! case-insensitive as required by RFC 3261 Section 7.3.1.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Grammar used to turn a header's raw bytes into a typed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Grammar {
    Via,
    NameAddr,
    CSeq,
    CallId,
    UInt32,
    Expires,
    Token,
    Mime,
    Text,
}

macro_rules! header_types {
    ($( $variant:ident => $name:literal, $compact:expr, $grammar:ident, $multi:literal; )*) => {
        /// Header names the message model knows how to parse.
        ///
        /// The discriminant indexes the fixed header slot array of
        /// [`crate::SipMessage`], so declaration order is also encode order.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum HeaderType {
            $( $variant, )*
        }

        impl HeaderType {
            pub const ALL: &'static [HeaderType] = &[ $( HeaderType::$variant, )* ];
            pub const COUNT: usize = Self::ALL.len();

            /// Canonical wire name.
            pub fn name(self) -> &'static str {
                match self {
                    $( HeaderType::$variant => $name, )*
                }
            }

            /// Compact form (RFC 3261 Section 7.3.3), if the header has one.
            pub fn compact(self) -> Option<&'static str> {
                match self {
                    $( HeaderType::$variant => $compact, )*
                }
            }

            pub fn grammar(self) -> Grammar {
                match self {
                    $( HeaderType::$variant => Grammar::$grammar, )*
                }
            }

            /// Whether comma-separated values are split into separate entries.
            pub fn is_multi(self) -> bool {
                match self {
                    $( HeaderType::$variant => $multi, )*
                }
            }
        }
    };
}

header_types! {
    Via => "Via", Some("v"), Via, true;
    MaxForwards => "Max-Forwards", None, UInt32, false;
    Route => "Route", None, NameAddr, true;
    RecordRoute => "Record-Route", None, NameAddr, true;
    To => "To", Some("t"), NameAddr, false;
    From => "From", Some("f"), NameAddr, false;
    CallId => "Call-ID", Some("i"), CallId, false;
    CSeq => "CSeq", None, CSeq, false;
    Contact => "Contact", Some("m"), NameAddr, true;
    Expires => "Expires", None, Expires, false;
    MinExpires => "Min-Expires", None, UInt32, false;
    ReferTo => "Refer-To", Some("r"), NameAddr, false;
    Event => "Event", Some("o"), Token, false;
    AllowEvents => "Allow-Events", Some("u"), Token, true;
    Allow => "Allow", None, Token, true;
    Supported => "Supported", Some("k"), Token, true;
    Require => "Require", None, Token, true;
    ProxyRequire => "Proxy-Require", None, Token, true;
    Unsupported => "Unsupported", None, Token, true;
    Accept => "Accept", None, Mime, true;
    ContentEncoding => "Content-Encoding", Some("e"), Token, true;
    ContentDisposition => "Content-Disposition", None, Token, false;
    Subject => "Subject", Some("s"), Text, false;
    UserAgent => "User-Agent", None, Text, false;
    Server => "Server", None, Text, false;
    Organization => "Organization", None, Text, false;
    Date => "Date", None, Text, false;
    Timestamp => "Timestamp", None, Text, false;
    ContentType => "Content-Type", Some("c"), Mime, false;
    ContentLength => "Content-Length", Some("l"), UInt32, false;
}

static REGISTRY: Lazy<HashMap<String, HeaderType>> = Lazy::new(|| {
    let mut table = HashMap::with_capacity(HeaderType::COUNT * 2);
    for &header in HeaderType::ALL {
        table.insert(header.name().to_ascii_lowercase(), header);
        if let Some(compact) = header.compact() {
            table.insert(compact.to_string(), header);
        }
    }
    table
});

impl HeaderType {
    /// Resolve a wire header name, long or compact, ignoring case.
    pub fn from_name(name: &str) -> Option<HeaderType> {
        if name.bytes().any(|c| c.is_ascii_uppercase()) {
            REGISTRY.get(&name.to_ascii_lowercase()).copied()
        } else {
            REGISTRY.get(name).copied()
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for HeaderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_names_case_insensitive() {
        assert_eq!(HeaderType::from_name("Via"), Some(HeaderType::Via));
        assert_eq!(HeaderType::from_name("call-id"), Some(HeaderType::CallId));
        assert_eq!(HeaderType::from_name("CSEQ"), Some(HeaderType::CSeq));
        assert_eq!(HeaderType::from_name("X-Custom"), None);
    }

    #[test]
    fn test_compact_forms() {
        assert_eq!(HeaderType::from_name("v"), Some(HeaderType::Via));
        assert_eq!(HeaderType::from_name("f"), Some(HeaderType::From));
        assert_eq!(HeaderType::from_name("T"), Some(HeaderType::To));
        assert_eq!(HeaderType::from_name("i"), Some(HeaderType::CallId));
        assert_eq!(HeaderType::from_name("m"), Some(HeaderType::Contact));
        assert_eq!(HeaderType::from_name("l"), Some(HeaderType::ContentLength));
        assert_eq!(HeaderType::from_name("c"), Some(HeaderType::ContentType));
    }

    #[test]
    fn test_indices_are_dense() {
        for (i, header) in HeaderType::ALL.iter().enumerate() {
            assert_eq!(header.index(), i);
        }
        assert_eq!(HeaderType::COUNT, HeaderType::ALL.len());
    }

    #[test]
    fn test_grammar_table() {
        assert_eq!(HeaderType::Via.grammar(), Grammar::Via);
        assert_eq!(HeaderType::Contact.grammar(), Grammar::NameAddr);
        assert!(HeaderType::Route.is_multi());
        assert!(!HeaderType::Date.is_multi());
    }
}
