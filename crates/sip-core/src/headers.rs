//! Typed header access keys.
//!
//! Each marker in [`h`] ties a [`HeaderType`] to the category its values
//! parse into, so `msg.header::<h::CSeq>()` returns a `&mut CSeqCategory`.

use crate::types::category::HeaderCategory;
use crate::types::header_type::HeaderType;

pub trait Header {
    type Category: HeaderCategory;
    const TYPE: HeaderType;
}

macro_rules! header_markers {
    ($( $marker:ident => $category:ty ),* $(,)?) => {
        pub mod h {
            use super::Header;
            use crate::types::header_type::HeaderType;
            use crate::types;

            $(
                #[derive(Debug, Clone, Copy)]
                pub struct $marker;

                impl Header for $marker {
                    type Category = $category;
                    const TYPE: HeaderType = HeaderType::$marker;
                }
            )*

            #[cfg(test)]
            pub(crate) fn grammar_mismatches() -> Vec<HeaderType> {
                use crate::types::category::HeaderCategory;
                let mut bad = Vec::new();
                $(
                    if <$category as HeaderCategory>::GRAMMAR != HeaderType::$marker.grammar() {
                        bad.push(HeaderType::$marker);
                    }
                )*
                bad
            }
        }
    };
}

header_markers! {
    Via => types::Via,
    MaxForwards => types::UInt32Category,
    Route => types::NameAddr,
    RecordRoute => types::NameAddr,
    To => types::NameAddr,
    From => types::NameAddr,
    CallId => types::CallId,
    CSeq => types::CSeqCategory,
    Contact => types::NameAddr,
    Expires => types::ExpiresCategory,
    MinExpires => types::UInt32Category,
    ReferTo => types::NameAddr,
    Event => types::Token,
    AllowEvents => types::Token,
    Allow => types::Token,
    Supported => types::Token,
    Require => types::Token,
    ProxyRequire => types::Token,
    Unsupported => types::Token,
    Accept => types::Mime,
    ContentEncoding => types::Token,
    ContentDisposition => types::Token,
    Subject => types::StringCategory,
    UserAgent => types::StringCategory,
    Server => types::StringCategory,
    Organization => types::StringCategory,
    Date => types::StringCategory,
    Timestamp => types::StringCategory,
    ContentType => types::Mime,
    ContentLength => types::UInt32Category,
}
