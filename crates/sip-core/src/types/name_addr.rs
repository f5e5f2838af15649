//! `name-addr` / `addr-spec` values used by To, From, Contact, Route,
//! Record-Route and Refer-To.

use std::fmt;

use crate::error::Result;
use crate::parse_buffer::ParseBuffer;
use crate::types::category::ParserCategory;
use crate::types::param::{Param, Params};
use crate::types::uri::Uri;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NameAddr {
    pub display_name: Option<String>,
    pub uri: Uri,
    pub params: Params,
    /// `Contact: *`
    pub all_contacts: bool,
}

impl NameAddr {
    pub fn new(uri: Uri) -> Self {
        NameAddr {
            uri,
            ..Default::default()
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn tag(&self) -> Option<&str> {
        self.params.value("tag")
    }

    pub fn set_tag(&mut self, tag: impl Into<String>) {
        self.params.set(Param::new("tag", Some(tag.into())));
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.set_tag(tag);
        self
    }
}

impl ParserCategory for NameAddr {
    fn parse(pb: &mut ParseBuffer<'_>) -> Result<Self> {
        pb.skip_lws();
        let mut value = NameAddr::default();

        if pb.peek() == Some(b'*') {
            pb.skip_char(b'*')?;
            value.all_contacts = true;
            value.params = Params::parse(pb, &[])?;
            return Ok(value);
        }

        if pb.peek() == Some(b'"') {
            pb.skip_char(b'"')?;
            let start = pb.mark();
            pb.skip_to_end_quote(b'"')?;
            value.display_name = Some(pb.data_str(start)?.to_string());
            pb.skip_char(b'"')?;
            pb.skip_lws();
            if pb.peek() != Some(b'<') {
                return Err(pb.fail("expected '<' after display name"));
            }
        } else if pb.rest().contains(&b'<') {
            let start = pb.mark();
            pb.skip_to_char(b'<');
            let name = std::str::from_utf8(pb.data(start))
                .map_err(|_| pb.fail("display name is not UTF-8"))?
                .trim();
            if !name.is_empty() {
                value.display_name = Some(name.to_string());
            }
        }

        if pb.peek() == Some(b'<') {
            pb.skip_char(b'<')?;
            value.uri = Uri::parse_until(pb, b">", true)?;
            pb.skip_char(b'>')?;
        } else {
            value.uri = Uri::parse_until(pb, &[], false)?;
        }

        value.params = Params::parse(pb, &[])?;
        Ok(value)
    }
}

impl fmt::Display for NameAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.all_contacts {
            f.write_str("*")?;
        } else {
            if let Some(name) = &self.display_name {
                write!(f, "\"{}\" ", name)?;
            }
            write!(f, "<{}>", self.uri)?;
        }
        write!(f, "{}", self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoted_display_name() {
        let na = NameAddr::parse_bytes(b"\"Bob \\\"B\\\"\" <sip:bob@biloxi.com>;tag=a6c85cf", "To")
            .unwrap();
        assert_eq!(na.display_name.as_deref(), Some("Bob \\\"B\\\""));
        assert_eq!(na.uri.host, "biloxi.com");
        assert_eq!(na.tag(), Some("a6c85cf"));
    }

    #[test]
    fn test_token_display_name() {
        let na = NameAddr::parse_bytes(b"Alice <sip:alice@atlanta.com;transport=udp>;tag=9fxced76sl", "From")
            .unwrap();
        assert_eq!(na.display_name.as_deref(), Some("Alice"));
        assert_eq!(na.uri.transport(), Some("udp"));
        assert_eq!(na.tag(), Some("9fxced76sl"));
    }

    #[test]
    fn test_addr_spec_params_belong_to_header() {
        let na = NameAddr::parse_bytes(b"sip:carol@chicago.com;tag=77", "To").unwrap();
        assert!(na.uri.params.is_empty());
        assert_eq!(na.tag(), Some("77"));
        assert_eq!(na.to_string(), "<sip:carol@chicago.com>;tag=77");
    }

    #[test]
    fn test_star_contact() {
        let na = NameAddr::parse_bytes(b"*", "Contact").unwrap();
        assert!(na.all_contacts);
        assert_eq!(na.to_string(), "*");
    }

    #[test]
    fn test_set_tag_replaces() {
        let mut na = NameAddr::new(Uri::sip("example.com")).with_tag("one");
        na.set_tag("two");
        assert_eq!(na.tag(), Some("two"));
        assert_eq!(na.params.len(), 1);
    }

    #[test]
    fn test_unterminated_angle() {
        assert!(NameAddr::parse_bytes(b"<sip:a@b", "To").is_err());
    }
}
