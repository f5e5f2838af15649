use std::fmt;

use crate::error::Result;
use crate::parse_buffer::ParseBuffer;
use crate::types::category::ParserCategory;
use crate::types::param::{Param, Params};

/// Media type such as `application/sdp` (Content-Type, Accept).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Mime {
    pub mime_type: String,
    pub subtype: String,
    pub params: Params,
}

impl Mime {
    pub fn new(mime_type: impl Into<String>, subtype: impl Into<String>) -> Self {
        Mime {
            mime_type: mime_type.into(),
            subtype: subtype.into(),
            params: Params::new(),
        }
    }

    /// Type and subtype compare case-insensitively; parameters are ignored.
    pub fn matches(&self, mime_type: &str, subtype: &str) -> bool {
        self.mime_type.eq_ignore_ascii_case(mime_type) && self.subtype.eq_ignore_ascii_case(subtype)
    }

    pub fn boundary(&self) -> Option<&str> {
        self.params.value("boundary")
    }

    pub fn with_boundary(mut self, boundary: impl Into<String>) -> Self {
        self.params.set(Param::new("boundary", Some(boundary.into())));
        self
    }
}

impl ParserCategory for Mime {
    fn parse(pb: &mut ParseBuffer<'_>) -> Result<Self> {
        pb.skip_lws();
        let start = pb.mark();
        pb.skip_to_one_of(b"/ \t");
        let mime_type = pb.data_str(start)?.to_string();
        pb.skip_whitespace();
        pb.skip_char(b'/')?;
        pb.skip_whitespace();
        let start = pb.mark();
        pb.skip_to_one_of(b"; \t\r\n");
        let subtype = pb.data_str(start)?.to_string();
        if mime_type.is_empty() || subtype.is_empty() {
            return Err(pb.fail("incomplete media type"));
        }
        let params = Params::parse(pb, &[])?;
        Ok(Mime {
            mime_type,
            subtype,
            params,
        })
    }
}

impl fmt::Display for Mime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}{}", self.mime_type, self.subtype, self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_with_boundary() {
        let m = Mime::parse_bytes(b"multipart/mixed; boundary=\"0a1b2c\"", "Content-Type").unwrap();
        assert!(m.matches("Multipart", "MIXED"));
        assert_eq!(m.boundary(), Some("0a1b2c"));
        assert!(Mime::parse_bytes(b"text", "Content-Type").is_err());
    }
}
