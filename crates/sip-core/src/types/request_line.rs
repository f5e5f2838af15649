use std::fmt;

use crate::error::{Error, Result};
use crate::parse_buffer::ParseBuffer;
use crate::parser::start_line::{raw_start_line, RawStartLine};
use crate::types::category::ParserCategory;
use crate::types::method::Method;
use crate::types::uri::Uri;

/// `Method SP Request-URI SP SIP-Version`
#[derive(Debug, Clone, PartialEq)]
pub struct RequestLine {
    pub method: Method,
    pub uri: Uri,
    pub version: String,
}

impl Default for RequestLine {
    fn default() -> Self {
        RequestLine {
            method: Method::default(),
            uri: Uri::default(),
            version: "SIP/2.0".to_string(),
        }
    }
}

impl RequestLine {
    pub fn new(method: Method, uri: Uri) -> Self {
        RequestLine {
            method,
            uri,
            ..Default::default()
        }
    }
}

fn utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|_| Error::Utf8("start line".to_string()))
}

impl ParserCategory for RequestLine {
    fn parse(pb: &mut ParseBuffer<'_>) -> Result<Self> {
        let line = pb.rest();
        match raw_start_line(line)? {
            RawStartLine::Request {
                method,
                uri,
                version,
            } => {
                let parsed = RequestLine {
                    method: utf8(method)?.parse()?,
                    uri: utf8(uri)?.parse()?,
                    version: utf8(version)?.to_string(),
                };
                pb.skip_n(line.len())?;
                Ok(parsed)
            }
            RawStartLine::Status { .. } => Err(pb.fail("expected a request line")),
        }
    }
}

impl fmt::Display for RequestLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.method, self.uri, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_line() {
        let rl = RequestLine::parse_bytes(b"REGISTER sip:registrar.biloxi.com SIP/2.0", "RequestLine")
            .unwrap();
        assert_eq!(rl.method, Method::Register);
        assert_eq!(rl.uri.host, "registrar.biloxi.com");
        assert_eq!(rl.to_string(), "REGISTER sip:registrar.biloxi.com SIP/2.0");
        assert!(RequestLine::parse_bytes(b"SIP/2.0 200 OK", "RequestLine").is_err());
    }
}
