//! SIP and SIPS URIs (RFC 3261 Section 19.1).
//!
//! Other schemes are kept opaquely: everything after the colon lands in
//! [`Uri::host`] and is written back unchanged.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::parse_buffer::ParseBuffer;
use crate::types::category::ParserCategory;
use crate::types::param::{Param, Params};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uri {
    pub scheme: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub host: String,
    pub port: Option<u16>,
    pub params: Params,
    pub headers: Option<String>,
}

impl Default for Uri {
    fn default() -> Self {
        Uri {
            scheme: "sip".to_string(),
            user: None,
            password: None,
            host: String::new(),
            port: None,
            params: Params::new(),
            headers: None,
        }
    }
}

impl Uri {
    pub fn sip(host: impl Into<String>) -> Self {
        Uri {
            host: host.into(),
            ..Default::default()
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_param(mut self, name: &str, value: Option<&str>) -> Self {
        self.params.set(Param::new(name, value.map(str::to_string)));
        self
    }

    pub fn is_sip(&self) -> bool {
        self.scheme.eq_ignore_ascii_case("sip") || self.scheme.eq_ignore_ascii_case("sips")
    }

    pub fn is_secure(&self) -> bool {
        self.scheme.eq_ignore_ascii_case("sips")
    }

    /// Value of the `transport` URI parameter, if any.
    pub fn transport(&self) -> Option<&str> {
        self.params.value("transport")
    }

    /// `maddr` overrides the host for routing purposes.
    pub fn maddr(&self) -> Option<&str> {
        self.params.value("maddr")
    }

    /// Host with IPv6 brackets stripped.
    pub fn host_unbracketed(&self) -> &str {
        self.host.trim_start_matches('[').trim_end_matches(']')
    }

    /// Parse a URI from the cursor. The URI ends at the first byte in `stops`
    /// or at end of input. When `with_params` is false a `;` also ends the
    /// URI, so trailing parameters belong to the enclosing header.
    pub fn parse_until(pb: &mut ParseBuffer<'_>, stops: &[u8], with_params: bool) -> Result<Uri> {
        pb.skip_whitespace();
        let start = pb.mark();
        pb.skip_to_one_of(&[b':', b' ', b'\t', b'>', b'<']);
        let scheme = pb.data_str(start)?.to_string();
        if scheme.is_empty() || !scheme.bytes().all(|c| c.is_ascii_alphanumeric() || c == b'+' || c == b'-' || c == b'.') {
            return Err(pb.fail("invalid URI scheme"));
        }
        pb.skip_char(b':')?;

        let mut uri = Uri {
            scheme,
            ..Default::default()
        };

        let mut end_stops: Vec<u8> = vec![b' ', b'\t', b'\r', b'\n'];
        end_stops.extend_from_slice(stops);
        if !with_params {
            end_stops.push(b';');
        }

        if !uri.is_sip() {
            let opaque_start = pb.mark();
            pb.skip_to_one_of(&end_stops);
            uri.host = pb.data_str(opaque_start)?.to_string();
            return Ok(uri);
        }

        // userinfo is present only if an '@' appears before the URI ends
        let rest = pb.rest();
        let mut userinfo_stops = end_stops.clone();
        userinfo_stops.retain(|c| *c != b';');
        let limit = rest
            .iter()
            .position(|c| userinfo_stops.contains(c))
            .unwrap_or(rest.len());
        if let Some(at) = rest[..limit].iter().rposition(|&c| c == b'@') {
            let userinfo_start = pb.mark();
            pb.skip_n(at)?;
            let userinfo = pb.data_str(userinfo_start)?;
            match userinfo.split_once(':') {
                Some((user, password)) => {
                    uri.user = Some(user.to_string());
                    uri.password = Some(password.to_string());
                }
                None => uri.user = Some(userinfo.to_string()),
            }
            pb.skip_char(b'@')?;
        }

        let host_start = pb.mark();
        if pb.peek() == Some(b'[') {
            pb.skip_to_char(b']');
            pb.skip_char(b']')?;
        } else {
            let mut host_stops = end_stops.clone();
            host_stops.extend_from_slice(&[b':', b';', b'?']);
            pb.skip_to_one_of(&host_stops);
        }
        uri.host = pb.data_str(host_start)?.to_string();
        if uri.host.is_empty() {
            return Err(pb.fail("empty host"));
        }

        if pb.peek() == Some(b':') {
            pb.skip_char(b':')?;
            let port = pb.u32()?;
            uri.port = Some(u16::try_from(port).map_err(|_| pb.fail("port out of range"))?);
        }

        if with_params {
            let mut param_stops = end_stops.clone();
            param_stops.push(b'?');
            uri.params = Params::parse_inline(pb, &param_stops)?;
        }

        if pb.peek() == Some(b'?') {
            pb.skip_char(b'?')?;
            let headers_start = pb.mark();
            pb.skip_to_one_of(&end_stops);
            uri.headers = Some(pb.data_str(headers_start)?.to_string());
        }

        Ok(uri)
    }
}

impl Params {
    /// URI parameters may not be separated by whitespace, so whitespace ends
    /// the list rather than being skipped.
    pub(crate) fn parse_inline(pb: &mut ParseBuffer<'_>, stops: &[u8]) -> Result<Params> {
        let mut params = Params::new();
        while pb.peek() == Some(b';') {
            pb.skip_char(b';')?;
            let start = pb.mark();
            let mut name_stops = stops.to_vec();
            name_stops.extend_from_slice(&[b';', b'=']);
            pb.skip_to_one_of(&name_stops);
            let name = pb.data_str(start)?.to_string();
            if name.is_empty() {
                return Err(pb.fail("empty URI parameter name"));
            }
            let value = if pb.peek() == Some(b'=') {
                pb.skip_char(b'=')?;
                let value_start = pb.mark();
                let mut value_stops = stops.to_vec();
                value_stops.push(b';');
                pb.skip_to_one_of(&value_stops);
                Some(pb.data_str(value_start)?.to_string())
            } else {
                None
            };
            params.set(Param::new(name, value));
        }
        Ok(params)
    }
}

impl ParserCategory for Uri {
    fn parse(pb: &mut ParseBuffer<'_>) -> Result<Self> {
        Uri::parse_until(pb, &[], true)
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.scheme)?;
        if let Some(user) = &self.user {
            f.write_str(user)?;
            if let Some(password) = &self.password {
                write!(f, ":{}", password)?;
            }
            f.write_str("@")?;
        }
        f.write_str(&self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        write!(f, "{}", self.params)?;
        if let Some(headers) = &self.headers {
            write!(f, "?{}", headers)?;
        }
        Ok(())
    }
}

impl FromStr for Uri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uri::parse_bytes(s.as_bytes(), "Uri")
    }
}
