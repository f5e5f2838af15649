//! Via header (RFC 3261 Section 20.42).

use std::fmt;

use crate::error::Result;
use crate::parse_buffer::ParseBuffer;
use crate::types::branch::BranchParameter;
use crate::types::category::ParserCategory;
use crate::types::param::{Param, Params};

/// One Via entry: `SIP/2.0/UDP host:port;branch=...;other-params`.
///
/// The branch is held separately from the other parameters so the
/// transaction layer can read it without reparsing. It is always written
/// first on encode.
#[derive(Debug, Clone, PartialEq)]
pub struct Via {
    pub protocol_name: String,
    pub protocol_version: String,
    pub transport: String,
    pub host: String,
    pub port: Option<u16>,
    pub branch: Option<BranchParameter>,
    pub params: Params,
}

impl Default for Via {
    fn default() -> Self {
        Via {
            protocol_name: "SIP".to_string(),
            protocol_version: "2.0".to_string(),
            transport: "UDP".to_string(),
            host: String::new(),
            port: None,
            branch: None,
            params: Params::new(),
        }
    }
}

impl Via {
    pub fn new(transport: &str, host: impl Into<String>, port: Option<u16>) -> Self {
        Via {
            transport: transport.to_ascii_uppercase(),
            host: host.into(),
            port,
            branch: Some(BranchParameter::generate()),
            ..Default::default()
        }
    }

    pub fn branch(&self) -> Option<&BranchParameter> {
        self.branch.as_ref()
    }

    /// `host[:port]` as it appears in the sent-by field.
    pub fn sent_by(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{}", self.host, port),
            None => self.host.clone(),
        }
    }

    /// Sent-by host without IPv6 brackets.
    pub fn host_unbracketed(&self) -> &str {
        self.host.trim_start_matches('[').trim_end_matches(']')
    }

    pub fn received(&self) -> Option<&str> {
        self.params.value("received")
    }

    pub fn set_received(&mut self, address: impl Into<String>) {
        self.params.set(Param::new("received", Some(address.into())));
    }

    /// `Some(None)` when `rport` is present without a value (a request for
    /// symmetric response routing), `Some(Some(p))` once filled in.
    pub fn rport(&self) -> Option<Option<u16>> {
        self.params
            .get("rport")
            .map(|p| p.value.as_deref().and_then(|v| v.parse().ok()))
    }

    pub fn set_rport(&mut self, port: u16) {
        self.params.set(Param::new("rport", Some(port.to_string())));
    }
}

impl ParserCategory for Via {
    fn parse(pb: &mut ParseBuffer<'_>) -> Result<Self> {
        pb.skip_lws();
        let mut via = Via::default();

        let start = pb.mark();
        pb.skip_to_one_of(b"/ \t");
        via.protocol_name = pb.data_str(start)?.to_string();
        pb.skip_whitespace();
        pb.skip_char(b'/')?;
        pb.skip_whitespace();

        let start = pb.mark();
        pb.skip_to_one_of(b"/ \t");
        via.protocol_version = pb.data_str(start)?.to_string();
        pb.skip_whitespace();
        pb.skip_char(b'/')?;
        pb.skip_whitespace();

        let start = pb.mark();
        pb.skip_non_whitespace();
        via.transport = pb.data_str(start)?.to_string();
        if via.protocol_name.is_empty() || via.protocol_version.is_empty() || via.transport.is_empty() {
            return Err(pb.fail("incomplete sent-protocol"));
        }
        pb.skip_lws();

        let start = pb.mark();
        if pb.peek() == Some(b'[') {
            pb.skip_to_char(b']');
            pb.skip_char(b']')?;
        } else {
            pb.skip_to_one_of(b":; \t\r\n");
        }
        via.host = pb.data_str(start)?.to_string();
        if via.host.is_empty() {
            return Err(pb.fail("missing sent-by host"));
        }

        pb.skip_whitespace();
        if pb.peek() == Some(b':') {
            pb.skip_char(b':')?;
            pb.skip_whitespace();
            let port = pb.u32()?;
            via.port = Some(u16::try_from(port).map_err(|_| pb.fail("port out of range"))?);
        }

        let mut params = Params::parse(pb, &[])?;
        if let Some(branch) = params.remove("branch") {
            let value = branch.value.unwrap_or_default();
            via.branch = Some(BranchParameter::parse(value.as_bytes())?);
        }
        via.params = params;
        Ok(via)
    }
}

impl fmt::Display for Via {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{} {}",
            self.protocol_name,
            self.protocol_version,
            self.transport,
            self.sent_by()
        )?;
        if let Some(branch) = &self.branch {
            write!(f, ";branch={}", branch)?;
        }
        write!(f, "{}", self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_via() {
        let via = Via::parse_bytes(
            b"SIP / 2.0 / UDP pc33.atlanta.com:5066;rport;branch=z9hG4bK776asdhds;received=192.0.2.1",
            "Via",
        )
        .unwrap();
        assert_eq!(via.transport, "UDP");
        assert_eq!(via.host, "pc33.atlanta.com");
        assert_eq!(via.port, Some(5066));
        assert_eq!(via.branch().unwrap().transaction_id(), "776asdhds");
        assert_eq!(via.rport(), Some(None));
        assert_eq!(via.received(), Some("192.0.2.1"));
        assert_eq!(
            via.to_string(),
            "SIP/2.0/UDP pc33.atlanta.com:5066;branch=z9hG4bK776asdhds;rport;received=192.0.2.1"
        );
    }

    #[test]
    fn test_ipv6_sent_by() {
        let via = Via::parse_bytes(b"SIP/2.0/TCP [::1]:5060;branch=z9hG4bKx", "Via").unwrap();
        assert_eq!(via.host, "[::1]");
        assert_eq!(via.sent_by(), "[::1]:5060");
    }

    #[test]
    fn test_rport_filled() {
        let mut via = Via::new("udp", "10.0.0.1", None);
        via.params.set(Param::new("rport", None));
        via.set_rport(40000);
        assert_eq!(via.rport(), Some(Some(40000)));
        assert_eq!(via.transport, "UDP");
    }

    #[test]
    fn test_bad_local_branch_is_an_error() {
        assert!(Via::parse_bytes(b"SIP/2.0/UDP h;branch=z9hG4bK-sw-zz-x", "Via").is_err());
    }

    #[test]
    fn test_missing_host() {
        assert!(Via::parse_bytes(b"SIP/2.0/UDP ;branch=x", "Via").is_err());
    }
}
