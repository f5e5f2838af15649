//! Transport addresses: a socket address plus the transport protocol.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Transport protocol of a [`Tuple`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportType {
    #[default]
    Udp,
    Tcp,
    Tls,
}

impl TransportType {
    /// Reliable transports do not need SIP-level retransmission.
    pub fn is_reliable(self) -> bool {
        !matches!(self, TransportType::Udp)
    }

    /// Token used in the Via sent-protocol.
    pub fn as_via_str(self) -> &'static str {
        match self {
            TransportType::Udp => "UDP",
            TransportType::Tcp => "TCP",
            TransportType::Tls => "TLS",
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            TransportType::Tls => 5061,
            _ => 5060,
        }
    }
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_via_str())
    }
}

impl FromStr for TransportType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "UDP" => Ok(TransportType::Udp),
            "TCP" => Ok(TransportType::Tcp),
            "TLS" => Ok(TransportType::Tls),
            _ => Err(Error::InvalidMessage(format!("unknown transport '{}'", s))),
        }
    }
}

/// Where a message came from or is going to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tuple {
    pub addr: SocketAddr,
    pub transport: TransportType,
}

impl Tuple {
    pub fn new(addr: SocketAddr, transport: TransportType) -> Self {
        Tuple { addr, transport }
    }

    pub fn udp(addr: SocketAddr) -> Self {
        Tuple::new(addr, TransportType::Udp)
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} {}]", self.transport, self.addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_type() {
        assert_eq!("udp".parse::<TransportType>().unwrap(), TransportType::Udp);
        assert!(!TransportType::Udp.is_reliable());
        assert!(TransportType::Tcp.is_reliable());
        assert_eq!(TransportType::Tls.default_port(), 5061);
        assert!("sctp".parse::<TransportType>().is_err());
    }

    #[test]
    fn test_tuple_display() {
        let t = Tuple::udp("127.0.0.1:5060".parse().unwrap());
        assert_eq!(t.to_string(), "[UDP 127.0.0.1:5060]");
    }
}
