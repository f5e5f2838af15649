//! Chooses where and through which transport a message leaves the stack.
//!
//! Requests go to the fixed destination if one is set, otherwise to the top
//! Route, otherwise to the Request-URI. Responses follow the top Via
//! (RFC 3261 Section 18.2.2 with the RFC 3581 `rport` extension). Hosts must
//! be IP literals; name resolution is left to the transaction user, which
//! can always pin a destination with a fixed destination.

use std::net::{IpAddr, SocketAddr};

use sipwire_sip_core::{h, SipMessage, TransportType, Tuple, Uri};
use sipwire_sip_transport::{SendData, Transport, TransportSink};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};

/// The pair of addresses a transaction's messages travel between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flow {
    pub local: Tuple,
    pub destination: Tuple,
}

impl Flow {
    pub fn is_reliable(&self) -> bool {
        self.destination.transport.is_reliable()
    }
}

#[derive(Default)]
pub struct TransportSelector {
    transports: Vec<Box<dyn Transport>>,
    registered: usize,
}

impl TransportSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_transport(&mut self, transport: Box<dyn Transport>) {
        debug!(
            "Adding {} transport on {}",
            transport.transport_type(),
            transport.local_tuple()
        );
        self.transports.push(transport);
    }

    pub fn transport_count(&self) -> usize {
        self.transports.len()
    }

    pub fn local_tuples(&self) -> Vec<Tuple> {
        self.transports.iter().map(|t| t.local_tuple()).collect()
    }

    /// Register transports added since the last call. Transport `i` gets
    /// token `first_token + i`.
    pub fn register(&mut self, registry: &mio::Registry, first_token: usize) -> Result<()> {
        for (index, transport) in self.transports.iter_mut().enumerate().skip(self.registered) {
            transport.register(registry, mio::Token(first_token + index))?;
            self.registered = index + 1;
        }
        Ok(())
    }

    pub fn has_data_to_send(&self) -> bool {
        self.transports.iter().any(|t| t.has_data_to_send())
    }

    /// Run every transport once. Returns whether any of them moved data.
    pub fn process(&mut self, sink: &dyn TransportSink) -> bool {
        let mut did_work = false;
        for transport in &mut self.transports {
            match transport.process(sink) {
                Ok(worked) => did_work |= worked,
                Err(e) => warn!("Transport {} failed: {}", transport.local_tuple(), e),
            }
        }
        did_work
    }

    /// Resolve a destination for `msg`, stamp the Via for requests, encode
    /// and queue it. `preferred_local` picks among transports of the same
    /// type, normally the one a request arrived on.
    pub fn send(
        &mut self,
        msg: &mut SipMessage,
        transaction_id: &str,
        is_client: bool,
        preferred_local: Option<Tuple>,
    ) -> Result<Flow> {
        let destination = self.destination_for(msg)?;
        let index = self.select(destination.transport, preferred_local)?;
        let local = self.transports[index].local_tuple();

        if msg.is_request() {
            let via = msg.header::<h::Via>()?;
            if via.host.is_empty() {
                via.host = match local.addr.ip() {
                    IpAddr::V6(ip) => format!("[{}]", ip),
                    IpAddr::V4(ip) => ip.to_string(),
                };
                via.port = Some(local.addr.port());
                via.transport = local.transport.as_via_str().to_string();
            }
        }

        let flow = Flow { local, destination };
        self.queue(index, msg, flow, transaction_id, is_client);
        Ok(flow)
    }

    /// Queue `msg` again along an established flow.
    pub fn resend(
        &mut self,
        msg: &SipMessage,
        flow: Flow,
        transaction_id: &str,
        is_client: bool,
    ) -> Result<()> {
        let index = self
            .transports
            .iter()
            .position(|t| t.local_tuple() == flow.local)
            .ok_or(Error::NoTransport(flow.local.transport))?;
        self.queue(index, msg, flow, transaction_id, is_client);
        Ok(())
    }

    fn queue(&mut self, index: usize, msg: &SipMessage, flow: Flow, tid: &str, is_client: bool) {
        trace!(tid = %tid, "Queueing {} for {}", msg.brief(), flow.destination);
        self.transports[index].send(SendData::new(
            flow.destination,
            msg.encode(),
            tid,
            is_client,
        ));
    }

    fn select(&self, transport: TransportType, preferred: Option<Tuple>) -> Result<usize> {
        if let Some(preferred) = preferred.filter(|p| p.transport == transport) {
            if let Some(index) = self.transports.iter().position(|t| t.local_tuple() == preferred) {
                return Ok(index);
            }
        }
        self.transports
            .iter()
            .position(|t| t.transport_type() == transport)
            .ok_or(Error::NoTransport(transport))
    }

    /// Where `msg` should be sent.
    pub fn destination_for(&self, msg: &SipMessage) -> Result<Tuple> {
        if let Some(fixed) = msg.fixed_destination() {
            return Ok(fixed);
        }
        if msg.is_request() {
            if msg.exists::<h::Route>() {
                let route = msg.const_header::<h::Route>()?;
                return uri_destination(&route.uri);
            }
            let uri = &msg
                .request_line()
                .ok_or_else(|| Error::NoDestination(msg.brief()))?
                .uri;
            uri_destination(uri)
        } else {
            response_destination(msg)
        }
    }
}

impl std::fmt::Debug for TransportSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportSelector")
            .field("transports", &self.local_tuples())
            .finish()
    }
}

fn parse_ip(host: &str) -> Result<IpAddr> {
    host.trim_start_matches('[')
        .trim_end_matches(']')
        .parse()
        .map_err(|_| Error::NoDestination(format!("'{}' is not an IP address", host)))
}

fn uri_destination(uri: &Uri) -> Result<Tuple> {
    let transport = match uri.transport() {
        Some(t) => t.parse::<TransportType>()?,
        None if uri.is_secure() => TransportType::Tls,
        None => TransportType::Udp,
    };
    let ip = parse_ip(uri.maddr().unwrap_or(&uri.host))?;
    let port = uri.port.unwrap_or_else(|| transport.default_port());
    Ok(Tuple::new(SocketAddr::new(ip, port), transport))
}

fn response_destination(msg: &SipMessage) -> Result<Tuple> {
    let via = msg.const_header::<h::Via>()?;
    let transport = via.transport.parse::<TransportType>()?;
    let ip = parse_ip(via.received().unwrap_or(&via.host))?;
    let port = match via.rport() {
        Some(Some(port)) => port,
        _ => via.port.unwrap_or_else(|| transport.default_port()),
    };
    Ok(Tuple::new(SocketAddr::new(ip, port), transport))
}
