//! Transport abstraction consumed by the transaction layer.
//!
//! A transport owns one local address. Outbound datagrams are queued with
//! [`Transport::send`] and flushed by [`Transport::process`], which also
//! reads whatever is available and hands framed messages to a
//! [`TransportSink`]. Nothing here blocks: sockets are non-blocking and
//! registered with a `mio` registry so an outer poll loop can wait on them.

pub mod memory;
pub mod udp;

use std::net::IpAddr;

use bytes::Bytes;
use sipwire_sip_core::{h, SipMessage, TransportType, Tuple};
use tracing::{debug, trace};

use crate::error::Result;

pub use memory::{Datagram, MemoryNetwork, MemoryTransport};
pub use udp::UdpTransport;

/// Upper bound on datagrams read per `process` call so one busy socket
/// cannot starve the rest of the loop.
pub const MAX_READS_PER_PROCESS: usize = 64;

/// One encoded message queued for the wire.
#[derive(Debug, Clone)]
pub struct SendData {
    pub destination: Tuple,
    pub data: Bytes,
    pub transaction_id: String,
    pub is_client: bool,
}

impl SendData {
    pub fn new(
        destination: Tuple,
        data: Bytes,
        transaction_id: impl Into<String>,
        is_client: bool,
    ) -> Self {
        SendData {
            destination,
            data,
            transaction_id: transaction_id.into(),
            is_client,
        }
    }
}

/// Events a transport reports upward.
#[derive(Debug)]
pub enum TransportEvent {
    /// A framed message from the wire, with source and receive tuple set
    MessageReceived(Box<SipMessage>),

    /// A queued datagram could not be written
    SendFailed {
        transaction_id: String,
        is_client: bool,
        target: Tuple,
        reason: String,
    },
}

/// Receiver of transport events. Implemented by the transaction layer,
/// which feeds them into its state-machine queue.
pub trait TransportSink: Send + Sync {
    fn deliver(&self, event: TransportEvent);
}

/// A single bound transport.
pub trait Transport: Send {
    fn transport_type(&self) -> TransportType;

    /// Address this transport is bound to.
    fn local_tuple(&self) -> Tuple;

    fn is_reliable(&self) -> bool {
        self.transport_type().is_reliable()
    }

    /// Queue a datagram. Never blocks; failures are reported from `process`.
    fn send(&mut self, data: SendData);

    /// Register the underlying socket with a poll registry.
    fn register(&mut self, registry: &mio::Registry, token: mio::Token) -> Result<()>;

    /// Flush queued sends and read available input. Returns whether any
    /// datagram moved in either direction.
    fn process(&mut self, sink: &dyn TransportSink) -> Result<bool>;

    fn has_data_to_send(&self) -> bool;
}

/// Frame one received datagram into a message, stamping the transport
/// metadata. Returns `None` (after logging) when the datagram is unusable.
pub fn frame_datagram(data: Bytes, source: Tuple, local: Tuple) -> Option<SipMessage> {
    if data.iter().all(|b| matches!(b, b'\r' | b'\n')) {
        trace!(%source, "Ignoring keepalive");
        return None;
    }

    let mut message = match SipMessage::parse(data) {
        Ok(message) => message,
        Err(e) => {
            debug!(%source, error = %e, "Dropping unparsable datagram");
            return None;
        }
    };
    message.set_from_wire(true);
    message.set_source(source);
    message.set_receive_tuple(local);

    if message.is_request() {
        if let Err(e) = stamp_received(&mut message, source) {
            debug!(%source, error = %e, "Dropping request with bad Via");
            return None;
        }
    }
    Some(message)
}

/// RFC 3261 Section 18.2.1 and RFC 3581: record the packet source on the
/// top Via so responses can be routed back to it.
/// A request without a Via is left alone for the transaction layer to reject.
fn stamp_received(message: &mut SipMessage, source: Tuple) -> sipwire_sip_core::Result<()> {
    if !message.exists::<h::Via>() {
        return Ok(());
    }
    let via = message.header::<h::Via>()?;
    let source_ip = source.addr.ip();
    let sent_by_matches = via
        .host_unbracketed()
        .parse::<IpAddr>()
        .map(|ip| ip == source_ip)
        .unwrap_or(false);
    if !sent_by_matches || via.rport().is_some() {
        via.set_received(source_ip.to_string());
    }
    if via.rport().is_some() {
        via.set_rport(source.addr.port());
    }
    Ok(())
}
