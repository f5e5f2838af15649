//! # sipwire-sip-transport
//!
//! Transports for the sipwire stack. Each transport queues outbound
//! datagrams, reads inbound ones without blocking, frames them into
//! [`SipMessage`](sipwire_sip_core::SipMessage)s and reports them to a
//! [`TransportSink`].
//!
//! - [`UdpTransport`]: a `mio` UDP socket, registered with the caller's poll.
//! - [`MemoryTransport`]: an endpoint on a shared [`MemoryNetwork`], used to
//!   run whole stacks in one process with deterministic delivery.

pub mod error;
pub mod transport;

pub use error::{Error, Result};
pub use transport::{
    frame_datagram, Datagram, MemoryNetwork, MemoryTransport, SendData, Transport,
    TransportEvent, TransportSink, UdpTransport,
};
