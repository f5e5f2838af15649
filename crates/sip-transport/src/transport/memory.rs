//! In-process datagram network for tests and simulations.
//!
//! Every [`MemoryTransport`] attached to a [`MemoryNetwork`] moves whole
//! messages: they go into the destination's inbox when the sender processes,
//! and may be discarded by a drop filter. The network records every
//! delivered datagram so tests can count retransmissions. An endpoint
//! reports UDP unless bound with [`MemoryNetwork::bind_as`], which lets the
//! transaction layer be exercised in its reliable-transport mode.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use mio::{Registry, Token};
use parking_lot::Mutex;
use sipwire_sip_core::{TransportType, Tuple};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::transport::{
    frame_datagram, SendData, Transport, TransportEvent, TransportSink, MAX_READS_PER_PROCESS,
};

/// One datagram as seen on the simulated wire.
#[derive(Debug, Clone)]
pub struct Datagram {
    pub source: Tuple,
    pub destination: Tuple,
    pub data: Bytes,
}

impl Datagram {
    /// The datagram payload as text, for assertions.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

type DropFilter = Box<dyn Fn(&Datagram) -> bool + Send>;

#[derive(Default)]
struct NetworkInner {
    inboxes: HashMap<SocketAddr, VecDeque<Datagram>>,
    delivered: Vec<Datagram>,
    dropped: usize,
    drop_filter: Option<DropFilter>,
}

/// Shared simulated network. Cloning yields another handle to the same one.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    inner: Arc<Mutex<NetworkInner>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a UDP transport at `addr`. Fails if the address is taken.
    pub fn bind(&self, addr: SocketAddr) -> Result<MemoryTransport> {
        self.bind_as(addr, TransportType::Udp)
    }

    /// Attach a transport at `addr` that reports `transport_type`.
    pub fn bind_as(&self, addr: SocketAddr, transport_type: TransportType) -> Result<MemoryTransport> {
        let mut inner = self.inner.lock();
        if inner.inboxes.contains_key(&addr) {
            return Err(Error::Bind {
                addr,
                source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use"),
            });
        }
        inner.inboxes.insert(addr, VecDeque::new());
        debug!("Memory {} transport bound to {}", transport_type, addr);
        Ok(MemoryTransport {
            network: self.clone(),
            local: Tuple::new(addr, transport_type),
            tx_queue: VecDeque::new(),
            closed: false,
        })
    }

    /// Discard every datagram for which `filter` returns true.
    pub fn set_drop_filter<F>(&self, filter: F)
    where
        F: Fn(&Datagram) -> bool + Send + 'static,
    {
        self.inner.lock().drop_filter = Some(Box::new(filter));
    }

    pub fn clear_drop_filter(&self) {
        self.inner.lock().drop_filter = None;
    }

    /// Put raw bytes on the wire as if `source` had sent them to `destination`.
    pub fn inject(&self, source: Tuple, destination: SocketAddr, data: impl Into<Bytes>) -> Result<()> {
        let datagram = Datagram {
            source,
            destination: Tuple::udp(destination),
            data: data.into(),
        };
        self.transmit(datagram)
    }

    /// Datagrams delivered to `addr` so far.
    pub fn datagrams_to(&self, addr: SocketAddr) -> Vec<Datagram> {
        self.inner
            .lock()
            .delivered
            .iter()
            .filter(|d| d.destination.addr == addr)
            .cloned()
            .collect()
    }

    pub fn count_to(&self, addr: SocketAddr) -> usize {
        self.inner
            .lock()
            .delivered
            .iter()
            .filter(|d| d.destination.addr == addr)
            .count()
    }

    /// Every delivered datagram, in send order.
    pub fn delivered(&self) -> Vec<Datagram> {
        self.inner.lock().delivered.clone()
    }

    pub fn dropped(&self) -> usize {
        self.inner.lock().dropped
    }

    /// Datagrams waiting in `addr`'s inbox.
    pub fn pending(&self, addr: SocketAddr) -> usize {
        self.inner.lock().inboxes.get(&addr).map_or(0, VecDeque::len)
    }

    fn transmit(&self, datagram: Datagram) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.drop_filter.as_ref().is_some_and(|f| f(&datagram)) {
            trace!("Dropping datagram {} -> {}", datagram.source, datagram.destination);
            inner.dropped += 1;
            return Ok(());
        }
        let destination = datagram.destination.addr;
        let inbox = inner.inboxes.get_mut(&destination).ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                format!("nothing bound at {}", destination),
            ))
        })?;
        inbox.push_back(datagram.clone());
        inner.delivered.push(datagram);
        Ok(())
    }

    fn take(&self, addr: SocketAddr) -> Option<Datagram> {
        self.inner.lock().inboxes.get_mut(&addr)?.pop_front()
    }

    fn unbind(&self, addr: SocketAddr) {
        self.inner.lock().inboxes.remove(&addr);
    }
}

impl std::fmt::Debug for MemoryNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("MemoryNetwork")
            .field("endpoints", &inner.inboxes.len())
            .field("delivered", &inner.delivered.len())
            .field("dropped", &inner.dropped)
            .finish()
    }
}

/// A transport endpoint on a [`MemoryNetwork`].
#[derive(Debug)]
pub struct MemoryTransport {
    network: MemoryNetwork,
    local: Tuple,
    tx_queue: VecDeque<SendData>,
    closed: bool,
}

impl MemoryTransport {
    pub fn local_addr(&self) -> SocketAddr {
        self.local.addr
    }

    /// Detach from the network; later sends fail with `TransportClosed`.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.network.unbind(self.local.addr);
        }
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        self.close();
    }
}

impl Transport for MemoryTransport {
    fn transport_type(&self) -> TransportType {
        self.local.transport
    }

    fn local_tuple(&self) -> Tuple {
        self.local
    }

    fn send(&mut self, data: SendData) {
        self.tx_queue.push_back(data);
    }

    fn register(&mut self, _registry: &Registry, _token: Token) -> Result<()> {
        Ok(())
    }

    fn process(&mut self, sink: &dyn TransportSink) -> Result<bool> {
        let mut did_work = false;

        while let Some(item) = self.tx_queue.pop_front() {
            did_work = true;
            let result = if self.closed {
                Err(Error::TransportClosed)
            } else {
                self.network.transmit(Datagram {
                    source: self.local,
                    destination: item.destination,
                    data: item.data,
                })
            };
            if let Err(e) = result {
                debug!("Send to {} failed: {}", item.destination, e);
                sink.deliver(TransportEvent::SendFailed {
                    transaction_id: item.transaction_id,
                    is_client: item.is_client,
                    target: item.destination,
                    reason: e.to_string(),
                });
            }
        }

        for _ in 0..MAX_READS_PER_PROCESS {
            let Some(datagram) = self.network.take(self.local.addr) else {
                break;
            };
            did_work = true;
            if let Some(message) = frame_datagram(datagram.data, datagram.source, self.local) {
                sink.deliver(TransportEvent::MessageReceived(Box::new(message)));
            }
        }

        Ok(did_work)
    }

    fn has_data_to_send(&self) -> bool {
        !self.tx_queue.is_empty()
    }
}
