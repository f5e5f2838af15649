use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;

use mio::net::UdpSocket;
use mio::{Interest, Registry, Token};
use sipwire_sip_core::{TransportType, Tuple};
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::transport::{
    frame_datagram, SendData, Transport, TransportEvent, TransportSink, MAX_READS_PER_PROCESS,
};

/// Largest datagram we accept
pub const MAX_UDP_DATAGRAM: usize = 65535;

/// UDP transport for SIP messages on a non-blocking `mio` socket
pub struct UdpTransport {
    socket: UdpSocket,
    local: Tuple,
    tx_queue: VecDeque<SendData>,
    recv_buffer: Vec<u8>,
}

impl UdpTransport {
    /// Binds a new UDP transport. Failing to bind is fatal to construction.
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr).map_err(|source| Error::Bind { addr, source })?;
        let local_addr = socket.local_addr()?;

        info!("SIP UDP transport bound to {}", local_addr);

        Ok(UdpTransport {
            socket,
            local: Tuple::udp(local_addr),
            tx_queue: VecDeque::new(),
            recv_buffer: vec![0u8; MAX_UDP_DATAGRAM],
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local.addr
    }

    fn flush(&mut self, sink: &dyn TransportSink) -> bool {
        let mut did_work = false;
        while let Some(item) = self.tx_queue.pop_front() {
            match self.socket.send_to(&item.data, item.destination.addr) {
                Ok(sent) => {
                    did_work = true;
                    trace!(
                        "Sent {} bytes to {} (tid {})",
                        sent,
                        item.destination,
                        item.transaction_id
                    );
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    self.tx_queue.push_front(item);
                    break;
                }
                Err(e) => {
                    did_work = true;
                    warn!("Failed to send to {}: {}", item.destination, e);
                    sink.deliver(TransportEvent::SendFailed {
                        transaction_id: item.transaction_id,
                        is_client: item.is_client,
                        target: item.destination,
                        reason: e.to_string(),
                    });
                }
            }
        }
        did_work
    }

    fn read(&mut self, sink: &dyn TransportSink) -> Result<bool> {
        let mut did_work = false;
        for _ in 0..MAX_READS_PER_PROCESS {
            match self.socket.recv_from(&mut self.recv_buffer) {
                Ok((len, src)) => {
                    did_work = true;
                    debug!("Received SIP message from {}", src);
                    let data = bytes::Bytes::copy_from_slice(&self.recv_buffer[..len]);
                    if let Some(message) = frame_datagram(data, Tuple::udp(src), self.local) {
                        sink.deliver(TransportEvent::MessageReceived(Box::new(message)));
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                // ICMP port unreachable from an earlier send shows up here on some platforms
                Err(e) if e.kind() == io::ErrorKind::ConnectionReset => {
                    debug!("Ignoring reset on {}: {}", self.local, e);
                }
                Err(e) => return Err(Error::Io(e)),
            }
        }
        Ok(did_work)
    }
}

impl Transport for UdpTransport {
    fn transport_type(&self) -> TransportType {
        TransportType::Udp
    }

    fn local_tuple(&self) -> Tuple {
        self.local
    }

    fn send(&mut self, data: SendData) {
        self.tx_queue.push_back(data);
    }

    fn register(&mut self, registry: &Registry, token: Token) -> Result<()> {
        registry.register(&mut self.socket, token, Interest::READABLE | Interest::WRITABLE)?;
        Ok(())
    }

    fn process(&mut self, sink: &dyn TransportSink) -> Result<bool> {
        let sent = self.flush(sink);
        let received = self.read(sink)?;
        Ok(sent || received)
    }

    fn has_data_to_send(&self) -> bool {
        !self.tx_queue.is_empty()
    }
}

impl std::fmt::Debug for UdpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpTransport")
            .field("local", &self.local)
            .field("queued", &self.tx_queue.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use parking_lot::Mutex;
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct Collect(Mutex<Vec<TransportEvent>>);

    impl TransportSink for Collect {
        fn deliver(&self, event: TransportEvent) {
            self.0.lock().push(event);
        }
    }

    const OPTIONS: &[u8] = b"OPTIONS sip:test@127.0.0.1 SIP/2.0\r\n\
Via: SIP/2.0/UDP 127.0.0.1;branch=z9hG4bK-udp-test\r\n\
CSeq: 1 OPTIONS\r\nContent-Length: 0\r\n\r\n";

    #[test]
    fn test_udp_transport_bind() {
        let transport = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        assert_ne!(transport.local_addr().port(), 0);
        assert_eq!(transport.transport_type(), TransportType::Udp);
        assert!(!transport.is_reliable());
    }

    #[test]
    fn test_udp_transport_bind_conflict() {
        let first = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let result = UdpTransport::bind(first.local_addr());
        assert!(matches!(result, Err(Error::Bind { .. })));
    }

    #[test]
    fn test_udp_transport_send_receive() {
        let mut a = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let mut b = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let sink_a = Collect::default();
        let sink_b = Collect::default();

        a.send(SendData::new(
            b.local_tuple(),
            Bytes::from_static(OPTIONS),
            "udp-test",
            true,
        ));
        assert!(a.has_data_to_send());
        assert!(a.process(&sink_a).unwrap());
        assert!(!a.has_data_to_send());

        let deadline = Instant::now() + Duration::from_secs(2);
        while sink_b.0.lock().is_empty() && Instant::now() < deadline {
            b.process(&sink_b).unwrap();
            std::thread::sleep(Duration::from_millis(5));
        }

        let events = sink_b.0.lock();
        match events.first() {
            Some(TransportEvent::MessageReceived(msg)) => {
                assert_eq!(msg.source().unwrap().addr, a.local_addr());
                assert_eq!(msg.transaction_id().unwrap(), "-udp-test");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
