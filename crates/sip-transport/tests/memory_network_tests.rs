use std::net::SocketAddr;

use bytes::Bytes;
use parking_lot::Mutex;
use sipwire_sip_core::prelude::*;
use sipwire_sip_transport::{MemoryNetwork, SendData, Transport, TransportEvent, TransportSink};

#[derive(Default)]
struct Inbox(Mutex<Vec<TransportEvent>>);

impl TransportSink for Inbox {
    fn deliver(&self, event: TransportEvent) {
        self.0.lock().push(event);
    }
}

fn addr(s: &str) -> SocketAddr {
    s.parse().unwrap()
}

fn register_request() -> SipMessage {
    let mut msg = make_request(
        Method::Register,
        "sip:registrar.biloxi.com".parse().unwrap(),
        NameAddr::new("sip:bob@biloxi.com".parse().unwrap()),
        NameAddr::new("sip:bob@biloxi.com".parse().unwrap()),
    );
    let via = msg.header::<h::Via>().unwrap();
    via.host = "10.1.1.1".to_string();
    via.port = Some(5060);
    msg
}

#[test]
fn request_crosses_network_with_lazy_headers_intact() {
    let net = MemoryNetwork::new();
    let mut client = net.bind(addr("10.1.1.1:5060")).unwrap();
    let mut server = net.bind(addr("10.1.1.2:5060")).unwrap();
    let inbox = Inbox::default();

    let request = register_request();
    let tid = request.transaction_id().unwrap().to_string();
    client.send(SendData::new(server.local_tuple(), request.encode(), tid.clone(), true));
    client.process(&inbox).unwrap();
    server.process(&inbox).unwrap();

    let events = inbox.0.lock();
    let TransportEvent::MessageReceived(received) = &events[0] else {
        panic!("expected a message");
    };
    assert_eq!(received.transaction_id().unwrap(), tid);
    assert_eq!(received.method().unwrap(), Method::Register);
    assert_eq!(received.source().unwrap(), client.local_tuple());
    assert!(received.is_from_wire());
    // sent-by matches the packet source, so nothing is stamped
    assert!(received.const_header::<h::Via>().unwrap().received().is_none());
}

#[test]
fn injected_garbage_is_dropped_silently() {
    let net = MemoryNetwork::new();
    let mut server = net.bind(addr("10.1.1.2:5060")).unwrap();
    let inbox = Inbox::default();

    net.inject(
        Tuple::udp(addr("10.1.1.9:5060")),
        server.local_addr(),
        Bytes::from_static(b"NOT SIP AT ALL"),
    )
    .unwrap();
    assert!(server.process(&inbox).unwrap());
    assert!(inbox.0.lock().is_empty());
}
