//! Shared harness: one controller on a [`MemoryNetwork`] driven by a
//! [`ManualClock`], with a bare peer endpoint whose traffic the tests read
//! and write as raw datagrams. Both ends are UDP unless the environment is
//! built with [`TestEnvironment::with_transport`].

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use sipwire_sip_core::prelude::*;
use sipwire_sip_transport::{MemoryNetwork, MemoryTransport};
use sipwire_transaction_core::{Clock, ManualClock, TimerSettings, TransactionController};

pub const LOCAL: &str = "10.0.0.1:5060";
pub const PEER: &str = "10.0.0.2:5060";

pub fn addr(s: &str) -> SocketAddr {
    s.parse().unwrap()
}

pub fn init_tracing() {
    sipwire_infra_common::init_test_logging("sipwire=debug");
}

pub struct TestEnvironment {
    pub net: MemoryNetwork,
    pub clock: Arc<ManualClock>,
    pub controller: TransactionController,
    /// Keeps the peer address bound so datagrams to it are delivered
    pub peer: MemoryTransport,
    pub transport: TransportType,
}

impl TestEnvironment {
    pub fn new() -> Self {
        Self::with_transport(TransportType::Udp)
    }

    /// Both ends report `transport`; TCP or TLS puts the transactions in
    /// their reliable-transport mode.
    pub fn with_transport(transport: TransportType) -> Self {
        init_tracing();
        let net = MemoryNetwork::new();
        let clock = Arc::new(ManualClock::new());
        let mut controller =
            TransactionController::new(TimerSettings::default(), clock.clone() as Arc<dyn Clock>);
        controller.add_transport(Box::new(net.bind_as(addr(LOCAL), transport).unwrap()));
        let peer = net.bind_as(addr(PEER), transport).unwrap();
        TestEnvironment {
            net,
            clock,
            controller,
            peer,
            transport,
        }
    }

    fn peer_tuple(&self) -> Tuple {
        Tuple::new(addr(PEER), self.transport)
    }

    /// Step the controller until nothing is left to do at the current time.
    pub fn run(&mut self) {
        loop {
            let transports = self.controller.process_transports();
            let timers = self.controller.process_timers();
            let state_machine = self.controller.process_state_machine();
            if !(transports || timers || state_machine) {
                break;
            }
        }
    }

    /// Advance the clock by `total`, stopping at every timer on the way.
    pub fn advance(&mut self, total: Duration) {
        let deadline = self.clock.elapsed() + total;
        self.run();
        while let Some(ms) = self.controller.ms_till_next_process() {
            let step = Duration::from_millis(ms.max(1));
            if self.clock.elapsed() + step > deadline {
                break;
            }
            self.clock.advance(step);
            self.run();
        }
        let rest = deadline.saturating_sub(self.clock.elapsed());
        self.clock.advance(rest);
        self.run();
    }

    pub fn advance_ms(&mut self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }

    pub fn tu_messages(&self) -> Vec<SipMessage> {
        std::iter::from_fn(|| self.controller.receive()).collect()
    }

    /// Messages the peer has received so far, parsed.
    pub fn peer_received(&self) -> Vec<SipMessage> {
        self.net
            .datagrams_to(addr(PEER))
            .into_iter()
            .map(|d| SipMessage::parse(d.data).unwrap())
            .collect()
    }

    pub fn peer_count(&self) -> usize {
        self.net.count_to(addr(PEER))
    }

    /// Put `msg` on the wire from the peer to the controller.
    pub fn inject(&self, msg: &SipMessage) {
        self.net
            .inject(self.peer_tuple(), addr(LOCAL), msg.encode())
            .unwrap();
    }

    pub fn inject_raw(&self, data: impl Into<Bytes>) {
        self.net.inject(self.peer_tuple(), addr(LOCAL), data).unwrap();
    }

    /// A request from the TU addressed to the peer.
    pub fn tu_request(&self, method: Method) -> SipMessage {
        let target = match self.transport {
            TransportType::Udp => format!("sip:bob@{}", PEER),
            other => format!("sip:bob@{};transport={}", PEER, other.as_via_str().to_lowercase()),
        };
        make_request(
            method,
            target.parse().unwrap(),
            NameAddr::new(format!("sip:alice@{}", LOCAL).parse().unwrap()),
            NameAddr::new(format!("sip:bob@{}", PEER).parse().unwrap()),
        )
    }

    /// A request as the peer would send it.
    pub fn peer_request(&self, method: Method) -> SipMessage {
        let mut msg = make_request(
            method,
            format!("sip:alice@{}", LOCAL).parse().unwrap(),
            NameAddr::new(format!("sip:bob@{}", PEER).parse().unwrap()),
            NameAddr::new(format!("sip:alice@{}", LOCAL).parse().unwrap()),
        );
        let via = msg.header::<h::Via>().unwrap();
        via.host = "10.0.0.2".to_string();
        via.port = Some(5060);
        via.transport = self.transport.as_via_str().to_string();
        msg
    }
}

pub fn status(msg: &SipMessage) -> u16 {
    msg.status_code().unwrap_or(0)
}
