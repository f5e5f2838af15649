//! Two stacks on one [`MemoryNetwork`], sharing a [`ManualClock`].

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use sipwire_sip_core::prelude::*;
use sipwire_sip_transport::MemoryNetwork;
use sipwire_stack::{LoggingConfig, SipStack, StackConfig};
use sipwire_transaction_core::{Clock, ManualClock};

pub const ALICE: &str = "192.168.1.10:5060";
pub const BOB: &str = "192.168.1.20:5060";

pub fn addr(s: &str) -> SocketAddr {
    s.parse().unwrap()
}

/// Logging goes through the stack's own `[logging]` configuration.
pub fn init_tracing() {
    let config = StackConfig::default()
        .with_logging(LoggingConfig::new("sipwire=debug").with_test_writer());
    let _ = config.init_logging();
}

pub struct StackPair {
    pub net: MemoryNetwork,
    pub clock: Arc<ManualClock>,
    pub alice: SipStack,
    pub bob: SipStack,
}

impl StackPair {
    pub fn new() -> Self {
        init_tracing();
        let net = MemoryNetwork::new();
        let clock = Arc::new(ManualClock::new());
        let mut alice =
            SipStack::with_clock(StackConfig::default(), clock.clone() as Arc<dyn Clock>).unwrap();
        alice.add_transport(Box::new(net.bind(addr(ALICE)).unwrap()));
        let mut bob =
            SipStack::with_clock(StackConfig::default(), clock.clone() as Arc<dyn Clock>).unwrap();
        bob.add_transport(Box::new(net.bind(addr(BOB)).unwrap()));
        StackPair {
            net,
            clock,
            alice,
            bob,
        }
    }

    /// Process both stacks until neither has anything left to do now.
    pub fn run(&mut self) {
        loop {
            let a = self.alice.process();
            let b = self.bob.process();
            if !(a || b) {
                break;
            }
        }
    }

    fn next_wakeup(&self) -> Option<Duration> {
        match (
            self.alice.get_time_till_next_process(),
            self.bob.get_time_till_next_process(),
        ) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Advance the shared clock by `ms` milliseconds, stopping at every timer.
    pub fn advance_ms(&mut self, ms: u64) {
        let deadline = self.clock.elapsed() + Duration::from_millis(ms);
        self.run();
        while let Some(next) = self.next_wakeup() {
            let step = next.max(Duration::from_millis(1));
            if self.clock.elapsed() + step > deadline {
                break;
            }
            self.clock.advance(step);
            self.run();
        }
        self.clock
            .advance(deadline.saturating_sub(self.clock.elapsed()));
        self.run();
    }

    /// A request from Alice's TU to Bob.
    pub fn request_to_bob(&self, method: Method) -> SipMessage {
        make_request(
            method,
            format!("sip:bob@{}", BOB).parse().unwrap(),
            NameAddr::new(format!("sip:alice@{}", ALICE).parse().unwrap()),
            NameAddr::new(format!("sip:bob@{}", BOB).parse().unwrap()),
        )
    }

    pub fn drain(stack: &SipStack) -> Vec<SipMessage> {
        std::iter::from_fn(|| stack.receive()).collect()
    }

    /// Datagrams that reached Bob carrying `method` requests.
    pub fn requests_at_bob(&self, method: Method) -> usize {
        let prefix = format!("{} ", method);
        self.net
            .datagrams_to(addr(BOB))
            .iter()
            .filter(|d| d.text().starts_with(&prefix))
            .count()
    }
}

pub fn status(msg: &SipMessage) -> u16 {
    msg.status_code().unwrap_or(0)
}
