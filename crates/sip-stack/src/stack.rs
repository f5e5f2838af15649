//! The single object a transaction user talks to.
//!
//! [`SipStack`] bundles an [`Executive`] and its transaction controller.
//! It never starts threads: the caller either steps it with
//! [`SipStack::process`] or blocks in [`SipStack::wait_and_process`], which
//! sleeps on the caller's `mio::Poll` until a socket is ready or the next
//! timer is due. [`StackThread`](crate::StackThread) wraps that loop in a
//! dedicated thread.

use std::sync::Arc;
use std::time::Duration;

use mio::{Events, Poll, Registry, Token};
use sipwire_infra_common::Fifo;
use sipwire_sip_core::{SipMessage, Tuple};
use sipwire_sip_transport::{Transport, UdpTransport};
use sipwire_transaction_core::{Clock, SystemClock, TransactionController, TransactionMessage};
use tracing::{debug, info};

use crate::config::{StackConfig, TransportConfig, TransportKind};
use crate::error::Result;
use crate::executive::Executive;

/// Token reserved for waking a blocked stack from another thread.
pub const WAKE_TOKEN: Token = Token(0);

/// Transport `i` is registered under `Token(FIRST_TRANSPORT_TOKEN + i)`.
pub const FIRST_TRANSPORT_TOKEN: usize = 1;

const EVENTS_CAPACITY: usize = 128;

pub struct SipStack {
    executive: Executive,
    events: Events,
}

impl SipStack {
    /// A stack on the system clock with the transports named in `config`.
    pub fn new(config: StackConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// A stack reading time from `clock`.
    pub fn with_clock(config: StackConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        let mut controller = TransactionController::new(config.timers, clock);
        controller.set_discard_stray_responses(config.discard_stray_responses);
        controller.set_fix_bad_cseq_numbers(config.fix_bad_cseq_numbers);

        let mut stack = SipStack {
            executive: Executive::new(controller),
            events: Events::with_capacity(EVENTS_CAPACITY),
        };
        for transport in &config.transports {
            stack.add_transport_from_config(transport)?;
        }
        Ok(stack)
    }

    pub fn add_transport(&mut self, transport: Box<dyn Transport>) {
        self.controller_mut().add_transport(transport);
    }

    /// Bind a transport described in configuration. Returns its local address.
    pub fn add_transport_from_config(&mut self, config: &TransportConfig) -> Result<Tuple> {
        let transport = match config.kind {
            TransportKind::Udp => UdpTransport::bind(config.bind)?,
        };
        let tuple = transport.local_tuple();
        info!("Added {} transport on {}", config.kind, tuple);
        self.add_transport(Box::new(transport));
        Ok(tuple)
    }

    pub fn local_tuples(&self) -> Vec<Tuple> {
        self.controller().selector().local_tuples()
    }

    /// Hand a request or response to the transaction layer.
    pub fn send(&self, msg: SipMessage) {
        self.controller().send(msg);
    }

    /// Send `msg` to `destination`, bypassing Route and Request-URI.
    pub fn send_to(&self, mut msg: SipMessage, destination: Tuple) {
        msg.set_fixed_destination(destination);
        self.send(msg);
    }

    /// Next message for the transaction user, if one is waiting.
    pub fn receive(&self) -> Option<SipMessage> {
        self.controller().receive()
    }

    /// Like [`receive`](Self::receive) but waits up to `timeout` on the queue.
    ///
    /// Only useful when another thread is processing the stack.
    pub fn receive_timeout(&self, timeout: Duration) -> Option<SipMessage> {
        self.controller().tu_fifo().get_timeout(timeout)
    }

    pub fn cancel_client_invite(&self, transaction_id: impl Into<String>) {
        self.controller().cancel_client_invite(transaction_id);
    }

    pub fn abandon_server_transaction(&self, transaction_id: impl Into<String>) {
        self.controller().abandon_server_transaction(transaction_id);
    }

    /// Register every transport not yet registered with `registry`.
    pub fn build_fd_set(&mut self, registry: &Registry) -> Result<()> {
        self.controller_mut()
            .register_transports(registry, FIRST_TRANSPORT_TOKEN)?;
        Ok(())
    }

    /// Do everything that can be done now without blocking.
    pub fn process(&mut self) -> bool {
        self.executive.process()
    }

    /// How long the caller may sleep before calling [`process`](Self::process)
    /// again. `None` means nothing is scheduled.
    pub fn get_time_till_next_process(&self) -> Option<Duration> {
        self.controller()
            .ms_till_next_process()
            .map(Duration::from_millis)
    }

    /// Block on `poll` until I/O is ready, the next timer is due or `max`
    /// elapses, then process. Returns whether any work was done.
    pub fn wait_and_process(&mut self, poll: &mut Poll, max: Duration) -> Result<bool> {
        self.build_fd_set(poll.registry())?;

        let timeout = self
            .get_time_till_next_process()
            .map_or(max, |next| next.min(max));
        if !timeout.is_zero() {
            match poll.poll(&mut self.events, Some(timeout)) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {
                    debug!("Poll interrupted");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(self.process())
    }

    pub fn controller(&self) -> &TransactionController {
        self.executive.controller()
    }

    pub fn controller_mut(&mut self) -> &mut TransactionController {
        self.executive.controller_mut()
    }

    /// Queue shared with the transaction user side.
    pub fn tu_fifo(&self) -> &Fifo<SipMessage> {
        self.controller().tu_fifo()
    }

    /// Queue feeding the state machine.
    pub fn state_machine_fifo(&self) -> &Fifo<TransactionMessage> {
        self.controller().state_machine_fifo()
    }
}

impl std::fmt::Debug for SipStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SipStack")
            .field("executive", &self.executive)
            .finish()
    }
}
