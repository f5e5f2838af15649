//! The transaction layer's front door.
//!
//! [`TransactionController`] owns the state-machine queue, the TU queue, the
//! timer queue, both transaction maps and the transport selector. It is
//! driven in three independent steps ([`process_transports`],
//! [`process_timers`], [`process_state_machine`]) which the executive calls
//! in a loop.
//!
//! [`process_transports`]: TransactionController::process_transports
//! [`process_timers`]: TransactionController::process_timers
//! [`process_state_machine`]: TransactionController::process_state_machine

use std::sync::Arc;

use sipwire_infra_common::Fifo;
use sipwire_sip_core::helper::make_response;
use sipwire_sip_core::{h, Method, SipMessage, StartLine};
use sipwire_sip_transport::{Transport, TransportEvent, TransportSink};
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::timer::{Clock, TimerQueue, TimerSettings};
use crate::transaction::state::{Context, Disposition};
use crate::transaction::{Machine, State, TransactionMap, TransactionMessage, TransactionState};
use crate::transport_selector::TransportSelector;

/// Suffix distinguishing a CANCEL transaction from the INVITE it cancels.
pub const CANCEL_SUFFIX: &str = "cancel";

/// Feeds transport events into the state-machine queue.
#[derive(Debug, Clone)]
pub struct StateMachineSink(Fifo<TransactionMessage>);

impl TransportSink for StateMachineSink {
    fn deliver(&self, event: TransportEvent) {
        match event {
            TransportEvent::MessageReceived(message) => {
                self.0.add(TransactionMessage::Sip(message));
            }
            TransportEvent::SendFailed {
                transaction_id,
                is_client,
                target,
                reason,
            } => self.0.add(TransactionMessage::TransportFailure {
                transaction_id,
                is_client,
                target,
                reason,
            }),
        }
    }
}

/// Borrow the controller's parts a transaction needs, leaving the maps free.
macro_rules! context {
    ($self:ident) => {
        Context {
            timers: &$self.timers,
            selector: &mut $self.selector,
            tu: &$self.tu_fifo,
            state_machine: &$self.state_machine_fifo,
            settings: &$self.settings,
        }
    };
}

pub struct TransactionController {
    state_machine_fifo: Fifo<TransactionMessage>,
    tu_fifo: Fifo<SipMessage>,
    sink: StateMachineSink,
    timers: TimerQueue,
    client_transactions: TransactionMap,
    server_transactions: TransactionMap,
    selector: TransportSelector,
    settings: TimerSettings,
    discard_stray_responses: bool,
    fix_bad_cseq_numbers: bool,
}

impl TransactionController {
    pub fn new(settings: TimerSettings, clock: Arc<dyn Clock>) -> Self {
        let state_machine_fifo = Fifo::new("state machine");
        TransactionController {
            sink: StateMachineSink(state_machine_fifo.clone()),
            state_machine_fifo,
            tu_fifo: Fifo::new("transaction user"),
            timers: TimerQueue::new(clock),
            client_transactions: TransactionMap::new(),
            server_transactions: TransactionMap::new(),
            selector: TransportSelector::new(),
            settings,
            discard_stray_responses: true,
            fix_bad_cseq_numbers: false,
        }
    }

    pub fn settings(&self) -> &TimerSettings {
        &self.settings
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        self.timers.clock()
    }

    /// Pass responses matching no transaction to the TU instead of dropping them.
    pub fn set_discard_stray_responses(&mut self, discard: bool) {
        self.discard_stray_responses = discard;
    }

    /// Rewrite a response's CSeq number to match its request.
    pub fn set_fix_bad_cseq_numbers(&mut self, fix: bool) {
        self.fix_bad_cseq_numbers = fix;
    }

    pub fn add_transport(&mut self, transport: Box<dyn Transport>) {
        self.selector.add_transport(transport);
    }

    pub fn selector(&self) -> &TransportSelector {
        &self.selector
    }

    pub fn selector_mut(&mut self) -> &mut TransportSelector {
        &mut self.selector
    }

    /// Queue feeding the state machine. Safe to use from other threads.
    pub fn state_machine_fifo(&self) -> &Fifo<TransactionMessage> {
        &self.state_machine_fifo
    }

    /// Queue of messages for the transaction user.
    pub fn tu_fifo(&self) -> &Fifo<SipMessage> {
        &self.tu_fifo
    }

    /// Hand a request or response from the TU to the transaction layer.
    pub fn send(&self, mut msg: SipMessage) {
        msg.set_from_wire(false);
        self.state_machine_fifo.add(TransactionMessage::from(msg));
    }

    /// Next message for the TU, if any.
    pub fn receive(&self) -> Option<SipMessage> {
        self.tu_fifo.try_get()
    }

    pub fn cancel_client_invite(&self, transaction_id: impl Into<String>) {
        self.state_machine_fifo
            .add(TransactionMessage::CancelClientInvite(transaction_id.into()));
    }

    pub fn abandon_server_transaction(&self, transaction_id: impl Into<String>) {
        self.state_machine_fifo
            .add(TransactionMessage::AbandonServer(transaction_id.into()));
    }

    pub fn client_transaction_count(&self) -> usize {
        self.client_transactions.len()
    }

    pub fn server_transaction_count(&self) -> usize {
        self.server_transactions.len()
    }

    /// Machine and state of a transaction, for diagnostics and tests.
    pub fn transaction_state(&self, transaction_id: &str, is_client: bool) -> Option<(Machine, State)> {
        let map = if is_client {
            &self.client_transactions
        } else {
            &self.server_transactions
        };
        map.find(transaction_id).map(|s| (s.machine(), s.state()))
    }

    /// Flush and read every transport.
    pub fn process_transports(&mut self) -> bool {
        self.selector.process(&self.sink)
    }

    /// Move every due timer onto the state-machine queue.
    pub fn process_timers(&mut self) -> bool {
        let fired = self.timers.process();
        let did_work = !fired.is_empty();
        self.state_machine_fifo
            .add_multiple(fired.into_iter().map(TransactionMessage::Timer));
        did_work
    }

    /// Handle one message from the state-machine queue.
    pub fn process_state_machine(&mut self) -> bool {
        match self.state_machine_fifo.try_get() {
            Some(msg) => {
                self.dispatch(msg);
                true
            }
            None => false,
        }
    }

    /// Upper bound on how long the caller may block before calling again.
    pub fn ms_till_next_process(&self) -> Option<u64> {
        if !self.state_machine_fifo.is_empty() || self.selector.has_data_to_send() {
            return Some(0);
        }
        self.timers.ms_till_next_timer()
    }

    pub fn register_transports(&mut self, registry: &mio::Registry, first_token: usize) -> Result<()> {
        self.selector.register(registry, first_token)
    }

    fn dispatch(&mut self, msg: TransactionMessage) {
        match msg {
            TransactionMessage::Sip(sip) => self.process_sip(*sip),
            TransactionMessage::Timer(timer) => {
                let (tid, is_client) = (timer.transaction_id.clone(), timer.is_client);
                if !self.step(is_client, &tid, TransactionMessage::Timer(timer)) {
                    trace!(tid = %tid, "Timer for finished transaction");
                }
            }
            TransactionMessage::TransportFailure {
                transaction_id,
                is_client,
                target,
                reason,
            } => {
                let tid = transaction_id.clone();
                let failure = TransactionMessage::TransportFailure {
                    transaction_id,
                    is_client,
                    target,
                    reason,
                };
                if !self.step(is_client, &tid, failure) {
                    debug!(tid = %tid, "Transport failure for unknown transaction");
                }
            }
            TransactionMessage::CancelClientInvite(tid) => {
                let msg = TransactionMessage::CancelClientInvite(tid.clone());
                if !self.step(true, &tid, msg) {
                    debug!(tid = %tid, "No client INVITE to cancel");
                }
            }
            TransactionMessage::AbandonServer(tid) => {
                let msg = TransactionMessage::AbandonServer(tid.clone());
                if !self.step(false, &tid, msg) {
                    debug!(tid = %tid, "No server transaction to abandon");
                }
            }
        }
    }

    /// Run `msg` through the transaction at `key`. Returns false if there is none.
    fn step(&mut self, is_client: bool, key: &str, msg: TransactionMessage) -> bool {
        let mut ctx = context!(self);
        let map = if is_client {
            &mut self.client_transactions
        } else {
            &mut self.server_transactions
        };
        let Some(state) = map.find_mut(key) else {
            return false;
        };
        if state.process(msg, &mut ctx) == Disposition::Delete {
            debug!(tid = %key, "Deleting transaction");
            map.remove(key);
        }
        true
    }

    fn process_sip(&mut self, sip: SipMessage) {
        let key = match transaction_key(&sip) {
            Ok(key) => key,
            Err(e) => {
                debug!("Dropping {} without transaction id: {}", sip.brief(), e);
                return;
            }
        };

        if sip.is_request() {
            let method = match sip.method() {
                Ok(method) => method,
                Err(e) => {
                    debug!("Dropping request: {}", e);
                    return;
                }
            };
            if sip.is_from_wire() {
                self.process_wire_request(sip, key, method);
            } else {
                self.process_tu_request(sip, key, method);
            }
        } else if sip.is_from_wire() {
            self.process_wire_response(sip, key);
        } else {
            self.process_tu_response(sip, key);
        }
    }

    fn process_wire_request(&mut self, sip: SipMessage, key: String, method: Method) {
        if let Some(state) = self.server_transactions.find(&key) {
            let matches = if method == Method::Ack {
                matches!(state.machine(), Machine::ServerInvite | Machine::ServerStale)
            } else {
                *state.method() == method
            };
            if !matches {
                debug!(tid = %key, "Method mismatch for {}, dropping", sip.brief());
                return;
            }
            if state.is_reliable() && method != Method::Ack {
                debug!(tid = %key, "Dropping retransmission on reliable transport");
                return;
            }
            self.step(false, &key, TransactionMessage::from(sip));
            return;
        }

        match method {
            Method::Ack => {
                debug!(tid = %key, "ACK without transaction, passing to TU");
                self.tu_fifo.add(sip);
            }
            Method::Cancel => self.process_wire_cancel(sip, key),
            _ => {
                let mut state = match TransactionState::server(key.clone(), sip.clone()) {
                    Ok(state) => state,
                    Err(e) => {
                        debug!("Cannot create server transaction: {}", e);
                        return;
                    }
                };
                debug!(tid = %key, "New server transaction for {}", sip.brief());
                state.start_server(&mut context!(self));
                self.server_transactions.add(state);
                self.tu_fifo.add(sip);
            }
        }
    }

    /// A CANCEL is its own server transaction. With no INVITE to cancel it
    /// is answered 481 on the spot.
    fn process_wire_cancel(&mut self, cancel: SipMessage, key: String) {
        let invite_key = key.strip_suffix(CANCEL_SUFFIX).unwrap_or(&key).to_string();
        let mut state = match TransactionState::server(key.clone(), cancel.clone()) {
            Ok(state) => state,
            Err(e) => {
                debug!("Cannot create CANCEL transaction: {}", e);
                return;
            }
        };
        let mut ctx = context!(self);
        state.start_server(&mut ctx);

        let invite_pending = self
            .server_transactions
            .find(&invite_key)
            .is_some_and(|s| s.machine() == Machine::ServerInvite);
        if invite_pending {
            self.server_transactions.add(state);
            self.tu_fifo.add(cancel);
            return;
        }

        info!(tid = %invite_key, "CANCEL matches no transaction, answering 481");
        let disposition = match make_response(&cancel, 481, None) {
            Ok(response) => state.process(TransactionMessage::from(response), &mut ctx),
            Err(e) => {
                warn!("Cannot build 481: {}", e);
                Disposition::Delete
            }
        };
        if disposition == Disposition::Keep {
            self.server_transactions.add(state);
        }
    }

    fn process_tu_request(&mut self, sip: SipMessage, key: String, method: Method) {
        if let Some(state) = self.client_transactions.find(&key) {
            if method == Method::Ack
                && matches!(state.machine(), Machine::ClientStale | Machine::Stateless)
            {
                self.step(true, &key, TransactionMessage::from(sip));
            } else {
                warn!(tid = %key, "Request from TU reuses a live transaction id, dropping");
            }
            return;
        }

        let mut ctx = context!(self);
        if method == Method::Ack {
            let mut state = TransactionState::stateless(key, method, true);
            if state.start_stateless(sip, &mut ctx) == Disposition::Keep {
                self.client_transactions.add(state);
            }
            return;
        }

        debug!(tid = %key, "New client transaction for {}", sip.brief());
        let mut state = TransactionState::client(key, method);
        if state.start_client(sip, &mut ctx) == Disposition::Keep {
            self.client_transactions.add(state);
        }
    }

    fn process_wire_response(&mut self, mut sip: SipMessage, key: String) {
        let Some(state) = self.client_transactions.find(&key) else {
            if self.discard_stray_responses {
                info!("Discarding stray response {}", sip.brief());
            } else {
                debug!("Passing stray response {} to TU", sip.brief());
                self.tu_fifo.add(sip);
            }
            return;
        };

        let response_method = match sip.const_header::<h::CSeq>() {
            Ok(cseq) => cseq.method.clone(),
            Err(e) => {
                debug!(tid = %key, "Dropping response with bad CSeq: {}", e);
                return;
            }
        };
        if state.machine() != Machine::Stateless && response_method != *state.method() {
            debug!(tid = %key, "Method mismatch for {}, dropping", sip.brief());
            return;
        }

        if self.fix_bad_cseq_numbers {
            let expected = state
                .request()
                .and_then(|r| r.const_header::<h::CSeq>().ok())
                .map(|c| c.sequence);
            if let (Some(expected), Ok(cseq)) = (expected, sip.header::<h::CSeq>()) {
                if cseq.sequence != expected {
                    debug!(tid = %key, "Fixing CSeq {} -> {}", cseq.sequence, expected);
                    cseq.sequence = expected;
                }
            }
        }

        self.step(true, &key, TransactionMessage::from(sip));
    }

    fn process_tu_response(&mut self, sip: SipMessage, key: String) {
        if let Some(state) = self.server_transactions.find(&key) {
            let matches = sip
                .const_header::<h::CSeq>()
                .map(|cseq| cseq.method == *state.method())
                .unwrap_or(false);
            if !matches && state.machine() != Machine::Stateless {
                warn!(tid = %key, "Response {} does not match its transaction, dropping", sip.brief());
                return;
            }
            self.step(false, &key, TransactionMessage::from(sip));
            return;
        }

        debug!(tid = %key, "No server transaction, sending {} statelessly", sip.brief());
        let method = sip
            .const_header::<h::CSeq>()
            .map(|cseq| cseq.method.clone())
            .unwrap_or(Method::Options);
        let mut state = TransactionState::stateless(key, method, false);
        if state.start_stateless(sip, &mut context!(self)) == Disposition::Keep {
            self.server_transactions.add(state);
        }
    }
}

impl std::fmt::Debug for TransactionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionController")
            .field("client_transactions", &self.client_transactions.len())
            .field("server_transactions", &self.server_transactions.len())
            .field("timers", &self.timers.len())
            .field("selector", &self.selector)
            .finish()
    }
}

/// Map key for a message: the transaction id, suffixed for CANCEL so it
/// does not collide with the INVITE sharing its branch.
pub fn transaction_key(msg: &SipMessage) -> Result<String> {
    let invalid = |e: sipwire_sip_core::Error| Error::InvalidTransactionId(e.to_string());
    let tid = msg.transaction_id().map_err(invalid)?;
    let is_cancel = match msg.start_line() {
        StartLine::Request(rl) => rl.method == Method::Cancel,
        StartLine::Response(_) => {
            msg.const_header::<h::CSeq>().map_err(invalid)?.method == Method::Cancel
        }
    };
    Ok(if is_cancel {
        format!("{}{}", tid, CANCEL_SUFFIX)
    } else {
        tid.to_string()
    })
}
