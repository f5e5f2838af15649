//! Per-transaction state and the four RFC 3261 state machines.
//!
//! Timers are never cancelled. Each handler checks the current state and
//! ignores timers that no longer apply, so a stale E1 firing in Proceeding
//! or a late G firing in Confirmed is harmless.

use std::time::Duration;

use sipwire_infra_common::Fifo;
use sipwire_sip_core::helper::{make_cancel, make_failure_ack, make_response};
use sipwire_sip_core::{Method, SipMessage};
use tracing::{debug, info, trace, warn};

use super::{Machine, State, TransactionMessage};
use crate::error::Result;
use crate::timer::{TimerMessage, TimerQueue, TimerSettings, TimerType};
use crate::transport_selector::{Flow, TransportSelector};

/// What a transaction needs from the controller while processing one message.
pub(crate) struct Context<'a> {
    pub timers: &'a TimerQueue,
    pub selector: &'a mut TransportSelector,
    pub tu: &'a Fifo<SipMessage>,
    pub state_machine: &'a Fifo<TransactionMessage>,
    pub settings: &'a TimerSettings,
}

/// Whether the controller keeps the transaction after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    Keep,
    Delete,
}

#[derive(Debug)]
pub struct TransactionState {
    id: String,
    machine: Machine,
    state: State,
    method: Method,
    is_client: bool,
    is_reliable: bool,
    /// The request that created the transaction
    request: Option<SipMessage>,
    /// ACK for a client INVITE, last response for a server transaction
    msg_to_retransmit: Option<SipMessage>,
    flow: Option<Flow>,
    pending_cancel: bool,
    abandoned: bool,
}

impl TransactionState {
    fn new(id: String, machine: Machine, state: State, method: Method, is_client: bool) -> Self {
        TransactionState {
            id,
            machine,
            state,
            method,
            is_client,
            is_reliable: false,
            request: None,
            msg_to_retransmit: None,
            flow: None,
            pending_cancel: false,
            abandoned: false,
        }
    }

    /// Client transaction for a request from the TU.
    pub fn client(id: impl Into<String>, method: Method) -> Self {
        match method {
            Method::Invite => Self::new(id.into(), Machine::ClientInvite, State::Calling, method, true),
            _ => Self::new(id.into(), Machine::ClientNonInvite, State::Trying, method, true),
        }
    }

    /// Server transaction for a request from the wire.
    pub fn server(id: impl Into<String>, request: SipMessage) -> Result<Self> {
        let method = request.method()?;
        let mut state = match method {
            Method::Invite => Self::new(id.into(), Machine::ServerInvite, State::Proceeding, method, false),
            _ => Self::new(id.into(), Machine::ServerNonInvite, State::Trying, method, false),
        };
        state.is_reliable = request
            .receive_tuple()
            .map(|t| t.transport.is_reliable())
            .unwrap_or(false);
        state.request = Some(request);
        Ok(state)
    }

    /// Holder for a message sent outside any transaction.
    pub fn stateless(id: impl Into<String>, method: Method, is_client: bool) -> Self {
        Self::new(id.into(), Machine::Stateless, State::Trying, method, is_client)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn machine(&self) -> Machine {
        self.machine
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn is_reliable(&self) -> bool {
        self.is_reliable
    }

    pub fn request(&self) -> Option<&SipMessage> {
        self.request.as_ref()
    }

    fn set_state(&mut self, state: State) {
        debug!(tid = %self.id, machine = ?self.machine, from = ?self.state, to = ?state, "Transaction state change");
        self.state = state;
    }

    fn set_machine(&mut self, machine: Machine, state: State) {
        debug!(tid = %self.id, from = ?self.machine, to = ?machine, "Transaction machine change");
        self.machine = machine;
        self.set_state(state);
    }

    fn arm(&self, ctx: &Context<'_>, timer: TimerType, duration: Duration) {
        ctx.timers.add(timer, &self.id, duration, self.is_client);
    }

    fn send_to_tu(&self, ctx: &Context<'_>, msg: SipMessage) {
        trace!(tid = %self.id, "To TU: {}", msg.brief());
        ctx.tu.add(msg);
    }

    /// First transmission picks a flow; later ones reuse it.
    fn send_to_wire(&mut self, msg: &mut SipMessage, ctx: &mut Context<'_>) -> Result<()> {
        match self.flow {
            Some(flow) => ctx.selector.resend(msg, flow, &self.id, self.is_client),
            None => {
                let preferred = self.request.as_ref().and_then(SipMessage::receive_tuple);
                let flow = ctx.selector.send(msg, &self.id, self.is_client, preferred)?;
                if self.is_client {
                    self.is_reliable = flow.is_reliable();
                }
                self.flow = Some(flow);
                Ok(())
            }
        }
    }

    fn resend(&self, msg: Option<&SipMessage>, ctx: &mut Context<'_>) {
        let (Some(msg), Some(flow)) = (msg, self.flow) else {
            return;
        };
        debug!(tid = %self.id, "Retransmitting {}", msg.brief());
        if let Err(e) = ctx.selector.resend(msg, flow, &self.id, self.is_client) {
            warn!(tid = %self.id, "Retransmission failed: {}", e);
        }
    }

    /// Report a failed client transaction to the TU as a 503.
    fn fail_client(&mut self, ctx: &Context<'_>, reason: &str) -> Disposition {
        warn!(tid = %self.id, "Client transaction failed: {}", reason);
        if let Some(request) = &self.request {
            if self.method != Method::Ack {
                match make_response(request, 503, None) {
                    Ok(response) => self.send_to_tu(ctx, response),
                    Err(e) => warn!(tid = %self.id, "Cannot build 503: {}", e),
                }
            }
        }
        self.set_state(State::Terminated);
        Disposition::Delete
    }

    fn time_out(&mut self, ctx: &Context<'_>) -> Disposition {
        info!(tid = %self.id, method = %self.method, "Transaction timed out");
        if let Some(request) = &self.request {
            match make_response(request, 408, None) {
                Ok(response) => self.send_to_tu(ctx, response),
                Err(e) => warn!(tid = %self.id, "Cannot build 408: {}", e),
            }
        }
        self.set_state(State::Terminated);
        Disposition::Delete
    }

    fn terminate(&mut self) -> Disposition {
        self.set_state(State::Terminated);
        Disposition::Delete
    }

    /// Send the TU's request and arm the client timers.
    pub(crate) fn start_client(&mut self, mut request: SipMessage, ctx: &mut Context<'_>) -> Disposition {
        let sent = self.send_to_wire(&mut request, ctx);
        self.request = Some(request);
        if let Err(e) = sent {
            return self.fail_client(ctx, &e.to_string());
        }

        match self.machine {
            Machine::ClientInvite => {
                self.arm(ctx, TimerType::B, ctx.settings.timer_b());
                if !self.is_reliable {
                    self.arm(ctx, TimerType::A, ctx.settings.t1);
                }
            }
            _ => {
                self.arm(ctx, TimerType::F, ctx.settings.timer_f());
                if !self.is_reliable {
                    self.arm(ctx, TimerType::E1, ctx.settings.t1);
                }
            }
        }
        Disposition::Keep
    }

    /// Arm the server timers for a freshly received request.
    pub(crate) fn start_server(&mut self, ctx: &mut Context<'_>) {
        match self.machine {
            Machine::ServerInvite => self.arm(ctx, TimerType::Trying, ctx.settings.t100),
            _ => self.arm(ctx, TimerType::Trying, ctx.settings.non_invite_trying()),
        }
    }

    /// Send a message that has no transaction of its own.
    pub(crate) fn start_stateless(&mut self, msg: SipMessage, ctx: &mut Context<'_>) -> Disposition {
        let disposition = self.process_stateless(TransactionMessage::from(msg), ctx);
        if disposition == Disposition::Keep {
            self.arm(ctx, TimerType::Stateless, ctx.settings.t4);
        }
        disposition
    }

    pub(crate) fn process(&mut self, msg: TransactionMessage, ctx: &mut Context<'_>) -> Disposition {
        trace!(tid = %self.id, machine = ?self.machine, state = ?self.state, "Processing {}", msg.brief());
        match self.machine {
            Machine::ClientNonInvite => self.process_client_non_invite(msg, ctx),
            Machine::ClientInvite => self.process_client_invite(msg, ctx),
            Machine::ServerNonInvite => self.process_server_non_invite(msg, ctx),
            Machine::ServerInvite => self.process_server_invite(msg, ctx),
            Machine::ClientStale => self.process_client_stale(msg, ctx),
            Machine::ServerStale => self.process_server_stale(msg, ctx),
            Machine::Stateless => self.process_stateless(msg, ctx),
        }
    }

    fn process_client_non_invite(&mut self, msg: TransactionMessage, ctx: &mut Context<'_>) -> Disposition {
        match msg {
            TransactionMessage::Sip(response) if response.is_response() && response.is_from_wire() => {
                let code = response.status_code().unwrap_or(0);
                match self.state {
                    State::Trying | State::Proceeding if code < 200 => {
                        if self.state == State::Trying && !self.is_reliable {
                            self.arm(ctx, TimerType::E2, ctx.settings.t2);
                        }
                        self.set_state(State::Proceeding);
                        self.send_to_tu(ctx, *response);
                        Disposition::Keep
                    }
                    State::Trying | State::Proceeding => {
                        self.send_to_tu(ctx, *response);
                        if self.is_reliable {
                            return self.terminate();
                        }
                        self.set_state(State::Completed);
                        self.arm(ctx, TimerType::K, ctx.settings.timer_k());
                        Disposition::Keep
                    }
                    _ => {
                        debug!(tid = %self.id, code, "Absorbing response retransmission");
                        Disposition::Keep
                    }
                }
            }
            TransactionMessage::Timer(timer) => self.client_non_invite_timer(timer, ctx),
            TransactionMessage::TransportFailure { reason, .. } => match self.state {
                State::Trying | State::Proceeding => self.fail_client(ctx, &reason),
                _ => Disposition::Keep,
            },
            _ => {
                debug!(tid = %self.id, "Ignoring message in client non-INVITE");
                Disposition::Keep
            }
        }
    }

    fn client_non_invite_timer(&mut self, timer: TimerMessage, ctx: &mut Context<'_>) -> Disposition {
        match timer.timer_type {
            TimerType::E1 if self.state == State::Trying => {
                self.arm(ctx, TimerType::E1, ctx.settings.backoff(timer.duration));
                self.resend(self.request.as_ref(), ctx);
                Disposition::Keep
            }
            TimerType::E2 if self.state == State::Proceeding => {
                self.arm(ctx, TimerType::E2, ctx.settings.t2);
                self.resend(self.request.as_ref(), ctx);
                Disposition::Keep
            }
            TimerType::F if matches!(self.state, State::Trying | State::Proceeding) => self.time_out(ctx),
            TimerType::K => self.terminate(),
            _ => Disposition::Keep,
        }
    }

    fn process_client_invite(&mut self, msg: TransactionMessage, ctx: &mut Context<'_>) -> Disposition {
        match msg {
            TransactionMessage::Sip(response) if response.is_response() && response.is_from_wire() => {
                let code = response.status_code().unwrap_or(0);
                let active = matches!(self.state, State::Calling | State::Proceeding);
                if code < 200 {
                    if active {
                        self.set_state(State::Proceeding);
                        self.send_to_tu(ctx, *response);
                        if self.pending_cancel {
                            self.pending_cancel = false;
                            self.spawn_cancel(ctx);
                        }
                    }
                    Disposition::Keep
                } else if code < 300 {
                    if active {
                        self.set_machine(Machine::ClientStale, State::Terminated);
                        self.arm(ctx, TimerType::StaleClient, ctx.settings.ts);
                        self.send_to_tu(ctx, *response);
                    }
                    Disposition::Keep
                } else if active {
                    self.acknowledge_failure(&response, ctx);
                    self.send_to_tu(ctx, *response);
                    if self.is_reliable {
                        return self.terminate();
                    }
                    self.set_state(State::Completed);
                    self.arm(ctx, TimerType::D, ctx.settings.timer_d());
                    Disposition::Keep
                } else {
                    debug!(tid = %self.id, code, "Final response retransmission, resending ACK");
                    self.resend(self.msg_to_retransmit.as_ref(), ctx);
                    Disposition::Keep
                }
            }
            TransactionMessage::Timer(timer) => match timer.timer_type {
                TimerType::A if self.state == State::Calling => {
                    self.arm(ctx, TimerType::A, ctx.settings.backoff(timer.duration));
                    self.resend(self.request.as_ref(), ctx);
                    Disposition::Keep
                }
                TimerType::B if self.state == State::Calling => self.time_out(ctx),
                TimerType::D => self.terminate(),
                _ => Disposition::Keep,
            },
            TransactionMessage::TransportFailure { reason, .. } => match self.state {
                State::Calling | State::Proceeding => self.fail_client(ctx, &reason),
                _ => Disposition::Keep,
            },
            TransactionMessage::CancelClientInvite(_) => {
                self.cancel(ctx);
                Disposition::Keep
            }
            _ => {
                debug!(tid = %self.id, "Ignoring message in client INVITE");
                Disposition::Keep
            }
        }
    }

    /// ACK a non-2xx final response along the INVITE's flow.
    fn acknowledge_failure(&mut self, response: &SipMessage, ctx: &mut Context<'_>) {
        let Some(invite) = &self.request else {
            return;
        };
        match make_failure_ack(invite, response) {
            Ok(ack) => {
                self.msg_to_retransmit = Some(ack);
                self.resend(self.msg_to_retransmit.as_ref(), ctx);
            }
            Err(e) => warn!(tid = %self.id, "Cannot build ACK: {}", e),
        }
    }

    /// TU wants the INVITE cancelled. A CANCEL may only follow a provisional
    /// response, so in Calling it waits for one.
    fn cancel(&mut self, ctx: &mut Context<'_>) {
        match (self.machine, self.state) {
            (Machine::ClientInvite, State::Calling) => {
                debug!(tid = %self.id, "Deferring CANCEL until a provisional response");
                self.pending_cancel = true;
            }
            (Machine::ClientInvite, State::Proceeding) => self.spawn_cancel(ctx),
            _ => {
                debug!(tid = %self.id, "INVITE already final, answering CANCEL locally");
                let Some(invite) = &self.request else {
                    return;
                };
                match make_cancel(invite).and_then(|cancel| make_response(&cancel, 200, None)) {
                    Ok(response) => self.send_to_tu(ctx, response),
                    Err(e) => warn!(tid = %self.id, "Cannot build CANCEL response: {}", e),
                }
            }
        }
    }

    fn spawn_cancel(&self, ctx: &Context<'_>) {
        let Some(invite) = &self.request else {
            return;
        };
        match make_cancel(invite) {
            Ok(cancel) => ctx.state_machine.add(TransactionMessage::from(cancel)),
            Err(e) => warn!(tid = %self.id, "Cannot build CANCEL: {}", e),
        }
    }

    fn process_client_stale(&mut self, msg: TransactionMessage, ctx: &mut Context<'_>) -> Disposition {
        match msg {
            TransactionMessage::Sip(response) if response.is_response() && response.is_from_wire() => {
                if response.status_code().is_some_and(|c| (200..300).contains(&c)) {
                    self.send_to_tu(ctx, *response);
                }
                Disposition::Keep
            }
            // ACK for a 2xx follows the dialog's route, not the INVITE's flow
            TransactionMessage::Sip(mut ack) if ack.is_request() && !ack.is_from_wire() => {
                if let Err(e) = ctx.selector.send(&mut ack, &self.id, true, None) {
                    warn!(tid = %self.id, "Cannot send ACK: {}", e);
                }
                self.msg_to_retransmit = Some(*ack);
                Disposition::Keep
            }
            TransactionMessage::Timer(timer) if timer.timer_type == TimerType::StaleClient => {
                self.terminate()
            }
            TransactionMessage::CancelClientInvite(_) => {
                self.cancel(ctx);
                Disposition::Keep
            }
            _ => Disposition::Keep,
        }
    }

    /// Response from the TU for a server transaction.
    fn send_response(&mut self, mut response: SipMessage, ctx: &mut Context<'_>) -> Option<Disposition> {
        let result = self.send_to_wire(&mut response, ctx);
        self.msg_to_retransmit = Some(response);
        match result {
            Ok(()) => None,
            Err(e) => {
                warn!(tid = %self.id, "Cannot send response: {}", e);
                Some(self.terminate())
            }
        }
    }

    fn send_trying(&mut self, ctx: &mut Context<'_>) -> Option<Disposition> {
        let trying = make_response(self.request.as_ref()?, 100, None).ok()?;
        debug!(tid = %self.id, "Sending 100 Trying");
        self.send_response(trying, ctx)
    }

    fn respond_abandoned(&mut self, ctx: &mut Context<'_>) -> Disposition {
        let response = self
            .request
            .as_ref()
            .and_then(|request| make_response(request, 500, None).ok());
        match response {
            Some(response) => {
                info!(tid = %self.id, "Answering abandoned transaction with 500");
                self.process(TransactionMessage::from(response), ctx)
            }
            None => self.terminate(),
        }
    }

    pub(crate) fn abandon(&mut self, ctx: &mut Context<'_>) -> Disposition {
        if self.abandoned {
            return Disposition::Keep;
        }
        match (self.machine, self.state) {
            (Machine::ServerInvite, State::Proceeding) => {
                self.abandoned = true;
                self.respond_abandoned(ctx)
            }
            (Machine::ServerNonInvite, State::Trying | State::Proceeding) => {
                self.abandoned = true;
                self.arm(ctx, TimerType::CleanUp, ctx.settings.transaction_timeout());
                Disposition::Keep
            }
            _ => Disposition::Keep,
        }
    }

    fn process_server_non_invite(&mut self, msg: TransactionMessage, ctx: &mut Context<'_>) -> Disposition {
        match msg {
            TransactionMessage::Sip(request) if request.is_request() && request.is_from_wire() => {
                match self.state {
                    State::Trying | State::Proceeding if self.abandoned => self.respond_abandoned(ctx),
                    State::Trying => Disposition::Keep,
                    _ => {
                        debug!(tid = %self.id, "Request retransmission, resending last response");
                        self.resend(self.msg_to_retransmit.as_ref(), ctx);
                        Disposition::Keep
                    }
                }
            }
            TransactionMessage::Sip(response) if response.is_response() && !response.is_from_wire() => {
                let code = response.status_code().unwrap_or(0);
                if !matches!(self.state, State::Trying | State::Proceeding) {
                    debug!(tid = %self.id, code, "Ignoring response after final");
                    return Disposition::Keep;
                }
                if let Some(d) = self.send_response(*response, ctx) {
                    return d;
                }
                if code < 200 {
                    self.set_state(State::Proceeding);
                    Disposition::Keep
                } else if self.is_reliable {
                    self.terminate()
                } else {
                    self.set_state(State::Completed);
                    self.arm(ctx, TimerType::J, ctx.settings.timer_j());
                    Disposition::Keep
                }
            }
            TransactionMessage::Timer(timer) => match timer.timer_type {
                TimerType::Trying if self.state == State::Trying && !self.abandoned => {
                    if let Some(d) = self.send_trying(ctx) {
                        return d;
                    }
                    self.set_state(State::Proceeding);
                    Disposition::Keep
                }
                TimerType::J => self.terminate(),
                TimerType::CleanUp if matches!(self.state, State::Trying | State::Proceeding) => {
                    self.terminate()
                }
                _ => Disposition::Keep,
            },
            TransactionMessage::TransportFailure { reason, .. } => {
                warn!(tid = %self.id, "Server transaction failed: {}", reason);
                self.terminate()
            }
            TransactionMessage::AbandonServer(_) => self.abandon(ctx),
            _ => Disposition::Keep,
        }
    }

    fn process_server_invite(&mut self, msg: TransactionMessage, ctx: &mut Context<'_>) -> Disposition {
        match msg {
            TransactionMessage::Sip(request) if request.is_request() && request.is_from_wire() => {
                match (request.method(), self.state) {
                    (Ok(Method::Invite), State::Proceeding) => {
                        if self.msg_to_retransmit.is_some() {
                            self.resend(self.msg_to_retransmit.as_ref(), ctx);
                        } else if let Some(d) = self.send_trying(ctx) {
                            return d;
                        }
                        Disposition::Keep
                    }
                    (Ok(Method::Invite), State::Completed) => {
                        self.resend(self.msg_to_retransmit.as_ref(), ctx);
                        Disposition::Keep
                    }
                    (Ok(Method::Ack), State::Completed) => {
                        if self.is_reliable {
                            return self.terminate();
                        }
                        self.set_state(State::Confirmed);
                        self.arm(ctx, TimerType::I, ctx.settings.timer_i());
                        Disposition::Keep
                    }
                    _ => Disposition::Keep,
                }
            }
            TransactionMessage::Sip(response) if response.is_response() && !response.is_from_wire() => {
                let code = response.status_code().unwrap_or(0);
                if self.state != State::Proceeding {
                    debug!(tid = %self.id, code, "Ignoring response after final");
                    return Disposition::Keep;
                }
                if let Some(d) = self.send_response(*response, ctx) {
                    return d;
                }
                if (200..300).contains(&code) {
                    self.set_machine(Machine::ServerStale, State::Terminated);
                    self.arm(ctx, TimerType::StaleServer, ctx.settings.ts);
                } else if code >= 300 {
                    self.set_state(State::Completed);
                    self.arm(ctx, TimerType::H, ctx.settings.timer_h());
                    if !self.is_reliable {
                        self.arm(ctx, TimerType::G, ctx.settings.t1);
                    }
                }
                Disposition::Keep
            }
            TransactionMessage::Timer(timer) => match timer.timer_type {
                TimerType::Trying
                    if self.state == State::Proceeding && self.msg_to_retransmit.is_none() =>
                {
                    self.send_trying(ctx).unwrap_or(Disposition::Keep)
                }
                TimerType::G if self.state == State::Completed => {
                    self.arm(ctx, TimerType::G, ctx.settings.backoff(timer.duration));
                    self.resend(self.msg_to_retransmit.as_ref(), ctx);
                    Disposition::Keep
                }
                TimerType::H if self.state == State::Completed => {
                    warn!(tid = %self.id, "No ACK received for final response");
                    self.terminate()
                }
                TimerType::I => self.terminate(),
                _ => Disposition::Keep,
            },
            TransactionMessage::TransportFailure { reason, .. } => {
                warn!(tid = %self.id, "Server transaction failed: {}", reason);
                self.terminate()
            }
            TransactionMessage::AbandonServer(_) => self.abandon(ctx),
            _ => Disposition::Keep,
        }
    }

    fn process_server_stale(&mut self, msg: TransactionMessage, ctx: &mut Context<'_>) -> Disposition {
        match msg {
            TransactionMessage::Sip(request) if request.is_request() && request.is_from_wire() => {
                match request.method() {
                    Ok(Method::Ack) => self.send_to_tu(ctx, *request),
                    _ => self.resend(self.msg_to_retransmit.as_ref(), ctx),
                }
                Disposition::Keep
            }
            // the TU retransmits its 2xx until the ACK arrives
            TransactionMessage::Sip(mut response) if response.is_response() && !response.is_from_wire() => {
                if let Err(e) = self.send_to_wire(&mut response, ctx) {
                    warn!(tid = %self.id, "Cannot send response: {}", e);
                }
                self.msg_to_retransmit = Some(*response);
                Disposition::Keep
            }
            TransactionMessage::Timer(timer) if timer.timer_type == TimerType::StaleServer => {
                self.terminate()
            }
            _ => Disposition::Keep,
        }
    }

    fn process_stateless(&mut self, msg: TransactionMessage, ctx: &mut Context<'_>) -> Disposition {
        match msg {
            TransactionMessage::Sip(mut sip) if !sip.is_from_wire() => {
                let preferred = sip.receive_tuple();
                match ctx.selector.send(&mut sip, &self.id, self.is_client, preferred) {
                    Ok(_) => Disposition::Keep,
                    Err(e) => {
                        warn!(tid = %self.id, "Cannot send {}: {}", sip.brief(), e);
                        self.terminate()
                    }
                }
            }
            TransactionMessage::Timer(timer) if timer.timer_type == TimerType::Stateless => {
                self.terminate()
            }
            TransactionMessage::TransportFailure { .. } => self.terminate(),
            _ => Disposition::Keep,
        }
    }
}
