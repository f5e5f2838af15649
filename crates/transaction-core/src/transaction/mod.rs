//! Transaction state machines (RFC 3261 Section 17).
//!
//! Every message the transaction layer handles arrives as a
//! [`TransactionMessage`] on one queue: SIP messages from the wire or the
//! TU, fired timers, transport failures and TU commands. The controller
//! looks up the [`TransactionState`] by transaction id and lets it advance.

pub mod map;
pub mod state;

use std::fmt;

use sipwire_sip_core::{SipMessage, Tuple};

use crate::timer::TimerMessage;

pub use map::TransactionMap;
pub use state::TransactionState;

/// The transaction kind driving a [`TransactionState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Machine {
    ClientNonInvite,
    ClientInvite,
    ServerNonInvite,
    ServerInvite,
    /// Client INVITE after a 2xx: forwards further 2xx to the TU
    ClientStale,
    /// Server INVITE after a 2xx: forwards the ACK to the TU
    ServerStale,
    /// A message sent without a transaction (ACK, stateless response)
    Stateless,
}

impl Machine {
    pub fn is_client(&self) -> bool {
        matches!(
            self,
            Machine::ClientNonInvite | Machine::ClientInvite | Machine::ClientStale
        )
    }
}

/// Transaction states from the RFC 3261 state diagrams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Calling,
    Trying,
    Proceeding,
    Completed,
    Confirmed,
    Terminated,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Input to the transaction state machine.
#[derive(Debug)]
pub enum TransactionMessage {
    /// A SIP message from the wire (`is_from_wire`) or from the TU
    Sip(Box<SipMessage>),

    Timer(TimerMessage),

    /// The transport could not send a message belonging to a transaction
    TransportFailure {
        transaction_id: String,
        is_client: bool,
        target: Tuple,
        reason: String,
    },

    /// TU request to cancel the client INVITE with this id
    CancelClientInvite(String),

    /// TU will not answer the server transaction with this id
    AbandonServer(String),
}

impl TransactionMessage {
    pub fn brief(&self) -> String {
        match self {
            TransactionMessage::Sip(msg) => msg.brief(),
            TransactionMessage::Timer(t) => format!("Timer {} {}", t.timer_type, t.transaction_id),
            TransactionMessage::TransportFailure { transaction_id, target, .. } => {
                format!("TransportFailure {} to {}", transaction_id, target)
            }
            TransactionMessage::CancelClientInvite(tid) => format!("CancelClientInvite {}", tid),
            TransactionMessage::AbandonServer(tid) => format!("AbandonServer {}", tid),
        }
    }
}

impl From<SipMessage> for TransactionMessage {
    fn from(msg: SipMessage) -> Self {
        TransactionMessage::Sip(Box::new(msg))
    }
}
