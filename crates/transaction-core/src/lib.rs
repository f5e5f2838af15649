//! # sipwire-transaction-core
//!
//! RFC 3261 transaction layer for the sipwire stack.
//!
//! The [`TransactionController`] matches every SIP message to a client or
//! server transaction, runs the per-transaction state machines, retransmits
//! over unreliable transports and reports timeouts to the transaction user
//! (TU) as synthesized `408` responses.
//!
//! Nothing here blocks or spawns threads. The controller is stepped by an
//! executive that alternates between transports, timers and the
//! state-machine queue; time comes from a [`Clock`] so the whole layer can
//! be driven by a [`ManualClock`] in tests.
//!
//! ## Transaction ids
//!
//! Transactions are keyed by the top Via branch. A CANCEL shares its
//! branch with the INVITE it cancels, so its key carries the
//! [`CANCEL_SUFFIX`]. Client and server transactions live in separate maps.

pub mod controller;
pub mod error;
pub mod timer;
pub mod transaction;
pub mod transport_selector;

pub use controller::{transaction_key, StateMachineSink, TransactionController, CANCEL_SUFFIX};
pub use error::{Error, Result};
pub use timer::{Clock, ManualClock, SystemClock, TimerMessage, TimerQueue, TimerSettings, TimerType};
pub use transaction::{Machine, State, TransactionMap, TransactionMessage, TransactionState};
pub use transport_selector::{Flow, TransportSelector};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        Clock, Error, Machine, ManualClock, Result, State, SystemClock, TimerSettings,
        TransactionController, TransactionMessage,
    };
}
