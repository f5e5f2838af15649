//! Transaction timers.
//!
//! RFC 3261 defines the timers that drive retransmission and timeout of
//! each transaction kind:
//!
//! - **Timer A / B** (client INVITE): request retransmit, transaction timeout
//! - **Timer D** (client INVITE): absorb response retransmissions
//! - **Timer E / F** (client non-INVITE): request retransmit, transaction timeout
//! - **Timer K** (client non-INVITE): absorb response retransmissions
//! - **Timer G / H** (server INVITE): response retransmit, wait for ACK
//! - **Timer I** (server INVITE): absorb ACK retransmissions
//! - **Timer J** (server non-INVITE): absorb request retransmissions
//!
//! All of them live in one [`TimerQueue`] keyed by absolute fire time. The
//! queue reads time from a [`Clock`], so tests can substitute a
//! [`ManualClock`] and step through a 32 second timeout instantly.

pub mod clock;
pub mod queue;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use queue::{TimerMessage, TimerQueue};
pub use types::{TimerSettings, TimerType};
