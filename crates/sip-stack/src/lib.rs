//! # sipwire-stack
//!
//! The top of the sipwire SIP stack: a [`SipStack`] facade over the
//! transaction layer, the [`Executive`] that schedules it, TOML
//! configuration and a [`StackThread`] for running a stack in the
//! background.
//!
//! ```no_run
//! use std::time::Duration;
//! use sipwire_stack::{SipStack, StackConfig, TransportConfig};
//!
//! # fn main() -> sipwire_stack::Result<()> {
//! let config = StackConfig::default()
//!     .with_transport(TransportConfig::udp("0.0.0.0:5060".parse().unwrap()));
//! config.init_logging()?;
//! let mut stack = SipStack::new(config)?;
//! let mut poll = mio::Poll::new()?;
//! loop {
//!     stack.wait_and_process(&mut poll, Duration::from_millis(100))?;
//!     while let Some(msg) = stack.receive() {
//!         println!("{}", msg.brief());
//!     }
//! }
//! # }
//! ```

pub mod config;
pub mod error;
pub mod executive;
pub mod stack;
pub mod stack_thread;

pub use config::{StackConfig, TransportConfig, TransportKind};
pub use sipwire_infra_common::LoggingConfig;
pub use error::{Error, Result};
pub use executive::Executive;
pub use stack::{SipStack, FIRST_TRANSPORT_TOKEN, WAKE_TOKEN};
pub use stack_thread::{AsyncTuHandle, StackSender, StackThread, MAX_WAIT};
