//! Common infrastructure for the sipwire SIP stack.
//!
//! This crate hosts the pieces every layer of the stack shares:
//!
//! - [`fifo::Fifo`]: the thread-safe queue used between transports, the
//!   transaction state machine and the transaction user
//! - [`logging`]: `tracing-subscriber` setup helpers
//! - [`errors`]: error types for the infrastructure layer

pub mod errors;
pub mod fifo;
pub mod logging;

pub use errors::types::{Error, Result};
pub use fifo::Fifo;
pub use logging::setup::{init_test_logging, setup_logging, LoggingConfig};
