//! Logging setup for applications embedding the stack.
//!
//! Library code only emits `tracing` events; installing a subscriber is
//! left to the binary or test harness through [`setup::setup_logging`].

pub mod setup;

pub use setup::{init_test_logging, setup_logging, LoggingConfig};
