//! Wire-level framing: start line, header lines and body boundaries.
//!
//! Header values are not interpreted here; they are sliced out of the
//! received buffer and handed to the message as raw bytes.

pub mod framing;
pub mod start_line;

pub use framing::{frame, split_comma_values, FramedMessage, RawHeader};
