//! Message bodies that carry structure of their own.

pub mod multipart;

pub use multipart::{MultipartMixedContents, MultipartPart};
