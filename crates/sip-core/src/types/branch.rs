//! The Via `branch` parameter and the transaction identity it carries.
//!
//! Wire forms accepted, in order of precedence:
//!
//! ```text
//! z9hG4bK-sw-<counter>-<client-data>-<transaction-id>   generated by this stack
//! z9hG4bK<transaction-id>                               RFC 3261 compliant peer
//! <transaction-id>                                      RFC 2543 peer
//! ```
//!
//! `counter` is mandatory decimal once the `-sw-` cookie has been seen.
//! `client-data` is standard base64 with `.` substituted for `=` so the value
//! stays a valid SIP token. The transaction id is everything that follows and
//! may itself contain `-`.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rand::Rng;

use crate::error::Result;
use crate::parse_buffer::ParseBuffer;

/// RFC 3261 magic cookie.
pub const MAGIC_COOKIE: &str = "z9hG4bK";

/// Marks a branch generated by this stack.
pub const LOCAL_COOKIE: &str = "-sw-";

static BRANCH_SEQUENCE: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BranchParameter {
    /// The magic cookie exactly as it appeared, `None` for RFC 2543 branches.
    magic: Option<String>,
    local: bool,
    counter: u32,
    client_data: Vec<u8>,
    transaction_id: String,
}

fn has_magic_cookie(value: &[u8]) -> bool {
    value.len() >= MAGIC_COOKIE.len()
        && &value[..6] == b"z9hG4b"
        && (value[6] == b'k' || value[6] == b'K')
}

impl BranchParameter {
    /// A locally generated branch with a fresh random transaction id.
    pub fn generate() -> Self {
        let seq = BRANCH_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let random: u64 = rand::thread_rng().gen();
        Self::local(format!("{:x}{:016x}", seq, random))
    }

    /// A locally generated branch carrying `transaction_id`.
    pub fn local(transaction_id: impl Into<String>) -> Self {
        BranchParameter {
            magic: Some(MAGIC_COOKIE.to_string()),
            local: true,
            counter: 1,
            client_data: Vec::new(),
            transaction_id: transaction_id.into(),
        }
    }

    /// Branch from a peer we know nothing about, magic cookie included.
    pub fn foreign(transaction_id: impl Into<String>) -> Self {
        BranchParameter {
            magic: Some(MAGIC_COOKIE.to_string()),
            local: false,
            counter: 0,
            client_data: Vec::new(),
            transaction_id: transaction_id.into(),
        }
    }

    /// Parse the value of a `branch` parameter.
    pub fn parse(value: &[u8]) -> Result<Self> {
        let mut pb = ParseBuffer::new(value, "BranchParameter");
        let mut branch = BranchParameter::default();

        if has_magic_cookie(value) {
            let start = pb.mark();
            pb.skip_n(MAGIC_COOKIE.len())?;
            branch.magic = Some(pb.data_str(start)?.to_string());

            if pb.rest().starts_with(LOCAL_COOKIE.as_bytes()) {
                pb.skip_chars(LOCAL_COOKIE)?;
                branch.local = true;
                branch.counter = pb.u32()?;
                pb.skip_char(b'-')?;

                let data_start = pb.mark();
                pb.skip_to_char(b'-');
                let encoded = pb.data_str(data_start)?;
                if !encoded.is_empty() {
                    branch.client_data = STANDARD
                        .decode(encoded.replace('.', "="))
                        .map_err(|e| pb.fail(format!("invalid client data: {}", e)))?;
                }
                pb.skip_char(b'-')?;
            }
        }

        let tid_start = pb.mark();
        pb.skip_to_one_of(b";, \t\r\n");
        branch.transaction_id = pb.data_str(tid_start)?.to_string();
        if !pb.eof() {
            return Err(pb.fail("unexpected character in branch"));
        }
        Ok(branch)
    }

    pub fn transaction_id(&self) -> &str {
        &self.transaction_id
    }

    pub fn has_magic_cookie(&self) -> bool {
        self.magic.is_some()
    }

    /// True when the branch carries this stack's `-sw-` cookie.
    pub fn is_local(&self) -> bool {
        self.local
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn increment_counter(&mut self) {
        self.counter = self.counter.wrapping_add(1);
    }

    pub fn client_data(&self) -> &[u8] {
        &self.client_data
    }

    /// Attach opaque data; only locally generated branches carry it.
    pub fn set_client_data(&mut self, data: impl Into<Vec<u8>>) {
        self.client_data = data.into();
    }

    /// Turn this into a local branch for `transaction_id`, counter 1 and no
    /// client data.
    pub fn reset(&mut self, transaction_id: impl Into<String>) {
        *self = BranchParameter::local(transaction_id);
    }
}

impl fmt::Display for BranchParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(magic) = &self.magic {
            f.write_str(magic)?;
            if self.local {
                write!(
                    f,
                    "{}{}-{}-",
                    LOCAL_COOKIE,
                    self.counter,
                    STANDARD.encode(&self.client_data).replace('=', ".")
                )?;
            }
        }
        f.write_str(&self.transaction_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc3261_foreign_branch() {
        let b = BranchParameter::parse(b"z9hG4bK776asdhds").unwrap();
        assert!(b.has_magic_cookie());
        assert!(!b.is_local());
        assert_eq!(b.transaction_id(), "776asdhds");
        assert_eq!(b.to_string(), "z9hG4bK776asdhds");
    }

    #[test]
    fn test_magic_cookie_case_preserved() {
        let b = BranchParameter::parse(b"z9hG4bkabc").unwrap();
        assert!(b.has_magic_cookie());
        assert_eq!(b.transaction_id(), "abc");
        assert_eq!(b.to_string(), "z9hG4bkabc");
    }

    #[test]
    fn test_rfc2543_branch() {
        let b = BranchParameter::parse(b"7c3a9f0.1").unwrap();
        assert!(!b.has_magic_cookie());
        assert_eq!(b.transaction_id(), "7c3a9f0.1");
        assert_eq!(b.to_string(), "7c3a9f0.1");
    }

    #[test]
    fn test_local_branch_with_client_data() {
        let b = BranchParameter::parse(b"z9hG4bK-sw-7-UEEzMjc2OA..-a-b-c").unwrap();
        assert!(b.is_local());
        assert_eq!(b.counter(), 7);
        assert_eq!(b.client_data(), b"PA32768");
        assert_eq!(b.transaction_id(), "a-b-c");
        assert_eq!(b.to_string(), "z9hG4bK-sw-7-UEEzMjc2OA..-a-b-c");
    }

    #[test]
    fn test_local_branch_requires_digit_counter() {
        assert!(BranchParameter::parse(b"z9hG4bK-sw-x-abc").is_err());
        assert!(BranchParameter::parse(b"z9hG4bK-sw-12").is_err());
    }

    #[test]
    fn test_reset_makes_local() {
        let mut b = BranchParameter::parse(b"z9hG4bKforeign").unwrap();
        b.set_client_data(b"x".to_vec());
        b.reset("tid1");
        assert!(b.is_local());
        assert_eq!(b.counter(), 1);
        assert!(b.client_data().is_empty());
        assert_eq!(b.to_string(), "z9hG4bK-sw-1--tid1");
        assert_eq!(BranchParameter::parse(b.to_string().as_bytes()).unwrap(), b);
    }

    #[test]
    fn test_generated_branches_are_unique() {
        let a = BranchParameter::generate();
        let b = BranchParameter::generate();
        assert_ne!(a.transaction_id(), b.transaction_id());
        assert!(a.to_string().starts_with("z9hG4bK-sw-1--"));
    }
}
