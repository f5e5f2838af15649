use std::fmt;

use crate::error::Result;
use crate::parse_buffer::ParseBuffer;
use crate::types::category::ParserCategory;

/// Call-ID header: `word [ "@" word ]`, compared byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CallId(pub String);

impl CallId {
    pub fn new(value: impl Into<String>) -> Self {
        CallId(value.into())
    }

    pub fn value(&self) -> &str {
        &self.0
    }
}

impl ParserCategory for CallId {
    fn parse(pb: &mut ParseBuffer<'_>) -> Result<Self> {
        pb.skip_lws();
        let start = pb.mark();
        pb.skip_non_whitespace();
        let value = pb.data_str(start)?;
        if value.is_empty() {
            return Err(pb.fail("empty Call-ID"));
        }
        Ok(CallId(value.to_string()))
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_id() {
        let id = CallId::parse_bytes(b"a84b4c76e66710@pc33.atlanta.com", "Call-ID").unwrap();
        assert_eq!(id.value(), "a84b4c76e66710@pc33.atlanta.com");
        assert!(CallId::parse_bytes(b"", "Call-ID").is_err());
        assert!(CallId::parse_bytes(b"two words", "Call-ID").is_err());
    }
}
