use std::fmt;

use crate::error::Result;
use crate::parse_buffer::ParseBuffer;
use crate::types::category::ParserCategory;

/// Unsigned 32-bit header value such as Content-Length or Max-Forwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UInt32Category(pub u32);

impl UInt32Category {
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl ParserCategory for UInt32Category {
    fn parse(pb: &mut ParseBuffer<'_>) -> Result<Self> {
        pb.skip_lws();
        Ok(UInt32Category(pb.u32()?))
    }
}

impl fmt::Display for UInt32Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uint32() {
        assert_eq!(UInt32Category::parse_bytes(b" 70", "Max-Forwards").unwrap().value(), 70);
        assert!(UInt32Category::parse_bytes(b"-1", "Max-Forwards").is_err());
    }
}
