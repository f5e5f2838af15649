use std::fmt;

use crate::error::Result;
use crate::parse_buffer::ParseBuffer;
use crate::types::category::ParserCategory;
use crate::types::method::Method;

/// CSeq header: sequence number plus request method.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CSeqCategory {
    pub sequence: u32,
    pub method: Method,
}

impl CSeqCategory {
    pub fn new(sequence: u32, method: Method) -> Self {
        CSeqCategory { sequence, method }
    }
}

impl ParserCategory for CSeqCategory {
    fn parse(pb: &mut ParseBuffer<'_>) -> Result<Self> {
        pb.skip_lws();
        let sequence = pb.u32()?;
        pb.skip_lws();
        let start = pb.mark();
        pb.skip_non_whitespace();
        let method = pb.data_str(start)?.parse::<Method>()?;
        Ok(CSeqCategory { sequence, method })
    }
}

impl fmt::Display for CSeqCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.sequence, self.method)
    }
}
