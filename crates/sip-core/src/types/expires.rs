use std::fmt;

use crate::error::Result;
use crate::parse_buffer::ParseBuffer;
use crate::types::category::ParserCategory;
use crate::types::param::Params;

/// Expires header: delta-seconds with optional parameters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExpiresCategory {
    pub value: u32,
    pub params: Params,
}

impl ExpiresCategory {
    pub fn new(value: u32) -> Self {
        ExpiresCategory {
            value,
            params: Params::new(),
        }
    }
}

impl ParserCategory for ExpiresCategory {
    fn parse(pb: &mut ParseBuffer<'_>) -> Result<Self> {
        pb.skip_lws();
        let value = pb.u32()?;
        let params = Params::parse(pb, &[])?;
        Ok(ExpiresCategory { value, params })
    }
}

impl fmt::Display for ExpiresCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.params)
    }
}
