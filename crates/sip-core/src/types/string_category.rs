use std::fmt;

use crate::error::Result;
use crate::parse_buffer::ParseBuffer;
use crate::types::category::ParserCategory;

/// Free-form text header value (Subject, User-Agent, unknown headers).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StringCategory(pub String);

impl StringCategory {
    pub fn new(value: impl Into<String>) -> Self {
        StringCategory(value.into())
    }

    pub fn value(&self) -> &str {
        &self.0
    }
}

impl ParserCategory for StringCategory {
    fn parse(pb: &mut ParseBuffer<'_>) -> Result<Self> {
        pb.skip_lws();
        let start = pb.mark();
        pb.skip_n(pb.remaining())?;
        let end = pb.mark();
        pb.skip_back_whitespace(start);
        let value = pb.data_str(start)?.to_string();
        pb.reset(end);
        Ok(StringCategory(value))
    }
}

impl fmt::Display for StringCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_trimmed() {
        let s = StringCategory::parse_bytes(b"  Softphone Beta1.5  ", "User-Agent").unwrap();
        assert_eq!(s.value(), "Softphone Beta1.5");
    }
}
