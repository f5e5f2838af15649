use std::fmt;

use crate::error::Result;
use crate::parse_buffer::ParseBuffer;
use crate::types::category::ParserCategory;
use crate::types::is_token_char;
use crate::types::param::Params;

/// A single token with optional parameters (Allow, Supported, Event, ...).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Token {
    pub value: String,
    pub params: Params,
}

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Token {
            value: value.into(),
            params: Params::new(),
        }
    }
}

impl ParserCategory for Token {
    fn parse(pb: &mut ParseBuffer<'_>) -> Result<Self> {
        pb.skip_lws();
        let start = pb.mark();
        while matches!(pb.peek(), Some(c) if is_token_char(c)) {
            pb.advance()?;
        }
        let value = pb.data_str(start)?.to_string();
        if value.is_empty() {
            return Err(pb.fail("expected a token"));
        }
        let params = Params::parse(pb, &[])?;
        Ok(Token { value, params })
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_with_params() {
        let t = Token::parse_bytes(b"presence;id=12", "Event").unwrap();
        assert_eq!(t.value, "presence");
        assert_eq!(t.params.value("id"), Some("12"));
        assert!(Token::parse_bytes(b"@bad", "Event").is_err());
    }
}
