use std::fmt;

use crate::error::{Error, Result};
use crate::parse_buffer::ParseBuffer;
use crate::parser::start_line::{raw_start_line, RawStartLine};
use crate::types::category::ParserCategory;

/// `SIP-Version SP Status-Code SP Reason-Phrase`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub version: String,
    pub code: u16,
    pub reason: String,
}

impl Default for StatusLine {
    fn default() -> Self {
        StatusLine {
            version: "SIP/2.0".to_string(),
            code: 200,
            reason: "OK".to_string(),
        }
    }
}

impl StatusLine {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        StatusLine {
            code,
            reason: reason.into(),
            ..Default::default()
        }
    }
}

impl ParserCategory for StatusLine {
    fn parse(pb: &mut ParseBuffer<'_>) -> Result<Self> {
        let line = pb.rest();
        match raw_start_line(line)? {
            RawStartLine::Status {
                version,
                code,
                reason,
            } => {
                let text = |b: &[u8]| {
                    std::str::from_utf8(b)
                        .map(str::to_string)
                        .map_err(|_| Error::Utf8("status line".to_string()))
                };
                let code = text(code)?
                    .parse::<u16>()
                    .map_err(|_| pb.fail("invalid status code"))?;
                if !(100..=699).contains(&code) {
                    return Err(pb.fail(format!("status code {} out of range", code)));
                }
                let parsed = StatusLine {
                    version: text(version)?,
                    code,
                    reason: text(reason)?.trim_end().to_string(),
                };
                pb.skip_n(line.len())?;
                Ok(parsed)
            }
            RawStartLine::Request { .. } => Err(pb.fail("expected a status line")),
        }
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.version, self.code, self.reason)
    }
}
