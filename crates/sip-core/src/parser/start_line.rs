//! nom grammars for the request line and status line.

use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_while1, take_while_m_n},
    character::complete::{char, digit1, space0, space1},
    combinator::{map, opt, recognize, rest},
    sequence::{pair, preceded, terminated, tuple},
    IResult,
};

use crate::error::{Error, Result};
use crate::types::is_token_char;

pub type ParseResult<'a, O> = IResult<&'a [u8], O>;

/// Raw pieces of a start line, before the URI and method are interpreted.
#[derive(Debug, PartialEq, Eq)]
pub enum RawStartLine<'a> {
    Request {
        method: &'a [u8],
        uri: &'a [u8],
        version: &'a [u8],
    },
    Status {
        version: &'a [u8],
        code: &'a [u8],
        reason: &'a [u8],
    },
}

/// `SIP/2.0`, version digits free-form.
pub fn sip_version(input: &[u8]) -> ParseResult<&[u8]> {
    recognize(tuple((tag_no_case("SIP/"), digit1, char('.'), digit1)))(input)
}

fn request_line(input: &[u8]) -> ParseResult<RawStartLine<'_>> {
    map(
        tuple((
            terminated(take_while1(is_token_char), space1),
            terminated(take_while1(|c: u8| c != b' ' && c != b'\t'), space1),
            terminated(sip_version, space0),
        )),
        |(method, uri, version)| RawStartLine::Request {
            method,
            uri,
            version,
        },
    )(input)
}

fn status_line(input: &[u8]) -> ParseResult<RawStartLine<'_>> {
    map(
        tuple((
            sip_version,
            preceded(space1, take_while_m_n(3, 3, |c: u8| c.is_ascii_digit())),
            opt(preceded(space1, rest)),
        )),
        |(version, code, reason)| RawStartLine::Status {
            version,
            code,
            reason: reason.unwrap_or(&[]),
        },
    )(input)
}

/// Parse one start line (without its CRLF).
pub fn raw_start_line(input: &[u8]) -> Result<RawStartLine<'_>> {
    let result: ParseResult<RawStartLine<'_>> = alt((status_line, request_line))(input);
    match result {
        Ok((remaining, line)) if remaining.is_empty() => Ok(line),
        Ok((remaining, _)) => Err(Error::Parse {
            context: "start line".to_string(),
            position: input.len() - remaining.len(),
            detail: "unexpected trailing characters".to_string(),
        }),
        Err(e) => Err(Error::Parse {
            context: "start line".to_string(),
            position: 0,
            detail: format!("malformed start line: {:?}", e.map(|inner| inner.code)),
        }),
    }
}

/// Is `line` the start of a response?
pub fn is_status_line(line: &[u8]) -> bool {
    pair(sip_version, space1)(line).is_ok()
}
