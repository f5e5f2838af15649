use bytes::{Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::parse_buffer::ParseBuffer;

/// A header line split into name and (trimmed) value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawHeader {
    pub name: String,
    pub value: Bytes,
}

/// A message split at its structural boundaries.
#[derive(Debug, Clone)]
pub struct FramedMessage {
    pub start_line: Bytes,
    pub headers: Vec<RawHeader>,
    /// Everything after the blank line; Content-Length is applied later.
    pub body: Bytes,
}

fn trim(data: &Bytes, from: usize, to: usize) -> Bytes {
    let slice = &data[from..to];
    let start = slice
        .iter()
        .position(|c| !c.is_ascii_whitespace())
        .unwrap_or(slice.len());
    let end = slice
        .iter()
        .rposition(|c| !c.is_ascii_whitespace())
        .map_or(start, |p| p + 1);
    data.slice(from + start..from + end)
}

/// Split `data` into start line, header lines and body.
///
/// Leading CRLFs (keep-alives) are skipped. Folded header lines are joined
/// with a single space; only those values are copied, all others are
/// zero-copy slices of `data`.
pub fn frame(data: &Bytes) -> Result<FramedMessage> {
    let mut pb = ParseBuffer::new(data, "message");
    while pb.rest().starts_with(b"\r\n") {
        pb.skip_n(2)?;
    }
    if pb.eof() {
        return Err(Error::Framing("empty message".to_string()));
    }

    let start = pb.mark();
    pb.skip_to_chars(b"\r\n\r\n");
    if pb.eof() {
        return Err(Error::Framing("unterminated header section".to_string()));
    }
    let header_end = pb.mark();
    let body = data.slice(header_end + 4..);

    let mut lines = ParseBuffer::new(&data[..header_end], "headers");
    lines.reset(start);
    let line_start = lines.mark();
    lines.skip_to_term_crlf();
    let start_line = data.slice(line_start..lines.mark());
    if start_line.is_empty() {
        return Err(Error::Framing("empty start line".to_string()));
    }

    let mut headers: Vec<RawHeader> = Vec::new();
    while !lines.eof() {
        lines.skip_chars("\r\n")?;
        let line_start = lines.mark();
        lines.skip_to_term_crlf();
        let line_end = lines.mark();

        if matches!(data.get(line_start), Some(b' ') | Some(b'\t')) {
            let previous = headers
                .last_mut()
                .ok_or_else(|| Error::Framing("continuation line before first header".to_string()))?;
            let continuation = trim(data, line_start, line_end);
            let mut joined = BytesMut::with_capacity(previous.value.len() + continuation.len() + 1);
            joined.extend_from_slice(&previous.value);
            joined.extend_from_slice(b" ");
            joined.extend_from_slice(&continuation);
            previous.value = joined.freeze();
            continue;
        }

        let mut line = ParseBuffer::new(&data[line_start..line_end], "header line");
        line.skip_to_char(b':');
        if line.eof() {
            return Err(Error::Framing(format!(
                "header line without colon at offset {}",
                line_start
            )));
        }
        let colon = line_start + line.position();
        let name = std::str::from_utf8(&data[line_start..colon])
            .map_err(|_| Error::Utf8("header name".to_string()))?
            .trim()
            .to_string();
        if name.is_empty() {
            return Err(Error::Framing("empty header name".to_string()));
        }
        headers.push(RawHeader {
            name,
            value: trim(data, colon + 1, line_end),
        });
    }

    Ok(FramedMessage {
        start_line,
        headers,
        body,
    })
}

/// Split a multi-valued header at commas that are outside quoted strings
/// and angle brackets. Empty pieces are dropped.
pub fn split_comma_values(value: &Bytes) -> Vec<Bytes> {
    let mut pieces = Vec::new();
    let mut in_quotes = false;
    let mut in_angle = false;
    let mut escaped = false;
    let mut start = 0;

    for (i, &c) in value.iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            b'\\' if in_quotes => escaped = true,
            b'"' => in_quotes = !in_quotes,
            b'<' if !in_quotes => in_angle = true,
            b'>' if !in_quotes => in_angle = false,
            b',' if !in_quotes && !in_angle => {
                let piece = trim(value, start, i);
                if !piece.is_empty() {
                    pieces.push(piece);
                }
                start = i + 1;
            }
            _ => {}
        }
    }
    let piece = trim(value, start, value.len());
    if !piece.is_empty() {
        pieces.push(piece);
    }
    pieces
}
