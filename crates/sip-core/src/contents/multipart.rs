//! `multipart/mixed` bodies (RFC 2046 Section 5.1).
//!
//! Layout produced by [`MultipartMixedContents::encode`]:
//!
//! ```text
//! --B CRLF part-headers CRLF body CRLF --B CRLF ... CRLF --B-- CRLF
//! ```
//!
//! An empty multipart is just the close delimiter `--B--` CRLF.

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::headers::h;
use crate::message::SipMessage;
use crate::parse_buffer::ParseBuffer;
use crate::types::category::ParserCategory;
use crate::types::Mime;

/// One body part with its own Content-Type and any other part headers.
#[derive(Debug, Clone, PartialEq)]
pub struct MultipartPart {
    pub content_type: Mime,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl MultipartPart {
    pub fn new(content_type: Mime, body: impl Into<Bytes>) -> Self {
        MultipartPart {
            content_type,
            headers: Vec::new(),
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultipartMixedContents {
    boundary: String,
    parts: Vec<MultipartPart>,
}

impl Default for MultipartMixedContents {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartMixedContents {
    /// Empty contents with a random 16 hex digit boundary.
    pub fn new() -> Self {
        Self::with_boundary(format!("{:016x}", rand::random::<u64>()))
    }

    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        MultipartMixedContents {
            boundary: boundary.into(),
            parts: Vec::new(),
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn parts(&self) -> &[MultipartPart] {
        &self.parts
    }

    pub fn push(&mut self, part: MultipartPart) {
        self.parts.push(part);
    }

    /// `multipart/mixed;boundary=...` for the enclosing Content-Type.
    pub fn content_type(&self) -> Mime {
        Mime::new("multipart", "mixed").with_boundary(self.boundary.clone())
    }

    pub fn encode(&self) -> Bytes {
        let delimiter = format!("--{}", self.boundary);
        let mut out: Vec<u8> = Vec::new();
        if self.parts.is_empty() {
            out.extend_from_slice(format!("{}--\r\n", delimiter).as_bytes());
            return Bytes::from(out);
        }
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                out.extend_from_slice(b"\r\n");
            }
            out.extend_from_slice(delimiter.as_bytes());
            out.extend_from_slice(b"\r\n");
            out.extend_from_slice(format!("Content-Type: {}\r\n", part.content_type).as_bytes());
            for (name, value) in &part.headers {
                out.extend_from_slice(format!("{}: {}\r\n", name, value).as_bytes());
            }
            out.extend_from_slice(b"\r\n");
            out.extend_from_slice(&part.body);
        }
        out.extend_from_slice(format!("\r\n{}--\r\n", delimiter).as_bytes());
        Bytes::from(out)
    }

    /// Split `body` into parts using `boundary`. Any preamble before the
    /// first delimiter and any epilogue after the close delimiter is ignored.
    pub fn parse(body: &Bytes, boundary: &str) -> Result<Self> {
        let delimiter = format!("--{}", boundary);
        let separator = format!("\r\n{}", delimiter);
        let mut contents = MultipartMixedContents::with_boundary(boundary);
        let mut pb = ParseBuffer::new(body, "multipart");

        if !pb.rest().starts_with(delimiter.as_bytes()) {
            pb.skip_to_chars(separator.as_bytes());
            pb.skip_chars("\r\n")?;
        }
        pb.skip_chars(&delimiter)?;

        loop {
            if pb.rest().starts_with(b"--") {
                return Ok(contents);
            }
            pb.skip_whitespace();
            pb.skip_chars("\r\n")?;

            let part_start = pb.mark();
            pb.skip_to_chars(separator.as_bytes());
            if pb.eof() {
                return Err(pb.fail("missing close delimiter"));
            }
            let part_end = pb.mark();
            contents.parts.push(parse_part(body.slice(part_start..part_end))?);
            pb.skip_chars(&separator)?;
        }
    }
}

fn parse_part(raw: Bytes) -> Result<MultipartPart> {
    let mut pb = ParseBuffer::new(&raw, "multipart part");
    let mut part = MultipartPart::new(Mime::new("text", "plain"), Bytes::new());

    while !pb.eof() && !pb.rest().starts_with(b"\r\n") {
        let line_start = pb.mark();
        pb.skip_to_term_crlf();
        let line = pb.data_str(line_start)?;
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| pb.fail("part header without colon"))?;
        let (name, value) = (name.trim(), value.trim());
        if name.eq_ignore_ascii_case("Content-Type") {
            part.content_type = Mime::parse_bytes(value.as_bytes(), "Content-Type")?;
        } else {
            part.headers.push((name.to_string(), value.to_string()));
        }
        if !pb.eof() {
            pb.skip_chars("\r\n")?;
        }
    }
    if !pb.eof() {
        pb.skip_chars("\r\n")?;
    }
    part.body = raw.slice(pb.position()..);
    Ok(part)
}

impl SipMessage {
    /// Set a multipart body and the matching Content-Type.
    pub fn set_multipart(&mut self, contents: &MultipartMixedContents) {
        self.set_body_with_type(contents.encode(), contents.content_type());
    }

    /// Interpret the body as `multipart/mixed` using the Content-Type boundary.
    pub fn multipart(&self) -> Result<MultipartMixedContents> {
        let content_type = self.const_header::<h::ContentType>()?;
        if !content_type.mime_type.eq_ignore_ascii_case("multipart") {
            return Err(Error::InvalidMessage(format!(
                "body is {}, not multipart",
                content_type
            )));
        }
        let boundary = content_type
            .boundary()
            .ok_or_else(|| Error::InvalidMessage("multipart body without boundary".to_string()))?;
        MultipartMixedContents::parse(self.body(), boundary)
    }
}
