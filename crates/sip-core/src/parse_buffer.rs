//! Bounds-checked cursor over an immutable byte range.
//!
//! Every grammar in the crate is written against [`ParseBuffer`]. The cursor
//! never leaves `[0, len]`: the `skip_to_*` family stops at end-of-buffer
//! when the target is absent, and primitives that require a particular byte
//! under the cursor fail with [`Error::Parse`] instead of advancing.
//!
//! Slices handed out by [`ParseBuffer::data`] borrow from the underlying
//! buffer; only [`ParseBuffer::data_owned`] copies.

use bytes::Bytes;

use crate::error::{Error, Result};

/// Position in a [`ParseBuffer`] saved for later slicing or rewinding.
pub type Anchor = usize;

#[derive(Debug, Clone)]
pub struct ParseBuffer<'a> {
    buf: &'a [u8],
    pos: usize,
    context: &'a str,
}

#[inline]
fn is_ws(c: u8) -> bool {
    c == b' ' || c == b'\t'
}

#[inline]
fn is_lws(c: u8) -> bool {
    is_ws(c) || c == b'\r' || c == b'\n'
}

impl<'a> ParseBuffer<'a> {
    /// Create a cursor at the start of `buf`. `context` names the thing being
    /// parsed in error messages.
    pub fn new(buf: &'a [u8], context: &'a str) -> Self {
        ParseBuffer {
            buf,
            pos: 0,
            context,
        }
    }

    pub fn context(&self) -> &str {
        self.context
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn eof(&self) -> bool {
        self.pos >= self.buf.len()
    }

    pub fn bof(&self) -> bool {
        self.pos == 0
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Bytes from the cursor to the end of the buffer.
    pub fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    /// Byte under the cursor, `None` at end-of-buffer.
    pub fn peek(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    pub fn mark(&self) -> Anchor {
        self.pos
    }

    /// Move the cursor back (or forward) to a previously saved anchor.
    pub fn reset(&mut self, anchor: Anchor) {
        self.pos = anchor.min(self.buf.len());
    }

    /// Build a parse error positioned at the cursor.
    pub fn fail(&self, detail: impl Into<String>) -> Error {
        Error::Parse {
            context: self.context.to_string(),
            position: self.pos,
            detail: detail.into(),
        }
    }

    /// Advance over exactly one byte of any value.
    pub fn advance(&mut self) -> Result<()> {
        if self.eof() {
            return Err(self.fail("unexpected end of input"));
        }
        self.pos += 1;
        Ok(())
    }

    /// Advance over `expected`, failing if some other byte is under the cursor.
    pub fn skip_char(&mut self, expected: u8) -> Result<()> {
        match self.peek() {
            Some(c) if c == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(c) => Err(self.fail(format!(
                "expected '{}', found '{}'",
                expected as char, c as char
            ))),
            None => Err(self.fail(format!(
                "expected '{}', found end of input",
                expected as char
            ))),
        }
    }

    /// Advance over the literal `expected`, failing on the first mismatch.
    pub fn skip_chars(&mut self, expected: &str) -> Result<()> {
        let anchor = self.pos;
        for &c in expected.as_bytes() {
            if let Err(e) = self.skip_char(c) {
                self.pos = anchor;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Advance `n` bytes, failing if fewer remain.
    pub fn skip_n(&mut self, n: usize) -> Result<()> {
        if n > self.remaining() {
            return Err(self.fail(format!("cannot skip {} bytes, {} remain", n, self.remaining())));
        }
        self.pos += n;
        Ok(())
    }

    /// Stop at the next `target` or at end-of-buffer.
    pub fn skip_to_char(&mut self, target: u8) -> &mut Self {
        self.pos = match self.buf[self.pos..].iter().position(|&c| c == target) {
            Some(offset) => self.pos + offset,
            None => self.buf.len(),
        };
        self
    }

    /// Stop at the next byte contained in `targets` or at end-of-buffer.
    pub fn skip_to_one_of(&mut self, targets: &[u8]) -> &mut Self {
        self.pos = match self.buf[self.pos..].iter().position(|c| targets.contains(c)) {
            Some(offset) => self.pos + offset,
            None => self.buf.len(),
        };
        self
    }

    /// Stop at the start of the next occurrence of `pattern` or at end-of-buffer.
    pub fn skip_to_chars(&mut self, pattern: &[u8]) -> &mut Self {
        if pattern.is_empty() {
            return self;
        }
        self.pos = match self.buf[self.pos..]
            .windows(pattern.len())
            .position(|w| w == pattern)
        {
            Some(offset) => self.pos + offset,
            None => self.buf.len(),
        };
        self
    }

    /// Stop at the next CRLF or at end-of-buffer.
    pub fn skip_to_term_crlf(&mut self) -> &mut Self {
        self.skip_to_chars(b"\r\n")
    }

    /// Skip spaces and horizontal tabs.
    pub fn skip_whitespace(&mut self) -> &mut Self {
        while matches!(self.peek(), Some(c) if is_ws(c)) {
            self.pos += 1;
        }
        self
    }

    /// Skip linear whitespace, including folded line breaks.
    pub fn skip_lws(&mut self) -> &mut Self {
        while matches!(self.peek(), Some(c) if is_lws(c)) {
            self.pos += 1;
        }
        self
    }

    /// Stop at the next whitespace byte or at end-of-buffer.
    pub fn skip_non_whitespace(&mut self) -> &mut Self {
        while matches!(self.peek(), Some(c) if !is_lws(c)) {
            self.pos += 1;
        }
        self
    }

    /// With the cursor just past an opening quote, advance to the closing
    /// quote, honouring backslash escapes. The cursor is left on the quote.
    pub fn skip_to_end_quote(&mut self, quote: u8) -> Result<()> {
        while let Some(c) = self.peek() {
            if c == b'\\' {
                self.pos = (self.pos + 2).min(self.buf.len());
                continue;
            }
            if c == quote {
                return Ok(());
            }
            self.pos += 1;
        }
        Err(self.fail("unterminated quoted string"))
    }

    /// Step back one byte, failing at the start of the buffer.
    pub fn skip_back_char(&mut self) -> Result<()> {
        if self.bof() {
            return Err(self.fail("cannot move before start of buffer"));
        }
        self.pos -= 1;
        Ok(())
    }

    /// Step back over whitespace, never moving before `floor`.
    pub fn skip_back_whitespace(&mut self, floor: Anchor) -> &mut Self {
        while self.pos > floor && is_lws(self.buf[self.pos - 1]) {
            self.pos -= 1;
        }
        self
    }

    /// Borrowed slice between `anchor` and the cursor.
    pub fn data(&self, anchor: Anchor) -> &'a [u8] {
        let (from, to) = if anchor <= self.pos {
            (anchor, self.pos)
        } else {
            (self.pos, anchor.min(self.buf.len()))
        };
        &self.buf[from..to]
    }

    /// Copy of the slice between `anchor` and the cursor.
    pub fn data_owned(&self, anchor: Anchor) -> Bytes {
        Bytes::copy_from_slice(self.data(anchor))
    }

    /// Slice between `anchor` and the cursor as text.
    pub fn data_str(&self, anchor: Anchor) -> Result<&'a str> {
        std::str::from_utf8(self.data(anchor)).map_err(|_| Error::Utf8(self.context.to_string()))
    }

    /// Signed decimal integer. Fails if the cursor is not on a digit (after
    /// an optional sign) or the value overflows.
    pub fn integer(&mut self) -> Result<i64> {
        let anchor = self.pos;
        let negative = match self.peek() {
            Some(b'-') => {
                self.pos += 1;
                true
            }
            Some(b'+') => {
                self.pos += 1;
                false
            }
            _ => false,
        };
        let magnitude = match self.digits_u64() {
            Ok(v) => v,
            Err(e) => {
                self.pos = anchor;
                return Err(e);
            }
        };
        let value = if negative {
            0i64.checked_sub_unsigned(magnitude)
        } else {
            i64::try_from(magnitude).ok()
        };
        value.ok_or_else(|| {
            let err = self.fail("integer overflow");
            self.pos = anchor;
            err
        })
    }

    pub fn u64(&mut self) -> Result<u64> {
        self.digits_u64()
    }

    pub fn u32(&mut self) -> Result<u32> {
        let anchor = self.pos;
        let v = self.digits_u64()?;
        u32::try_from(v).map_err(|_| {
            let err = self.fail("value does not fit in 32 bits");
            self.pos = anchor;
            err
        })
    }

    /// Decimal number with an optional fractional part.
    pub fn float_val(&mut self) -> Result<f64> {
        let anchor = self.pos;
        if matches!(self.peek(), Some(b'-') | Some(b'+')) {
            self.pos += 1;
        }
        if !matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos = anchor;
            return Err(self.fail("expected a digit"));
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek() == Some(b'.') {
            self.pos += 1;
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        let text = self.data_str(anchor)?;
        text.parse::<f64>().map_err(|_| {
            let err = self.fail(format!("invalid number '{}'", text));
            self.pos = anchor;
            err
        })
    }

    /// q-value scaled to thousandths: `0.5` yields 500, `1` yields 1000.
    pub fn q_val(&mut self) -> Result<u16> {
        let anchor = self.pos;
        let whole = match self.peek() {
            Some(b'0') => 0u16,
            Some(b'1') => 1u16,
            _ => return Err(self.fail("q-value must start with 0 or 1")),
        };
        self.pos += 1;
        let mut value = whole * 1000;
        if self.peek() == Some(b'.') {
            self.pos += 1;
            let mut scale = 100u16;
            while let Some(c) = self.peek() {
                if !c.is_ascii_digit() {
                    break;
                }
                if scale == 0 {
                    self.pos = anchor;
                    return Err(self.fail("q-value has more than three decimals"));
                }
                value += u16::from(c - b'0') * scale;
                scale /= 10;
                self.pos += 1;
            }
        }
        if value > 1000 {
            self.pos = anchor;
            return Err(self.fail("q-value greater than 1"));
        }
        Ok(value)
    }

    fn digits_u64(&mut self) -> Result<u64> {
        if !matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            return Err(self.fail("expected a digit"));
        }
        let anchor = self.pos;
        let mut value: u64 = 0;
        while let Some(c) = self.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            value = match value
                .checked_mul(10)
                .and_then(|v| v.checked_add(u64::from(c - b'0')))
            {
                Some(v) => v,
                None => {
                    let err = self.fail("integer overflow");
                    self.pos = anchor;
                    return Err(err);
                }
            };
            self.pos += 1;
        }
        Ok(value)
    }
}
