//! Generic `;name[=value]` parameter lists shared by URIs and headers.

use std::fmt;

use crate::error::Result;
use crate::parse_buffer::ParseBuffer;

/// A single parameter. Quoted values are stored without their quotes and
/// re-quoted on encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub value: Option<String>,
    pub quoted: bool,
}

impl Param {
    pub fn new(name: impl Into<String>, value: Option<String>) -> Self {
        Param {
            name: name.into(),
            value,
            quoted: false,
        }
    }

    pub fn quoted(name: impl Into<String>, value: impl Into<String>) -> Self {
        Param {
            name: name.into(),
            value: Some(value.into()),
            quoted: true,
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.value, self.quoted) {
            (Some(v), true) => write!(f, "{}=\"{}\"", self.name, v),
            (Some(v), false) => write!(f, "{}={}", self.name, v),
            (None, _) => f.write_str(&self.name),
        }
    }
}

/// Ordered parameter list. Names compare case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Params(Vec<Param>);

impl Params {
    pub fn new() -> Self {
        Params(Vec::new())
    }

    pub fn get(&self, name: &str) -> Option<&Param> {
        self.0.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Value of a parameter; `None` if absent or valueless.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|p| p.value.as_deref())
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Replace the parameter if present, otherwise append it.
    pub fn set(&mut self, param: Param) {
        match self.0.iter_mut().find(|p| p.name.eq_ignore_ascii_case(&param.name)) {
            Some(existing) => *existing = param,
            None => self.0.push(param),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Param> {
        let idx = self.0.iter().position(|p| p.name.eq_ignore_ascii_case(name))?;
        Some(self.0.remove(idx))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse a run of `;name[=value]` pairs starting at the cursor. Stops at
    /// the first byte in `terminators` outside a quoted value, or at end of
    /// input. Leading whitespace around separators is tolerated.
    pub fn parse(pb: &mut ParseBuffer<'_>, terminators: &[u8]) -> Result<Params> {
        let mut params = Params::new();
        loop {
            pb.skip_lws();
            if pb.peek() != Some(b';') {
                break;
            }
            pb.skip_char(b';')?;
            pb.skip_lws();

            let start = pb.mark();
            let mut stops = vec![b';', b'=', b' ', b'\t', b'\r', b'\n'];
            stops.extend_from_slice(terminators);
            pb.skip_to_one_of(&stops);
            let name = pb.data_str(start)?.to_string();
            if name.is_empty() {
                return Err(pb.fail("empty parameter name"));
            }

            pb.skip_whitespace();
            if pb.peek() != Some(b'=') {
                params.0.push(Param::new(name, None));
                continue;
            }
            pb.skip_char(b'=')?;
            pb.skip_whitespace();

            if pb.peek() == Some(b'"') {
                pb.skip_char(b'"')?;
                let value_start = pb.mark();
                pb.skip_to_end_quote(b'"')?;
                let value = pb.data_str(value_start)?.to_string();
                pb.skip_char(b'"')?;
                params.0.push(Param::quoted(name, value));
            } else {
                let value_start = pb.mark();
                let mut stops = vec![b';', b' ', b'\t', b'\r', b'\n'];
                stops.extend_from_slice(terminators);
                pb.skip_to_one_of(&stops);
                let value = pb.data_str(value_start)?.to_string();
                params.0.push(Param::new(name, Some(value)));
            }
        }
        Ok(params)
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for p in &self.0 {
            write!(f, ";{}", p)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mixed_params() {
        let mut pb = ParseBuffer::new(b";tag=abc ; lr;reason=\"a;b\"?x", "params");
        let params = Params::parse(&mut pb, b"?").unwrap();
        assert_eq!(params.len(), 3);
        assert_eq!(params.value("TAG"), Some("abc"));
        assert!(params.has("lr"));
        assert_eq!(params.value("lr"), None);
        assert_eq!(params.value("reason"), Some("a;b"));
        assert_eq!(pb.peek(), Some(b'?'));
        assert_eq!(params.to_string(), ";tag=abc;lr;reason=\"a;b\"");
    }

    #[test]
    fn test_set_and_remove() {
        let mut params = Params::new();
        params.set(Param::new("rport", None));
        params.set(Param::new("rport", Some("5060".to_string())));
        assert_eq!(params.len(), 1);
        assert_eq!(params.value("rport"), Some("5060"));
        assert!(params.remove("RPORT").is_some());
        assert!(params.is_empty());
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut pb = ParseBuffer::new(b";=x", "params");
        assert!(Params::parse(&mut pb, b"").is_err());
    }
}
