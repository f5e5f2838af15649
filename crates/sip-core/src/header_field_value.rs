//! One occurrence of one header, parsed lazily.
//!
//! A [`HeaderFieldValue`] starts out holding only the raw bytes sliced from
//! the received datagram. The first typed access runs the header's grammar
//! and caches the outcome, success or failure, so the grammar runs at most
//! once per value. Later accesses return the cached value, and mutations made
//! through [`HeaderFieldValue::get_mut`] are what gets encoded.

use bytes::Bytes;
use once_cell::unsync::OnceCell;

use crate::error::{Error, Result};
use crate::types::category::{HeaderCategory, ParsedHeader};
use crate::types::header_type::Grammar;

#[derive(Debug, Clone)]
pub struct HeaderFieldValue {
    raw: Bytes,
    parsed: OnceCell<std::result::Result<ParsedHeader, Error>>,
}

impl HeaderFieldValue {
    /// Unparsed value over `raw`.
    pub fn from_raw(raw: Bytes) -> Self {
        HeaderFieldValue {
            raw,
            parsed: OnceCell::new(),
        }
    }

    /// Value constructed locally; there are no wire bytes behind it.
    pub fn from_parsed(parsed: ParsedHeader) -> Self {
        HeaderFieldValue {
            raw: Bytes::new(),
            parsed: OnceCell::with_value(Ok(parsed)),
        }
    }

    pub fn from_category<C: HeaderCategory>(value: C) -> Self {
        Self::from_parsed(value.into_parsed())
    }

    /// The bytes this value was created from.
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    /// True once a typed view has been successfully materialised.
    pub fn is_parsed(&self) -> bool {
        matches!(self.parsed.get(), Some(Ok(_)))
    }

    /// Run `grammar` if it has not been run yet and return the cached result.
    /// `context` names the header in parse errors.
    pub fn parse(&self, grammar: Grammar, context: &str) -> Result<&ParsedHeader> {
        self.parsed
            .get_or_init(|| ParsedHeader::parse(grammar, &self.raw, context))
            .as_ref()
            .map_err(Clone::clone)
    }

    pub fn parse_mut(&mut self, grammar: Grammar, context: &str) -> Result<&mut ParsedHeader> {
        self.parse(grammar, context)?;
        match self.parsed.get_mut() {
            Some(Ok(parsed)) => Ok(parsed),
            Some(Err(e)) => Err(e.clone()),
            None => Err(Error::InvalidMessage(format!("{} was not parsed", context))),
        }
    }

    /// Typed view of this value.
    pub fn get<C: HeaderCategory>(&self, context: &str) -> Result<&C> {
        let parsed = self.parse(C::GRAMMAR, context)?;
        C::from_parsed(parsed).ok_or_else(|| wrong_category(context))
    }

    /// Mutable typed view of this value.
    pub fn get_mut<C: HeaderCategory>(&mut self, context: &str) -> Result<&mut C> {
        let parsed = self.parse_mut(C::GRAMMAR, context)?;
        C::from_parsed_mut(parsed).ok_or_else(|| wrong_category(context))
    }

    /// Consume the value, parsing it first if needed.
    pub fn into_category<C: HeaderCategory>(self, context: &str) -> Result<C> {
        let parsed = match self.parsed.into_inner() {
            Some(result) => result?,
            None => ParsedHeader::parse(C::GRAMMAR, &self.raw, context)?,
        };
        C::from_parsed_owned(parsed).ok_or_else(|| wrong_category(context))
    }

    /// Wire form: the cached typed value when there is one, the raw bytes
    /// otherwise (including values whose grammar failed).
    pub fn encode(&self, out: &mut Vec<u8>) {
        match self.parsed.get() {
            Some(Ok(parsed)) => out.extend_from_slice(parsed.to_string().as_bytes()),
            _ => out.extend_from_slice(&self.raw),
        }
    }
}

fn wrong_category(context: &str) -> Error {
    match crate::types::HeaderType::from_name(context) {
        Some(header) => Error::WrongCategory(header),
        None => Error::InvalidMessage(format!("{} holds a different category", context)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CSeqCategory, Method, UInt32Category};

    #[test]
    fn test_lazy_parse_once() {
        let hfv = HeaderFieldValue::from_raw(Bytes::from_static(b"1 INVITE"));
        assert!(!hfv.is_parsed());
        let first: *const CSeqCategory = hfv.get::<CSeqCategory>("CSeq").unwrap();
        assert!(hfv.is_parsed());
        let second: *const CSeqCategory = hfv.get::<CSeqCategory>("CSeq").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_mutation_visible_and_encoded() {
        let mut hfv = HeaderFieldValue::from_raw(Bytes::from_static(b"1 INVITE"));
        hfv.get_mut::<CSeqCategory>("CSeq").unwrap().sequence = 2;
        assert_eq!(hfv.get::<CSeqCategory>("CSeq").unwrap().sequence, 2);
        let mut out = Vec::new();
        hfv.encode(&mut out);
        assert_eq!(out, b"2 INVITE");
    }

    #[test]
    fn test_error_deferred_and_cached() {
        let hfv = HeaderFieldValue::from_raw(Bytes::from_static(b"abc"));
        let err = hfv.get::<UInt32Category>("Content-Length").unwrap_err();
        assert!(err.is_parse());
        assert!(!hfv.is_parsed());
        assert_eq!(hfv.get::<UInt32Category>("Content-Length").unwrap_err(), err);

        // failed values are written back untouched
        let mut out = Vec::new();
        hfv.encode(&mut out);
        assert_eq!(out, b"abc");
    }

    #[test]
    fn test_wrong_category() {
        let hfv = HeaderFieldValue::from_category(CSeqCategory::new(1, Method::Bye));
        assert!(matches!(
            hfv.get::<UInt32Category>("CSeq"),
            Err(Error::WrongCategory(_))
        ));
    }

    #[test]
    fn test_into_category() {
        let hfv = HeaderFieldValue::from_raw(Bytes::from_static(b"70"));
        let value: UInt32Category = hfv.into_category("Max-Forwards").unwrap();
        assert_eq!(value.value(), 70);
    }
}
