//! The SIP message: a start line, a fixed slot per known header, a side list
//! for unknown headers, and a body.
//!
//! Header values stay as raw bytes until a typed accessor is used. Accessing
//! an absent header through [`SipMessage::header`] creates an empty value so
//! callers can always write through it.

use std::fmt;
use std::marker::PhantomData;

use bytes::Bytes;
use once_cell::unsync::OnceCell;
use tracing::trace;

use crate::error::{Error, Result};
use crate::header_field_value::HeaderFieldValue;
use crate::header_field_value_list::HeaderFieldValueList;
use crate::headers::{h, Header};
use crate::parser::framing::{frame, split_comma_values};
use crate::parser::start_line::is_status_line;
use crate::tuple::Tuple;
use crate::types::category::{ParsedHeader, ParserCategory};
use crate::types::header_type::HeaderType;
use crate::types::{Method, Mime, RequestLine, StatusLine, StringCategory, Uri};

#[derive(Debug, Clone, PartialEq)]
pub enum StartLine {
    Request(RequestLine),
    Response(StatusLine),
}

impl fmt::Display for StartLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartLine::Request(rl) => rl.fmt(f),
            StartLine::Response(sl) => sl.fmt(f),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SipMessage {
    start_line: StartLine,
    headers: [Option<HeaderFieldValueList>; HeaderType::COUNT],
    unknown_headers: Vec<(String, HeaderFieldValueList)>,
    body: Bytes,
    from_wire: bool,
    source: Option<Tuple>,
    receive_tuple: Option<Tuple>,
    fixed_destination: Option<Tuple>,
    transaction_id: OnceCell<String>,
}

impl SipMessage {
    fn with_start_line(start_line: StartLine) -> Self {
        SipMessage {
            start_line,
            headers: std::array::from_fn(|_| None),
            unknown_headers: Vec::new(),
            body: Bytes::new(),
            from_wire: false,
            source: None,
            receive_tuple: None,
            fixed_destination: None,
            transaction_id: OnceCell::new(),
        }
    }

    pub fn new_request(method: Method, uri: Uri) -> Self {
        Self::with_start_line(StartLine::Request(RequestLine::new(method, uri)))
    }

    pub fn new_response(code: u16, reason: impl Into<String>) -> Self {
        Self::with_start_line(StartLine::Response(StatusLine::new(code, reason)))
    }

    /// Frame a datagram into a message.
    ///
    /// Only the start line and Content-Length are interpreted; every other
    /// header is stored raw and parsed on first typed access.
    pub fn parse(data: Bytes) -> Result<SipMessage> {
        let framed = frame(&data)?;

        let start_line = if is_status_line(&framed.start_line) {
            StartLine::Response(StatusLine::parse_bytes(&framed.start_line, "status line")?)
        } else {
            StartLine::Request(RequestLine::parse_bytes(&framed.start_line, "request line")?)
        };
        let mut msg = Self::with_start_line(start_line);

        for raw in framed.headers {
            match HeaderType::from_name(&raw.name) {
                Some(header) if header.is_multi() => {
                    let list = msg.headers[header.index()].get_or_insert_with(HeaderFieldValueList::new);
                    for value in split_comma_values(&raw.value) {
                        list.push_back(HeaderFieldValue::from_raw(value));
                    }
                }
                Some(header) => msg.headers[header.index()]
                    .get_or_insert_with(HeaderFieldValueList::new)
                    .push_back(HeaderFieldValue::from_raw(raw.value)),
                None => msg
                    .unknown_header(&raw.name)
                    .push_back(HeaderFieldValue::from_raw(raw.value)),
            }
        }

        let mut body = framed.body;
        if msg.exists::<h::ContentLength>() {
            let length = msg
                .const_header::<h::ContentLength>()
                .map_err(|e| Error::Framing(format!("bad Content-Length: {}", e)))?
                .value() as usize;
            if body.len() < length {
                return Err(Error::Framing(format!(
                    "body is {} bytes, Content-Length says {}",
                    body.len(),
                    length
                )));
            }
            body.truncate(length);
        }
        msg.body = body;
        msg.from_wire = true;

        trace!(brief = %msg.brief(), "framed message");
        Ok(msg)
    }

    pub fn start_line(&self) -> &StartLine {
        &self.start_line
    }

    pub fn is_request(&self) -> bool {
        matches!(self.start_line, StartLine::Request(_))
    }

    pub fn is_response(&self) -> bool {
        matches!(self.start_line, StartLine::Response(_))
    }

    pub fn request_line(&self) -> Option<&RequestLine> {
        match &self.start_line {
            StartLine::Request(rl) => Some(rl),
            StartLine::Response(_) => None,
        }
    }

    pub fn request_line_mut(&mut self) -> Option<&mut RequestLine> {
        match &mut self.start_line {
            StartLine::Request(rl) => Some(rl),
            StartLine::Response(_) => None,
        }
    }

    pub fn status_line(&self) -> Option<&StatusLine> {
        match &self.start_line {
            StartLine::Response(sl) => Some(sl),
            StartLine::Request(_) => None,
        }
    }

    pub fn status_line_mut(&mut self) -> Option<&mut StatusLine> {
        match &mut self.start_line {
            StartLine::Response(sl) => Some(sl),
            StartLine::Request(_) => None,
        }
    }

    /// Status code of a response.
    pub fn status_code(&self) -> Option<u16> {
        self.status_line().map(|sl| sl.code)
    }

    /// Request method, or for a response the method in its CSeq.
    pub fn method(&self) -> Result<Method> {
        match &self.start_line {
            StartLine::Request(rl) => Ok(rl.method.clone()),
            StartLine::Response(_) => Ok(self.const_header::<h::CSeq>()?.method.clone()),
        }
    }

    /// Typed access to the first value of `H`, creating an empty value if the
    /// header is absent. Fails only if the existing value does not parse.
    pub fn header<H: Header>(&mut self) -> Result<&mut H::Category> {
        self.invalidate_cached_id(H::TYPE);
        let list = self.headers[H::TYPE.index()].get_or_insert_with(HeaderFieldValueList::new);
        if list.is_empty() {
            list.push_back(HeaderFieldValue::from_parsed(ParsedHeader::empty(
                H::TYPE.grammar(),
            )));
        }
        match list.front_mut() {
            Some(value) => value.get_mut::<H::Category>(H::TYPE.name()),
            None => Err(Error::HeaderMissing(H::TYPE)),
        }
    }

    /// Typed access to the first value of `H` without creating it.
    pub fn const_header<H: Header>(&self) -> Result<&H::Category> {
        self.headers[H::TYPE.index()]
            .as_ref()
            .and_then(HeaderFieldValueList::front)
            .ok_or(Error::HeaderMissing(H::TYPE))?
            .get::<H::Category>(H::TYPE.name())
    }

    /// All values of `H`, in order. Fails on the first value that does not parse.
    pub fn const_headers<H: Header>(&self) -> Result<Vec<&H::Category>> {
        match &self.headers[H::TYPE.index()] {
            Some(list) => list
                .iter()
                .map(|value| value.get::<H::Category>(H::TYPE.name()))
                .collect(),
            None => Ok(Vec::new()),
        }
    }

    /// Mutable typed view over every value of `H`. Creates an empty list, not
    /// a default value, when the header is absent.
    pub fn headers<H: Header>(&mut self) -> ParserContainer<'_, H> {
        self.invalidate_cached_id(H::TYPE);
        let list = self.headers[H::TYPE.index()].get_or_insert_with(HeaderFieldValueList::new);
        ParserContainer {
            list,
            _marker: PhantomData,
        }
    }

    /// Replace every value of `H` with `value`.
    pub fn set_header<H: Header>(&mut self, value: H::Category) {
        self.invalidate_cached_id(H::TYPE);
        self.headers[H::TYPE.index()] = Some(HeaderFieldValueList::with_value(
            HeaderFieldValue::from_category(value),
        ));
    }

    /// True if at least one value of `H` is present.
    pub fn exists<H: Header>(&self) -> bool {
        self.exists_type(H::TYPE)
    }

    pub fn exists_type(&self, header: HeaderType) -> bool {
        matches!(&self.headers[header.index()], Some(list) if !list.is_empty())
    }

    pub fn remove<H: Header>(&mut self) {
        self.invalidate_cached_id(H::TYPE);
        self.headers[H::TYPE.index()] = None;
    }

    pub fn header_count<H: Header>(&self) -> usize {
        self.headers[H::TYPE.index()]
            .as_ref()
            .map_or(0, HeaderFieldValueList::len)
    }

    /// Raw values of a known header, untouched by any grammar.
    pub fn raw_header(&self, header: HeaderType) -> Option<&HeaderFieldValueList> {
        self.headers[header.index()].as_ref()
    }

    /// Replace a known header's values with an existing list, raw or parsed.
    pub fn set_raw_header(&mut self, header: HeaderType, list: HeaderFieldValueList) {
        self.invalidate_cached_id(header);
        self.headers[header.index()] = Some(list);
    }

    /// Values of a header the registry does not know, created if absent.
    pub fn unknown_header(&mut self, name: &str) -> &mut HeaderFieldValueList {
        let idx = match self
            .unknown_headers
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            Some(idx) => idx,
            None => {
                self.unknown_headers
                    .push((name.to_string(), HeaderFieldValueList::new()));
                self.unknown_headers.len() - 1
            }
        };
        &mut self.unknown_headers[idx].1
    }

    pub fn const_unknown_header(&self, name: &str) -> Option<&HeaderFieldValueList> {
        self.unknown_headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, list)| list)
    }

    pub fn exists_unknown(&self, name: &str) -> bool {
        matches!(self.const_unknown_header(name), Some(list) if !list.is_empty())
    }

    pub fn remove_unknown(&mut self, name: &str) {
        self.unknown_headers
            .retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    /// Append a text value to an unknown header.
    pub fn add_unknown(&mut self, name: &str, value: impl Into<String>) {
        self.unknown_header(name)
            .push_back(HeaderFieldValue::from_category(StringCategory::new(value)));
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Set the body. Content-Length is derived from it when encoding.
    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
    }

    pub fn set_body_with_type(&mut self, body: impl Into<Bytes>, content_type: Mime) {
        self.set_body(body);
        self.set_header::<h::ContentType>(content_type);
    }

    pub fn is_from_wire(&self) -> bool {
        self.from_wire
    }

    pub fn set_from_wire(&mut self, from_wire: bool) {
        self.from_wire = from_wire;
    }

    /// Remote address a wire message arrived from.
    pub fn source(&self) -> Option<Tuple> {
        self.source
    }

    pub fn set_source(&mut self, source: Tuple) {
        self.source = Some(source);
    }

    /// Local address a wire message arrived on.
    pub fn receive_tuple(&self) -> Option<Tuple> {
        self.receive_tuple
    }

    pub fn set_receive_tuple(&mut self, tuple: Tuple) {
        self.receive_tuple = Some(tuple);
    }

    /// Destination that overrides normal request routing.
    pub fn fixed_destination(&self) -> Option<Tuple> {
        self.fixed_destination
    }

    pub fn set_fixed_destination(&mut self, destination: Tuple) {
        self.fixed_destination = Some(destination);
    }

    /// Whether this message belongs to a client transaction: responses
    /// arriving from the wire and requests sent by the local user.
    pub fn is_client_transaction(&self) -> bool {
        self.from_wire == self.is_response()
    }

    /// Transaction id from the top Via branch, cached after the first call.
    ///
    /// Branch-less messages (RFC 2543 peers) get a key built from Call-ID,
    /// CSeq number, From tag and the top Via sent-by.
    pub fn transaction_id(&self) -> Result<&str> {
        self.transaction_id
            .get_or_try_init(|| {
                let via = self.const_header::<h::Via>()?;
                match via.branch() {
                    Some(branch) if !branch.transaction_id().is_empty() => {
                        Ok(branch.transaction_id().to_string())
                    }
                    _ => {
                        let call_id = self.const_header::<h::CallId>()?;
                        let cseq = self.const_header::<h::CSeq>()?;
                        let from_tag = self
                            .const_header::<h::From>()
                            .ok()
                            .and_then(|from| from.tag())
                            .unwrap_or_default();
                        Ok(format!(
                            "{}-{}-{}-{}",
                            call_id,
                            cseq.sequence,
                            from_tag,
                            via.sent_by()
                        ))
                    }
                }
            })
            .map(String::as_str)
    }

    fn invalidate_cached_id(&mut self, header: HeaderType) {
        if header == HeaderType::Via {
            self.transaction_id.take();
        }
    }

    /// One-line summary for logs.
    pub fn brief(&self) -> String {
        let cseq = self
            .const_header::<h::CSeq>()
            .map(|c| c.to_string())
            .unwrap_or_else(|_| "?".to_string());
        let tid = self.transaction_id().unwrap_or("?");
        match &self.start_line {
            StartLine::Request(rl) => {
                format!("{} {} tid={} cseq={}", rl.method, rl.uri, tid, cseq)
            }
            StartLine::Response(sl) => {
                format!("SIP/{} {} tid={} cseq={}", sl.code, sl.reason, tid, cseq)
            }
        }
    }

    /// Serialise for the wire. Content-Length always reflects the body.
    pub fn encode(&self) -> Bytes {
        let mut out = Vec::with_capacity(512 + self.body.len());
        out.extend_from_slice(self.start_line.to_string().as_bytes());
        out.extend_from_slice(b"\r\n");

        for (idx, slot) in self.headers.iter().enumerate() {
            let header = HeaderType::ALL[idx];
            if header == HeaderType::ContentLength {
                continue;
            }
            if let Some(list) = slot {
                list.encode(header.name(), &mut out);
            }
        }
        for (name, list) in &self.unknown_headers {
            list.encode(name, &mut out);
        }
        out.extend_from_slice(format!("Content-Length: {}\r\n\r\n", self.body.len()).as_bytes());
        out.extend_from_slice(&self.body);
        Bytes::from(out)
    }
}

impl fmt::Display for SipMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.encode()))
    }
}

/// Typed, mutable view over every value of one multi-valued header.
///
/// Each entry is parsed on first access; the order of entries never changes
/// as a result of parsing.
pub struct ParserContainer<'a, H: Header> {
    list: &'a mut HeaderFieldValueList,
    _marker: PhantomData<H>,
}

impl<'a, H: Header> ParserContainer<'a, H> {
    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn front(&self) -> Result<&H::Category> {
        self.get(0)
    }

    pub fn front_mut(&mut self) -> Result<&mut H::Category> {
        self.get_mut(0)
    }

    pub fn get(&self, index: usize) -> Result<&H::Category> {
        self.list
            .get(index)
            .ok_or(Error::HeaderMissing(H::TYPE))?
            .get::<H::Category>(H::TYPE.name())
    }

    pub fn get_mut(&mut self, index: usize) -> Result<&mut H::Category> {
        self.list
            .get_mut(index)
            .ok_or(Error::HeaderMissing(H::TYPE))?
            .get_mut::<H::Category>(H::TYPE.name())
    }

    pub fn iter(&self) -> impl Iterator<Item = Result<&H::Category>> + '_ {
        self.list
            .iter()
            .map(|value| value.get::<H::Category>(H::TYPE.name()))
    }

    pub fn push_front(&mut self, value: H::Category) {
        self.list.push_front(HeaderFieldValue::from_category(value));
    }

    pub fn push_back(&mut self, value: H::Category) {
        self.list.push_back(HeaderFieldValue::from_category(value));
    }

    /// Remove and return the first value, parsing it if needed.
    pub fn pop_front(&mut self) -> Result<Option<H::Category>> {
        match self.list.pop_front() {
            Some(value) => value.into_category::<H::Category>(H::TYPE.name()).map(Some),
            None => Ok(None),
        }
    }

    pub fn clear(&mut self) {
        self.list.clear();
    }
}

/// Convenience for tests and tools: parse text into a message.
impl std::str::FromStr for SipMessage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        SipMessage::parse(Bytes::copy_from_slice(s.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CSeqCategory, NameAddr, Via};

    const REGISTER: &str = "REGISTER sip:registrar.biloxi.com SIP/2.0\r\n\
Via: SIP/2.0/UDP bobspc.biloxi.com:5060;branch=z9hG4bKnashds7\r\n\
Max-Forwards: 70\r\n\
To: Bob <sip:bob@biloxi.com>\r\n\
From: Bob <sip:bob@biloxi.com>;tag=456248\r\n\
Call-ID: 843817637684230@998sdasdh09\r\n\
CSeq: 1826 REGISTER\r\n\
Contact: <sip:bob@192.0.2.4>, <sip:bob@192.0.2.5>;expires=60\r\n\
X-Custom: one\r\n\
Expires: 7200\r\n\
Content-Length: 0\r\n\r\n";

    fn register() -> SipMessage {
        REGISTER.parse().unwrap()
    }

    #[test]
    fn test_parse_leaves_headers_unparsed() {
        let msg = register();
        assert!(msg.is_request());
        assert!(msg.is_from_wire());
        assert_eq!(msg.method().unwrap(), Method::Register);
        let via = msg.raw_header(HeaderType::Via).unwrap();
        assert!(!via.front().unwrap().is_parsed());
        // Content-Length is interpreted during framing
        assert!(msg.raw_header(HeaderType::ContentLength).unwrap().front().unwrap().is_parsed());
    }

    #[test]
    fn test_typed_access_is_cached() {
        let msg = register();
        let first: *const CSeqCategory = msg.const_header::<h::CSeq>().unwrap();
        let second: *const CSeqCategory = msg.const_header::<h::CSeq>().unwrap();
        assert_eq!(first, second);
        assert!(msg.raw_header(HeaderType::CSeq).unwrap().front().unwrap().is_parsed());
    }

    #[test]
    fn test_mutation_visible_on_next_access() {
        let mut msg = register();
        msg.header::<h::CSeq>().unwrap().sequence = 1827;
        assert_eq!(msg.const_header::<h::CSeq>().unwrap().sequence, 1827);
        let encoded = msg.encode();
        assert!(String::from_utf8_lossy(&encoded).contains("CSeq: 1827 REGISTER\r\n"));
    }

    #[test]
    fn test_access_creates() {
        let mut msg = register();
        assert!(!msg.exists::<h::Subject>());
        assert!(matches!(
            msg.const_header::<h::Subject>(),
            Err(Error::HeaderMissing(HeaderType::Subject))
        ));
        assert_eq!(msg.header::<h::Subject>().unwrap().value(), "");
        assert!(msg.exists::<h::Subject>());
        msg.header::<h::Subject>().unwrap().0 = "hi".to_string();
        assert_eq!(msg.const_header::<h::Subject>().unwrap().value(), "hi");
    }

    #[test]
    fn test_multi_valued_container() {
        let mut msg = register();
        assert_eq!(msg.header_count::<h::Contact>(), 2);
        let mut contacts = msg.headers::<h::Contact>();
        assert_eq!(contacts.get(1).unwrap().params.value("expires"), Some("60"));
        contacts.push_front(NameAddr::new("sip:first@example.com".parse().unwrap()));
        assert_eq!(contacts.len(), 3);
        let hosts: Vec<String> = contacts
            .iter()
            .map(|c| c.unwrap().uri.host.clone())
            .collect();
        assert_eq!(hosts, vec!["example.com", "192.0.2.4", "192.0.2.5"]);
        let popped = contacts.pop_front().unwrap().unwrap();
        assert_eq!(popped.uri.user.as_deref(), Some("first"));
        assert_eq!(msg.header_count::<h::Contact>(), 2);
    }

    #[test]
    fn test_unknown_headers() {
        let mut msg = register();
        assert!(msg.exists_unknown("x-custom"));
        let list = msg.const_unknown_header("X-CUSTOM").unwrap();
        assert_eq!(&list.front().unwrap().raw()[..], b"one");
        msg.add_unknown("X-Other", "two");
        assert!(String::from_utf8_lossy(&msg.encode()).contains("X-Other: two\r\n"));
        msg.remove_unknown("x-custom");
        assert!(!msg.exists_unknown("X-Custom"));
    }

    #[test]
    fn test_transaction_id_from_branch() {
        let mut msg = register();
        assert_eq!(msg.transaction_id().unwrap(), "nashds7");
        msg.header::<h::Via>().unwrap().branch = Some(crate::BranchParameter::local("abc"));
        assert_eq!(msg.transaction_id().unwrap(), "abc");
    }

    #[test]
    fn test_transaction_id_without_branch() {
        let text = REGISTER.replace(";branch=z9hG4bKnashds7", "");
        let msg: SipMessage = text.parse().unwrap();
        assert_eq!(
            msg.transaction_id().unwrap(),
            "843817637684230@998sdasdh09-1826-456248-bobspc.biloxi.com:5060"
        );
    }

    #[test]
    fn test_deferred_grammar_error() {
        let text = REGISTER.replace("CSeq: 1826 REGISTER", "CSeq: abc REGISTER");
        let msg: SipMessage = text.parse().unwrap();
        assert!(msg.const_header::<h::CSeq>().unwrap_err().is_parse());
        // other headers are unaffected
        assert_eq!(msg.const_header::<h::MaxForwards>().unwrap().value(), 70);
        // and the bad value is written back untouched
        assert!(String::from_utf8_lossy(&msg.encode()).contains("CSeq: abc REGISTER"));
    }

    #[test]
    fn test_content_length_framing() {
        let text = "MESSAGE sip:a@b SIP/2.0\r\nVia: SIP/2.0/UDP h;branch=z9hG4bK1\r\nContent-Length: 5\r\n\r\nhello-extra";
        let msg: SipMessage = text.parse().unwrap();
        assert_eq!(&msg.body()[..], b"hello");

        let short = "MESSAGE sip:a@b SIP/2.0\r\nContent-Length: 50\r\n\r\nhello";
        assert!(matches!(short.parse::<SipMessage>(), Err(Error::Framing(_))));

        let bad = "MESSAGE sip:a@b SIP/2.0\r\nContent-Length: x\r\n\r\n";
        assert!(matches!(bad.parse::<SipMessage>(), Err(Error::Framing(_))));
    }

    #[test]
    fn test_encode_reparse() {
        let msg = register();
        let reparsed = SipMessage::parse(msg.encode()).unwrap();
        assert_eq!(reparsed.header_count::<h::Contact>(), 2);
        assert_eq!(
            reparsed.const_header::<h::Via>().unwrap(),
            msg.const_header::<h::Via>().unwrap()
        );
        assert_eq!(reparsed.body().len(), 0);
    }

    #[test]
    fn test_built_response_classification() {
        let mut resp = SipMessage::new_response(200, "OK");
        resp.set_header::<h::Via>(Via::new("UDP", "10.0.0.1", Some(5060)));
        resp.set_header::<h::CSeq>(CSeqCategory::new(1, Method::Options));
        assert!(!resp.is_client_transaction());
        assert_eq!(resp.method().unwrap(), Method::Options);
        assert!(resp.brief().starts_with("SIP/200 OK"));
    }

    #[test]
    fn test_malformed_start_line() {
        assert!("GARBAGE\r\n\r\n".parse::<SipMessage>().is_err());
    }
}
