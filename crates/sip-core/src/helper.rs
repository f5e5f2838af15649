//! Builders for the messages the transaction layer and its users need most:
//! responses, failure ACKs, CANCELs and new out-of-dialog requests.

use rand::Rng;

use crate::error::{Error, Result};
use crate::header_field_value_list::HeaderFieldValueList;
use crate::headers::h;
use crate::message::SipMessage;
use crate::types::header_type::HeaderType;
use crate::types::{BranchParameter, CSeqCategory, CallId, Method, NameAddr, UInt32Category, Uri, Via};

/// Max-Forwards for requests originated here.
pub const DEFAULT_MAX_FORWARDS: u32 = 70;

/// Standard reason phrase for a status code.
pub fn reason_phrase(code: u16) -> &'static str {
    match code {
        100 => "Trying",
        180 => "Ringing",
        181 => "Call Is Being Forwarded",
        182 => "Queued",
        183 => "Session Progress",
        200 => "OK",
        202 => "Accepted",
        300 => "Multiple Choices",
        301 => "Moved Permanently",
        302 => "Moved Temporarily",
        305 => "Use Proxy",
        380 => "Alternative Service",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        407 => "Proxy Authentication Required",
        408 => "Request Timeout",
        410 => "Gone",
        413 => "Request Entity Too Large",
        415 => "Unsupported Media Type",
        416 => "Unsupported URI Scheme",
        420 => "Bad Extension",
        421 => "Extension Required",
        423 => "Interval Too Brief",
        480 => "Temporarily Unavailable",
        481 => "Call/Transaction Does Not Exist",
        482 => "Loop Detected",
        483 => "Too Many Hops",
        484 => "Address Incomplete",
        485 => "Ambiguous",
        486 => "Busy Here",
        487 => "Request Terminated",
        488 => "Not Acceptable Here",
        491 => "Request Pending",
        500 => "Server Internal Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Server Time-out",
        505 => "Version Not Supported",
        513 => "Message Too Large",
        600 => "Busy Everywhere",
        603 => "Decline",
        604 => "Does Not Exist Anywhere",
        606 => "Not Acceptable",
        _ => match code / 100 {
            1 => "Trying",
            2 => "OK",
            3 => "Redirected",
            4 => "Client Error",
            5 => "Server Error",
            _ => "Global Failure",
        },
    }
}

/// Random tag for To/From.
pub fn compute_tag() -> String {
    format!("{:08x}", rand::thread_rng().gen::<u32>())
}

/// Random Call-ID value.
pub fn compute_call_id() -> String {
    let mut rng = rand::thread_rng();
    format!("{:016x}{:08x}", rng.gen::<u64>(), rng.gen::<u32>())
}

/// Branch for a new client transaction.
pub fn compute_unique_branch() -> BranchParameter {
    BranchParameter::generate()
}

fn copy_header(from: &SipMessage, to: &mut SipMessage, header: HeaderType) {
    if let Some(list) = from.raw_header(header) {
        to.set_raw_header(header, list.clone());
    }
}

/// New out-of-dialog request with a fresh branch, From tag, Call-ID and CSeq 1.
///
/// The top Via carries only the branch; its sent-by and transport are filled
/// in when a transport is chosen for the request.
pub fn make_request(method: Method, target: Uri, from: NameAddr, to: NameAddr) -> SipMessage {
    let mut msg = SipMessage::new_request(method.clone(), target);
    msg.set_header::<h::Via>(Via {
        branch: Some(compute_unique_branch()),
        ..Default::default()
    });
    msg.set_header::<h::MaxForwards>(UInt32Category(DEFAULT_MAX_FORWARDS));
    let from = if from.tag().is_some() {
        from
    } else {
        from.with_tag(compute_tag())
    };
    msg.set_header::<h::From>(from);
    msg.set_header::<h::To>(to);
    msg.set_header::<h::CallId>(CallId::new(compute_call_id()));
    msg.set_header::<h::CSeq>(CSeqCategory::new(1, method));
    msg
}

/// Response to `request`. Via, From, Call-ID, CSeq and To are copied when
/// present; To gets a tag for anything but 100 if it has none. `reason`
/// defaults to the standard phrase.
pub fn make_response(request: &SipMessage, code: u16, reason: Option<&str>) -> Result<SipMessage> {
    if !request.is_request() {
        return Err(Error::InvalidMessage("cannot respond to a response".to_string()));
    }
    let mut response =
        SipMessage::new_response(code, reason.unwrap_or_else(|| reason_phrase(code)));
    for header in [
        HeaderType::Via,
        HeaderType::From,
        HeaderType::CallId,
        HeaderType::CSeq,
        HeaderType::To,
    ] {
        copy_header(request, &mut response, header);
    }
    if (101..300).contains(&code) {
        copy_header(request, &mut response, HeaderType::RecordRoute);
    }
    if code > 100 && response.exists::<h::To>() && response.const_header::<h::To>()?.tag().is_none() {
        response.header::<h::To>()?.set_tag(compute_tag());
    }
    Ok(response)
}

/// ACK for a non-2xx final response to `invite` (RFC 3261 Section 17.1.1.3).
pub fn make_failure_ack(invite: &SipMessage, response: &SipMessage) -> Result<SipMessage> {
    let uri = invite
        .request_line()
        .ok_or_else(|| Error::InvalidMessage("not a request".to_string()))?
        .uri
        .clone();
    let mut ack = SipMessage::new_request(Method::Ack, uri);
    ack.set_header::<h::Via>(invite.const_header::<h::Via>()?.clone());
    ack.set_header::<h::MaxForwards>(UInt32Category(DEFAULT_MAX_FORWARDS));
    copy_header(invite, &mut ack, HeaderType::From);
    copy_header(invite, &mut ack, HeaderType::CallId);
    copy_header(invite, &mut ack, HeaderType::Route);
    copy_header(response, &mut ack, HeaderType::To);
    let sequence = invite.const_header::<h::CSeq>()?.sequence;
    ack.set_header::<h::CSeq>(CSeqCategory::new(sequence, Method::Ack));
    if let Some(destination) = invite.fixed_destination() {
        ack.set_fixed_destination(destination);
    }
    Ok(ack)
}

/// CANCEL for `invite` (RFC 3261 Section 9.1): same Request-URI, top Via,
/// To, From, Call-ID and CSeq number.
pub fn make_cancel(invite: &SipMessage) -> Result<SipMessage> {
    let uri = invite
        .request_line()
        .filter(|rl| rl.method == Method::Invite)
        .ok_or_else(|| Error::InvalidMessage("can only cancel an INVITE".to_string()))?
        .uri
        .clone();
    let mut cancel = SipMessage::new_request(Method::Cancel, uri);
    let top_via = invite
        .raw_header(HeaderType::Via)
        .and_then(HeaderFieldValueList::front)
        .cloned()
        .ok_or(Error::HeaderMissing(HeaderType::Via))?;
    cancel.set_raw_header(HeaderType::Via, HeaderFieldValueList::with_value(top_via));
    cancel.set_header::<h::MaxForwards>(UInt32Category(DEFAULT_MAX_FORWARDS));
    copy_header(invite, &mut cancel, HeaderType::To);
    copy_header(invite, &mut cancel, HeaderType::From);
    copy_header(invite, &mut cancel, HeaderType::CallId);
    copy_header(invite, &mut cancel, HeaderType::Route);
    let sequence = invite.const_header::<h::CSeq>()?.sequence;
    cancel.set_header::<h::CSeq>(CSeqCategory::new(sequence, Method::Cancel));
    if let Some(destination) = invite.fixed_destination() {
        cancel.set_fixed_destination(destination);
    }
    Ok(cancel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::category::ParserCategory;

    fn invite() -> SipMessage {
        let mut msg = make_request(
            Method::Invite,
            "sip:bob@biloxi.com".parse().unwrap(),
            NameAddr::new("sip:alice@atlanta.com".parse().unwrap()),
            NameAddr::new("sip:bob@biloxi.com".parse().unwrap()),
        );
        msg.headers::<h::Via>()
            .push_back(Via::parse_bytes(b"SIP/2.0/UDP proxy.example.com;branch=z9hG4bKp1", "Via").unwrap());
        msg
    }

    #[test]
    fn test_make_request_defaults() {
        let msg = invite();
        assert!(msg.const_header::<h::From>().unwrap().tag().is_some());
        assert_eq!(msg.const_header::<h::CSeq>().unwrap().sequence, 1);
        assert_eq!(msg.const_header::<h::MaxForwards>().unwrap().value(), 70);
        assert!(msg.const_header::<h::Via>().unwrap().branch().unwrap().is_local());
        assert!(msg.transaction_id().is_ok());
    }

    #[test]
    fn test_make_response_copies_and_tags() {
        let request = invite();
        let response = make_response(&request, 486, None).unwrap();
        assert_eq!(response.status_code(), Some(486));
        assert_eq!(response.status_line().unwrap().reason, "Busy Here");
        assert_eq!(response.header_count::<h::Via>(), 2);
        assert_eq!(
            response.transaction_id().unwrap(),
            request.transaction_id().unwrap()
        );
        assert!(response.const_header::<h::To>().unwrap().tag().is_some());

        let trying = make_response(&request, 100, None).unwrap();
        assert!(trying.const_header::<h::To>().unwrap().tag().is_none());
    }

    #[test]
    fn test_make_response_without_to() {
        let mut request = invite();
        request.remove::<h::To>();
        let response = make_response(&request, 408, None).unwrap();
        assert_eq!(response.status_code(), Some(408));
        assert!(!response.exists::<h::To>());
        assert_eq!(
            response.transaction_id().unwrap(),
            request.transaction_id().unwrap()
        );
    }

    #[test]
    fn test_make_failure_ack() {
        let request = invite();
        let response = make_response(&request, 404, None).unwrap();
        let ack = make_failure_ack(&request, &response).unwrap();
        assert_eq!(ack.method().unwrap(), Method::Ack);
        assert_eq!(ack.header_count::<h::Via>(), 1);
        assert_eq!(ack.transaction_id().unwrap(), request.transaction_id().unwrap());
        assert_eq!(
            ack.const_header::<h::To>().unwrap().tag(),
            response.const_header::<h::To>().unwrap().tag()
        );
        assert_eq!(ack.const_header::<h::CSeq>().unwrap().method, Method::Ack);
    }

    #[test]
    fn test_make_cancel() {
        let request = invite();
        let cancel = make_cancel(&request).unwrap();
        assert_eq!(cancel.method().unwrap(), Method::Cancel);
        assert_eq!(cancel.transaction_id().unwrap(), request.transaction_id().unwrap());
        assert_eq!(cancel.const_header::<h::CSeq>().unwrap().sequence, 1);

        let mut options = request.clone();
        options.request_line_mut().unwrap().method = Method::Options;
        assert!(make_cancel(&options).is_err());
    }

    #[test]
    fn test_reason_phrases() {
        assert_eq!(reason_phrase(408), "Request Timeout");
        assert_eq!(reason_phrase(499), "Client Error");
        assert_eq!(compute_tag().len(), 8);
    }
}
