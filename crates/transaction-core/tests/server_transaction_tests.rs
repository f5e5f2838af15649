/// Server transaction tests (RFC 3261 Section 17.2)
mod transaction_test_utils;

use sipwire_sip_core::prelude::*;
use sipwire_transaction_core::{Machine, State};

use transaction_test_utils::*;

/// Flow sequence:
/// 1. Peer sends OPTIONS, TU answers 200
/// 2. Peer retransmits; the stack resends the 200 and the TU sees nothing
/// 3. Timer J removes the transaction after 64*T1
#[test]
fn test_non_invite_retransmission_absorbed() {
    let mut env = TestEnvironment::new();
    let options = env.peer_request(Method::Options);
    let tid = options.transaction_id().unwrap().to_string();
    env.inject(&options);
    env.run();

    let tu = env.tu_messages();
    assert_eq!(tu.len(), 1);
    assert_eq!(tu[0].method().unwrap(), Method::Options);
    assert_eq!(tu[0].source(), Some(Tuple::udp(addr(PEER))));

    env.controller.send(make_response(&tu[0], 200, None).unwrap());
    env.run();
    assert_eq!(env.peer_count(), 1);
    assert_eq!(status(&env.peer_received()[0]), 200);

    env.inject(&options);
    env.run();
    assert!(env.tu_messages().is_empty());
    assert_eq!(env.peer_count(), 2);
    assert_eq!(status(&env.peer_received()[1]), 200);

    env.advance_ms(31_999);
    assert_eq!(
        env.controller.transaction_state(&tid, false),
        Some((Machine::ServerNonInvite, State::Completed))
    );
    env.advance_ms(1);
    assert_eq!(env.controller.server_transaction_count(), 0);
}

/// A retransmission that arrives before the TU answers is dropped.
#[test]
fn test_non_invite_retransmission_before_answer() {
    let mut env = TestEnvironment::new();
    let options = env.peer_request(Method::Options);
    env.inject(&options);
    env.inject(&options);
    env.run();

    assert_eq!(env.tu_messages().len(), 1);
    assert_eq!(env.peer_count(), 0);
}

/// A slow TU gets a 100 Trying sent on its behalf before the client's
/// retransmissions reach T2.
#[test]
fn test_non_invite_trying_after_delay() {
    let mut env = TestEnvironment::new();
    env.inject(&env.peer_request(Method::Register));
    env.run();

    env.advance_ms(3_499);
    assert_eq!(env.peer_count(), 0);
    env.advance_ms(1);
    assert_eq!(env.peer_count(), 1);
    assert_eq!(status(&env.peer_received()[0]), 100);
}

/// An INVITE the TU has not answered within T100 gets a 100 Trying.
#[test]
fn test_invite_trying_after_t100() {
    let mut env = TestEnvironment::new();
    env.inject(&env.peer_request(Method::Invite));
    env.run();
    assert_eq!(env.tu_messages().len(), 1);

    env.advance_ms(199);
    assert_eq!(env.peer_count(), 0);
    env.advance_ms(1);
    assert_eq!(env.peer_count(), 1);
    assert_eq!(status(&env.peer_received()[0]), 100);
}

/// An answered INVITE gets no 100 Trying.
#[test]
fn test_invite_answered_before_t100() {
    let mut env = TestEnvironment::new();
    env.inject(&env.peer_request(Method::Invite));
    env.run();
    let invite = env.tu_messages().remove(0);

    env.controller.send(make_response(&invite, 180, None).unwrap());
    env.advance_ms(1_000);

    let received = env.peer_received();
    assert_eq!(received.len(), 1);
    assert_eq!(status(&received[0]), 180);
}

/// Flow sequence:
/// 1. Peer sends INVITE, TU rejects it with 486
/// 2. Timer G retransmits the 486 until the ACK arrives
/// 3. The ACK moves the transaction to Confirmed; Timer I removes it
#[test]
fn test_invite_failure_retransmitted_until_ack() {
    let mut env = TestEnvironment::new();
    let invite = env.peer_request(Method::Invite);
    let tid = invite.transaction_id().unwrap().to_string();
    env.inject(&invite);
    env.run();
    let received_invite = env.tu_messages().remove(0);

    env.controller.send(make_response(&received_invite, 486, None).unwrap());
    env.run();
    assert_eq!(env.peer_count(), 1);

    env.advance_ms(500);
    assert_eq!(env.peer_count(), 2);
    env.advance_ms(1_000);
    assert_eq!(env.peer_count(), 3);

    let busy = env.peer_received().remove(0);
    env.inject(&make_failure_ack(&invite, &busy).unwrap());
    env.run();
    assert!(env.tu_messages().is_empty());
    assert_eq!(
        env.controller.transaction_state(&tid, false),
        Some((Machine::ServerInvite, State::Confirmed))
    );

    env.advance_ms(10_000);
    assert_eq!(env.peer_count(), 3);
    assert_eq!(env.controller.server_transaction_count(), 0);
}

/// With no ACK, Timer H gives up after 64*T1.
#[test]
fn test_invite_failure_without_ack() {
    let mut env = TestEnvironment::new();
    env.inject(&env.peer_request(Method::Invite));
    env.run();
    let invite = env.tu_messages().remove(0);

    env.controller.send(make_response(&invite, 603, None).unwrap());
    env.advance_ms(31_999);
    assert_eq!(env.controller.server_transaction_count(), 1);
    env.advance_ms(1);
    assert_eq!(env.controller.server_transaction_count(), 0);
}

/// After a 2xx the INVITE transaction hands the ACK to the TU.
#[test]
fn test_invite_success_passes_ack_to_tu() {
    let mut env = TestEnvironment::new();
    let invite = env.peer_request(Method::Invite);
    let tid = invite.transaction_id().unwrap().to_string();
    env.inject(&invite);
    env.run();
    let received_invite = env.tu_messages().remove(0);

    env.controller.send(make_response(&received_invite, 200, None).unwrap());
    env.run();
    assert_eq!(
        env.controller.transaction_state(&tid, false),
        Some((Machine::ServerStale, State::Terminated))
    );

    // a retransmitted INVITE gets the 2xx again
    env.inject(&invite);
    env.run();
    assert_eq!(env.peer_count(), 2);

    let ok = env.peer_received().remove(0);
    env.inject(&make_failure_ack(&invite, &ok).unwrap());
    env.run();
    let tu = env.tu_messages();
    assert_eq!(tu.len(), 1);
    assert_eq!(tu[0].method().unwrap(), Method::Ack);
}

/// A CANCEL for an unknown INVITE is answered 481 without involving the TU.
#[test]
fn test_cancel_without_invite_gets_481() {
    let mut env = TestEnvironment::new();
    let invite = env.peer_request(Method::Invite);
    env.inject(&make_cancel(&invite).unwrap());
    env.run();

    assert!(env.tu_messages().is_empty());
    let received = env.peer_received();
    assert_eq!(received.len(), 1);
    assert_eq!(status(&received[0]), 481);
    assert_eq!(
        received[0].const_header::<h::CSeq>().unwrap().method,
        Method::Cancel
    );
}

/// A CANCEL for a pending INVITE is its own transaction and goes to the TU.
#[test]
fn test_cancel_for_pending_invite() {
    let mut env = TestEnvironment::new();
    let invite = env.peer_request(Method::Invite);
    env.inject(&invite);
    env.run();
    assert_eq!(env.tu_messages().len(), 1);

    env.inject(&make_cancel(&invite).unwrap());
    env.run();
    let tu = env.tu_messages();
    assert_eq!(tu.len(), 1);
    assert_eq!(tu[0].method().unwrap(), Method::Cancel);
    assert_eq!(env.controller.server_transaction_count(), 2);

    env.controller.send(make_response(&tu[0], 200, None).unwrap());
    env.run();
    let received = env.peer_received();
    assert_eq!(received.len(), 1);
    assert_eq!(status(&received[0]), 200);
    assert_eq!(
        received[0].const_header::<h::CSeq>().unwrap().method,
        Method::Cancel
    );
}

/// The CANCEL key drops exactly one suffix, so an INVITE whose own branch
/// ends in "cancel" is still found.
#[test]
fn test_cancel_matches_invite_with_cancel_like_branch() {
    let mut env = TestEnvironment::new();
    let mut invite = env.peer_request(Method::Invite);
    invite.header::<h::Via>().unwrap().branch =
        Some(BranchParameter::parse(b"z9hG4bKabccancel").unwrap());
    assert!(invite.transaction_id().unwrap().ends_with("cancel"));
    env.inject(&invite);
    env.run();
    assert_eq!(env.tu_messages().len(), 1);

    env.inject(&make_cancel(&invite).unwrap());
    env.run();
    let tu = env.tu_messages();
    assert_eq!(tu.len(), 1);
    assert_eq!(tu[0].method().unwrap(), Method::Cancel);
    assert_eq!(env.peer_count(), 0);
    assert_eq!(env.controller.server_transaction_count(), 2);
}

/// An abandoned INVITE is answered 500 at once.
#[test]
fn test_abandoned_invite_gets_500() {
    let mut env = TestEnvironment::new();
    let invite = env.peer_request(Method::Invite);
    let tid = invite.transaction_id().unwrap().to_string();
    env.inject(&invite);
    env.run();

    env.controller.abandon_server_transaction(tid);
    env.run();
    let received = env.peer_received();
    assert_eq!(received.len(), 1);
    assert_eq!(status(&received[0]), 500);
}

/// An ACK that matches no transaction goes straight to the TU.
#[test]
fn test_stray_ack_goes_to_tu() {
    let mut env = TestEnvironment::new();
    env.inject(&env.peer_request(Method::Ack));
    env.run();

    let tu = env.tu_messages();
    assert_eq!(tu.len(), 1);
    assert_eq!(tu[0].method().unwrap(), Method::Ack);
    assert_eq!(env.controller.server_transaction_count(), 0);
}

/// Responses with no server transaction are sent statelessly.
#[test]
fn test_stateless_response() {
    let mut env = TestEnvironment::new();
    let request = env.peer_request(Method::Options);
    env.controller.send(make_response(&request, 404, None).unwrap());
    env.run();

    assert_eq!(env.peer_count(), 1);
    assert_eq!(env.controller.server_transaction_count(), 1);
    env.advance_ms(5_000);
    assert_eq!(env.controller.server_transaction_count(), 0);
}

/// Flow sequence:
/// 1. Peer sends OPTIONS over TCP, TU answers 100
/// 2. A repeated OPTIONS is dropped instead of answered again
/// 3. The 200 ends the transaction at once, without Timer J
#[test]
fn test_non_invite_reliable_transport() {
    let mut env = TestEnvironment::with_transport(TransportType::Tcp);
    let options = env.peer_request(Method::Options);
    let tid = options.transaction_id().unwrap().to_string();
    env.inject(&options);
    env.run();
    let request = env.tu_messages().remove(0);

    env.controller.send(make_response(&request, 100, None).unwrap());
    env.run();
    assert_eq!(
        env.controller.transaction_state(&tid, false),
        Some((Machine::ServerNonInvite, State::Proceeding))
    );

    env.inject(&options);
    env.run();
    assert!(env.tu_messages().is_empty());
    assert_eq!(env.peer_count(), 1);

    env.controller.send(make_response(&request, 200, None).unwrap());
    env.run();
    let received = env.peer_received();
    assert_eq!(received.len(), 2);
    assert_eq!(status(&received[1]), 200);
    assert_eq!(env.controller.server_transaction_count(), 0);
}

/// Flow sequence:
/// 1. Peer sends INVITE over TCP, TU rejects it 486
/// 2. No Timer G: the 486 goes out once
/// 3. The ACK ends the transaction at once, without Timer I
#[test]
fn test_invite_reliable_transport() {
    let mut env = TestEnvironment::with_transport(TransportType::Tcp);
    let invite = env.peer_request(Method::Invite);
    let tid = invite.transaction_id().unwrap().to_string();
    env.inject(&invite);
    env.run();
    let request = env.tu_messages().remove(0);

    env.controller.send(make_response(&request, 486, None).unwrap());
    env.advance_ms(10_000);
    assert_eq!(env.peer_count(), 1);
    assert_eq!(
        env.controller.transaction_state(&tid, false),
        Some((Machine::ServerInvite, State::Completed))
    );

    let busy = env.peer_received().remove(0);
    env.inject(&make_failure_ack(&invite, &busy).unwrap());
    env.run();
    assert!(env.tu_messages().is_empty());
    assert_eq!(env.controller.server_transaction_count(), 0);
}
