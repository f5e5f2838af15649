/// Two stacks exchanging a transaction over real UDP sockets on loopback.
mod stack_test_utils;

use std::time::{Duration, Instant};

use mio::Poll;
use serial_test::serial;
use sipwire_sip_core::prelude::*;
use sipwire_stack::{SipStack, StackConfig};

use stack_test_utils::init_tracing;

const CONFIG: &str = r#"
[[transports]]
kind = "udp"
bind = "127.0.0.1:0"
"#;

fn pump_until<F>(stacks: &mut [(&mut SipStack, &mut Poll)], mut done: F)
where
    F: FnMut(&[(&mut SipStack, &mut Poll)]) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done(stacks) {
        assert!(Instant::now() < deadline, "timed out waiting for the stacks");
        for (stack, poll) in stacks.iter_mut() {
            stack
                .wait_and_process(poll, Duration::from_millis(5))
                .unwrap();
        }
    }
}

#[test]
#[serial]
fn test_udp_register_round_trip() {
    init_tracing();
    let config = StackConfig::from_toml_str(CONFIG).unwrap();
    let mut alice = SipStack::new(config.clone()).unwrap();
    let mut bob = SipStack::new(config).unwrap();
    let mut alice_poll = Poll::new().unwrap();
    let mut bob_poll = Poll::new().unwrap();

    let bob_addr = bob.local_tuples()[0].addr;
    assert_ne!(bob_addr.port(), 0);

    let register = make_request(
        Method::Register,
        format!("sip:{}", bob_addr).parse().unwrap(),
        NameAddr::new("sip:alice@127.0.0.1".parse().unwrap()),
        NameAddr::new("sip:alice@127.0.0.1".parse().unwrap()),
    );
    alice.send(register);

    let mut stacks = [(&mut alice, &mut alice_poll), (&mut bob, &mut bob_poll)];
    pump_until(&mut stacks, |s| s[1].0.tu_fifo().len() == 1);
    let at_bob = stacks[1].0.receive().unwrap();
    assert_eq!(at_bob.method().unwrap(), Method::Register);
    assert_eq!(at_bob.source().unwrap().addr.ip(), bob_addr.ip());

    stacks[1].0.send(make_response(&at_bob, 200, None).unwrap());
    pump_until(&mut stacks, |s| s[0].0.tu_fifo().len() == 1);
    let at_alice = stacks[0].0.receive().unwrap();
    assert_eq!(at_alice.status_code(), Some(200));
}

#[test]
#[serial]
fn test_udp_bind_conflict_is_a_construction_error() {
    init_tracing();
    let bob = SipStack::new(StackConfig::from_toml_str(CONFIG).unwrap()).unwrap();
    let taken = bob.local_tuples()[0].addr;

    let conflicting = StackConfig::from_toml_str(&format!(
        "[[transports]]\nkind = \"udp\"\nbind = \"{}\"\n",
        taken
    ))
    .unwrap();
    assert!(matches!(
        SipStack::new(conflicting),
        Err(sipwire_stack::Error::Transport(_))
    ));
}
