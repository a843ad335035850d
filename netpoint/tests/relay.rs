//! Bounce relaying and the local-loopback fast path: who sees an RPC, how
//! many times, and whether the looped-back payload decodes identically to
//! the one that crossed the wire.

mod harness;

use std::{cell::RefCell, rc::Rc};

use netpoint::{
    CallRegistry, DeliveryMode, ObjectPath, RelayKind, SendPattern, Serde, WireMessage,
};

use harness::{init_logging, pump, start_session, Peer};

fn spawn_attack_counter(peer: &mut Peer, path: &ObjectPath) -> Rc<RefCell<u32>> {
    let count = Rc::new(RefCell::new(0u32));

    let mut registry = CallRegistry::new(path.clone());
    let handle = count.clone();
    registry
        .register_rpc("attack", move |_| {
            *handle.borrow_mut() += 1;
            Ok(())
        })
        .unwrap();
    peer.world.add(registry);

    count
}

type DamagePayload = (i32, f32, [f32; 3]);

fn spawn_damage_recorder(peer: &mut Peer, path: &ObjectPath) -> Rc<RefCell<Option<DamagePayload>>> {
    let recorded = Rc::new(RefCell::new(None));

    let mut registry = CallRegistry::new(path.clone());
    let handle = recorded.clone();
    registry
        .register_rpc("damage", move |reader| {
            let amount = i32::de(reader)?;
            let lift = f32::de(reader)?;
            let knockback = <[f32; 3]>::de(reader)?;
            *handle.borrow_mut() = Some((amount, lift, knockback));
            Ok(())
        })
        .unwrap();
    peer.world.add(registry);

    recorded
}

#[test]
fn bounce_fast_reaches_everyone_but_the_sender() {
    init_logging();

    let (network, mut host, mut clients) = start_session(1, &[2, 3]);
    let mut b = clients.pop().unwrap();
    let mut a = clients.pop().unwrap();

    let path = ObjectPath::from("Player 0");
    let host_count = spawn_attack_counter(&mut host, &path);
    let a_count = spawn_attack_counter(&mut a, &path);
    let b_count = spawn_attack_counter(&mut b, &path);

    a.router
        .send(
            &mut a.world,
            SendPattern::BounceToClientsFast,
            DeliveryMode::Reliable,
            &path,
            "attack",
            |_| {},
        )
        .unwrap();

    // the loopback fires before the message has even reached the host
    assert_eq!(*a_count.borrow(), 1);
    assert_eq!(*b_count.borrow(), 0);

    pump(&network, &mut [&mut host, &mut a, &mut b]);

    // the relay excludes the sender, and the host's own connection counts as
    // a client of its server
    assert_eq!(*a_count.borrow(), 1);
    assert_eq!(*b_count.borrow(), 1);
    assert_eq!(*host_count.borrow(), 1);
}

#[test]
fn bounce_broadcast_reaches_everyone_through_the_wire() {
    init_logging();

    let (network, mut host, mut clients) = start_session(1, &[2, 3]);
    let mut b = clients.pop().unwrap();
    let mut a = clients.pop().unwrap();

    let path = ObjectPath::from("Player 1");
    let host_hit = spawn_damage_recorder(&mut host, &path);
    let a_hit = spawn_damage_recorder(&mut a, &path);
    let b_hit = spawn_damage_recorder(&mut b, &path);

    a.router
        .send(
            &mut a.world,
            SendPattern::BounceToClients,
            DeliveryMode::Reliable,
            &path,
            "damage",
            |message| {
                message.add_int(7);
                message.add_float(5.5);
                message.add(&[0.0f32, 5.0, 7.0]);
            },
        )
        .unwrap();

    // no fast path on this variant: the sender waits for the round trip
    assert_eq!(*a_hit.borrow(), None);

    pump(&network, &mut [&mut host, &mut a, &mut b]);

    let expected = Some((7, 5.5, [0.0, 5.0, 7.0]));
    assert_eq!(*a_hit.borrow(), expected);
    assert_eq!(*b_hit.borrow(), expected);
    assert_eq!(*host_hit.borrow(), expected);
}

#[test]
fn to_clients_fast_fires_locally_with_no_other_clients() {
    init_logging();

    let (network, mut host, _clients) = start_session(1, &[]);

    let path = ObjectPath::from("Player 0");
    let host_count = spawn_attack_counter(&mut host, &path);

    host.router
        .send(
            &mut host.world,
            SendPattern::ToClientsFast,
            DeliveryMode::Reliable,
            &path,
            "attack",
            |_| {},
        )
        .unwrap();

    assert_eq!(*host_count.borrow(), 1);
    assert_eq!(network.borrow().pending(1), 0);

    pump(&network, &mut [&mut host]);
    assert_eq!(*host_count.borrow(), 1);
}

#[test]
fn to_clients_fast_loopback_decodes_like_the_wire_copy() {
    init_logging();

    let (network, mut host, mut clients) = start_session(1, &[2]);
    let mut a = clients.pop().unwrap();

    let path = ObjectPath::from("Player 0");
    let host_hit = spawn_damage_recorder(&mut host, &path);
    let a_hit = spawn_damage_recorder(&mut a, &path);

    host.router
        .send(
            &mut host.world,
            SendPattern::ToClientsFast,
            DeliveryMode::Reliable,
            &path,
            "damage",
            |message| {
                message.add_int(-3);
                message.add_float(12.25);
                message.add(&[1.5f32, -2.0, 0.125]);
            },
        )
        .unwrap();

    // host already applied through the loopback clone
    let local = *host_hit.borrow();
    assert_eq!(local, Some((-3, 12.25, [1.5, -2.0, 0.125])));

    pump(&network, &mut [&mut host, &mut a]);

    // the peer that decoded from the network must agree bit for bit
    assert_eq!(*a_hit.borrow(), local);
    // and the host must not have been re-delivered over the wire
    assert_eq!(*host_hit.borrow(), local);
}

#[test]
fn to_clients_loops_back_through_the_transport_instead() {
    init_logging();

    let (network, mut host, mut clients) = start_session(1, &[2]);
    let mut a = clients.pop().unwrap();

    let path = ObjectPath::from("Player 0");
    let host_count = spawn_attack_counter(&mut host, &path);
    let a_count = spawn_attack_counter(&mut a, &path);

    host.router
        .send(
            &mut host.world,
            SendPattern::ToClients,
            DeliveryMode::Reliable,
            &path,
            "attack",
            |_| {},
        )
        .unwrap();

    // nothing synchronous on the plain broadcast
    assert_eq!(*host_count.borrow(), 0);

    pump(&network, &mut [&mut host, &mut a]);

    assert_eq!(*host_count.borrow(), 1);
    assert_eq!(*a_count.borrow(), 1);
}

#[test]
fn relay_tagged_message_at_a_client_is_a_no_op() {
    init_logging();

    let (network, _host, mut clients) = start_session(1, &[2]);
    let mut a = clients.pop().unwrap();

    let path = ObjectPath::from("Player 0");
    let a_count = spawn_attack_counter(&mut a, &path);

    let mut message = WireMessage::create(DeliveryMode::Reliable, RelayKind::Broadcast);
    message.add_string("attack");
    message.add_string(path.as_str());

    let result = a
        .router
        .handle_incoming(&mut a.world, 1, DeliveryMode::Reliable, message.as_bytes());

    assert!(result.is_ok());
    assert_eq!(*a_count.borrow(), 0);
    assert_eq!(network.borrow().pending(2), 0);
}
