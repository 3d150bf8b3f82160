use peerseq_sync::{ChangeCause, Delivery, Session, SessionConfig, StateChanged, SyncMessage};
use peerseq_types::ReplicaId;
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};
use tokio_test::assert_ok;

fn session(name: &str) -> Session<char> {
    Session::new(ReplicaId::new(name))
}

fn text(session: &Session<char>) -> String {
    session.value().iter().collect()
}

fn record(session: &Session<char>) -> (Arc<Mutex<Vec<StateChanged>>>, peerseq_sync::Subscription) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let subscription = session.subscribe(move |event, _| sink.lock().unwrap().push(event.clone()));
    (events, subscription)
}

// ── Construction ─────────────────────────────────────────────────

#[test]
fn session_defaults() {
    let alice = session("alice");
    assert_eq!(alice.replica_id(), &ReplicaId::new("alice"));
    assert_eq!(alice.name(), "shared");
    assert_eq!(alice.version(), 0);
    assert!(alice.is_empty());
    assert_eq!(alice.members(), vec![ReplicaId::new("alice")]);
}

#[test]
fn session_custom_config() {
    let alice: Session<char> =
        Session::with_config(ReplicaId::new("alice"), SessionConfig::named("notes"));
    assert_eq!(alice.name(), "notes");
}

// ── Editing ──────────────────────────────────────────────────────

#[test]
fn local_editing() {
    let mut alice = session("alice");
    for c in "helo".chars() {
        assert_ok!(alice.push(c));
    }
    assert_ok!(alice.insert_at(3, 'l'));
    assert_eq!(text(&alice), "hello");

    assert_ok!(alice.remove_at(0));
    assert_eq!(alice.to_vec(), vec!['e', 'l', 'l', 'o']);
    assert_eq!(alice.len(), 4);
    assert_eq!(alice.version(), 6);
}

#[test]
fn concurrent_pushes_agree() {
    let mut alice = session("alice");
    let mut bob = session("bob");

    let x = assert_ok!(alice.push('x'));
    let y = assert_ok!(bob.push('y'));
    assert_ok!(alice.receive(y));
    assert_ok!(bob.receive(x));

    // Both anchor on the root with clock 1; "bob" > "alice".
    assert_eq!(text(&alice), "yx");
    assert_eq!(text(&bob), "yx");
}

#[test]
fn insert_after_a_remote_element() {
    let mut alice = session("alice");
    let mut bob = session("bob");

    let a = assert_ok!(alice.push('a'));
    assert_ok!(bob.receive(a.clone()));
    let b = assert_ok!(bob.insert_after(a.id.clone(), 'b'));
    assert_ok!(alice.receive(b));
    assert_ok!(alice.push('c'));

    assert_eq!(text(&alice), "abc");
    assert_eq!(alice.sequence().element_count(), 3);
}

#[test]
fn remove_by_id_is_idempotent() {
    let mut alice = session("alice");
    let x = assert_ok!(alice.push('x'));
    assert!(assert_ok!(alice.remove(x.id.clone())).is_some());
    assert!(assert_ok!(alice.remove(x.id)).is_none());
    assert_eq!(alice.version(), 2);
}

// ── Notifications ────────────────────────────────────────────────

#[test]
fn local_edits_notify() {
    let mut alice = session("alice");
    let (events, _subscription) = record(&alice);

    assert_ok!(alice.push('a'));
    assert_ok!(alice.push('b'));

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].version, 2);
    assert_eq!(events[1].len, 2);
    assert_eq!(events[1].cause, ChangeCause::Local);
    assert_eq!(events[1].clock.get(&ReplicaId::new("alice")), 2);
}

#[test]
fn duplicates_and_buffered_operations_do_not_notify() {
    let mut alice = session("alice");
    let mut bob = session("bob");
    let first = assert_ok!(bob.push('a'));
    let second = assert_ok!(bob.push('b'));
    let (events, _subscription) = record(&alice);

    assert_eq!(assert_ok!(alice.receive(second)), Delivery::Buffered);
    assert!(events.lock().unwrap().is_empty());

    assert_eq!(assert_ok!(alice.receive(first.clone())), Delivery::Merged { merged: 2 });
    assert_eq!(assert_ok!(alice.receive(first)), Delivery::Duplicate);

    // One notification for the whole cascade.
    let events = events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].len, 2);
    assert_eq!(events[0].cause, ChangeCause::Remote(ReplicaId::new("bob")));
}

#[test]
fn failed_edits_do_not_notify() {
    let mut alice = session("alice");
    let (events, _subscription) = record(&alice);

    assert!(alice.remove_at(3).is_err());
    assert!(events.lock().unwrap().is_empty());
    assert_eq!(alice.version(), 0);
}

#[test]
fn listeners_read_the_value_after_each_change() {
    let mut alice = session("alice");
    let mut bob = session("bob");
    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _subscription =
        alice.subscribe(move |_, value| sink.lock().unwrap().push(value.iter().collect()));

    assert_ok!(alice.push('x'));
    let y = assert_ok!(bob.push('y'));
    assert_ok!(alice.receive(y));
    assert_ok!(alice.remove_at(1));

    assert_eq!(*seen.lock().unwrap(), vec!["x", "yx", "y"]);
    assert_eq!(text(&alice), "y");
}

#[test]
fn dropping_the_subscription_stops_notifications() {
    let mut alice = session("alice");
    let (events, subscription) = record(&alice);

    assert_ok!(alice.push('a'));
    drop(subscription);
    assert_ok!(alice.push('b'));

    assert_eq!(events.lock().unwrap().len(), 1);
    assert!(alice.observers().is_empty());
}

// ── Progress reports ─────────────────────────────────────────────

#[test]
fn local_vector_clock_lists_every_member() {
    let mut alice = session("alice");
    alice.set_members(["bob", "carol"].map(ReplicaId::new));
    assert_ok!(alice.push('x'));

    let clock = alice.vector_clock(&ReplicaId::new("alice")).unwrap();
    let entries: Vec<(String, u64)> = clock
        .to_map()
        .into_iter()
        .map(|(replica, value)| (replica.to_string(), value))
        .collect();
    assert_eq!(
        entries,
        vec![
            ("alice".to_string(), 1),
            ("bob".to_string(), 0),
            ("carol".to_string(), 0),
        ]
    );
    assert_eq!(alice.members().len(), 3);
}

#[test]
fn remote_vector_clock_comes_from_snapshots() {
    let mut alice = session("alice");
    let mut bob = session("bob");
    assert_ok!(bob.push('x'));
    assert_ok!(bob.push('y'));

    let bob_id = ReplicaId::new("bob");
    assert!(alice.vector_clock(&bob_id).is_none());

    assert!(assert_ok!(alice.receive_state(bob.snapshot())).changed());
    let reported = alice.vector_clock(&bob_id).unwrap();
    assert_eq!(reported.get(&bob_id), 2);
    assert!(alice.members().contains(&bob_id));
}

// ── Message handling ─────────────────────────────────────────────

#[test]
fn state_request_round_trip() {
    let mut alice = session("alice");
    let mut bob = session("bob");
    for c in "abc".chars() {
        assert_ok!(alice.push(c));
    }
    let (events, _subscription) = record(&bob);

    let reply = assert_ok!(alice.handle_message(bob.state_request())).unwrap();
    assert!(matches!(reply, SyncMessage::State(_)));
    assert!(assert_ok!(bob.handle_message(reply)).is_none());

    assert_eq!(text(&bob), "abc");
    assert_eq!(bob.clock(), alice.clock());
    let events = events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].cause, ChangeCause::Snapshot(ReplicaId::new("alice")));
}

#[test]
fn operations_through_handle_message() {
    let mut alice = session("alice");
    let mut bob = session("bob");

    let op = assert_ok!(alice.push('z'));
    let bytes = assert_ok!(SyncMessage::Operation(op).encode());
    let message = assert_ok!(SyncMessage::<char>::decode(&bytes));
    assert!(assert_ok!(bob.handle_message(message)).is_none());

    assert_eq!(text(&bob), "z");
}
