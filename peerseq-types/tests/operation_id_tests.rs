use peerseq_types::{Error, OperationId, ReplicaId};
use proptest::prelude::*;

fn op(replica: &str, clock: u64) -> OperationId {
    OperationId::new(ReplicaId::new(replica), clock)
}

// ── Construction ─────────────────────────────────────────────────

#[test]
fn root_is_root() {
    let root = OperationId::root();
    assert!(root.is_root());
    assert_eq!(root.clock(), 0);
}

#[test]
fn issued_ids_are_not_root() {
    let id = op("a", 1);
    assert!(!id.is_root());
    assert_eq!(id.replica().as_str(), "a");
    assert_eq!(id.clock(), 1);
}

#[test]
#[should_panic(expected = "start at 1")]
fn zero_clock_is_rejected() {
    let _ = op("a", 0);
}

#[test]
fn predecessor_walks_back_one_tick() {
    assert_eq!(op("a", 3).predecessor(), Some(op("a", 2)));
    assert_eq!(op("a", 1).predecessor(), None);
}

// ── Ordering ─────────────────────────────────────────────────────

#[test]
fn ordering_by_clock_first() {
    assert!(op("z", 1) < op("a", 2));
}

#[test]
fn ordering_by_replica_when_clocks_equal() {
    assert!(op("a", 5) < op("b", 5));
}

#[test]
fn root_sorts_before_everything() {
    assert!(OperationId::root() < op("a", 1));
    assert!(OperationId::root() < op("0", 1));
}

// ── Display / parse ──────────────────────────────────────────────

#[test]
fn display_and_parse() {
    let id = op("peer-1", 42);
    assert_eq!(id.to_string(), "42@peer-1");
    let parsed: OperationId = "42@peer-1".parse().unwrap();
    assert_eq!(parsed, id);
}

#[test]
fn root_display_and_parse() {
    assert_eq!(OperationId::root().to_string(), "root");
    assert!("root".parse::<OperationId>().unwrap().is_root());
}

#[test]
fn replica_may_contain_at_sign() {
    let parsed: OperationId = "3@user@host".parse().unwrap();
    assert_eq!(parsed.replica().as_str(), "user@host");
    assert_eq!(parsed.clock(), 3);
}

#[test]
fn parse_invalid() {
    assert!("bad".parse::<OperationId>().is_err());
    assert!("x@a".parse::<OperationId>().is_err());
    assert!("0@a".parse::<OperationId>().is_err());
    assert_eq!("1@".parse::<OperationId>(), Err(Error::EmptyReplicaId));
}

// ── Serde ────────────────────────────────────────────────────────

#[test]
fn serializes_as_replica_and_clock() {
    let id = op("bob", 5);
    let json = serde_json::to_value(&id).unwrap();
    assert_eq!(json, serde_json::json!({ "replica": "bob", "clock": 5 }));
    assert_eq!(serde_json::from_value::<OperationId>(json).unwrap(), id);
}

#[test]
fn root_travels_as_empty_replica_at_clock_zero() {
    let json = serde_json::to_value(OperationId::root()).unwrap();
    assert_eq!(json, serde_json::json!({ "replica": "", "clock": 0 }));
    assert!(serde_json::from_value::<OperationId>(json).unwrap().is_root());
}

#[test]
fn malformed_ids_are_rejected_when_deserialized() {
    for json in [
        serde_json::json!({ "replica": "", "clock": 5 }),
        serde_json::json!({ "replica": "bob", "clock": 0 }),
        serde_json::json!({ "replica": "bob" }),
    ] {
        assert!(serde_json::from_value::<OperationId>(json.clone()).is_err(), "{json}");
    }
}

proptest! {
    /// The order is total and consistent with (clock, replica).
    #[test]
    fn order_matches_clock_then_replica(
        c1 in 1u64..1000,
        c2 in 1u64..1000,
        r1 in "[a-z]{1,8}",
        r2 in "[a-z]{1,8}",
    ) {
        let a = op(&r1, c1);
        let b = op(&r2, c2);
        prop_assert_eq!(a.cmp(&b), (c1, &r1).cmp(&(c2, &r2)));
    }
}
