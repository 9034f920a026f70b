//! Integration tests verifying convergence.
//!
//! However replicas exchange their operations, once every replica has seen
//! every operation they must all hold the same state.

use crdt_doc::prelude::*;

fn doc(peer: u64) -> Document {
    Document::builder().peer_id(peer).build()
}

fn strings(items: &[&str]) -> Vec<Value> {
    items.iter().map(|s| Value::from(*s)).collect()
}

/// Three replicas with concurrent edits on every container kind.
fn three_replicas() -> (Document, Document, Document) {
    let mut base = doc(1);
    base.get_list("list").push("base").unwrap();
    base.get_text("text").insert(0, "--").unwrap();
    let snapshot = base.export_snapshot().unwrap();

    let mut a = base;
    let mut b = doc(2);
    let mut c = doc(3);
    b.import(&snapshot).unwrap();
    c.import(&snapshot).unwrap();

    a.get_list("list").insert(0, "a").unwrap();
    a.get_map("map").set("owner", "a").unwrap();
    a.get_text("text").insert(1, "A").unwrap();

    b.get_list("list").insert(1, "b").unwrap();
    b.get_map("map").set("owner", "b").unwrap();
    b.get_text("text").insert(1, "B").unwrap();

    c.get_list("list").delete(0, 1).unwrap();
    c.get_map("map").set("color", "red").unwrap();
    c.get_text("text").insert(2, "C").unwrap();

    (a, b, c)
}

#[test]
fn three_way_convergence_in_any_merge_order() {
    let (a, b, c) = three_replicas();

    let mut order1 = doc(11);
    order1.merge(&a);
    order1.merge(&b);
    order1.merge(&c);

    let mut order2 = doc(12);
    order2.merge(&c);
    order2.merge(&a);
    order2.merge(&b);

    let mut order3 = doc(13);
    order3.merge(&b);
    order3.merge(&c);
    order3.merge(&a);

    assert_eq!(order1.get_deep_value(), order2.get_deep_value());
    assert_eq!(order2.get_deep_value(), order3.get_deep_value());
    assert_eq!(order1.version(), order3.version());
}

#[test]
fn merge_is_commutative_and_idempotent() {
    let (a, b, _) = three_replicas();

    let mut ab = doc(21);
    ab.merge(&a);
    ab.merge(&b);

    let mut ba = doc(22);
    ba.merge(&b);
    ba.merge(&a);
    assert_eq!(ab.to_json(), ba.to_json());

    let before = ab.to_json();
    let copy = ab.fork().unwrap();
    ab.merge(&copy);
    ab.merge(&a);
    assert_eq!(ab.to_json(), before);
}

#[test]
fn merge_is_associative() {
    let (a, b, c) = three_replicas();

    // (a ∪ b) ∪ c
    let mut left = a.fork().unwrap();
    left.merge(&b);
    left.merge(&c);

    // a ∪ (b ∪ c)
    let mut bc = b.fork().unwrap();
    bc.merge(&c);
    let mut right = a.fork().unwrap();
    right.merge(&bc);

    assert_eq!(left.get_deep_value(), right.get_deep_value());
}

#[test]
fn concurrent_map_writes_pick_one_winner() {
    let mut a = doc(1);
    let mut b = doc(2);
    a.get_map("m").set("k", "from-a").unwrap();
    b.get_map("m").set("k", "from-b").unwrap();

    a.merge(&b);
    b.merge(&a);

    // Same Lamport, so the larger peer id wins.
    assert_eq!(a.get_map("m").get("k"), Some(&Value::from("from-b")));
    assert_eq!(a.to_json(), b.to_json());
}

#[test]
fn causally_later_map_write_wins_over_higher_peer() {
    let mut low = doc(1);
    let mut high = doc(9);
    high.get_map("m").set("k", "old").unwrap();
    low.merge(&high);
    low.get_map("m").set("k", "new").unwrap();

    high.merge(&low);
    assert_eq!(high.get_map("m").get("k"), Some(&Value::from("new")));
}

#[test]
fn concurrent_inserts_at_same_position_keep_runs_together() {
    let mut a = doc(1);
    let mut b = doc(2);
    a.get_text("t").insert(0, "hello").unwrap();
    b.get_text("t").insert(0, "world").unwrap();

    a.merge(&b);
    b.merge(&a);

    let merged = a.get_text("t").to_string();
    assert_eq!(merged, b.get_text("t").to_string());
    assert!(merged == "helloworld" || merged == "worldhello");
}

#[test]
fn delete_concurrent_with_insert_keeps_the_insert() {
    let mut a = doc(1);
    a.get_list("l")
        .insert_many(0, strings(&["x", "y", "z"]))
        .unwrap();
    let mut b = a.fork().unwrap();

    a.get_list("l").delete(1, 1).unwrap();
    b.get_list("l").insert(2, "new").unwrap();

    a.merge(&b);
    b.merge(&a);

    assert_eq!(a.get_list("l").to_vec(), strings(&["x", "new", "z"]));
    assert_eq!(a.get_deep_value(), b.get_deep_value());
}

#[test]
fn concurrent_deletes_of_same_element_are_harmless() {
    let mut a = doc(1);
    a.get_list("l").insert_many(0, strings(&["p", "q"])).unwrap();
    let mut b = a.fork().unwrap();

    a.get_list("l").delete(0, 1).unwrap();
    b.get_list("l").delete(0, 1).unwrap();

    a.merge(&b);
    b.merge(&a);
    assert_eq!(a.get_list("l").to_vec(), strings(&["q"]));
    assert_eq!(b.get_list("l").to_vec(), strings(&["q"]));
}

#[test]
fn concurrent_container_creation_under_one_key() {
    let mut a = doc(1);
    let mut b = doc(2);
    let from_a = a.get_map("m").set_container("child", ContainerType::List).unwrap();
    let from_b = b.get_map("m").set_container("child", ContainerType::Text).unwrap();
    a.list(&from_a).unwrap().push(1).unwrap();
    b.text(&from_b).unwrap().insert(0, "t").unwrap();

    a.merge(&b);
    b.merge(&a);

    // The loser's container still exists; only the slot points elsewhere.
    assert_eq!(a.get_map("m").get("child"), Some(&Value::Container(from_b.clone())));
    assert_eq!(a.list(&from_a).unwrap().len(), 1);
    assert_eq!(a.to_json(), b.to_json());
}
