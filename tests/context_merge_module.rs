use subtask_engine::context::{keys, Context, MergeConflict};

fn upstream(pairs: &[(&str, &str)], zones: &[&str]) -> Context {
    let mut context = Context::new();
    for (key, value) in pairs {
        context.put(*key, *value);
    }
    context.put_list("zones", zones.iter().copied());
    context
}

#[test]
fn differing_non_exclusive_values_conflict_in_either_order() {
    let a = upstream(&[("k", "v1")], &[]);
    let b = upstream(&[("k", "v2")], &[]);

    let mut forward = a.clone();
    let err = forward.merge(&b).expect_err("conflict");
    assert_eq!(
        err,
        MergeConflict {
            key: "k".to_string(),
            existing: "v1".to_string(),
            incoming: "v2".to_string(),
        }
    );
    assert_eq!(forward, a);

    let mut backward = b.clone();
    assert!(backward.merge(&a).is_err());
}

#[test]
fn exclusive_key_takes_the_incoming_value() {
    let mut a = upstream(&[(keys::LATEST_EXECUTION_START_TIME, "v1")], &[]);
    let b = upstream(&[(keys::LATEST_EXECUTION_START_TIME, "v2")], &[]);
    a.merge(&b).expect("exclusive keys never conflict");
    assert_eq!(
        a.get_string(keys::LATEST_EXECUTION_START_TIME),
        Some("v2")
    );
}

#[test]
fn downstream_sees_the_same_list_union_whatever_the_upstream_order() {
    let first = upstream(&[("cluster", "c1")], &["z1", "z2"]);
    let second = upstream(&[("cluster", "c1")], &["z3", "z1"]);
    let third = upstream(&[("tenant", "t1")], &["z2", "z4"]);

    let mut one = Context::new();
    one.merge_all([&first, &second, &third]).expect("merge");
    let mut two = Context::new();
    two.merge_all([&third, &first, &second]).expect("merge");

    let sorted = |context: &Context| {
        let mut zones = context.get_list("zones").expect("zones").to_vec();
        zones.sort();
        zones
    };
    assert_eq!(sorted(&one), vec!["z1", "z2", "z3", "z4"]);
    assert_eq!(sorted(&one), sorted(&two));
    assert_eq!(one.string_map, two.string_map);
}

#[test]
fn merging_the_same_upstream_twice_changes_nothing() {
    let source = upstream(&[("cluster", "c1"), (keys::TRACE_ID, "t")], &["z1"]);
    let mut once = Context::new();
    once.merge(&source).expect("merge");
    let mut twice = once.clone();
    twice.merge(&source).expect("merge again");
    assert_eq!(once, twice);
}

#[test]
fn merge_all_stops_at_the_first_conflict() {
    let ok = upstream(&[("a", "1")], &["z1"]);
    let clash = upstream(&[("a", "2")], &[]);
    let never = upstream(&[("b", "3")], &[]);

    let mut target = Context::new();
    assert!(target.merge_all([&ok, &clash, &never]).is_err());
    assert_eq!(target.get_string("a"), Some("1"));
    assert_eq!(target.get_string("b"), None);
}

#[test]
fn parallel_sibling_reads_its_own_element() {
    let context = upstream(&[("version", "4.2")], &["z1", "z2", "z3"]);
    assert_eq!(context.get("zones", Some(1)), Some("z2"));
    assert_eq!(context.get("version", Some(1)), Some("4.2"));

    let view = context.parallel_view(2);
    assert_eq!(view.get_string("zones"), Some("z3"));
}
