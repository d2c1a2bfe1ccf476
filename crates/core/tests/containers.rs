use std::collections::{BTreeMap, HashMap};

use luaw_core::Session;

fn session() -> Session {
    let mut s = Session::new().unwrap();
    s.set_log_conversion_errors(false);
    s
}

#[test]
fn sequences_round_trip() {
    let mut s = session();
    s.set("v", vec![3, 1, 2]).unwrap();
    assert_eq!(s.eval::<i32>("return #v"), 3);
    assert_eq!(s.eval::<i32>("table.sort(v) return v[1]"), 1);
    assert_eq!(s.get::<Vec<i32>>("v"), [1, 2, 3]);

    let words: Vec<String> = s.eval("return {'a', 'b', 3}");
    assert_eq!(words, ["a", "b", "3"]);
}

#[test]
fn sequence_with_bad_element_is_partial() {
    let mut s = session();
    let c = s.eval_with("return {1, true, 'x', 4}", Vec::<i32>::new(), false);
    assert_eq!(c.value, [1, 1, 0, 4]);
    assert!(c.failed);
}

#[test]
fn nil_and_non_tables_give_the_default() {
    let mut s = session();
    let c = s.eval_with("return 5", vec![9], false);
    assert_eq!(c.value, [9]);
    assert!(c.failed);
    assert!(s.get::<Vec<i32>>("nothing").is_empty());
}

#[test]
fn reported_length_beyond_memory_fails_without_panicking() {
    let mut s = session();
    let c = s.eval_with(
        "return setmetatable({}, {__len = function() return 1 << 62 end})",
        Vec::<i64>::new(),
        false,
    );
    assert!(c.failed);
    assert!(c.value.is_empty());
    assert_eq!(s.gettop(), 0);

    let c = s.eval_with("return {7, 8}", Vec::<i64>::new(), false);
    assert_eq!(c.value, [7, 8]);
}

#[test]
fn maps_round_trip() {
    let mut s = session();
    let scores = BTreeMap::from([("ann".to_string(), 3), ("bob".to_string(), 5)]);
    s.set("scores", &scores).unwrap();
    assert_eq!(s.eval::<i32>("return scores.ann + scores.bob"), 8);

    assert!(s.run("scores.cid = 1").is_ok());
    let back: HashMap<String, i64> = s.get("scores");
    assert_eq!(back.len(), 3);
    assert_eq!(back["cid"], 1);
}

#[test]
fn map_keys_and_values_are_coerced() {
    let mut s = session();
    let m: BTreeMap<i32, String> = s.eval("return { [1] = 'one', ['2'] = 2 }");
    let expected = BTreeMap::from([(1, "one".to_string()), (2, "2".to_string())]);
    assert_eq!(m, expected);

    let c = s.eval_with(
        "return { a = 1, b = {} }",
        BTreeMap::<String, i32>::new(),
        false,
    );
    assert_eq!(c.value, BTreeMap::from([("a".to_string(), 1)]));
    assert!(c.failed);
}

#[test]
fn nested_containers() {
    let mut s = session();
    let grid: Vec<Vec<i32>> = s.eval("return {{1, 2}, {3}}");
    assert_eq!(grid, vec![vec![1, 2], vec![3]]);

    let groups: HashMap<String, Vec<String>> = s.eval("return { a = {'x', 'y'} }");
    assert_eq!(groups["a"], ["x", "y"]);
}
