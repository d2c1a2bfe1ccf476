use std::cell::Cell;
use std::rc::Rc;

use luaw_core::mlua::{Lua, Value};
use luaw_core::provider::detect_variable_names;
use luaw_core::{Session, Status};

fn ones(_: &Lua, name: &str) -> luaw_core::mlua::Result<Option<Value>> {
    Ok((name.len() == 1).then_some(Value::Integer(1)))
}

fn powers(_: &Lua, name: &str) -> luaw_core::mlua::Result<Option<Value>> {
    Ok(match name {
        "a" => Some(Value::Integer(1)),
        "b" => Some(Value::Integer(2)),
        "c" => Some(Value::Integer(3)),
        _ => None,
    })
}

#[test]
fn provider_fills_missing_globals() {
    let mut s = Session::new().unwrap();
    s.set_provider(ones).unwrap();
    assert_eq!(s.eval::<i32>("return a + b + c"), 3);

    s.set("b", 10).unwrap();
    assert_eq!(s.eval::<i32>("return a + b + c"), 12);
}

#[test]
fn unknown_names_raise_not_found() {
    let mut s = Session::new().unwrap();
    s.set_provider(ones).unwrap();
    assert_eq!(s.run("return missing"), Status::Runtime);
    assert!(s.error_message().unwrap().contains("Not found: missing"));
}

#[test]
fn provider_is_asked_on_every_access() {
    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    let mut s = Session::new().unwrap();
    s.set_provider(move |_: &Lua, _: &str| -> luaw_core::mlua::Result<Option<Value>> {
        counter.set(counter.get() + 1);
        Ok(Some(Value::Integer(5)))
    })
    .unwrap();

    assert_eq!(s.eval::<i32>("return v + v"), 10);
    assert_eq!(calls.get(), 2);
}

#[test]
fn clearing_the_provider_restores_nil_globals() {
    let mut s = Session::new().unwrap();
    s.set_provider(ones).unwrap();
    s.clear_provider().unwrap();
    assert!(s.eval::<bool>("return x == nil"));
}

#[test]
fn prefetch_sets_free_variables() {
    let mut s = Session::new().unwrap();
    let names = s.prefetch("return a*10 + b^c", &powers).unwrap();
    assert_eq!(names, ["a", "b", "c"]);
    assert_eq!(s.eval::<i32>("return a*10 + b^c"), 18);
}

#[test]
fn prefetch_skips_locals_and_unknown_names() {
    let mut s = Session::new().unwrap();
    let names = s
        .prefetch("local a = 5 return a + b + zz", &powers)
        .unwrap();
    assert_eq!(names, ["b", "zz"]);
    assert!(s.eval::<bool>("return a == nil and zz == nil"));
    assert_eq!(s.get::<i32>("b"), 2);
}

#[test]
fn eval_prefetched_resolves_then_evaluates() {
    let mut s = Session::new().unwrap();
    assert_eq!(s.eval_prefetched::<i32>("return a + b * c", &powers), 7);
}

#[test]
fn detection_skips_member_roots_strings_and_comments() {
    let names = detect_variable_names(
        "return obj.field + #list - tbl:method(x) .. 'quoted' -- note",
    );
    assert_eq!(names, ["list", "x"]);
}
