use luaw_core::mlua::Value;
use luaw_core::{LuawError, Session, Status};

fn session() -> Session {
    let mut s = Session::new().unwrap();
    s.set_log_conversion_errors(false);
    s
}

#[test]
fn eval_converts_the_last_return_value() {
    let mut s = session();
    assert_eq!(s.eval::<i32>("return 1, 2, 3"), 3);
    assert_eq!(s.eval::<f64>("return 3 // 2"), 1.0);
    assert_eq!(
        s.eval::<String>("if 0 then return 'A' else return 'B' end"),
        "A"
    );
    assert!(!s.eval::<bool>("return ''"));
    assert_eq!(s.gettop(), 0);
}

#[test]
fn eval_without_return_gives_the_default() {
    let mut s = session();
    let c = s.eval_with("s = 'a' .. '0'", "none".to_string(), false);
    assert_eq!(c.value, "none");
    assert!(c.failed);
    assert_eq!(s.get::<String>("s"), "a0");
    assert_eq!(s.gettop(), 0);
}

#[test]
fn eval_keeps_the_stack_balanced_on_errors() {
    let mut s = session();
    s.push(10).unwrap();
    assert_eq!(s.eval_or("return nil + 1", -5_i32), -5);
    assert_eq!(s.eval_or("return (", 8_i32), 8);
    assert_eq!(s.gettop(), 1);
    assert_eq!(s.to::<i32>(-1), 10);
}

#[test]
fn try_eval_reports_each_failure() {
    let mut s = session();
    assert_eq!(s.try_eval::<i64>("return 6 * 7").unwrap(), 42);

    let err = s.try_eval::<i64>("return (").unwrap_err();
    assert!(matches!(
        err,
        LuawError::Script {
            status: Status::Syntax,
            ..
        }
    ));

    let err = s.try_eval::<i64>("error('boom')").unwrap_err();
    match err {
        LuawError::Script { status, message } => {
            assert_eq!(status, Status::Runtime);
            assert!(message.contains("boom"), "{message}");
        }
        other => panic!("unexpected error: {other}"),
    }

    let err = s.try_eval::<i64>("x = 1").unwrap_err();
    assert!(matches!(err, LuawError::NoReturn));
    let err = s.try_eval::<i64>("return {}").unwrap_err();
    assert!(matches!(err, LuawError::Conversion(_)));
    assert_eq!(s.gettop(), 0);
}

#[test]
fn eval_multi_takes_every_result() {
    let mut s = session();
    s.push("keep").unwrap();
    let values = s.eval_multi("return 1, 'two', nil").unwrap();
    assert_eq!(values.len(), 3);
    assert!(matches!(values[0], Value::Integer(1)));
    assert!(matches!(values[2], Value::Nil));
    assert_eq!(s.gettop(), 1);
    assert!(s.eval_multi("x = 1").unwrap().is_empty());
}

#[test]
fn run_leaves_results_or_message_on_the_stack() {
    let mut s = session();
    assert_eq!(s.run("return 1, 2"), Status::Ok);
    assert_eq!(s.gettop(), 2);
    assert_eq!(s.to::<i32>(-2), 1);
    s.cleartop();

    let status = s.run("local x = ");
    assert_eq!(status, Status::Syntax);
    assert!(!status.is_ok());
    assert_eq!(s.gettop(), 1);
    assert!(s.error_message().unwrap().contains("luaw"));
    s.cleartop();

    assert_eq!(s.run("error('bad thing')"), Status::Runtime);
    assert!(s.error_message().unwrap().contains("bad thing"));
    s.log_error_out();
    assert_eq!(s.gettop(), 0);
}

#[test]
fn run_file_executes_a_script() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("init.lua");
    std::fs::write(&path, "answer = 40 + 2\nreturn answer").unwrap();

    let mut s = session();
    assert_eq!(s.run_file(&path), Status::Ok);
    assert_eq!(s.to::<i32>(-1), 42);
    assert_eq!(s.get::<i32>("answer"), 42);

    s.cleartop();
    assert_eq!(s.run_file(dir.path().join("missing.lua")), Status::Error);
    assert!(s.error_message().unwrap().starts_with("cannot open"));
}

#[test]
fn globals_round_trip() {
    let mut s = session();
    s.set("name", "luaw").unwrap();
    s.set("n", 3_u8).unwrap();
    s.set("ratio", 0.5_f32).unwrap();
    s.set("on", true).unwrap();

    assert_eq!(s.eval::<String>("return name .. n"), "luaw3");
    assert_eq!(s.eval::<f64>("return ratio * 4"), 2.0);
    assert!(s.eval::<bool>("return on"));

    s.set_nil("name").unwrap();
    assert_eq!(s.get_or("name", "gone".to_string()), "gone");
    assert_eq!(s.gettop(), 0);
}

#[test]
fn serde_values_cross_the_boundary() {
    #[derive(serde::Serialize)]
    struct Limits {
        low: i32,
        high: i32,
    }

    let mut s = session();
    s.set_serde("limits", &Limits { low: 1, high: 9 }).unwrap();
    assert_eq!(s.eval::<i32>("return limits.high - limits.low"), 8);

    assert!(s.run("cfg = { name = 'x', sizes = {1, 2} }").is_ok());
    let cfg: serde_json::Value = s.get_serde("cfg").unwrap();
    assert_eq!(cfg, serde_json::json!({ "name": "x", "sizes": [1, 2] }));
}

#[test]
fn nested_tables_through_the_stack() {
    let mut s = session();
    s.gtouchtb("config").unwrap();
    s.touchtb("window").unwrap();
    s.setfield("width", 800).unwrap();
    s.setfield("title", "main").unwrap();
    s.cleartop();

    s.lset("config.window.height", 600).unwrap();
    assert_eq!(
        s.eval::<i32>("return config.window.width + config.window.height"),
        1400
    );

    s.gseek("config").unwrap();
    s.seek("window").unwrap();
    s.seek("title").unwrap();
    assert_eq!(s.to::<String>(-1), "main");
    assert_eq!(s.gettop(), 3);
}

#[test]
fn guard_restores_the_stack() {
    let mut s = session();
    s.push(1).unwrap();
    {
        let mut g = s.guard();
        g.push(2).unwrap();
        g.push(3).unwrap();
        assert_eq!(g.gettop(), 3);
    }
    assert_eq!(s.gettop(), 1);
}
