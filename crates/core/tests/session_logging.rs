use std::io;
use std::sync::{Arc, Mutex};

use luaw_core::Session;
use luaw_core::mlua::{Lua, Value};
use luaw_core::object::MemberRegistry;
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Captured {
    type Writer = Captured;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn capture(f: impl FnOnce()) -> String {
    let out = Captured::default();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(out.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    out.text()
}

fn nothing(_: &Lua, _: &str) -> luaw_core::mlua::Result<Option<Value>> {
    Ok(None)
}

#[derive(Clone, Default)]
struct Point {
    x: i32,
}

#[test]
fn registry_and_provider_changes_are_logged() {
    let log = capture(|| {
        let mut s = Session::new().unwrap();
        s.set_registry(MemberRegistry::new()).unwrap();
        s.update_registry(|r| {
            r.register::<Point>()
                .value("x", |p| &p.x, |p| &mut p.x)
                .unwrap();
        })
        .unwrap();
        s.set_provider(nothing).unwrap();
        s.clear_provider().unwrap();
        assert!(s.eval::<bool>("return missing == nil"));
    });

    assert!(log.contains("installed member registry types=0"), "{log}");
    assert!(log.contains("registered member"), "{log}");
    assert!(log.contains("updated member registry types=1"), "{log}");
    assert!(log.contains("installed global provider"), "{log}");
    assert!(log.contains("removed global provider"), "{log}");
}
