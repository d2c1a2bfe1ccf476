//! Lazy global resolution.
//!
//! A [`Provider`] is asked for the value of any global a script reads that
//! is not set. It is hooked into the globals table's `__index`, so each
//! access of a missing name calls it again; nothing is cached. A name the
//! provider doesn't know raises `Not found: <name>` in the script.
//!
//! For hosts that prefer to resolve everything up front, [`scanner`] finds
//! the free variables of an expression so they can be set before it runs.

pub mod scanner;

use std::rc::Rc;

use mlua::{Lua, Table, Value};

pub use scanner::detect_variable_names;

/// Supplies values for globals on demand.
pub trait Provider {
    /// Value of global `name`, or `None` if unknown.
    fn provide(&self, lua: &Lua, name: &str) -> mlua::Result<Option<Value>>;
}

impl<F> Provider for F
where
    F: Fn(&Lua, &str) -> mlua::Result<Option<Value>>,
{
    fn provide(&self, lua: &Lua, name: &str) -> mlua::Result<Option<Value>> {
        self(lua, name)
    }
}

struct ProviderSlot(Rc<dyn Provider>);

pub(crate) fn install(lua: &Lua, provider: Rc<dyn Provider>) -> mlua::Result<()> {
    lua.set_app_data(ProviderSlot(provider));

    let globals = lua.globals();
    let metatable = if let Some(mt) = globals.get_metatable() {
        mt
    } else {
        let mt = lua.create_table()?;
        globals.set_metatable(Some(mt.clone()));
        mt
    };
    metatable.raw_set("__index", lua.create_function(resolve_global)?)?;
    tracing::debug!("installed global provider");
    Ok(())
}

pub(crate) fn uninstall(lua: &Lua) -> mlua::Result<()> {
    lua.remove_app_data::<ProviderSlot>();
    if let Some(mt) = lua.globals().get_metatable() {
        mt.raw_set("__index", Value::Nil)?;
    }
    tracing::debug!("removed global provider");
    Ok(())
}

fn resolve_global(lua: &Lua, (_, key): (Table, Value)) -> mlua::Result<Value> {
    let Value::String(name) = key else {
        return Ok(Value::Nil);
    };
    let name = name.to_str()?.to_string();

    // Release the app data borrow before calling out; the provider may touch it.
    let provider = lua
        .app_data_ref::<ProviderSlot>()
        .map(|slot| Rc::clone(&slot.0));
    let found = match provider {
        Some(provider) => provider.provide(lua, &name)?,
        None => None,
    };
    found.ok_or_else(|| mlua::Error::runtime(format!("Not found: {name}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(_: &Lua, name: &str) -> mlua::Result<Option<Value>> {
        Ok(match name {
            "a" => Some(Value::Integer(1)),
            "b" => Some(Value::Integer(2)),
            _ => None,
        })
    }

    #[test]
    fn test_missing_globals_are_provided() {
        let lua = Lua::new();
        install(&lua, Rc::new(numbers)).unwrap();
        let sum: i64 = lua.load("return a + b").eval().unwrap();
        assert_eq!(sum, 3);
    }

    #[test]
    fn test_unknown_name_raises() {
        let lua = Lua::new();
        install(&lua, Rc::new(numbers)).unwrap();
        let err = lua.load("return zzz").exec().unwrap_err();
        assert!(err.to_string().contains("Not found: zzz"));
    }

    #[test]
    fn test_set_globals_win() {
        let lua = Lua::new();
        install(&lua, Rc::new(numbers)).unwrap();
        lua.globals().set("a", 10).unwrap();
        let sum: i64 = lua.load("return a + b").eval().unwrap();
        assert_eq!(sum, 12);
    }

    #[test]
    fn test_uninstall_restores_nil() {
        let lua = Lua::new();
        install(&lua, Rc::new(numbers)).unwrap();
        uninstall(&lua).unwrap();
        let v: Value = lua.load("return a").eval().unwrap();
        assert!(matches!(v, Value::Nil));
    }
}
