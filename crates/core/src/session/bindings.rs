//! Extension functions installed as globals.
//!
//! These are plain helpers for expression-style scripts: a conditional, a
//! set builder and two frequency counters.

use mlua::{Function, Lua, Result as LuaResult, Table, Value, Variadic};

/// Registry key of the metatable shared by every `COUNTER0` result.
const COUNTER0_METATABLE: &str = "luaw.counter0";

/// Register `IF`, `SET`, `COUNTER` and `COUNTER0` as globals.
pub fn register_extensions(lua: &Lua) -> LuaResult<()> {
    let globals = lua.globals();

    globals.set("IF", create_if_fn(lua)?)?;
    globals.set("SET", create_set_fn(lua)?)?;
    globals.set("COUNTER", create_counter_fn(lua)?)?;
    globals.set("COUNTER0", create_counter0_fn(lua)?)?;

    Ok(())
}

/// `IF(c1, r1, c2, r2, ..., else)`.
///
/// ```lua
/// IF(x > 0, "pos", x < 0, "neg", "zero")
/// ```
///
/// All arguments are evaluated by the caller; only the selection is lazy.
fn create_if_fn(lua: &Lua) -> LuaResult<Function> {
    lua.create_function(|_, args: Variadic<Value>| {
        if args.len() < 3 {
            return Err(mlua::Error::runtime("IF: At least 3 arguments"));
        }
        if args.len() % 2 == 0 {
            return Err(mlua::Error::runtime(
                "IF: The number of arguments should be odd",
            ));
        }
        let picked = args
            .chunks_exact(2)
            .find(|pair| truthy(&pair[0]))
            .map_or(&args[args.len() - 1], |pair| &pair[1]);
        Ok(picked.clone())
    })
}

/// `SET(a, b, ...)` or `SET({a, b, ...})`: a table mapping each key to true.
fn create_set_fn(lua: &Lua) -> LuaResult<Function> {
    lua.create_function(|lua, args: Variadic<Value>| {
        let set = lua.create_table()?;
        for key in keys(&args)? {
            set.set(key, true)?;
        }
        Ok(set)
    })
}

/// `COUNTER(a, b, ...)` or `COUNTER({a, b, ...})`: a table mapping each key
/// to how often it appears.
fn create_counter_fn(lua: &Lua) -> LuaResult<Function> {
    lua.create_function(|lua, args: Variadic<Value>| count(lua, &args))
}

/// Like `COUNTER`, but absent keys read as 0.
fn create_counter0_fn(lua: &Lua) -> LuaResult<Function> {
    lua.create_function(|lua, args: Variadic<Value>| {
        let counter = count(lua, &args)?;
        counter.set_metatable(Some(counter0_metatable(lua)?));
        Ok(counter)
    })
}

fn count(lua: &Lua, args: &[Value]) -> LuaResult<Table> {
    let counter = lua.create_table()?;
    for key in keys(args)? {
        let n = counter.raw_get::<Option<i64>>(key.clone())?.unwrap_or(0);
        counter.raw_set(key, n + 1)?;
    }
    Ok(counter)
}

fn counter0_metatable(lua: &Lua) -> LuaResult<Table> {
    if let Some(mt) = lua.named_registry_value::<Option<Table>>(COUNTER0_METATABLE)? {
        return Ok(mt);
    }
    let mt = lua.create_table()?;
    let zero = lua.create_function(|_, _: Variadic<Value>| Ok(0))?;
    mt.set("__index", zero)?;
    lua.set_named_registry_value(COUNTER0_METATABLE, mt.clone())?;
    Ok(mt)
}

/// Keys from either a single sequence argument or the argument list itself.
/// Nil entries are skipped.
fn keys(args: &[Value]) -> LuaResult<Vec<Value>> {
    if let [Value::Table(list)] = args {
        let len = list.len()?;
        let mut out = Vec::new();
        for i in 1..=len {
            let item: Value = list.get(i)?;
            if !matches!(item, Value::Nil) {
                out.push(item);
            }
        }
        return Ok(out);
    }
    Ok(args
        .iter()
        .filter(|v| !matches!(v, Value::Nil))
        .cloned()
        .collect())
}

fn truthy(value: &Value) -> bool {
    !matches!(value, Value::Nil | Value::Boolean(false))
}
