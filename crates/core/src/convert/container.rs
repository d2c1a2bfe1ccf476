use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};

use mlua::{Lua, Table, Value};

use super::{Convert, Outcome, Push, fail};

impl<T: Push> Push for Vec<T> {
    fn to_lua_value(&self, lua: &Lua) -> mlua::Result<Value> {
        let table = lua.create_table()?;
        for (i, item) in self.iter().enumerate() {
            table.raw_set(i + 1, item.to_lua_value(lua)?)?;
        }
        Ok(Value::Table(table))
    }
}

/// Reads indices `1..=#t`, honouring `__len` and `__index`.
///
/// `nil` and unconvertible elements become `T::default()` so positions are
/// preserved; the latter mark the result partial.
impl<T: Convert + Default> Convert for Vec<T> {
    fn type_name() -> Cow<'static, str> {
        Cow::Owned(format!("Vec<{}>", T::type_name()))
    }

    fn read(lua: &Lua, value: &Value, log: bool) -> Outcome<Self> {
        let Value::Table(table) = value else {
            return fail(value, log);
        };
        let Ok(len) = table.len() else {
            return fail(value, log);
        };
        // `__len` may report any length; refuse one we can't hold
        let mut items = Vec::new();
        let reserved = usize::try_from(len.max(0))
            .ok()
            .is_some_and(|n| items.try_reserve_exact(n).is_ok());
        if !reserved {
            if log {
                tracing::warn!("can't read {len} elements into {}", Self::type_name());
            }
            return Outcome::Failed(super::ConversionError::new(
                Self::type_name(),
                format!("a table of length {len}"),
            ));
        }

        let mut failed = false;
        for i in 1..=len {
            let item = match table.get::<Value>(i) {
                Ok(item) => T::read(lua, &item, log),
                Err(err) => {
                    if log {
                        tracing::warn!("can't read element {i}: {err}");
                    }
                    Outcome::Failed(super::ConversionError::new(
                        T::type_name(),
                        err.to_string(),
                    ))
                }
            };
            match item {
                Outcome::Nil => items.push(T::default()),
                Outcome::Done(v) => items.push(v),
                Outcome::Partial(v) => {
                    failed = true;
                    items.push(v);
                }
                Outcome::Failed(_) => {
                    failed = true;
                    items.push(T::default());
                }
            }
        }

        if failed {
            Outcome::Partial(items)
        } else {
            Outcome::Done(items)
        }
    }
}

/// Walks `pairs(t)`. Entries whose key or value can't be converted are
/// dropped and mark the result partial.
fn read_map<K, V, M>(lua: &Lua, value: &Value, log: bool) -> Outcome<M>
where
    K: Convert,
    V: Convert + Default,
    M: Convert + Default + Extend<(K, V)>,
{
    let Value::Table(table) = value else {
        return fail(value, log);
    };

    let mut map = M::default();
    let mut failed = false;
    for pair in table.clone().pairs::<Value, Value>() {
        let Ok((k, v)) = pair else {
            failed = true;
            continue;
        };
        let key = match K::read(lua, &k, log) {
            Outcome::Done(key) => key,
            Outcome::Partial(key) => {
                failed = true;
                key
            }
            Outcome::Nil | Outcome::Failed(_) => {
                failed = true;
                continue;
            }
        };
        let value = match V::read(lua, &v, log) {
            Outcome::Nil => V::default(),
            Outcome::Done(value) => value,
            Outcome::Partial(value) => {
                failed = true;
                value
            }
            Outcome::Failed(_) => {
                failed = true;
                continue;
            }
        };
        map.extend(std::iter::once((key, value)));
    }

    if failed {
        Outcome::Partial(map)
    } else {
        Outcome::Done(map)
    }
}

fn push_pairs<'a, K, V>(
    lua: &Lua,
    entries: impl Iterator<Item = (&'a K, &'a V)>,
) -> mlua::Result<Value>
where
    K: Push + 'a,
    V: Push + 'a,
{
    let table: Table = lua.create_table()?;
    for (k, v) in entries {
        table.raw_set(k.to_lua_value(lua)?, v.to_lua_value(lua)?)?;
    }
    Ok(Value::Table(table))
}

impl<K: Push, V: Push, S> Push for HashMap<K, V, S> {
    fn to_lua_value(&self, lua: &Lua) -> mlua::Result<Value> {
        push_pairs(lua, self.iter())
    }
}

impl<K, V, S> Convert for HashMap<K, V, S>
where
    K: Convert + Eq + Hash,
    V: Convert + Default,
    S: BuildHasher + Default,
{
    fn type_name() -> Cow<'static, str> {
        Cow::Owned(format!("HashMap<{}, {}>", K::type_name(), V::type_name()))
    }

    fn read(lua: &Lua, value: &Value, log: bool) -> Outcome<Self> {
        read_map(lua, value, log)
    }
}

impl<K: Push, V: Push> Push for BTreeMap<K, V> {
    fn to_lua_value(&self, lua: &Lua) -> mlua::Result<Value> {
        push_pairs(lua, self.iter())
    }
}

impl<K, V> Convert for BTreeMap<K, V>
where
    K: Convert + Ord,
    V: Convert + Default,
{
    fn type_name() -> Cow<'static, str> {
        Cow::Owned(format!("BTreeMap<{}, {}>", K::type_name(), V::type_name()))
    }

    fn read(lua: &Lua, value: &Value, log: bool) -> Outcome<Self> {
        read_map(lua, value, log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_keeps_positions_of_bad_elements() {
        let lua = Lua::new();
        let t: Value = lua.load("return {1, 'x', 3}").eval().unwrap();
        let out = Vec::<i32>::read(&lua, &t, false);
        assert_eq!(out, Outcome::Partial(vec![1, 0, 3]));
    }

    #[test]
    fn test_vec_honours_len_metamethod() {
        let lua = Lua::new();
        let t: Value = lua
            .load(
                "return setmetatable({}, {
                    __len = function() return 3 end,
                    __index = function(_, k) return k * 10 end,
                })",
            )
            .eval()
            .unwrap();
        let out = Vec::<i64>::read(&lua, &t, false);
        assert_eq!(out, Outcome::Done(vec![10, 20, 30]));
    }

    #[test]
    fn test_vec_rejects_huge_reported_length() {
        let lua = Lua::new();
        let t: Value = lua
            .load(
                "return setmetatable({}, {__len = function() return 1 << 62 end})",
            )
            .eval()
            .unwrap();
        let Outcome::Failed(err) = Vec::<i64>::read(&lua, &t, false) else {
            panic!("expected a failed conversion");
        };
        assert!(err.to_string().contains("length 4611686018427387904"));

        let negative: Value = lua
            .load(
                "return setmetatable({}, {__len = function() return -1 end})",
            )
            .eval()
            .unwrap();
        assert_eq!(
            Vec::<i64>::read(&lua, &negative, false),
            Outcome::Done(vec![])
        );
    }

    #[test]
    fn test_map_drops_bad_entries() {
        let lua = Lua::new();
        let t: Value = lua
            .load("return {a = 1, b = 'x', [true] = 2}")
            .eval()
            .unwrap();
        let out = BTreeMap::<String, i32>::read(&lua, &t, false);
        let expected = BTreeMap::from([("a".to_string(), 1)]);
        assert_eq!(out, Outcome::Partial(expected));
    }

    #[test]
    fn test_non_table_fails() {
        let lua = Lua::new();
        assert!(matches!(
            Vec::<i32>::read(&lua, &Value::Nil, false),
            Outcome::Failed(_)
        ));
        assert!(matches!(
            HashMap::<String, i32>::read(&lua, &Value::Integer(1), false),
            Outcome::Failed(_)
        ));
    }
}
