//! Stack primitives.
//!
//! Lua-style indices: `1` is the bottom, `-1` the top, `0` is never valid.

use std::ops::{Deref, DerefMut};

use mlua::{Table, Value};

use super::engine::Session;
use super::types::LuawError;
use crate::convert::Push;

impl Session {
    pub fn gettop(&self) -> usize {
        self.stack.len()
    }

    /// Truncate or pad (with nil) the stack to `top` values.
    pub fn settop(&mut self, top: usize) {
        self.stack.resize(top, Value::Nil);
    }

    pub fn pop(&mut self, n: usize) {
        let top = self.gettop().saturating_sub(n);
        self.stack.truncate(top);
    }

    pub fn cleartop(&mut self) {
        self.stack.clear();
    }

    /// Zero-based position of `idx`, if it names a slot.
    pub fn abs_index(&self, idx: i32) -> Option<usize> {
        let len = self.stack.len();
        let pos = if idx > 0 {
            usize::try_from(idx).ok()? - 1
        } else if idx < 0 {
            len.checked_sub(usize::try_from(idx.unsigned_abs()).ok()?)?
        } else {
            return None;
        };
        (pos < len).then_some(pos)
    }

    pub fn value_at(&self, idx: i32) -> Option<&Value> {
        self.abs_index(idx).map(|pos| &self.stack[pos])
    }

    /// Lua type name at `idx`; `"no value"` for an empty slot.
    pub fn type_name_at(&self, idx: i32) -> &'static str {
        self.value_at(idx).map_or("no value", Value::type_name)
    }

    pub fn push(&mut self, value: impl Push) -> Result<(), LuawError> {
        let value = value.to_lua_value(self.lua()?)?;
        self.stack.push(value);
        Ok(())
    }

    pub fn push_value(&mut self, value: Value) {
        self.stack.push(value);
    }

    /// Remove the top value and return it.
    pub fn take_top(&mut self) -> Option<Value> {
        self.stack.pop()
    }

    /// Push global `name`. A provider installed on the session is consulted
    /// for missing names. Nothing is pushed on error.
    pub fn gseek(&mut self, name: &str) -> Result<(), LuawError> {
        let value: Value = self.lua()?.globals().get(name)?;
        self.stack.push(value);
        Ok(())
    }

    /// Push `top[key]`, or nil if the top is not a table.
    pub fn seek(&mut self, key: impl Push) -> Result<(), LuawError> {
        let value = match self.top_table() {
            Some(table) => {
                let key = key.to_lua_value(self.lua()?)?;
                table.get::<Value>(key)?
            }
            None => Value::Nil,
        };
        self.stack.push(value);
        Ok(())
    }

    /// Push `top[key]`, creating an empty table there if it is not a table.
    pub fn touchtb(&mut self, key: impl Push) -> Result<(), LuawError> {
        let table = self.top_table().ok_or(LuawError::NotATable)?;
        let lua = self.lua()?;
        let key = key.to_lua_value(lua)?;
        let child = if let Value::Table(child) = table.get::<Value>(key.clone())? {
            child
        } else {
            let child = lua.create_table()?;
            table.set(key, child.clone())?;
            child
        };
        self.stack.push(Value::Table(child));
        Ok(())
    }

    /// Push global table `name`, creating it if needed.
    pub fn gtouchtb(&mut self, name: &str) -> Result<(), LuawError> {
        let lua = self.lua()?;
        let globals = lua.globals();
        let table = if let Value::Table(table) = globals.raw_get::<Value>(name)? {
            table
        } else {
            let table = lua.create_table()?;
            globals.set(name, table.clone())?;
            table
        };
        self.stack.push(Value::Table(table));
        Ok(())
    }

    /// `top[key] = value`. The stack is unchanged.
    pub fn setfield(&mut self, key: impl Push, value: impl Push) -> Result<(), LuawError> {
        let table = self.top_table().ok_or(LuawError::NotATable)?;
        let lua = self.lua()?;
        table.set(key.to_lua_value(lua)?, value.to_lua_value(lua)?)?;
        Ok(())
    }

    /// Pop the top value into global `name`.
    pub fn setglobal(&mut self, name: &str) -> Result<(), LuawError> {
        let value = self.stack.pop().unwrap_or(Value::Nil);
        self.lua()?.globals().set(name, value)?;
        Ok(())
    }

    /// Assign `value` at a dotted global path such as `a.b.c`, creating
    /// intermediate tables. The stack is unchanged.
    pub fn lset(&mut self, path: &str, value: impl Push) -> Result<(), LuawError> {
        let mut keys: Vec<&str> = path.split('.').collect();
        let last = keys.pop().unwrap_or_default();
        let Some((first, rest)) = keys.split_first() else {
            return self.set(last, value);
        };
        let top = self.gettop();
        let result = self
            .touch_path(first, rest)
            .and_then(|()| self.setfield(last, value));
        self.settop(top);
        result
    }

    fn touch_path(&mut self, first: &str, rest: &[&str]) -> Result<(), LuawError> {
        self.gtouchtb(first)?;
        for key in rest {
            self.touchtb(*key)?;
        }
        Ok(())
    }

    /// Push the metatable of the table at the top, or nil.
    pub fn seek_metatable(&mut self) {
        let mt = self
            .top_table()
            .and_then(|t| t.get_metatable())
            .map_or(Value::Nil, Value::Table);
        self.stack.push(mt);
    }

    /// Push the metatable of the table at the top, creating it if needed.
    pub fn touch_metatable(&mut self) -> Result<(), LuawError> {
        let table = self.top_table().ok_or(LuawError::NotATable)?;
        let mt = if let Some(mt) = table.get_metatable() {
            mt
        } else {
            let mt = self.lua()?.create_table()?;
            table.set_metatable(Some(mt.clone()));
            mt
        };
        self.stack.push(Value::Table(mt));
        Ok(())
    }

    /// Replace the metatable of the table at the top.
    pub fn set_metatable(&mut self, metatable: Option<Table>) -> Result<(), LuawError> {
        let table = self.top_table().ok_or(LuawError::NotATable)?;
        table.set_metatable(metatable);
        Ok(())
    }

    /// Restore the current stack height when the guard is dropped.
    pub fn guard(&mut self) -> StackGuard<'_> {
        let top = self.gettop();
        StackGuard {
            session: self,
            top,
        }
    }

    fn top_table(&self) -> Option<Table> {
        match self.value_at(-1) {
            Some(Value::Table(t)) => Some(t.clone()),
            _ => None,
        }
    }
}

/// Scope guard returned by [`Session::guard`].
pub struct StackGuard<'s> {
    session: &'s mut Session,
    top: usize,
}

impl StackGuard<'_> {
    /// Height the stack goes back to on drop.
    pub fn height(&self) -> usize {
        self.top
    }
}

impl Deref for StackGuard<'_> {
    type Target = Session;

    fn deref(&self) -> &Session {
        self.session
    }
}

impl DerefMut for StackGuard<'_> {
    fn deref_mut(&mut self) -> &mut Session {
        self.session
    }
}

impl Drop for StackGuard<'_> {
    fn drop(&mut self) {
        self.session.settop(self.top);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abs_index() {
        let mut s = Session::new().unwrap();
        s.push(1).unwrap();
        s.push(2).unwrap();
        s.push(3).unwrap();
        assert_eq!(s.abs_index(1), Some(0));
        assert_eq!(s.abs_index(-1), Some(2));
        assert_eq!(s.abs_index(-3), Some(0));
        assert_eq!(s.abs_index(-4), None);
        assert_eq!(s.abs_index(4), None);
        assert_eq!(s.abs_index(0), None);
    }

    #[test]
    fn test_settop_pads_with_nil() {
        let mut s = Session::new().unwrap();
        s.settop(2);
        assert_eq!(s.gettop(), 2);
        assert_eq!(s.type_name_at(-1), "nil");
        s.pop(5);
        assert_eq!(s.gettop(), 0);
        assert_eq!(s.type_name_at(1), "no value");
    }

    #[test]
    fn test_guard_restores_height() {
        let mut s = Session::new().unwrap();
        s.push(1).unwrap();
        {
            let mut g = s.guard();
            g.push("a").unwrap();
            g.push("b").unwrap();
            assert_eq!(g.gettop(), 3);
        }
        assert_eq!(s.gettop(), 1);
    }

    #[test]
    fn test_lset_builds_path() {
        let mut s = Session::new().unwrap();
        s.lset("a.b.c", 5).unwrap();
        s.lset("top", "x").unwrap();
        assert_eq!(s.gettop(), 0);
        assert_eq!(s.eval::<i32>("return a.b.c"), 5);
        assert_eq!(s.get::<String>("top"), "x");
    }

    #[test]
    fn test_touchtb_and_setfield() {
        let mut s = Session::new().unwrap();
        s.gtouchtb("g").unwrap();
        s.touchtb("inner").unwrap();
        s.setfield("k", 10).unwrap();
        s.setfield(1, true).unwrap();
        assert_eq!(s.gettop(), 2);
        s.cleartop();
        assert_eq!(s.eval::<i32>("return g.inner.k"), 10);
        assert!(s.eval::<bool>("return g.inner[1]"));
    }

    #[test]
    fn test_metatable_helpers() {
        let mut s = Session::new().unwrap();
        s.gtouchtb("t").unwrap();
        s.seek_metatable();
        assert_eq!(s.type_name_at(-1), "nil");
        s.pop(1);
        s.touch_metatable().unwrap();
        let index: Value = s
            .lua()
            .unwrap()
            .load("function(_, k) return k .. '!' end")
            .eval()
            .unwrap();
        s.setfield("__index", index).unwrap();
        s.cleartop();
        assert_eq!(s.eval::<String>("return t.hey"), "hey!");
    }
}
