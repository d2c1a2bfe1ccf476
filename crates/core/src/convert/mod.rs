//! Conversions between Lua values and Rust values.
//!
//! Reading a value is more forgiving than Lua's own rules in most places
//! and stricter in one:
//!
//! - numbers, booleans and numeric strings all convert to any numeric type
//!   and to `bool` (zero is false);
//! - only strings and numbers convert to `String`, booleans never do;
//! - a scalar read of `nil` yields the caller's default without failing;
//! - containers need a table, then convert element by element and keep
//!   whatever succeeded.
//!
//! Every read produces an [`Outcome`]. Callers that want a plain value use
//! [`Outcome::or_default`], which flattens it into a [`Converted`] carrying
//! the value and a `failed` flag.

mod container;
mod scalar;

use std::borrow::Cow;

use mlua::{Lua, Value};
use thiserror::Error;

/// A Rust value that can be pushed into Lua.
pub trait Push {
    fn to_lua_value(&self, lua: &Lua) -> mlua::Result<Value>;
}

/// A Rust value that can be read back from a Lua value.
pub trait Convert: Push + Sized {
    /// Name used in conversion failure messages.
    fn type_name() -> Cow<'static, str>;

    /// Read `value` as `Self`.
    ///
    /// When `log` is set, failures are reported through `tracing` as they
    /// happen, including failures of nested elements.
    fn read(lua: &Lua, value: &Value, log: bool) -> Outcome<Self>;
}

/// Result of reading one Lua value.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// The value was `nil` (or absent).
    Nil,
    /// Converted without loss.
    Done(T),
    /// A container where some elements failed; the rest are kept.
    Partial(T),
    Failed(ConversionError),
}

impl<T> Outcome<T> {
    pub fn or_default(self, default: T) -> Converted<T> {
        match self {
            Outcome::Nil => Converted::ok(default),
            Outcome::Done(value) => Converted::ok(value),
            Outcome::Partial(value) => Converted::failed(value),
            Outcome::Failed(_) => Converted::failed(default),
        }
    }

    /// Strict form: anything short of a clean conversion is an error.
    pub fn into_result(self) -> Result<T, ConversionError>
    where
        T: Convert,
    {
        match self {
            Outcome::Done(value) => Ok(value),
            Outcome::Nil => Err(ConversionError::new(T::type_name(), "nil".to_string())),
            Outcome::Partial(_) => Err(ConversionError::new(
                T::type_name(),
                "a container with unconvertible elements".to_string(),
            )),
            Outcome::Failed(err) => Err(err),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_) | Outcome::Partial(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Nil => Outcome::Nil,
            Outcome::Done(value) => Outcome::Done(f(value)),
            Outcome::Partial(value) => Outcome::Partial(f(value)),
            Outcome::Failed(err) => Outcome::Failed(err),
        }
    }
}

/// A converted value plus whether anything went wrong on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Converted<T> {
    pub value: T,
    pub failed: bool,
}

impl<T> Converted<T> {
    pub fn ok(value: T) -> Self {
        Self {
            value,
            failed: false,
        }
    }

    pub fn failed(value: T) -> Self {
        Self {
            value,
            failed: true,
        }
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("can't convert to {expected} by {found}")]
pub struct ConversionError {
    pub expected: Cow<'static, str>,
    pub found: String,
}

impl ConversionError {
    pub fn new(expected: Cow<'static, str>, found: String) -> Self {
        Self { expected, found }
    }
}

/// Convert `value`, substituting `default` for `nil` and for failures.
pub fn convert<T: Convert>(lua: &Lua, value: &Value, default: T, log: bool) -> Converted<T> {
    T::read(lua, value, log).or_default(default)
}

pub fn try_convert<T: Convert>(lua: &Lua, value: &Value) -> Result<T, ConversionError> {
    T::read(lua, value, false).into_result()
}

/// Human readable `type: value` text for diagnostics.
pub fn describe(value: &Value) -> String {
    match value {
        Value::Nil => "nil".to_string(),
        Value::Boolean(b) => format!("boolean: {b}"),
        Value::Integer(i) => format!("number: {i}"),
        Value::Number(n) => format!("number: {n}"),
        Value::String(s) => format!("string: {}", s.to_string_lossy()),
        other => format!("{}: {:p}", other.type_name(), other.to_pointer()),
    }
}

pub(crate) fn fail<T: Convert>(value: &Value, log: bool) -> Outcome<T> {
    let err = ConversionError::new(T::type_name(), describe(value));
    if log {
        tracing::warn!("{err}");
    }
    Outcome::Failed(err)
}

impl<T: Push + ?Sized> Push for &T {
    fn to_lua_value(&self, lua: &Lua) -> mlua::Result<Value> {
        (**self).to_lua_value(lua)
    }
}

impl Push for Value {
    fn to_lua_value(&self, _: &Lua) -> mlua::Result<Value> {
        Ok(self.clone())
    }
}

/// Passes the value through untouched, `nil` included.
impl Convert for Value {
    fn type_name() -> Cow<'static, str> {
        Cow::Borrowed("value")
    }

    fn read(_: &Lua, value: &Value, _: bool) -> Outcome<Self> {
        Outcome::Done(value.clone())
    }
}

impl<T: Push> Push for Option<T> {
    fn to_lua_value(&self, lua: &Lua) -> mlua::Result<Value> {
        match self {
            Some(value) => value.to_lua_value(lua),
            None => Ok(Value::Nil),
        }
    }
}

/// `nil` reads as `None`; anything else must convert to `T`.
impl<T: Convert> Convert for Option<T> {
    fn type_name() -> Cow<'static, str> {
        Cow::Owned(format!("Option<{}>", T::type_name()))
    }

    fn read(lua: &Lua, value: &Value, log: bool) -> Outcome<Self> {
        match T::read(lua, value, log) {
            Outcome::Nil => Outcome::Done(None),
            Outcome::Done(v) => Outcome::Done(Some(v)),
            Outcome::Partial(v) => Outcome::Partial(Some(v)),
            Outcome::Failed(err) => Outcome::Failed(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_or_default_keeps_partial_values() {
        let partial: Outcome<Vec<i32>> = Outcome::Partial(vec![1, 0, 3]);
        let c = partial.or_default(Vec::new());
        assert!(c.failed);
        assert_eq!(c.value, vec![1, 0, 3]);
    }

    #[test]
    fn test_nil_is_not_a_failure() {
        let c = Outcome::<i32>::Nil.or_default(7);
        assert_eq!(c, Converted::ok(7));
    }

    #[test]
    fn test_describe() {
        let lua = Lua::new();
        assert_eq!(describe(&Value::Nil), "nil");
        assert_eq!(describe(&Value::Boolean(true)), "boolean: true");
        assert_eq!(describe(&Value::Integer(3)), "number: 3");
        let s = Value::String(lua.create_string("abc").unwrap());
        assert_eq!(describe(&s), "string: abc");
        let t = Value::Table(lua.create_table().unwrap());
        assert!(describe(&t).starts_with("table: "));
    }

    #[test]
    fn test_option_reads_nil_as_none() {
        let lua = Lua::new();
        let out = Option::<i32>::read(&lua, &Value::Nil, false);
        assert_eq!(out, Outcome::Done(None));
        let out = Option::<i32>::read(&lua, &Value::Integer(4), false);
        assert_eq!(out, Outcome::Done(Some(4)));
    }

    #[test]
    fn test_conversion_error_message() {
        let lua = Lua::new();
        let s = Value::String(lua.create_string("abc").unwrap());
        let err = try_convert::<i32>(&lua, &s).unwrap_err();
        assert_eq!(err.to_string(), "can't convert to i32 by string: abc");
    }
}
