use std::borrow::Cow;

use mlua::{Lua, Value};

use super::{Convert, Outcome, Push, fail};

/// A Lua value seen through the numeric coercion rules.
enum Scalar {
    Int(i64),
    Float(f64),
    Bool(bool),
    Nil,
    Other,
}

fn classify(lua: &Lua, value: &Value) -> Scalar {
    match value {
        Value::Nil => Scalar::Nil,
        Value::Integer(i) => Scalar::Int(*i),
        Value::Number(n) => float_or_exact(*n),
        Value::Boolean(b) => Scalar::Bool(*b),
        Value::String(_) => numeric_string(lua, value).unwrap_or(Scalar::Other),
        _ => Scalar::Other,
    }
}

/// Integral floats go through the integer path so large values keep their
/// exact bits. Zero stays a float so `-0.0` keeps its sign.
fn float_or_exact(n: f64) -> Scalar {
    match exact_integer(n) {
        Some(i) if i != 0 => Scalar::Int(i),
        _ => Scalar::Float(n),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn exact_integer(n: f64) -> Option<i64> {
    // 2^63 is the first float past i64::MAX.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if n.fract() == 0.0 && n >= -LIMIT && n < LIMIT {
        Some(n as i64)
    } else {
        None
    }
}

fn numeric_string(lua: &Lua, value: &Value) -> Option<Scalar> {
    if let Ok(Some(i)) = lua.coerce_integer(value.clone()) {
        return Some(Scalar::Int(i));
    }
    match lua.coerce_number(value.clone()) {
        Ok(Some(n)) => Some(float_or_exact(n)),
        _ => None,
    }
}

macro_rules! convert_integer {
    ($($ty:ty),* $(,)?) => {$(
        impl Push for $ty {
            // Unsigned 64-bit values keep their bit pattern.
            #[allow(clippy::cast_possible_wrap, clippy::cast_lossless)]
            fn to_lua_value(&self, _: &Lua) -> mlua::Result<Value> {
                Ok(Value::Integer(*self as i64))
            }
        }

        impl Convert for $ty {
            fn type_name() -> Cow<'static, str> {
                Cow::Borrowed(stringify!($ty))
            }

            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            fn read(lua: &Lua, value: &Value, log: bool) -> Outcome<Self> {
                match classify(lua, value) {
                    Scalar::Int(i) => Outcome::Done(i as $ty),
                    Scalar::Float(n) => Outcome::Done(n as $ty),
                    Scalar::Bool(b) => Outcome::Done(<$ty>::from(b)),
                    Scalar::Nil => Outcome::Nil,
                    Scalar::Other => fail(value, log),
                }
            }
        }
    )*};
}

convert_integer!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

macro_rules! convert_float {
    ($($ty:ty),* $(,)?) => {$(
        impl Push for $ty {
            fn to_lua_value(&self, _: &Lua) -> mlua::Result<Value> {
                Ok(Value::Number(f64::from(*self)))
            }
        }

        impl Convert for $ty {
            fn type_name() -> Cow<'static, str> {
                Cow::Borrowed(stringify!($ty))
            }

            #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
            fn read(lua: &Lua, value: &Value, log: bool) -> Outcome<Self> {
                match classify(lua, value) {
                    Scalar::Int(i) => Outcome::Done(i as $ty),
                    Scalar::Float(n) => Outcome::Done(n as $ty),
                    Scalar::Bool(b) => Outcome::Done(if b { 1.0 } else { 0.0 }),
                    Scalar::Nil => Outcome::Nil,
                    Scalar::Other => fail(value, log),
                }
            }
        }
    )*};
}

convert_float!(f32, f64);

impl Push for bool {
    fn to_lua_value(&self, _: &Lua) -> mlua::Result<Value> {
        Ok(Value::Boolean(*self))
    }
}

impl Convert for bool {
    fn type_name() -> Cow<'static, str> {
        Cow::Borrowed("bool")
    }

    fn read(lua: &Lua, value: &Value, log: bool) -> Outcome<Self> {
        match classify(lua, value) {
            Scalar::Int(i) => Outcome::Done(i != 0),
            Scalar::Float(n) => Outcome::Done(n != 0.0),
            Scalar::Bool(b) => Outcome::Done(b),
            Scalar::Nil => Outcome::Nil,
            Scalar::Other => fail(value, log),
        }
    }
}

impl Push for str {
    fn to_lua_value(&self, lua: &Lua) -> mlua::Result<Value> {
        lua.create_string(self).map(Value::String)
    }
}

impl Push for String {
    fn to_lua_value(&self, lua: &Lua) -> mlua::Result<Value> {
        self.as_str().to_lua_value(lua)
    }
}

/// Only strings and numbers; numbers use Lua's own formatting.
impl Convert for String {
    fn type_name() -> Cow<'static, str> {
        Cow::Borrowed("string")
    }

    fn read(lua: &Lua, value: &Value, log: bool) -> Outcome<Self> {
        let text = match value {
            Value::Nil => return Outcome::Nil,
            Value::String(s) => Some(s.clone()),
            Value::Integer(_) | Value::Number(_) => lua.coerce_string(value.clone()).ok().flatten(),
            _ => None,
        };
        match text.as_ref().map(mlua::String::to_str) {
            Some(Ok(s)) => Outcome::Done(s.to_string()),
            _ => fail(value, log),
        }
    }
}
