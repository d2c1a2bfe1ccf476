//! The session: one interpreter plus an evaluation stack.

use std::rc::Rc;
use std::sync::Arc;

use mlua::{Lua, LuaSerdeExt, MultiValue, Value};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::bindings::register_extensions;
use super::libs;
use super::types::{LuawError, Status, error_text};
use crate::config::SessionOptions;
use crate::convert::{Convert, Converted, Push, describe};
use crate::object::registry::{MemberRegistry, SharedRegistry, registry_of};
use crate::provider::{self, Provider, detect_variable_names};

/// A Lua interpreter together with the stack that the session API reads and
/// writes.
///
/// Values produced by [`run`](Self::run) and the stack helpers live on the
/// session stack and are addressed like Lua stack slots: positive indices
/// count from the bottom starting at 1, negative indices count from the top.
///
/// The evaluation helpers (`eval*`, `get*`, `set*`) always leave the stack
/// at the height they found it.
///
/// # Example
///
/// ```rust
/// use luaw_core::Session;
///
/// let mut session = Session::new().unwrap();
/// session.set("a", 4).unwrap();
/// assert_eq!(session.eval::<i64>("return a * 2 + 1"), 9);
/// assert_eq!(session.gettop(), 0);
/// ```
#[derive(Debug, Default)]
pub struct Session {
    // Dropped before the interpreter.
    pub(crate) stack: Vec<Value>,
    state: State,
}

#[derive(Debug, Default)]
enum State {
    #[default]
    Uninitialized,
    Ready(Runtime),
    Closed,
}

#[derive(Debug)]
struct Runtime {
    lua: Lua,
    adopted: bool,
    log_conversion_errors: bool,
    chunk_name: String,
}

impl Session {
    /// Create a ready session with default options.
    pub fn new() -> Result<Self, LuawError> {
        Self::with_options(SessionOptions::default())
    }

    pub fn with_options(options: SessionOptions) -> Result<Self, LuawError> {
        let mut session = Self::default();
        session.init(options)?;
        Ok(session)
    }

    /// Run on an existing interpreter. Closing the session leaves it alive.
    pub fn adopt(lua: Lua) -> Result<Self, LuawError> {
        Self::with_options(SessionOptions::default().adopt(lua))
    }

    /// Bring an uninitialized or closed session up.
    pub fn init(&mut self, mut options: SessionOptions) -> Result<(), LuawError> {
        if self.is_ready() {
            return Err(LuawError::AlreadyInitialized);
        }

        let (lua, adopted) = match options.adopted.take() {
            Some(lua) => (lua, true),
            None => (libs::new_state()?, false),
        };
        libs::open(&lua, &options)?;
        if options.extensions {
            register_extensions(&lua)?;
        }

        tracing::debug!(adopted, chunk = %options.chunk_name, "session ready");
        self.stack.clear();
        self.state = State::Ready(Runtime {
            lua,
            adopted,
            log_conversion_errors: options.log_conversion_errors,
            chunk_name: options.chunk_name,
        });
        Ok(())
    }

    /// Release the interpreter. An adopted interpreter is only detached.
    pub fn close(&mut self) {
        self.stack.clear();
        if let State::Ready(runtime) = std::mem::replace(&mut self.state, State::Closed) {
            if runtime.adopted {
                tracing::debug!("detached from adopted interpreter");
            } else {
                tracing::debug!("closed interpreter");
            }
        }
    }

    /// Close, then initialize again with `options`.
    pub fn reset(&mut self, options: SessionOptions) -> Result<(), LuawError> {
        self.close();
        self.init(options)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, State::Ready(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed)
    }

    pub fn lua(&self) -> Result<&Lua, LuawError> {
        self.runtime().map(|rt| &rt.lua)
    }

    fn runtime(&self) -> Result<&Runtime, LuawError> {
        match &self.state {
            State::Ready(rt) => Ok(rt),
            _ => Err(LuawError::NotReady),
        }
    }

    /// Whether conversion failures are logged by the convenience getters.
    pub fn log_conversion_errors(&self) -> bool {
        self.runtime().is_ok_and(|rt| rt.log_conversion_errors)
    }

    pub fn set_log_conversion_errors(&mut self, enabled: bool) {
        if let State::Ready(rt) = &mut self.state {
            rt.log_conversion_errors = enabled;
        }
    }

    // ---- running code ----

    /// Compile and run `code`.
    ///
    /// On success every value the chunk returns is pushed. On failure the
    /// error message is pushed instead.
    pub fn run(&mut self, code: &str) -> Status {
        let Ok(rt) = self.runtime() else {
            return Status::NotReady;
        };
        let (lua, name) = (rt.lua.clone(), rt.chunk_name.clone());
        match lua.load(code).set_name(name).call::<MultiValue>(()) {
            Ok(values) => {
                self.stack.extend(values);
                Status::Ok
            }
            Err(err) => {
                let status = Status::of(&err);
                let message = error_text(&err);
                let value = lua
                    .create_string(&message)
                    .map_or(Value::Nil, Value::String);
                self.stack.push(value);
                status
            }
        }
    }

    /// Run a file with `dofile` semantics.
    pub fn run_file(&mut self, path: impl AsRef<std::path::Path>) -> Status {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(code) => self.run(&code),
            Err(err) => {
                let message = format!("cannot open {}: {err}", path.display());
                let Ok(lua) = self.lua() else {
                    return Status::NotReady;
                };
                let value = lua
                    .create_string(&message)
                    .map_or(Value::Nil, Value::String);
                self.stack.push(value);
                Status::Error
            }
        }
    }

    /// Message at the top of the stack, if it is a string or a number.
    pub fn error_message(&self) -> Option<String> {
        let lua = self.lua().ok()?;
        let value = self.value_at(-1)?.clone();
        String::read(lua, &value, false).into_result().ok()
    }

    /// Pop the message at the top of the stack and log it through `tracing`.
    pub fn log_error_out(&mut self) {
        match self.error_message() {
            Some(message) => tracing::error!("{message}"),
            None => tracing::error!("unknown Lua error"),
        }
        self.pop(1);
    }

    // ---- evaluation ----

    /// Evaluate `expr` and convert its last return value.
    ///
    /// Returns `T::default()` on any failure. The stack is unchanged.
    pub fn eval<T: Convert + Default>(&mut self, expr: &str) -> T {
        let log = self.log_conversion_errors();
        self.eval_with(expr, T::default(), log).value
    }

    pub fn eval_or<T: Convert>(&mut self, expr: &str, default: T) -> T {
        let log = self.log_conversion_errors();
        self.eval_with(expr, default, log).value
    }

    /// Evaluate `expr` and report whether anything failed along the way.
    pub fn eval_with<T: Convert>(&mut self, expr: &str, default: T, log: bool) -> Converted<T> {
        let top = self.gettop();
        let status = self.run(expr);
        if !status.is_ok() {
            if log {
                self.log_error_out();
            }
            self.settop(top);
            return Converted::failed(default);
        }
        if self.gettop() == top {
            if log {
                tracing::error!("no return value: {expr}");
            }
            return Converted::failed(default);
        }
        let result = self.convert_at(-1, default, log);
        self.settop(top);
        result
    }

    /// Strict evaluation: every failure is an error.
    pub fn try_eval<T: Convert>(&mut self, expr: &str) -> Result<T, LuawError> {
        let top = self.gettop();
        let status = self.run(expr);
        if !status.is_ok() {
            let message = self.error_message().unwrap_or_default();
            self.settop(top);
            return Err(LuawError::Script { status, message });
        }
        if self.gettop() == top {
            return Err(LuawError::NoReturn);
        }
        let result = self.try_to(-1);
        self.settop(top);
        result
    }

    /// Evaluate `expr` and take all of its return values off the stack.
    pub fn eval_multi(&mut self, expr: &str) -> Result<Vec<Value>, LuawError> {
        let top = self.gettop();
        let status = self.run(expr);
        if !status.is_ok() {
            let message = self.error_message().unwrap_or_default();
            self.settop(top);
            return Err(LuawError::Script { status, message });
        }
        Ok(self.stack.split_off(top))
    }

    /// Fetch missing globals from `provider` for every free variable of
    /// `expr`, then evaluate it.
    pub fn eval_prefetched<T: Convert + Default>(
        &mut self,
        expr: &str,
        provider: &dyn Provider,
    ) -> T {
        if let Err(err) = self.prefetch(expr, provider) {
            tracing::error!("prefetch failed: {err}");
            return T::default();
        }
        self.eval(expr)
    }

    // ---- conversion at stack slots ----

    pub fn convert_at<T: Convert>(&self, idx: i32, default: T, log: bool) -> Converted<T> {
        let Ok(lua) = self.lua() else {
            return Converted::failed(default);
        };
        let value = self.value_at(idx).cloned().unwrap_or(Value::Nil);
        T::read(lua, &value, log).or_default(default)
    }

    /// Convert the value at `idx`; `nil`, an empty slot or a failure gives
    /// `T::default()`.
    pub fn to<T: Convert + Default>(&self, idx: i32) -> T {
        let log = self.log_conversion_errors();
        self.convert_at(idx, T::default(), log).value
    }

    pub fn to_or<T: Convert>(&self, idx: i32, default: T) -> T {
        let log = self.log_conversion_errors();
        self.convert_at(idx, default, log).value
    }

    pub fn try_to<T: Convert>(&self, idx: i32) -> Result<T, LuawError> {
        let lua = self.lua()?;
        let value = self.value_at(idx).cloned().unwrap_or(Value::Nil);
        Ok(T::read(lua, &value, false).into_result()?)
    }

    // ---- globals ----

    pub fn get<T: Convert + Default>(&mut self, name: &str) -> T {
        let log = self.log_conversion_errors();
        self.get_with(name, T::default(), log).value
    }

    pub fn get_or<T: Convert>(&mut self, name: &str, default: T) -> T {
        let log = self.log_conversion_errors();
        self.get_with(name, default, log).value
    }

    /// Read global `name`. The stack is unchanged.
    pub fn get_with<T: Convert>(&mut self, name: &str, default: T, log: bool) -> Converted<T> {
        let top = self.gettop();
        if let Err(err) = self.gseek(name) {
            if log {
                tracing::error!("can't read global {name}: {err}");
            }
            return Converted::failed(default);
        }
        let result = self.convert_at(-1, default, log);
        self.settop(top);
        result
    }

    pub fn try_get<T: Convert>(&mut self, name: &str) -> Result<T, LuawError> {
        let top = self.gettop();
        self.gseek(name)?;
        let result = self.try_to(-1);
        self.settop(top);
        result
    }

    /// Assign global `name`.
    pub fn set(&mut self, name: &str, value: impl Push) -> Result<(), LuawError> {
        self.push(value)?;
        self.setglobal(name)
    }

    pub fn set_nil(&mut self, name: &str) -> Result<(), LuawError> {
        self.push_value(Value::Nil);
        self.setglobal(name)
    }

    /// Assign global `name` from any serde-serializable value.
    pub fn set_serde<S: Serialize + ?Sized>(
        &mut self,
        name: &str,
        value: &S,
    ) -> Result<(), LuawError> {
        let lua = self.lua()?;
        let value = lua.to_value(value)?;
        lua.globals().set(name, value)?;
        Ok(())
    }

    /// Read global `name` through serde.
    pub fn get_serde<D: DeserializeOwned>(&mut self, name: &str) -> Result<D, LuawError> {
        let top = self.gettop();
        self.gseek(name)?;
        let value = self.value_at(-1).cloned().unwrap_or(Value::Nil);
        self.settop(top);
        let lua = self.lua()?;
        Ok(lua.from_value(value)?)
    }

    // ---- members and providers ----

    /// Registry consulted when scripts index native objects.
    pub fn registry(&self) -> Arc<MemberRegistry> {
        self.lua().ok().and_then(registry_of).unwrap_or_default()
    }

    pub fn set_registry(
        &mut self,
        registry: impl Into<Arc<MemberRegistry>>,
    ) -> Result<(), LuawError> {
        let lua = self.lua()?;
        let registry = registry.into();
        tracing::debug!(types = registry.len(), "installed member registry");
        lua.set_app_data(SharedRegistry(registry));
        Ok(())
    }

    /// Edit the registry in place; it is cloned first if shared.
    pub fn update_registry<R>(
        &mut self,
        f: impl FnOnce(&mut MemberRegistry) -> R,
    ) -> Result<R, LuawError> {
        let lua = self.lua()?;
        let mut registry = lua
            .remove_app_data::<SharedRegistry>()
            .map(|shared| shared.0)
            .unwrap_or_default();
        let out = f(Arc::make_mut(&mut registry));
        tracing::debug!(types = registry.len(), "updated member registry");
        lua.set_app_data(SharedRegistry(registry));
        Ok(out)
    }

    /// Resolve missing globals through `provider` on every access.
    pub fn set_provider(&mut self, provider: impl Provider + 'static) -> Result<(), LuawError> {
        let lua = self.lua()?;
        provider::install(lua, Rc::new(provider))?;
        Ok(())
    }

    pub fn clear_provider(&mut self) -> Result<(), LuawError> {
        let lua = self.lua()?;
        provider::uninstall(lua)?;
        Ok(())
    }

    /// Set every free variable of `expr` that `provider` knows as a global.
    ///
    /// Returns the detected names.
    pub fn prefetch(
        &mut self,
        expr: &str,
        provider: &dyn Provider,
    ) -> Result<Vec<String>, LuawError> {
        let lua = self.lua()?;
        let names = detect_variable_names(expr);
        let globals = lua.globals();
        for name in &names {
            match provider.provide(lua, name)? {
                Some(value) => {
                    tracing::trace!(name = %name, value = %describe(&value), "prefetched");
                    globals.raw_set(name.as_str(), value)?;
                }
                None => tracing::trace!(name = %name, "not provided"),
            }
        }
        Ok(names)
    }
}
