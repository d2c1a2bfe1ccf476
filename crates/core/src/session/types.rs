//! Types shared by the session API.

use std::fmt;

use thiserror::Error;

use crate::config::ConfigError;
use crate::convert::ConversionError;
use crate::object::{AccessError, RegistryError};

/// Outcome of running a chunk.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    /// The chunk failed to compile.
    Syntax,
    /// The chunk raised an error while running.
    Runtime,
    /// The interpreter ran out of memory (or hit its limit).
    Memory,
    /// Any other interpreter failure.
    Error,
    /// The session has no interpreter.
    NotReady,
}

impl Status {
    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }

    pub(crate) fn of(err: &mlua::Error) -> Self {
        match err {
            mlua::Error::SyntaxError { .. } => Status::Syntax,
            mlua::Error::MemoryError(_) => Status::Memory,
            mlua::Error::RuntimeError(_) | mlua::Error::CallbackError { .. } => Status::Runtime,
            _ => Status::Error,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Ok => "ok",
            Status::Syntax => "syntax error",
            Status::Runtime => "runtime error",
            Status::Memory => "memory error",
            Status::Error => "error",
            Status::NotReady => "not ready",
        };
        f.write_str(s)
    }
}

/// Errors surfaced by the fallible (`try_*`) session API.
#[derive(Debug, Error)]
pub enum LuawError {
    #[error("session is not initialized")]
    NotReady,

    #[error("session is already initialized")]
    AlreadyInitialized,

    #[error("{status}: {message}")]
    Script { status: Status, message: String },

    #[error("no return value")]
    NoReturn,

    #[error("value at the top of the stack is not a table")]
    NotATable,

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Lua error: {0}")]
    Lua(#[from] mlua::Error),
}

/// The bare message of a Lua error, without mlua's kind prefix.
pub fn error_text(err: &mlua::Error) -> String {
    match err {
        mlua::Error::RuntimeError(msg) | mlua::Error::MemoryError(msg) => msg.clone(),
        mlua::Error::SyntaxError { message, .. } => message.clone(),
        mlua::Error::CallbackError { cause, .. } => error_text(cause),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_of_errors() {
        assert_eq!(Status::of(&mlua::Error::runtime("x")), Status::Runtime);
        let oom = mlua::Error::MemoryError("oom".into());
        assert_eq!(Status::of(&oom), Status::Memory);
        let mismatch = mlua::Error::UserDataTypeMismatch;
        assert_eq!(Status::of(&mismatch), Status::Error);
    }

    #[test]
    fn test_error_text_unwraps_callbacks() {
        let err = mlua::Error::CallbackError {
            traceback: "stack traceback:".into(),
            cause: std::sync::Arc::new(mlua::Error::runtime("member not found: A.x")),
        };
        assert_eq!(error_text(&err), "member not found: A.x");
        assert_eq!(Status::of(&err), Status::Runtime);
    }
}
