//! Interpreter sessions.
//!
//! A [`Session`] owns (or adopts) one Lua interpreter and exposes it through
//! a small stack-based API:
//!
//! - `run` executes a chunk and leaves its results on the stack;
//! - `eval*` evaluate an expression and convert its last result;
//! - `get*` / `set*` read and write globals;
//! - the stack primitives (`gettop`, `seek`, `touchtb`, `setfield`, ...)
//!   build nested tables.
//!
//! Conversions follow [`crate::convert`]. The convenience forms return a
//! default on failure, `*_with` forms also report whether anything failed,
//! and `try_*` forms return a [`LuawError`].

pub mod bindings;
mod engine;
pub mod libs;
mod stack;
pub mod types;

pub use engine::Session;
pub use libs::Library;
pub use stack::StackGuard;
pub use types::{LuawError, Status};
