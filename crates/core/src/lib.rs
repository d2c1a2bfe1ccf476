//! Embed Lua 5.4 in Rust.
//!
//! - [`convert`]: coercion between Lua values and Rust scalars/containers;
//! - [`session`]: an interpreter with a stack API and expression evaluation;
//! - [`object`]: native objects exposed to scripts with per-member access;
//! - [`provider`]: on-demand resolution of missing globals;
//! - [`config`]: session options, optionally read from TOML.

#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate, clippy::return_self_not_must_use)]

pub mod config;
pub mod convert;
pub mod object;
pub mod provider;
pub mod session;

pub use config::{ConfigLoader, LibPolicy, SessionOptions};
pub use convert::{ConversionError, Convert, Converted, Outcome, Push};
pub use object::{Const, Handle, MemberRegistry, Mutable};
pub use provider::Provider;
pub use session::{LuawError, Session, StackGuard, Status};

/// The underlying Lua bindings.
pub use mlua;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
