//! Session configuration.
//!
//! Options can be built in code with the [`SessionOptions`] builder or read
//! from `~/.config/luaw/config.toml`:
//!
//! ```toml
//! version = 1
//!
//! [session]
//! libs = "preload"
//! load = ["math"]
//! package_path = ["~/lua/?.lua"]
//! memory_limit = 1048576
//! ```

pub mod loader;
pub mod types;

pub use loader::{ConfigError, ConfigLoader, default_config_path};
pub use types::{ConfigFile, LibPolicy, SessionOptions};
