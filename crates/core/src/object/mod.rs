//! Native objects projected into Lua.
//!
//! Register the members scripts may use, install the registry on a session,
//! then hand objects to scripts as [`Handle`]s:
//!
//! ```rust
//! use luaw_core::object::{Handle, MemberRegistry};
//! use luaw_core::Session;
//!
//! #[derive(Clone, Default)]
//! struct Point { x: i32, y: i32 }
//!
//! let mut registry = MemberRegistry::new();
//! registry
//!     .register::<Point>()
//!     .value("x", |p| &p.x, |p| &mut p.x)
//!     .unwrap()
//!     .value("y", |p| &p.y, |p| &mut p.y)
//!     .unwrap();
//!
//! let mut session = Session::new().unwrap();
//! session.set_registry(registry).unwrap();
//!
//! let p: Handle<Point> = Handle::copy(Point { x: 1, y: 2 });
//! session.set("p", &p).unwrap();
//! assert!(session.run("p.x = p.x + p.y").is_ok());
//! assert_eq!(p.get().unwrap().x, 3);
//! ```

mod handle;
mod projection;
pub mod registry;
mod types;

pub use handle::{Const, Constness, Handle, Mutable};
pub use registry::{MemberRegistry, Members};
pub use types::{AccessError, MemberDescriptor, MemberMode, Ownership, RegistryError};
