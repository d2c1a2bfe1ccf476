use std::any::TypeId;
use std::fmt;

use thiserror::Error;

/// How a registered member is exposed to scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberMode {
    /// Read converts to a Lua value; write converts back and stores.
    Value,
    /// Read yields a detached copy of the field; write copies a whole object in.
    Object,
    /// Read yields a handle to the field itself, const when the owner is.
    Pointer,
    /// Read yields a const handle to the field; never writable.
    ConstPointer,
    /// Read runs a function of the owner; never writable.
    Computed,
}

impl MemberMode {
    pub fn is_writable(self) -> bool {
        matches!(self, MemberMode::Value | MemberMode::Object)
    }
}

impl fmt::Display for MemberMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MemberMode::Value => "value",
            MemberMode::Object => "object",
            MemberMode::Pointer => "pointer",
            MemberMode::ConstPointer => "const pointer",
            MemberMode::Computed => "computed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberDescriptor {
    pub owner: TypeId,
    pub owner_name: &'static str,
    pub name: String,
    pub mode: MemberMode,
}

/// How a handle holds on to its root object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// The handle owns a private copy.
    Copy,
    /// Shared ownership with the host through an `Rc`.
    Shared,
    /// Non-owning; the host keeps the object alive.
    Pointer,
}

impl fmt::Display for Ownership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Ownership::Copy => "copy",
            Ownership::Shared => "shared",
            Ownership::Pointer => "pointer",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("object has been dropped")]
    Dangling,

    #[error("object is already borrowed")]
    Borrowed,

    #[error("object is read-only")]
    ReadOnly,

    #[error("object type mismatch")]
    Mismatch,
}

impl From<AccessError> for mlua::Error {
    fn from(err: AccessError) -> Self {
        mlua::Error::runtime(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("member {owner}.{name} is already registered")]
    Duplicate { owner: &'static str, name: String },
}
