//! Member registration.
//!
//! A [`MemberRegistry`] maps a native type to the members scripts may
//! reach on it. Each member is one accessor, chosen by how it was
//! registered:
//!
//! ```rust
//! use luaw_core::object::MemberRegistry;
//!
//! #[derive(Clone, Default)]
//! struct Inner { n: i32 }
//!
//! #[derive(Clone, Default)]
//! struct Outer { inner: Inner, label: String }
//!
//! let mut registry = MemberRegistry::new();
//! registry
//!     .register::<Inner>()
//!     .value("n", |i| &i.n, |i| &mut i.n)
//!     .unwrap();
//! registry
//!     .register::<Outer>()
//!     .value("label", |o| &o.label, |o| &mut o.label)
//!     .unwrap()
//!     .object("inner", |o| &o.inner, |o| &mut o.inner)
//!     .unwrap()
//!     .pointer("inner_ptr", |o| &o.inner, |o| &mut o.inner)
//!     .unwrap()
//!     .computed("label_len", |o| o.label.len() as i64)
//!     .unwrap();
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use mlua::{Lua, Value};

use super::handle::{Const, Handle, Mutable, Target, type_label};
use super::projection::{FieldLens, Projection, ReadLens};
use super::types::{MemberDescriptor, MemberMode, RegistryError};
use crate::convert::{Convert, Outcome, Push, describe};

/// Reads and writes one member given its owner.
pub(crate) trait Accessor: Send + Sync {
    fn get(&self, lua: &Lua, owner: &Target, owner_is_const: bool) -> mlua::Result<Value>;
    fn set(&self, lua: &Lua, owner: &Target, value: Value) -> mlua::Result<()>;
}

/// Members per native type.
#[derive(Clone, Default)]
pub struct MemberRegistry {
    types: HashMap<TypeId, TypeMembers>,
}

#[derive(Clone)]
struct TypeMembers {
    name: &'static str,
    members: HashMap<String, Member>,
}

#[derive(Clone)]
struct Member {
    descriptor: MemberDescriptor,
    accessor: Arc<dyn Accessor>,
}

impl MemberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or continue) registering members of `O`.
    pub fn register<O: Any>(&mut self) -> Members<'_, O> {
        let entry = self
            .types
            .entry(TypeId::of::<O>())
            .or_insert_with(|| TypeMembers {
                name: type_label::<O>(),
                members: HashMap::new(),
            });
        Members {
            entry,
            _owner: PhantomData,
        }
    }

    pub fn contains<O: Any>(&self, name: &str) -> bool {
        self.types
            .get(&TypeId::of::<O>())
            .is_some_and(|t| t.members.contains_key(name))
    }

    pub fn descriptor<O: Any>(&self, name: &str) -> Option<&MemberDescriptor> {
        self.types
            .get(&TypeId::of::<O>())?
            .members
            .get(name)
            .map(|m| &m.descriptor)
    }

    /// Members of `O`, sorted by name.
    pub fn descriptors<O: Any>(&self) -> Vec<&MemberDescriptor> {
        let mut out: Vec<_> = self
            .types
            .get(&TypeId::of::<O>())
            .map(|t| t.members.values().map(|m| &m.descriptor).collect())
            .unwrap_or_default();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub(crate) fn accessor<O: Any>(&self, name: &str) -> Option<Arc<dyn Accessor>> {
        let member = self.types.get(&TypeId::of::<O>())?.members.get(name)?;
        Some(Arc::clone(&member.accessor))
    }
}

impl fmt::Debug for MemberRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self
            .types
            .values()
            .map(|t| {
                let mut names: Vec<_> = t.members.keys().map(String::as_str).collect();
                names.sort_unstable();
                (t.name, names)
            })
            .collect();
        types.sort_unstable();
        f.debug_map().entries(types).finish()
    }
}

/// Builder returned by [`MemberRegistry::register`].
pub struct Members<'r, O> {
    entry: &'r mut TypeMembers,
    _owner: PhantomData<fn(O)>,
}

impl<O: Any> Members<'_, O> {
    /// A field converted to and from a Lua value on every access.
    pub fn value<F, G, M>(
        &mut self,
        name: &str,
        get: G,
        get_mut: M,
    ) -> Result<&mut Self, RegistryError>
    where
        F: Convert + Clone + Any,
        G: Fn(&O) -> &F + Send + Sync + 'static,
        M: Fn(&mut O) -> &mut F + Send + Sync + 'static,
    {
        let lens: Arc<dyn Projection> = Arc::new(FieldLens::new(get, get_mut));
        let accessor = FieldAccessor::<F> {
            name: name.to_string(),
            lens,
            _field: PhantomData,
        };
        self.insert(name, MemberMode::Value, Arc::new(ValueMember(accessor)))
    }

    /// A nested object. Reads copy it out; writes copy a whole object in.
    pub fn object<F, G, M>(
        &mut self,
        name: &str,
        get: G,
        get_mut: M,
    ) -> Result<&mut Self, RegistryError>
    where
        F: Clone + Any,
        G: Fn(&O) -> &F + Send + Sync + 'static,
        M: Fn(&mut O) -> &mut F + Send + Sync + 'static,
    {
        let lens: Arc<dyn Projection> = Arc::new(FieldLens::new(get, get_mut));
        let accessor = FieldAccessor::<F> {
            name: name.to_string(),
            lens,
            _field: PhantomData,
        };
        self.insert(name, MemberMode::Object, Arc::new(ObjectMember(accessor)))
    }

    /// A nested object reached in place. The handle is const when the owner is.
    pub fn pointer<F, G, M>(
        &mut self,
        name: &str,
        get: G,
        get_mut: M,
    ) -> Result<&mut Self, RegistryError>
    where
        F: Any,
        G: Fn(&O) -> &F + Send + Sync + 'static,
        M: Fn(&mut O) -> &mut F + Send + Sync + 'static,
    {
        let lens: Arc<dyn Projection> = Arc::new(FieldLens::new(get, get_mut));
        let accessor = FieldAccessor::<F> {
            name: name.to_string(),
            lens,
            _field: PhantomData,
        };
        let member = PointerMember {
            accessor,
            always_const: false,
        };
        self.insert(name, MemberMode::Pointer, Arc::new(member))
    }

    /// A nested object reached in place, always read-only.
    pub fn const_pointer<F, G>(&mut self, name: &str, get: G) -> Result<&mut Self, RegistryError>
    where
        F: Any,
        G: Fn(&O) -> &F + Send + Sync + 'static,
    {
        let lens: Arc<dyn Projection> = Arc::new(ReadLens::new(get));
        let accessor = FieldAccessor::<F> {
            name: name.to_string(),
            lens,
            _field: PhantomData,
        };
        let member = PointerMember {
            accessor,
            always_const: true,
        };
        self.insert(name, MemberMode::ConstPointer, Arc::new(member))
    }

    /// A read-only value computed from the owner.
    pub fn computed<V, G>(&mut self, name: &str, get: G) -> Result<&mut Self, RegistryError>
    where
        V: Push + 'static,
        G: Fn(&O) -> V + Send + Sync + 'static,
    {
        let accessor = ComputedMember::<O, V, G> {
            name: name.to_string(),
            get,
            _types: PhantomData,
        };
        self.insert(name, MemberMode::Computed, Arc::new(accessor))
    }

    fn insert(
        &mut self,
        name: &str,
        mode: MemberMode,
        accessor: Arc<dyn Accessor>,
    ) -> Result<&mut Self, RegistryError> {
        if self.entry.members.contains_key(name) {
            return Err(RegistryError::Duplicate {
                owner: self.entry.name,
                name: name.to_string(),
            });
        }
        let descriptor = MemberDescriptor {
            owner: TypeId::of::<O>(),
            owner_name: self.entry.name,
            name: name.to_string(),
            mode,
        };
        tracing::debug!(
            owner = self.entry.name,
            member = name,
            %mode,
            "registered member"
        );
        let member = Member {
            descriptor,
            accessor,
        };
        self.entry.members.insert(name.to_string(), member);
        Ok(self)
    }
}

/// A field of the owner reached through a lens.
struct FieldAccessor<F> {
    name: String,
    lens: Arc<dyn Projection>,
    _field: PhantomData<fn() -> F>,
}

impl<F: Any> FieldAccessor<F> {
    fn target(&self, owner: &Target) -> Target {
        owner.join(Arc::clone(&self.lens))
    }

    fn read_only(&self) -> mlua::Error {
        mlua::Error::runtime(format!("member {} is read-only", self.name))
    }
}

struct ValueMember<F>(FieldAccessor<F>);

impl<F: Convert + Clone + Any> Accessor for ValueMember<F> {
    fn get(&self, lua: &Lua, owner: &Target, _: bool) -> mlua::Result<Value> {
        let field = self.0.target(owner).read_as::<F, _>(F::clone)?;
        field.to_lua_value(lua)
    }

    fn set(&self, lua: &Lua, owner: &Target, value: Value) -> mlua::Result<()> {
        let Outcome::Done(field) = F::read(lua, &value, false) else {
            return Err(mlua::Error::runtime(format!(
                "can't assign {} to member {}: expected {}",
                describe(&value),
                self.0.name,
                F::type_name()
            )));
        };
        self.0
            .target(owner)
            .write_as::<F, _>(|slot| *slot = field)?;
        Ok(())
    }
}

struct ObjectMember<F>(FieldAccessor<F>);

impl<F: Clone + Any> Accessor for ObjectMember<F> {
    fn get(&self, lua: &Lua, owner: &Target, owner_is_const: bool) -> mlua::Result<Value> {
        let copy = self.0.target(owner).read_as::<F, _>(F::clone)?;
        if owner_is_const {
            Handle::<F, Const>::copy(copy).to_lua_value(lua)
        } else {
            Handle::<F, Mutable>::copy(copy).to_lua_value(lua)
        }
    }

    fn set(&self, _: &Lua, owner: &Target, value: Value) -> mlua::Result<()> {
        let source = match &value {
            Value::UserData(ud) => {
                if let Ok(handle) = ud.borrow::<Handle<F, Mutable>>() {
                    Some(handle.get()?)
                } else if let Ok(handle) = ud.borrow::<Handle<F, Const>>() {
                    Some(handle.get()?)
                } else {
                    None
                }
            }
            _ => None,
        };
        let Some(source) = source else {
            return Err(mlua::Error::runtime(format!(
                "can't assign {} to member {}: expected {}",
                describe(&value),
                self.0.name,
                type_label::<F>()
            )));
        };
        self.0
            .target(owner)
            .write_as::<F, _>(|slot| *slot = source)?;
        Ok(())
    }
}

struct PointerMember<F> {
    accessor: FieldAccessor<F>,
    always_const: bool,
}

impl<F: Any> Accessor for PointerMember<F> {
    fn get(&self, lua: &Lua, owner: &Target, owner_is_const: bool) -> mlua::Result<Value> {
        let target = self.accessor.target(owner);
        if self.always_const || owner_is_const {
            Handle::<F, Const>::from_target(target).to_lua_value(lua)
        } else {
            Handle::<F, Mutable>::from_target(target).to_lua_value(lua)
        }
    }

    fn set(&self, _: &Lua, _: &Target, _: Value) -> mlua::Result<()> {
        Err(self.accessor.read_only())
    }
}

struct ComputedMember<O, V, G> {
    name: String,
    get: G,
    _types: PhantomData<fn(&O) -> V>,
}

impl<O, V, G> Accessor for ComputedMember<O, V, G>
where
    O: Any,
    V: Push + 'static,
    G: Fn(&O) -> V + Send + Sync,
{
    fn get(&self, lua: &Lua, owner: &Target, _: bool) -> mlua::Result<Value> {
        let value = owner.read_as::<O, _>(|o| (self.get)(o))?;
        value.to_lua_value(lua)
    }

    fn set(&self, _: &Lua, _: &Target, _: Value) -> mlua::Result<()> {
        let message = format!("member {} is read-only", self.name);
        Err(mlua::Error::runtime(message))
    }
}

/// Registry shared with metamethods through the interpreter's app data.
pub(crate) struct SharedRegistry(pub(crate) Arc<MemberRegistry>);

pub(crate) fn registry_of(lua: &Lua) -> Option<Arc<MemberRegistry>> {
    lua.app_data_ref::<SharedRegistry>()
        .map(|shared| Arc::clone(&shared.0))
}
