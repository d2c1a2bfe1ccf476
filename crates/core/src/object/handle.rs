//! Native objects as Lua userdata.
//!
//! A [`Handle`] names a native object, or a field nested anywhere inside
//! one, and carries its constness in the type. Every `(T, constness)` pair
//! gets its own userdata metatable, so a script holding `Handle<A, Const>`
//! and one holding `Handle<A, Mutable>` see different metatables even though
//! both reach the same object.
//!
//! The root is held in one of three ways (see [`Ownership`]):
//!
//! - [`Handle::copy`] moves a value into the handle;
//! - [`Handle::shared`] shares an `Rc<RefCell<T>>` with the host;
//! - [`Handle::pointer`] keeps only a `Weak`, so the host decides the
//!   lifetime and a dropped object reports [`AccessError::Dangling`].
//!
//! Member lookups go through the [`MemberRegistry`](super::MemberRegistry)
//! installed on the session.

use std::any::Any;
use std::borrow::Cow;
use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use mlua::{AnyUserData, Lua, MetaMethod, UserData, UserDataMethods, Value};

use super::projection::Projection;
use super::registry::{Accessor, registry_of};
use super::types::{AccessError, Ownership};
use crate::convert::{Convert, Outcome, Push, fail};

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Mutable {}
    impl Sealed for super::Const {}
}

/// Type-level constness of a [`Handle`].
pub trait Constness: sealed::Sealed + 'static {
    const IS_CONST: bool;
}

/// Scripts may assign members through the handle.
#[derive(Debug)]
pub enum Mutable {}

/// Scripts may only read through the handle.
#[derive(Debug)]
pub enum Const {}

impl Constness for Mutable {
    const IS_CONST: bool = false;
}

impl Constness for Const {
    const IS_CONST: bool = true;
}

type Cell = RefCell<dyn Any>;

#[derive(Clone)]
enum Anchor {
    Owned(Rc<Cell>),
    Shared(Rc<Cell>),
    Pointer(Weak<Cell>),
}

impl Anchor {
    fn upgrade(&self) -> Result<Rc<Cell>, AccessError> {
        match self {
            Anchor::Owned(rc) | Anchor::Shared(rc) => Ok(Rc::clone(rc)),
            Anchor::Pointer(weak) => weak.upgrade().ok_or(AccessError::Dangling),
        }
    }

    fn ownership(&self) -> Ownership {
        match self {
            Anchor::Owned(_) => Ownership::Copy,
            Anchor::Shared(_) => Ownership::Shared,
            Anchor::Pointer(_) => Ownership::Pointer,
        }
    }
}

/// A root object plus the projection path down to the referenced value.
#[derive(Clone)]
pub(crate) struct Target {
    anchor: Anchor,
    path: Vec<Arc<dyn Projection>>,
}

impl Target {
    fn new(anchor: Anchor) -> Self {
        Self {
            anchor,
            path: Vec::new(),
        }
    }

    /// The same root, one projection deeper.
    pub(crate) fn join(&self, step: Arc<dyn Projection>) -> Target {
        let mut path = self.path.clone();
        path.push(step);
        Target {
            anchor: self.anchor.clone(),
            path,
        }
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&dyn Any) -> R) -> Result<R, AccessError> {
        let cell = self.anchor.upgrade()?;
        let guard = cell.try_borrow().map_err(|_| AccessError::Borrowed)?;
        let mut current: &dyn Any = &*guard;
        for step in &self.path {
            current = step.project(current).ok_or(AccessError::Mismatch)?;
        }
        let out = f(current);
        Ok(out)
    }

    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut dyn Any) -> R) -> Result<R, AccessError> {
        let cell = self.anchor.upgrade()?;
        let mut guard = cell.try_borrow_mut().map_err(|_| AccessError::Borrowed)?;
        let mut current: &mut dyn Any = &mut *guard;
        for step in &self.path {
            current = step.project_mut(current).ok_or(AccessError::ReadOnly)?;
        }
        let out = f(current);
        Ok(out)
    }

    pub(crate) fn read_as<F: Any, R>(&self, f: impl FnOnce(&F) -> R) -> Result<R, AccessError> {
        self.read(|any| any.downcast_ref::<F>().map(f))?
            .ok_or(AccessError::Mismatch)
    }

    pub(crate) fn write_as<F: Any, R>(
        &self,
        f: impl FnOnce(&mut F) -> R,
    ) -> Result<R, AccessError> {
        self.write(|any| any.downcast_mut::<F>().map(f))?
            .ok_or(AccessError::Mismatch)
    }

    /// Address of the referenced value; stable while the root is alive.
    pub(crate) fn address(&self) -> Result<usize, AccessError> {
        self.read(|any| std::ptr::from_ref(any).cast::<()>().addr())
    }
}

/// A native `T` exposed to Lua, with constness `C`.
pub struct Handle<T, C = Mutable> {
    target: Target,
    _marker: PhantomData<fn() -> (T, C)>,
}

impl<T, C> Clone for Handle<T, C> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Any, C: Constness> Handle<T, C> {
    /// A handle owning its own copy of `value`.
    pub fn copy(value: T) -> Self {
        Self::from_target(Target::new(Anchor::Owned(Rc::new(RefCell::new(value)))))
    }

    /// A handle sharing ownership of `value` with the host.
    pub fn shared(value: &Rc<RefCell<T>>) -> Self {
        let rc: Rc<Cell> = Rc::clone(value) as Rc<Cell>;
        Self::from_target(Target::new(Anchor::Shared(rc)))
    }

    /// A non-owning handle; the host keeps `value` alive.
    pub fn pointer(value: &Rc<RefCell<T>>) -> Self {
        let weak: Weak<Cell> = Rc::downgrade(value) as Weak<Cell>;
        Self::from_target(Target::new(Anchor::Pointer(weak)))
    }

    pub(crate) fn from_target(target: Target) -> Self {
        Self {
            target,
            _marker: PhantomData,
        }
    }

    pub fn ownership(&self) -> Ownership {
        self.target.anchor.ownership()
    }

    pub fn is_const(&self) -> bool {
        C::IS_CONST
    }

    /// Whether the referenced object is still alive.
    pub fn is_alive(&self) -> bool {
        self.target.anchor.upgrade().is_ok()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R, AccessError> {
        self.target.read_as(f)
    }

    /// A clone of the referenced value.
    pub fn get(&self) -> Result<T, AccessError>
    where
        T: Clone,
    {
        self.with(T::clone)
    }

    pub fn address(&self) -> Result<usize, AccessError> {
        self.target.address()
    }

    /// Whether both handles reach the same object.
    pub fn same_object<D: Constness>(&self, other: &Handle<T, D>) -> bool {
        matches!((self.address(), other.address()), (Ok(a), Ok(b)) if a == b)
    }

    /// The same object seen read-only.
    pub fn to_const(&self) -> Handle<T, Const> {
        Handle::from_target(self.target.clone())
    }

    fn index(&self, lua: &Lua, key: &str) -> mlua::Result<Value> {
        self.member(lua, key)?.get(lua, &self.target, C::IS_CONST)
    }

    fn new_index(&self, lua: &Lua, key: &str, value: Value) -> mlua::Result<()> {
        let member = self.member(lua, key)?;
        if C::IS_CONST {
            return Err(mlua::Error::runtime(format!(
                "can't assign {}.{key} through a const object",
                type_label::<T>()
            )));
        }
        member.set(lua, &self.target, value)
    }

    fn member(&self, lua: &Lua, key: &str) -> mlua::Result<Arc<dyn Accessor>> {
        registry_of(lua)
            .and_then(|registry| registry.accessor::<T>(key))
            .ok_or_else(|| {
                mlua::Error::runtime(format!("member not found: {}.{key}", type_label::<T>()))
            })
    }

    fn equals(&self, other: &AnyUserData) -> bool {
        if let Ok(other) = other.borrow::<Handle<T, Mutable>>() {
            return self.same_object(&*other);
        }
        if let Ok(other) = other.borrow::<Handle<T, Const>>() {
            return self.same_object(&*other);
        }
        false
    }
}

impl<T: Any> Handle<T, Mutable> {
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R, AccessError> {
        self.target.write_as(f)
    }

    pub fn set(&self, value: T) -> Result<(), AccessError> {
        self.with_mut(|slot| *slot = value)
    }
}

impl<T: Any, C: Constness> fmt::Debug for Handle<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("type", &type_label::<T>())
            .field("const", &C::IS_CONST)
            .field("ownership", &self.ownership())
            .field("depth", &self.target.path.len())
            .finish_non_exhaustive()
    }
}

impl<T: Any, C: Constness> fmt::Display for Handle<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let qualifier = if C::IS_CONST { "const " } else { "" };
        let label = type_label::<T>();
        let ownership = self.ownership();
        match self.address() {
            Ok(addr) => write!(f, "{qualifier}{label}({ownership}): {addr:#x}"),
            Err(err) => write!(f, "{qualifier}{label}({ownership}): {err}"),
        }
    }
}

impl<T: Any, C: Constness> UserData for Handle<T, C> {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_meta_method(MetaMethod::Index, |lua, this, key: mlua::String| {
            let key = key.to_str()?;
            this.index(lua, &key)
        });
        methods.add_meta_method(
            MetaMethod::NewIndex,
            |lua, this, (key, value): (mlua::String, Value)| {
                let key = key.to_str()?;
                this.new_index(lua, &key, value)
            },
        );
        methods.add_meta_method(MetaMethod::Eq, |_, this, other: AnyUserData| {
            Ok(this.equals(&other))
        });
        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| Ok(this.to_string()));
    }
}

impl<T: Any, C: Constness> Push for Handle<T, C> {
    fn to_lua_value(&self, lua: &Lua) -> mlua::Result<Value> {
        lua.create_userdata(self.clone()).map(Value::UserData)
    }
}

/// Accepts userdata created from a handle of the same type. A const handle
/// also accepts a mutable one.
impl<T: Any, C: Constness> Convert for Handle<T, C> {
    fn type_name() -> Cow<'static, str> {
        let qualifier = if C::IS_CONST { "const " } else { "" };
        Cow::Owned(format!("{qualifier}{}", type_label::<T>()))
    }

    fn read(_: &Lua, value: &Value, log: bool) -> Outcome<Self> {
        let Value::UserData(ud) = value else {
            return if value.is_nil() {
                Outcome::Nil
            } else {
                fail(value, log)
            };
        };
        if let Ok(handle) = ud.borrow::<Handle<T, C>>() {
            return Outcome::Done((*handle).clone());
        }
        match ud.borrow::<Handle<T, Mutable>>() {
            Ok(handle) if C::IS_CONST => Outcome::Done(Handle::from_target(handle.target.clone())),
            _ => fail(value, log),
        }
    }
}

/// Short name of `T` for messages: `my_crate::geo::Point` becomes `Point`.
pub(crate) fn type_label<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    if full.contains('<') {
        return full;
    }
    full.rsplit("::").next().unwrap_or(full)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Point {
        x: i32,
    }

    #[test]
    fn test_copy_is_detached() {
        let p = Point { x: 1 };
        let h: Handle<Point> = Handle::copy(p.clone());
        h.set(Point { x: 2 }).unwrap();
        assert_eq!(p.x, 1);
        assert_eq!(h.get().unwrap().x, 2);
        assert_eq!(h.ownership(), Ownership::Copy);
    }

    #[test]
    fn test_shared_sees_host_changes() {
        let rc = Rc::new(RefCell::new(Point { x: 1 }));
        let h: Handle<Point> = Handle::shared(&rc);
        rc.borrow_mut().x = 9;
        assert_eq!(h.get().unwrap().x, 9);
        drop(rc);
        assert!(h.is_alive());
    }

    #[test]
    fn test_pointer_dangles_after_drop() {
        let rc = Rc::new(RefCell::new(Point { x: 1 }));
        let h: Handle<Point, Const> = Handle::pointer(&rc);
        assert!(h.is_const());
        assert_eq!(h.with(|p| p.x).unwrap(), 1);
        drop(rc);
        assert_eq!(h.get().unwrap_err(), AccessError::Dangling);
    }

    #[test]
    fn test_same_object_across_constness() {
        let rc = Rc::new(RefCell::new(Point { x: 1 }));
        let a: Handle<Point> = Handle::pointer(&rc);
        let b = a.to_const();
        let c: Handle<Point> = Handle::shared(&rc);
        let d: Handle<Point> = Handle::copy(Point { x: 1 });
        assert!(a.same_object(&b));
        assert!(b.same_object(&c));
        assert!(!a.same_object(&d));
    }

    #[test]
    fn test_borrow_conflict_is_reported() {
        let rc = Rc::new(RefCell::new(Point { x: 1 }));
        let h: Handle<Point> = Handle::shared(&rc);
        let _guard = rc.borrow_mut();
        assert_eq!(h.get().unwrap_err(), AccessError::Borrowed);
    }

    #[test]
    fn test_type_label() {
        assert_eq!(type_label::<Point>(), "Point");
        assert_eq!(type_label::<i32>(), "i32");
    }
}
