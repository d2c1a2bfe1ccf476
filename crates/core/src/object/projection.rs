//! Type-erased paths from a root object to one of its fields.

use std::any::Any;
use std::marker::PhantomData;

/// One step from an owner to a field inside it.
pub(crate) trait Projection: Send + Sync {
    fn project<'a>(&self, owner: &'a dyn Any) -> Option<&'a dyn Any>;

    /// `None` when the owner has the wrong type or the step is read-only.
    fn project_mut<'a>(&self, owner: &'a mut dyn Any) -> Option<&'a mut dyn Any>;
}

/// A field reached through a pair of accessor functions.
pub(crate) struct FieldLens<O, F, G, M> {
    get: G,
    get_mut: M,
    _types: PhantomData<fn(&O) -> &F>,
}

impl<O, F, G, M> FieldLens<O, F, G, M>
where
    G: Fn(&O) -> &F,
    M: Fn(&mut O) -> &mut F,
{
    pub(crate) fn new(get: G, get_mut: M) -> Self {
        Self {
            get,
            get_mut,
            _types: PhantomData,
        }
    }
}

impl<O, F, G, M> Projection for FieldLens<O, F, G, M>
where
    O: Any,
    F: Any,
    G: Fn(&O) -> &F + Send + Sync,
    M: Fn(&mut O) -> &mut F + Send + Sync,
{
    fn project<'a>(&self, owner: &'a dyn Any) -> Option<&'a dyn Any> {
        let owner = owner.downcast_ref::<O>()?;
        Some((self.get)(owner) as &dyn Any)
    }

    fn project_mut<'a>(&self, owner: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        let owner = owner.downcast_mut::<O>()?;
        Some((self.get_mut)(owner) as &mut dyn Any)
    }
}

/// A field that can only be read.
pub(crate) struct ReadLens<O, F, G> {
    get: G,
    _types: PhantomData<fn(&O) -> &F>,
}

impl<O, F, G> ReadLens<O, F, G>
where
    G: Fn(&O) -> &F,
{
    pub(crate) fn new(get: G) -> Self {
        Self {
            get,
            _types: PhantomData,
        }
    }
}

impl<O, F, G> Projection for ReadLens<O, F, G>
where
    O: Any,
    F: Any,
    G: Fn(&O) -> &F + Send + Sync,
{
    fn project<'a>(&self, owner: &'a dyn Any) -> Option<&'a dyn Any> {
        let owner = owner.downcast_ref::<O>()?;
        Some((self.get)(owner) as &dyn Any)
    }

    fn project_mut<'a>(&self, _: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        None
    }
}
