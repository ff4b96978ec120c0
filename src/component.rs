//! Component trait and kind registration.
//!
//! Every component kind is assigned a dense integer id the first time it is
//! registered with a world. All later per-kind work (presence rows, pool
//! lookup, group specs) indexes by that id; the TypeId map below is consulted
//! only inside `register`, never on a frame path.

use std::any::TypeId;
use std::marker::PhantomData;

use rustc_hash::FxHashMap;

use crate::entity::Entity;

/// A data record attached to exactly one entity.
///
/// `on_add` runs right after the component is placed in its pool, `on_remove`
/// right before it is taken out (including the destroy cascade). Both default
/// to no-ops. Dispatch is static: each pool is homogeneous in its component
/// type, so these never go through a vtable.
pub trait Component: Default + 'static {
    fn on_add(&mut self, _entity: Entity) {}
    fn on_remove(&mut self, _entity: Entity) {}
}

/// Stable integer id of a registered component kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KindId(u16);

impl KindId {
    pub(crate) fn new(index: u16) -> Self {
        Self(index)
    }

    #[inline]
    pub fn raw(self) -> u16 {
        self.0
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Typed registration token for a component kind.
///
/// Obtained from [`World::register`](crate::World::register); carries the
/// kind id plus the component type, so typed pool access needs no runtime
/// type lookup. Copyable; hand it to whatever code touches the kind.
pub struct Kind<T: Component> {
    id: KindId,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Component> Kind<T> {
    pub(crate) fn new(id: KindId) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn id(self) -> KindId {
        self.id
    }
}

impl<T: Component> Clone for Kind<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: Component> Copy for Kind<T> {}

impl<T: Component> std::fmt::Debug for Kind<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Kind<{}>({})", std::any::type_name::<T>(), self.id.raw())
    }
}

/// Registration bookkeeping: TypeId → kind id, plus a name per kind for
/// diagnostics.
#[derive(Default)]
pub(crate) struct KindTable {
    by_type: FxHashMap<TypeId, KindId>,
    names: Vec<&'static str>,
}

impl KindTable {
    /// Returns the existing id for `T`, or assigns the next one.
    /// The bool is true when this call performed the registration.
    pub(crate) fn register<T: Component>(&mut self) -> (KindId, bool) {
        if let Some(&id) = self.by_type.get(&TypeId::of::<T>()) {
            return (id, false);
        }
        let id = KindId::new(self.names.len() as u16);
        self.by_type.insert(TypeId::of::<T>(), id);
        self.names.push(std::any::type_name::<T>());
        (id, true)
    }

    pub(crate) fn len(&self) -> usize {
        self.names.len()
    }

    pub(crate) fn name(&self, kind: KindId) -> Option<&'static str> {
        self.names.get(kind.index()).copied()
    }
}
