//! Packed per-kind component storage.
//!
//! One pool per registered component kind: a dense `components` array with a
//! parallel `owners` array, plus a sparse slot array indexed by entity id.
//! Add appends, remove swap-removes and patches the sparse entries (its own
//! and the registry's mirror row) for the element that moved. The pool never
//! has holes: `slots[owners[i]] == i` for every dense index.

use std::any::Any;

use crate::component::{Component, KindId};
use crate::entity::{Entity, EntityRegistry, ABSENT};

pub(crate) struct ComponentPool<T: Component> {
    kind: KindId,
    components: Vec<T>,
    owners: Vec<Entity>,
    /// Sparse: entity id -> dense slot, or ABSENT.
    slots: Vec<u32>,
}

impl<T: Component> ComponentPool<T> {
    pub(crate) fn new(kind: KindId, capacity: usize) -> Self {
        Self {
            kind,
            components: Vec::with_capacity(capacity),
            owners: Vec::with_capacity(capacity),
            slots: Vec::new(),
        }
    }

    #[inline]
    pub(crate) fn slot_of(&self, entity: Entity) -> Option<usize> {
        match self.slots.get(entity.idx()) {
            Some(&slot) if slot != ABSENT => Some(slot as usize),
            _ => None,
        }
    }

    /// Append a component for `entity` and run its `on_add` hook.
    /// Caller guarantees the entity does not already have this kind.
    pub(crate) fn insert(&mut self, entity: Entity, value: T) -> u32 {
        debug_assert!(self.slot_of(entity).is_none());
        let slot = self.components.len();
        self.components.push(value);
        self.owners.push(entity);
        if entity.idx() >= self.slots.len() {
            self.slots.resize(entity.idx() + 1, ABSENT);
        }
        self.slots[entity.idx()] = slot as u32;
        self.components[slot].on_add(entity);
        slot as u32
    }

    pub(crate) fn get(&self, entity: Entity) -> Option<&T> {
        self.slot_of(entity).map(|slot| &self.components[slot])
    }

    pub(crate) fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        self.slot_of(entity).map(|slot| &mut self.components[slot])
    }

    pub(crate) fn get_slot_mut(&mut self, slot: u32) -> &mut T {
        &mut self.components[slot as usize]
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.owners.iter().copied().zip(self.components.iter())
    }
}

/// Type-erased pool surface: what the destroy cascade and group seeding need
/// without knowing the component type. Hooks still dispatch statically inside
/// the impl.
pub(crate) trait AnyPool {
    /// Teardown hook + swap-remove + sparse fixup for the moved owner.
    /// No-op returning false when the entity has no component of this kind.
    fn remove(&mut self, entity: Entity, registry: &mut EntityRegistry) -> bool;

    fn len(&self) -> usize;

    /// Dense owner list, parallel to the component array.
    fn owners(&self) -> &[Entity];

    /// Debug aid: verify packing and the registry mirror.
    fn validate(&self, registry: &EntityRegistry) -> Result<(), String>;

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> AnyPool for ComponentPool<T> {
    fn remove(&mut self, entity: Entity, registry: &mut EntityRegistry) -> bool {
        let Some(slot) = self.slot_of(entity) else {
            return false;
        };

        self.components[slot].on_remove(entity);

        self.components.swap_remove(slot);
        self.owners.swap_remove(slot);
        if slot < self.owners.len() {
            // The former last element now lives at `slot`; repoint both
            // sparse views at it.
            let moved = self.owners[slot];
            self.slots[moved.idx()] = slot as u32;
            registry.set_slot(moved, self.kind, slot as u32);
        }
        self.slots[entity.idx()] = ABSENT;
        registry.clear_slot(entity, self.kind);
        true
    }

    fn len(&self) -> usize {
        self.components.len()
    }

    fn owners(&self) -> &[Entity] {
        &self.owners
    }

    fn validate(&self, registry: &EntityRegistry) -> Result<(), String> {
        for (i, &owner) in self.owners.iter().enumerate() {
            if self.slot_of(owner) != Some(i) {
                return Err(format!(
                    "pool kind {}: owners[{i}] = {owner} but sparse slot is {:?}",
                    self.kind.raw(),
                    self.slot_of(owner)
                ));
            }
            if registry.slot(owner, self.kind) != i as u32 {
                return Err(format!(
                    "pool kind {}: registry row for {owner} disagrees with slot {i}",
                    self.kind.raw()
                ));
            }
        }
        let present = self
            .slots
            .iter()
            .filter(|&&slot| slot != ABSENT)
            .count();
        if present != self.owners.len() {
            return Err(format!(
                "pool kind {}: {present} sparse entries for {} dense elements",
                self.kind.raw(),
                self.owners.len()
            ));
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
