//! Entity identity and the registry that owns it.
//!
//! Entities are bare integer ids. Destroying an entity returns its id to a
//! free queue and a later create may hand the same id back out, so at most
//! one live entity exists per id at any time. Identity is the id alone; a
//! handle held across destroy-then-create aliases the new entity.
//!
//! The registry also owns the presence table: one fixed-width row per entity
//! id, one column per registered component kind, holding that entity's pool
//! slot for the kind (or [`ABSENT`]). The table mirrors the pools' own sparse
//! arrays so multi-kind `has_all` checks are a single row scan.

use std::collections::VecDeque;

use crate::component::KindId;

/// Sentinel slot value meaning "entity has no component of this kind".
pub(crate) const ABSENT: u32 = u32::MAX;

/// Lightweight entity handle. Copy, compare, and hash by id only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity(u32);

impl Entity {
    pub(crate) fn new(id: u32) -> Self {
        Self(id)
    }

    /// Raw integer id. Ids are recycled after destroy.
    #[inline]
    pub fn id(self) -> u32 {
        self.0
    }

    #[inline]
    pub(crate) fn idx(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

/// Owns entity ids, their recycling, and the presence table.
pub struct EntityRegistry {
    /// Presence rows indexed by entity id; row width == registered kind count.
    rows: Vec<Vec<u32>>,
    /// Liveness flag per id.
    active: Vec<bool>,
    /// Destroyed ids waiting for reuse, oldest first.
    pooled: VecDeque<Entity>,
    /// Current row width.
    kinds: usize,
    active_count: usize,
}

impl EntityRegistry {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            rows: Vec::with_capacity(capacity),
            active: Vec::with_capacity(capacity),
            pooled: VecDeque::new(),
            kinds: 0,
            active_count: 0,
        }
    }

    /// Reuse a pooled id if one exists, otherwise mint the next fresh id.
    pub(crate) fn create(&mut self) -> Entity {
        let entity = if let Some(entity) = self.pooled.pop_front() {
            self.active[entity.idx()] = true;
            entity
        } else {
            let id = self.rows.len() as u32;
            self.rows.push(vec![ABSENT; self.kinds]);
            self.active.push(true);
            Entity::new(id)
        };
        self.active_count += 1;
        entity
    }

    /// Flip the entity to not-active. Structural cleanup happens separately;
    /// this is the part that must be observable before destroy returns.
    pub(crate) fn deactivate(&mut self, entity: Entity) -> bool {
        match self.active.get_mut(entity.idx()) {
            Some(flag) if *flag => {
                *flag = false;
                self.active_count -= 1;
                true
            }
            _ => false,
        }
    }

    /// Reset the presence row and return the id to the free queue.
    pub(crate) fn recycle(&mut self, entity: Entity) {
        self.rows[entity.idx()].fill(ABSENT);
        self.pooled.push_back(entity);
    }

    #[inline]
    pub(crate) fn is_active(&self, entity: Entity) -> bool {
        self.active.get(entity.idx()).copied().unwrap_or(false)
    }

    /// Look up the live entity with the given id, if any.
    pub(crate) fn entity(&self, id: u32) -> Option<Entity> {
        let entity = Entity::new(id);
        self.is_active(entity).then_some(entity)
    }

    /// Widen every row for newly registered kinds.
    pub(crate) fn widen_rows(&mut self, kinds: usize) {
        debug_assert!(kinds >= self.kinds);
        for row in &mut self.rows {
            row.resize(kinds, ABSENT);
        }
        self.kinds = kinds;
    }

    #[inline]
    pub(crate) fn slot(&self, entity: Entity, kind: KindId) -> u32 {
        self.rows
            .get(entity.idx())
            .map_or(ABSENT, |row| row[kind.index()])
    }

    #[inline]
    pub(crate) fn set_slot(&mut self, entity: Entity, kind: KindId, slot: u32) {
        self.rows[entity.idx()][kind.index()] = slot;
    }

    #[inline]
    pub(crate) fn clear_slot(&mut self, entity: Entity, kind: KindId) {
        self.rows[entity.idx()][kind.index()] = ABSENT;
    }

    /// O(row) check that the entity carries every listed kind.
    pub(crate) fn has_all(&self, entity: Entity, kinds: &[KindId]) -> bool {
        let Some(row) = self.rows.get(entity.idx()) else {
            return false;
        };
        kinds.iter().all(|kind| row[kind.index()] != ABSENT)
    }

    /// Every id ever issued, live or pooled.
    pub(crate) fn total_count(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn active_count(&self) -> usize {
        self.active_count
    }

    pub(crate) fn pooled_count(&self) -> usize {
        self.pooled.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_ids_are_sequential() {
        let mut registry = EntityRegistry::with_capacity(4);
        assert_eq!(registry.create().id(), 0);
        assert_eq!(registry.create().id(), 1);
        assert_eq!(registry.create().id(), 2);
        assert_eq!(registry.active_count(), 3);
    }

    #[test]
    fn destroyed_ids_are_reused() {
        let mut registry = EntityRegistry::with_capacity(4);
        let a = registry.create();
        let _b = registry.create();

        assert!(registry.deactivate(a));
        registry.recycle(a);
        assert!(!registry.is_active(a));
        assert_eq!(registry.pooled_count(), 1);

        let c = registry.create();
        assert_eq!(c.id(), a.id());
        assert!(registry.is_active(c));
        assert_eq!(registry.pooled_count(), 0);
        assert_eq!(registry.total_count(), 2);
    }

    #[test]
    fn deactivate_is_idempotent() {
        let mut registry = EntityRegistry::with_capacity(4);
        let a = registry.create();
        assert!(registry.deactivate(a));
        assert!(!registry.deactivate(a));
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn recycled_row_is_cleared() {
        let mut registry = EntityRegistry::with_capacity(4);
        registry.widen_rows(2);
        let a = registry.create();
        let kind = KindId::new(1);
        registry.set_slot(a, kind, 7);
        assert_eq!(registry.slot(a, kind), 7);

        registry.deactivate(a);
        registry.recycle(a);
        let b = registry.create();
        assert_eq!(b.id(), a.id());
        assert_eq!(registry.slot(b, kind), ABSENT);
    }

    #[test]
    fn rows_widen_for_late_registration() {
        let mut registry = EntityRegistry::with_capacity(4);
        registry.widen_rows(1);
        let a = registry.create();
        registry.set_slot(a, KindId::new(0), 3);

        registry.widen_rows(3);
        assert_eq!(registry.slot(a, KindId::new(0)), 3);
        assert_eq!(registry.slot(a, KindId::new(2)), ABSENT);
        assert!(registry.has_all(a, &[KindId::new(0)]));
        assert!(!registry.has_all(a, &[KindId::new(0), KindId::new(2)]));
    }
}
