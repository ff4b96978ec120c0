//! Incrementally maintained multi-kind entity sets.
//!
//! A group tracks every entity that currently carries all of a fixed list of
//! component kinds. Membership follows a three-state machine per entity:
//!
//! - absent -> pending: an attach completed the required set; the entity is
//!   queued, not yet a member.
//! - pending -> active: promotion, which re-verifies the entity still has
//!   every required kind. Runs only at controlled points (tick start,
//!   `World::process` entry), never mid-iteration.
//! - active -> absent: immediately, inside the detach/destroy call, in any
//!   tick phase. A system must never be handed an evicted member; a newly
//!   eligible one can wait a tick.
//!
//! The membership log records promote/evict transitions for subscribers
//! (scheduled systems) that mirror the member set into their own caches.
//! Events are retained only while at least one cursor is registered and are
//! dropped as soon as every cursor has consumed them.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;

use crate::component::KindId;
use crate::entity::{Entity, EntityRegistry};

/// Handle to a group owned by a [`World`](crate::World).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(u32);

impl GroupId {
    pub(crate) fn new(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A membership transition, in the order it happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MembershipEvent {
    Promoted(Entity),
    Evicted(Entity),
}

/// Subscriber handle into a group's membership log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CursorId(u32);

/// Sequence-numbered transition log with per-subscriber read positions.
#[derive(Default)]
pub(crate) struct MembershipLog {
    events: VecDeque<MembershipEvent>,
    /// Sequence number of `events.front()`.
    base: u64,
    cursors: Vec<(CursorId, u64)>,
    next_cursor: u32,
}

impl MembershipLog {
    fn record(&mut self, event: MembershipEvent) {
        // Nobody listening, nothing to retain.
        if self.cursors.is_empty() {
            return;
        }
        self.events.push_back(event);
    }

    /// New cursors start at the end of the log: a subscriber seeds its cache
    /// from the current member set and only wants transitions after that.
    pub(crate) fn register_cursor(&mut self) -> CursorId {
        let id = CursorId(self.next_cursor);
        self.next_cursor += 1;
        self.cursors.push((id, self.base + self.events.len() as u64));
        id
    }

    /// Deterministic unsubscription: after this returns, the cursor receives
    /// nothing further, including events already recorded.
    pub(crate) fn remove_cursor(&mut self, cursor: CursorId) -> bool {
        let before = self.cursors.len();
        self.cursors.retain(|(id, _)| *id != cursor);
        let removed = self.cursors.len() != before;
        if removed {
            self.compact();
        }
        removed
    }

    /// Return all events the cursor has not seen and advance it past them.
    pub(crate) fn drain(&mut self, cursor: CursorId) -> Vec<MembershipEvent> {
        let end = self.base + self.events.len() as u64;
        let Some(entry) = self.cursors.iter_mut().find(|(id, _)| *id == cursor) else {
            return Vec::new();
        };
        let start = (entry.1 - self.base) as usize;
        entry.1 = end;
        let out: Vec<MembershipEvent> = self.events.iter().skip(start).copied().collect();
        self.compact();
        out
    }

    /// Drop events every remaining cursor has consumed.
    fn compact(&mut self) {
        let min = match self.cursors.iter().map(|(_, pos)| *pos).min() {
            Some(min) => min,
            None => {
                self.base += self.events.len() as u64;
                self.events.clear();
                return;
            }
        };
        while self.base < min {
            self.events.pop_front();
            self.base += 1;
        }
    }

    #[cfg(test)]
    pub(crate) fn retained(&self) -> usize {
        self.events.len()
    }
}

pub(crate) struct GroupState {
    /// Required kinds, sorted and deduped.
    kinds: Box<[KindId]>,
    /// Active members, packed.
    dense: Vec<Entity>,
    /// Entity id -> dense index.
    index: FxHashMap<u32, usize>,
    /// Entities that became eligible but are not yet promoted.
    pending: VecDeque<Entity>,
    pub(crate) log: MembershipLog,
}

impl GroupState {
    pub(crate) fn new(kinds: Box<[KindId]>) -> Self {
        Self {
            kinds,
            dense: Vec::new(),
            index: FxHashMap::default(),
            pending: VecDeque::new(),
            log: MembershipLog::default(),
        }
    }

    #[inline]
    pub(crate) fn kinds(&self) -> &[KindId] {
        &self.kinds
    }

    #[inline]
    pub(crate) fn contains(&self, entity: Entity) -> bool {
        self.index.contains_key(&entity.id())
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.dense.len()
    }

    pub(crate) fn members(&self) -> &[Entity] {
        &self.dense
    }

    #[cfg(test)]
    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn insert(&mut self, entity: Entity) {
        self.index.insert(entity.id(), self.dense.len());
        self.dense.push(entity);
    }

    /// Construction-time seeding: straight to active, no pending phase.
    pub(crate) fn seed(&mut self, entity: Entity) {
        debug_assert!(!self.contains(entity));
        self.insert(entity);
    }

    /// An attach just completed the required set for this entity.
    pub(crate) fn enqueue(&mut self, entity: Entity) {
        // Members cannot receive a completing attach, but a pending entity
        // that lost and regained a kind can be queued twice; promotion
        // re-checks either way.
        if self.contains(entity) {
            return;
        }
        self.pending.push_back(entity);
    }

    /// Promotion point: drain the pending queue, re-verify each entity still
    /// has every required kind, and move survivors into the active set.
    pub(crate) fn promote(&mut self, registry: &EntityRegistry) -> usize {
        let mut promoted = 0;
        while let Some(entity) = self.pending.pop_front() {
            if self.contains(entity) || !registry.has_all(entity, &self.kinds) {
                continue;
            }
            self.insert(entity);
            self.log.record(MembershipEvent::Promoted(entity));
            promoted += 1;
        }
        promoted
    }

    /// Synchronous eviction on removal of any required kind.
    pub(crate) fn evict(&mut self, entity: Entity) -> bool {
        let Some(slot) = self.index.remove(&entity.id()) else {
            return false;
        };
        self.dense.swap_remove(slot);
        if slot < self.dense.len() {
            self.index.insert(self.dense[slot].id(), slot);
        }
        self.log.record(MembershipEvent::Evicted(entity));
        true
    }
}
