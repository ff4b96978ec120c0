//! Systems and the tick schedule.
//!
//! A system binds to one group. While scheduled and active it keeps a
//! processor cache (a packed copy of the group's member list plus a side
//! index) maintained by draining the group's membership log at the start of
//! every tick (append on promotion, swap-remove on eviction). The cache is
//! rebuilt by full rescan only on (re)activation.
//!
//! The external driver calls [`Schedule::run`] once per phase per frame.
//! During a pass the cache itself is never mutated; entities evicted by a
//! callback are filtered by a per-step membership check against the group,
//! and the eviction reaches the cache through the log on the next tick.

use rustc_hash::FxHashMap;

use crate::entity::Entity;
use crate::group::{CursorId, GroupId, MembershipEvent};
use crate::world::World;

/// Tick phases the external scheduler drives, in the frame order it chooses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Update,
    FixedUpdate,
}

/// Per-tick query executor over one group.
///
/// Implement the hook for each phase named by [`phases`](System::phases);
/// the others default to no-ops. Hooks receive the world back, so they may
/// attach, detach, destroy, and publish events mid-iteration.
pub trait System: 'static {
    fn name(&self) -> &str {
        "system"
    }

    /// Phases this system ticks in.
    fn phases(&self) -> &'static [Phase] {
        &[Phase::Update]
    }

    fn update(&mut self, _world: &mut World, _entity: Entity) {}

    fn fixed_update(&mut self, _world: &mut World, _entity: Entity) {}
}

/// Handle to a scheduled system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SystemId(u32);

impl SystemId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Packed mirror of a group's member list: dense entities + id side index,
/// the same sparse/dense shape the pools use.
#[derive(Default)]
struct ProcessorCache {
    dense: Vec<Entity>,
    index: FxHashMap<u32, usize>,
}

impl ProcessorCache {
    fn len(&self) -> usize {
        self.dense.len()
    }

    fn push(&mut self, entity: Entity) {
        if self.index.contains_key(&entity.id()) {
            return;
        }
        self.index.insert(entity.id(), self.dense.len());
        self.dense.push(entity);
    }

    fn remove(&mut self, entity: Entity) {
        let Some(slot) = self.index.remove(&entity.id()) else {
            return;
        };
        self.dense.swap_remove(slot);
        if slot < self.dense.len() {
            self.index.insert(self.dense[slot].id(), slot);
        }
    }

    fn clear(&mut self) {
        self.dense.clear();
        self.index.clear();
    }

    fn apply(&mut self, event: MembershipEvent) {
        match event {
            MembershipEvent::Promoted(entity) => self.push(entity),
            MembershipEvent::Evicted(entity) => self.remove(entity),
        }
    }
}

struct Entry {
    system: Box<dyn System>,
    group: GroupId,
    cursor: Option<CursorId>,
    cache: ProcessorCache,
    member_count: usize,
    active: bool,
}

/// Owns scheduled systems and drives them, in registration order, when the
/// surrounding loop calls [`run`](Schedule::run) for a phase.
#[derive(Default)]
pub struct Schedule {
    entries: Vec<Option<Entry>>,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a system over a group and activate it: the processor cache
    /// seeds from the group's current members and a membership-log cursor is
    /// registered for incremental upkeep.
    pub fn add_system<S: System>(
        &mut self,
        world: &mut World,
        system: S,
        group: GroupId,
    ) -> SystemId {
        let id = SystemId(self.entries.len() as u32);
        let mut entry = Entry {
            system: Box::new(system),
            group,
            cursor: None,
            cache: ProcessorCache::default(),
            member_count: 0,
            active: false,
        };
        Self::activate(world, &mut entry);
        log::debug!(
            "[Schedule] added '{}' with {} members",
            entry.system.name(),
            entry.member_count
        );
        self.entries.push(Some(entry));
        id
    }

    fn activate(world: &mut World, entry: &mut Entry) {
        world.promote_pending(entry.group);
        // None for a group id this world does not know; the system then
        // idles with an empty cache instead of panicking.
        entry.cursor = world.register_group_cursor(entry.group);
        entry.cache.clear();
        for &entity in world.group_members(entry.group) {
            entry.cache.push(entity);
        }
        entry.member_count = entry.cache.len();
        entry.active = true;
    }

    fn deactivate(world: &mut World, entry: &mut Entry) {
        // Symmetric to activation: dropping the cursor guarantees no further
        // membership events are delivered, or even retained, for this system.
        if let Some(cursor) = entry.cursor.take() {
            world.remove_group_cursor(entry.group, cursor);
        }
        entry.cache.clear();
        entry.member_count = 0;
        entry.active = false;
    }

    /// Activate or deactivate a scheduled system. Reactivation re-seeds the
    /// cache by full rescan, same as initial scheduling.
    pub fn set_active(&mut self, world: &mut World, id: SystemId, active: bool) -> bool {
        let Some(Some(entry)) = self.entries.get_mut(id.index()) else {
            return false;
        };
        if entry.active != active {
            if active {
                Self::activate(world, entry);
            } else {
                Self::deactivate(world, entry);
            }
            log::debug!(
                "[Schedule] '{}' {}",
                entry.system.name(),
                if active { "activated" } else { "deactivated" }
            );
        }
        true
    }

    /// Deactivate and drop a system. Its id is never reused.
    pub fn remove_system(&mut self, world: &mut World, id: SystemId) -> bool {
        let Some(slot) = self.entries.get_mut(id.index()) else {
            return false;
        };
        let Some(mut entry) = slot.take() else {
            return false;
        };
        Self::deactivate(world, &mut entry);
        true
    }

    /// Tick every active system that declares `phase`, in registration
    /// order: promote the group, drain the membership log into the cache,
    /// record the member count, then run the phase hook per cached member
    /// (skipping any the group no longer contains).
    pub fn run(&mut self, phase: Phase, world: &mut World) {
        for i in 0..self.entries.len() {
            let Some(Some(entry)) = self.entries.get_mut(i) else {
                continue;
            };
            if !entry.active || !entry.system.phases().contains(&phase) {
                continue;
            }
            let Some(cursor) = entry.cursor else {
                continue;
            };
            let group = entry.group;

            world.promote_pending(group);
            for event in world.drain_group_events(group, cursor) {
                entry.cache.apply(event);
            }
            entry.member_count = entry.cache.len();
            log::trace!(
                "[Schedule] {:?} '{}': {} members",
                phase,
                entry.system.name(),
                entry.member_count
            );

            for j in 0..entry.cache.len() {
                let entity = entry.cache.dense[j];
                if !world.group_contains(group, entity) {
                    continue;
                }
                match phase {
                    Phase::Update => entry.system.update(world, entity),
                    Phase::FixedUpdate => entry.system.fixed_update(world, entity),
                }
            }
        }
    }

    /// Ad hoc iteration over one system's cached members, outside the
    /// scheduler-driven phases. Same promote/drain/filter discipline as
    /// [`run`](Schedule::run).
    pub fn process<F>(&mut self, id: SystemId, world: &mut World, mut f: F)
    where
        F: FnMut(&mut World, Entity),
    {
        let Some(Some(entry)) = self.entries.get_mut(id.index()) else {
            return;
        };
        if !entry.active {
            return;
        }
        let Some(cursor) = entry.cursor else {
            return;
        };
        let group = entry.group;

        world.promote_pending(group);
        for event in world.drain_group_events(group, cursor) {
            entry.cache.apply(event);
        }
        entry.member_count = entry.cache.len();

        for j in 0..entry.cache.len() {
            let entity = entry.cache.dense[j];
            if !world.group_contains(group, entity) {
                continue;
            }
            f(world, entity);
        }
    }

    /// Member count recorded at the system's last tick (diagnostic).
    pub fn member_count(&self, id: SystemId) -> usize {
        match self.entries.get(id.index()) {
            Some(Some(entry)) => entry.member_count,
            _ => 0,
        }
    }

    pub fn is_active(&self, id: SystemId) -> bool {
        matches!(self.entries.get(id.index()), Some(Some(entry)) if entry.active)
    }
}
