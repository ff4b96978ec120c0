//! pulse-ecs: a sparse-set entity component system with incremental groups.
//!
//! The crate is organized around a single [`World`] context object:
//!
//! - [`entity`]: entity ids, recycling, and the presence table
//! - [`component`]: the [`Component`] trait and kind registration
//! - [`group`]: incremental multi-kind membership with deferred additions
//! - [`system`]: the [`Schedule`], tick phases, and processor caches
//! - [`event`]: a typed publish/subscribe bus owned by the world
//! - [`config`]: capacity tuning loaded from TOML
//!
//! Component removal takes effect everywhere immediately; component addition
//! reaches groups, and therefore systems, at the next tick boundary. See the
//! module docs on [`group`] for why the two directions differ.
//!
//! ```
//! use pulse_ecs::{Component, World};
//!
//! #[derive(Default)]
//! struct Health(u32);
//! impl Component for Health {}
//!
//! let mut world = World::new();
//! let health = world.register::<Health>();
//! let e = world.spawn().with_value(health, Health(100)).build();
//! assert_eq!(world.get(health, e).map(|h| h.0), Some(100));
//! ```

pub mod component;
pub mod config;
pub mod entity;
pub mod error;
pub mod event;
pub mod group;
pub mod system;
pub mod world;

mod pool;

pub use component::{Component, Kind, KindId};
pub use config::WorldConfig;
pub use entity::Entity;
pub use error::{EcsError, EcsResult};
pub use event::{EventBus, SubscriptionId};
pub use group::GroupId;
pub use system::{Phase, Schedule, System, SystemId};
pub use world::{EntityBuilder, World};
