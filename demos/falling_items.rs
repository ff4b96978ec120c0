//! Falling items demo: spawns a shower of items with random velocities,
//! pulls them down with gravity on the fixed step, and despawns anything
//! that drops below the floor.
//!
//! Run with `cargo run --example falling_items`.

use anyhow::Result;
use rand::Rng;

use pulse_ecs::{Component, Entity, Kind, Phase, Schedule, System, World};

const FLOOR_Y: f32 = 0.0;
const GRAVITY: f32 = -9.81;
const FIXED_DT: f32 = 1.0 / 30.0;
const FRAMES: u32 = 120;

#[derive(Default)]
struct Position {
    x: f32,
    y: f32,
}
impl Component for Position {}

#[derive(Default)]
struct Velocity {
    dx: f32,
    dy: f32,
}
impl Component for Velocity {}

struct Gravity {
    vel: Kind<Velocity>,
}

impl System for Gravity {
    fn name(&self) -> &str {
        "gravity"
    }
    fn phases(&self) -> &'static [Phase] {
        &[Phase::FixedUpdate]
    }
    fn fixed_update(&mut self, world: &mut World, entity: Entity) {
        if let Some(vel) = world.get_mut(self.vel, entity) {
            vel.dy += GRAVITY * FIXED_DT;
        }
    }
}

struct Movement {
    pos: Kind<Position>,
    vel: Kind<Velocity>,
}

impl System for Movement {
    fn name(&self) -> &str {
        "movement"
    }
    fn update(&mut self, world: &mut World, entity: Entity) {
        let (dx, dy) = match world.get(self.vel, entity) {
            Some(vel) => (vel.dx, vel.dy),
            None => return,
        };
        if let Some(pos) = world.get_mut(self.pos, entity) {
            pos.x += dx * FIXED_DT;
            pos.y += dy * FIXED_DT;
        }
    }
}

struct FloorCull {
    pos: Kind<Position>,
    culled: u32,
}

impl System for FloorCull {
    fn name(&self) -> &str {
        "floor_cull"
    }
    fn update(&mut self, world: &mut World, entity: Entity) {
        let below = world
            .get(self.pos, entity)
            .map_or(false, |pos| pos.y < FLOOR_Y);
        if below {
            log::debug!("[demo] {entity} hit the floor");
            world.destroy(entity);
            self.culled += 1;
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let mut world = World::new();
    let pos = world.register::<Position>();
    let vel = world.register::<Velocity>();
    let moving = world.group(&[pos.id(), vel.id()])?;
    let placed = world.group(&[pos.id()])?;

    let mut rng = rand::thread_rng();
    for _ in 0..200 {
        world
            .spawn()
            .with_value(
                pos,
                Position {
                    x: rng.gen_range(-20.0..20.0),
                    y: rng.gen_range(5.0..40.0),
                },
            )
            .with_value(
                vel,
                Velocity {
                    dx: rng.gen_range(-2.0..2.0),
                    dy: rng.gen_range(-1.0..1.0),
                },
            )
            .build();
    }

    let mut schedule = Schedule::new();
    let gravity = schedule.add_system(&mut world, Gravity { vel }, moving);
    schedule.add_system(&mut world, Movement { pos, vel }, moving);
    schedule.add_system(&mut world, FloorCull { pos, culled: 0 }, placed);

    for frame in 0..FRAMES {
        schedule.run(Phase::FixedUpdate, &mut world);
        schedule.run(Phase::Update, &mut world);
        if frame % 30 == 0 {
            log::info!(
                "[demo] frame {frame}: {} falling, {} active entities",
                schedule.member_count(gravity),
                world.active_count()
            );
        }
    }

    world.validate().map_err(anyhow::Error::msg)?;
    println!(
        "simulated {FRAMES} frames: {} items still falling, {} pooled",
        world.active_count(),
        world.pooled_count()
    );
    Ok(())
}
