use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use asteroids::{Asteroid, ControlFlags, Entity, Spaceship, WorldState};
use glam::Vec2;
use rand::Rng;

const STEER_INTERVAL: Duration = Duration::from_millis(33);
const AIM_TOLERANCE: f32 = 0.25;
const TURN_DEADBAND: f32 = 0.05;
const CRUISE_DISTANCE: f32 = 300.0;

/// Picks controls that turn the ship towards the nearest asteroid and fire
/// once it is roughly lined up.
pub fn steer(ship: &Spaceship, asteroids: &[Asteroid]) -> ControlFlags {
    let position = ship.position();
    let Some(target) = asteroids
        .iter()
        .map(|asteroid| asteroid.position())
        .min_by(|a, b| {
            a.distance_squared(position)
                .total_cmp(&b.distance_squared(position))
        })
    else {
        return ControlFlags::empty();
    };

    let offset = target - position;
    let diff = angle_between(ship.direction(), bearing(offset));

    let mut controls = ControlFlags::empty();
    if diff > TURN_DEADBAND {
        controls |= ControlFlags::TURN_RIGHT;
    } else if diff < -TURN_DEADBAND {
        controls |= ControlFlags::TURN_LEFT;
    }
    if diff.abs() < AIM_TOLERANCE {
        controls |= ControlFlags::FIRE;
        if offset.length() > CRUISE_DISTANCE {
            controls |= ControlFlags::ACCELERATE;
        }
    }
    controls
}

/// Heading that points along `offset`, 0 being up.
fn bearing(offset: Vec2) -> f32 {
    offset.x.atan2(-offset.y)
}

/// Signed shortest rotation from `from` to `to`.
fn angle_between(from: f32, to: f32) -> f32 {
    use std::f32::consts::{PI, TAU};
    (to - from + PI).rem_euclid(TAU) - PI
}

/// Flies the local ship until the world stops running. With `jitter` the
/// ship sometimes thrusts at random.
pub fn spawn(world: Arc<WorldState>, jitter: bool) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("autopilot".to_string())
        .spawn(move || {
            let mut rng = rand::rng();
            loop {
                thread::sleep(STEER_INTERVAL);
                if !world.is_running() {
                    break;
                }
                let Some(ship) = world.local_ship() else {
                    continue;
                };

                let mut controls = steer(&ship, &world.asteroids());
                if jitter && rng.random_bool(0.05) {
                    controls |= ControlFlags::ACCELERATE;
                }
                for flag in ControlFlags::all().iter() {
                    world.controls().set(flag, controls.contains(flag));
                }
            }
            world.controls().clear();
        })
}
