use std::sync::atomic::{AtomicU8, Ordering};

use bitflags::bitflags;
use glam::Vec2;

use super::{Body, Bullet, Entity};
use crate::geometry::{self, PolarCoordinate, WORLD_CENTER};

pub const SHIP_RADIUS: f32 = 15.0;

/// Ticks a freshly spawned ship is protected for.
pub const SPAWN_IMMUNITY: u32 = 30;

/// Minimum protection after firing so the ship cannot run into its own shot.
pub const FIRE_IMMUNITY: u32 = 3;

pub const FIRE_COOLDOWN: u32 = 20;
pub const MUZZLE_SPEED: f32 = 15.0;

const ACCELERATION: f32 = 0.4;
const TURN_RATE: f32 = 0.04 * std::f32::consts::PI;
const DAMPING: f32 = 0.99;
const MAX_SPEED: f32 = 8.0;

/// Ship colours, handed out by participant slot.
pub const PALETTE: [[u8; 3]; 9] = [
    [64, 64, 64],
    [255, 0, 0],
    [0, 0, 255],
    [255, 200, 0],
    [0, 255, 0],
    [0, 255, 255],
    [255, 255, 255],
    [255, 0, 255],
    [255, 175, 175],
];

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ControlFlags: u8 {
        const ACCELERATE = 1 << 0;
        const TURN_LEFT = 1 << 1;
        const TURN_RIGHT = 1 << 2;
        const FIRE = 1 << 3;
    }
}

/// Input flags shared between the input collaborator and the engine.
#[derive(Debug, Default)]
pub struct ShipControls {
    bits: AtomicU8,
}

impl ShipControls {
    pub fn set(&self, flag: ControlFlags, pressed: bool) {
        if pressed {
            self.bits.fetch_or(flag.bits(), Ordering::Relaxed);
        } else {
            self.bits.fetch_and(!flag.bits(), Ordering::Relaxed);
        }
    }

    pub fn load(&self) -> ControlFlags {
        ControlFlags::from_bits_truncate(self.bits.load(Ordering::Relaxed))
    }

    pub fn clear(&self) {
        self.bits.store(0, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spaceship {
    body: Body,
    direction: f32,
    controls: ControlFlags,
    weapon_cooldown: u32,
    score: u32,
    color: [u8; 3],
    id: String,
    name: String,
}

impl Spaceship {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            body: Body::new(WORLD_CENTER, Vec2::ZERO).with_immunity(SPAWN_IMMUNITY),
            direction: 0.0,
            controls: ControlFlags::empty(),
            weapon_cooldown: 0,
            score: 0,
            color: PALETTE[0],
            id: id.into(),
            name: name.into(),
        }
    }

    /// Back to spawn state, keeping identity.
    pub fn reset(&mut self) {
        self.body = Body::new(WORLD_CENTER, Vec2::ZERO).with_immunity(SPAWN_IMMUNITY);
        self.direction = 0.0;
        self.controls = ControlFlags::empty();
        self.weapon_cooldown = 0;
        self.score = 0;
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn color(&self) -> [u8; 3] {
        self.color
    }

    pub fn set_color_slot(&mut self, slot: usize) {
        self.color = PALETTE[slot % PALETTE.len()];
    }

    pub fn direction(&self) -> f32 {
        self.direction
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn steps_until_collision(&self) -> u32 {
        self.body.steps_until_collision
    }

    pub fn weapon_cooldown(&self) -> u32 {
        self.weapon_cooldown
    }

    pub fn controls(&self) -> ControlFlags {
        self.controls
    }

    pub fn set_controls(&mut self, controls: ControlFlags) {
        self.controls = controls;
    }

    pub fn is_accelerating(&self) -> bool {
        self.controls.contains(ControlFlags::ACCELERATE)
    }

    pub fn increase_score(&mut self) -> u32 {
        self.score = self.score.saturating_add(1);
        self.score
    }

    /// Adopts an externally reported score. Scores never go down.
    pub fn update_score(&mut self, score: u32) {
        self.score = self.score.max(score);
    }

    /// Mirrors state reported by the ship's owner.
    pub fn apply_remote(
        &mut self,
        position: Vec2,
        direction: f32,
        accelerating: bool,
        steps_until_collision: u32,
    ) {
        self.body.position = position;
        self.direction = direction;
        self.body.steps_until_collision = steps_until_collision;
        self.controls.set(ControlFlags::ACCELERATE, accelerating);
    }

    pub fn can_fire(&self) -> bool {
        !self.body.destroyed
            && self.controls.contains(ControlFlags::FIRE)
            && self.weapon_cooldown == 0
    }

    /// Spawns a bullet at the ship's nose and starts the weapon cooldown.
    pub fn fire(&mut self) -> Bullet {
        let nose = PolarCoordinate::new(0.0, SHIP_RADIUS).offset_from(self.direction);
        let bullet = Bullet::new(
            geometry::wrap(self.body.position + nose),
            self.body.velocity + geometry::heading(self.direction) * MUZZLE_SPEED,
        );
        self.weapon_cooldown = FIRE_COOLDOWN;
        self.body.steps_until_collision = self.body.steps_until_collision.max(FIRE_IMMUNITY);
        bullet
    }
}

impl Entity for Spaceship {
    fn body(&self) -> &Body {
        &self.body
    }

    fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    fn radius(&self) -> f32 {
        SHIP_RADIUS
    }

    fn advance(&mut self) {
        if self.controls.contains(ControlFlags::TURN_LEFT) {
            self.direction -= TURN_RATE;
        }
        if self.controls.contains(ControlFlags::TURN_RIGHT) {
            self.direction += TURN_RATE;
        }
        self.direction = geometry::normalize_angle(self.direction);

        if self.is_accelerating() {
            self.body.velocity += geometry::heading(self.direction) * ACCELERATION;
        }
        self.body.velocity = (self.body.velocity * DAMPING).clamp_length_max(MAX_SPEED);

        self.body.step();
        self.weapon_cooldown = self.weapon_cooldown.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_state() {
        let ship = Spaceship::new("id", "pilot");
        assert_eq!(ship.position(), WORLD_CENTER);
        assert_eq!(ship.steps_until_collision(), SPAWN_IMMUNITY);
        assert_eq!(ship.score(), 0);
        assert!(!ship.is_destroyed());
    }

    #[test]
    fn test_acceleration_follows_heading_and_is_capped() {
        let mut ship = Spaceship::new("id", "pilot");
        ship.set_controls(ControlFlags::ACCELERATE);
        ship.advance();
        assert!(ship.velocity().y < 0.0);
        assert!(ship.velocity().x.abs() < 1e-5);

        for _ in 0..200 {
            ship.advance();
        }
        assert!(ship.velocity().length() <= MAX_SPEED + 1e-4);
    }

    #[test]
    fn test_turning_changes_direction() {
        let mut ship = Spaceship::new("id", "pilot");
        ship.set_controls(ControlFlags::TURN_RIGHT);
        ship.advance();
        assert!((ship.direction() - TURN_RATE).abs() < 1e-5);
    }

    #[test]
    fn test_fire_respects_cooldown() {
        let mut ship = Spaceship::new("id", "pilot");
        ship.set_controls(ControlFlags::FIRE);
        assert!(ship.can_fire());

        let bullet = ship.fire();
        assert!(!ship.can_fire());
        assert!((bullet.position() - ship.position()).length() - SHIP_RADIUS < 1e-3);
        assert!((bullet.velocity().length() - MUZZLE_SPEED).abs() < 1e-3);

        for _ in 0..FIRE_COOLDOWN {
            ship.advance();
        }
        assert!(ship.can_fire());
    }

    #[test]
    fn test_scores_do_not_decrease() {
        let mut ship = Spaceship::new("id", "pilot");
        ship.increase_score();
        ship.increase_score();
        ship.update_score(1);
        assert_eq!(ship.score(), 2);
        ship.update_score(9);
        assert_eq!(ship.score(), 9);
        ship.reset();
        assert_eq!(ship.score(), 0);
    }

    #[test]
    fn test_shared_controls() {
        let controls = ShipControls::default();
        controls.set(ControlFlags::FIRE, true);
        controls.set(ControlFlags::TURN_LEFT, true);
        controls.set(ControlFlags::FIRE, false);
        assert_eq!(controls.load(), ControlFlags::TURN_LEFT);
    }
}
