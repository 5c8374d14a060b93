mod asteroid;
mod bullet;
mod spaceship;

pub use asteroid::{Asteroid, AsteroidSize};
pub use bullet::{Bullet, BULLET_LIFETIME, BULLET_RADIUS};
pub use spaceship::{
    ControlFlags, ShipControls, Spaceship, FIRE_COOLDOWN, FIRE_IMMUNITY, MUZZLE_SPEED,
    PALETTE, SHIP_RADIUS, SPAWN_IMMUNITY,
};

use glam::Vec2;

use crate::geometry;

/// Motion state every entity carries.
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub position: Vec2,
    pub velocity: Vec2,
    pub steps_until_collision: u32,
    pub destroyed: bool,
}

impl Body {
    pub fn new(position: Vec2, velocity: Vec2) -> Self {
        Self {
            position,
            velocity,
            steps_until_collision: 0,
            destroyed: false,
        }
    }

    pub fn with_immunity(mut self, steps: u32) -> Self {
        self.steps_until_collision = steps;
        self
    }

    /// Drift by one tick and count the immunity down.
    pub fn step(&mut self) {
        self.position = geometry::wrap(self.position + self.velocity);
        self.steps_until_collision = self.steps_until_collision.saturating_sub(1);
    }
}

pub trait Entity {
    fn body(&self) -> &Body;

    fn body_mut(&mut self) -> &mut Body;

    fn radius(&self) -> f32;

    /// Applies one tick of this entity's physics rule.
    fn advance(&mut self);

    fn position(&self) -> Vec2 {
        self.body().position
    }

    fn velocity(&self) -> Vec2 {
        self.body().velocity
    }

    fn is_destroyed(&self) -> bool {
        self.body().destroyed
    }

    fn destroy(&mut self) {
        self.body_mut().destroyed = true;
    }

    fn can_collide(&self) -> bool {
        let body = self.body();
        !body.destroyed && body.steps_until_collision == 0
    }

    fn collides_with<E: Entity + ?Sized>(&self, other: &E) -> bool {
        if !self.can_collide() || !other.can_collide() {
            return false;
        }
        let reach = self.radius() + other.radius();
        self.position().distance_squared(other.position()) < reach * reach
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collision_requires_overlap() {
        let a = Asteroid::new(Vec2::new(100.0, 100.0), Vec2::ZERO, AsteroidSize::Small, 0.0);
        let near = Bullet::new(Vec2::new(105.0, 100.0), Vec2::ZERO).armed();
        let far = Bullet::new(Vec2::new(150.0, 100.0), Vec2::ZERO).armed();

        assert!(a.collides_with(&near));
        assert!(!a.collides_with(&far));
    }

    #[test]
    fn test_immune_entities_never_collide() {
        let mut ship = Spaceship::new("a", "pilot");
        ship.body_mut().position = Vec2::new(200.0, 200.0);
        assert!(ship.body().steps_until_collision > 0);

        let rock = Asteroid::new(Vec2::new(200.0, 200.0), Vec2::ZERO, AsteroidSize::Large, 0.0);
        assert!(!ship.collides_with(&rock));
        assert!(!rock.collides_with(&ship));

        ship.body_mut().steps_until_collision = 0;
        assert!(ship.collides_with(&rock));
    }

    #[test]
    fn test_destroyed_entities_never_collide() {
        let mut rock = Asteroid::new(Vec2::new(50.0, 50.0), Vec2::ZERO, AsteroidSize::Medium, 0.0);
        let bullet = Bullet::new(Vec2::new(50.0, 50.0), Vec2::ZERO).armed();
        rock.destroy();
        assert!(!rock.collides_with(&bullet));
    }

    #[test]
    fn test_body_step_wraps_and_counts_down() {
        let mut body = Body::new(Vec2::new(799.0, 1.0), Vec2::new(2.0, -2.0)).with_immunity(2);
        body.step();
        assert!((body.position.x - 1.0).abs() < 1e-3);
        assert!((body.position.y - 799.0).abs() < 1e-3);
        assert_eq!(body.steps_until_collision, 1);
        body.step();
        body.step();
        assert_eq!(body.steps_until_collision, 0);
    }
}
