use glam::Vec2;

use super::{Body, Entity};

pub const BULLET_RADIUS: f32 = 2.0;

/// Steps a bullet lives for.
pub const BULLET_LIFETIME: u32 = 60;

/// Leading steps of a bullet's life during which it cannot hit anything.
const ARMING_STEPS: u32 = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct Bullet {
    body: Body,
    steps_left: u32,
    owner: Option<String>,
}

impl Bullet {
    pub fn new(position: Vec2, velocity: Vec2) -> Self {
        Self {
            body: Body::new(position, velocity),
            steps_left: BULLET_LIFETIME,
            owner: None,
        }
    }

    /// Rebuilds a bullet reported by a peer. Remote bullets are not moved
    /// locally, so only position and remaining steps matter.
    pub fn remote(position: Vec2, steps_left: u32, owner: Option<String>) -> Self {
        Self {
            body: Body::new(position, Vec2::ZERO),
            steps_left: steps_left.min(BULLET_LIFETIME),
            owner,
        }
    }

    pub fn steps_left(&self) -> u32 {
        self.steps_left
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn is_expired(&self) -> bool {
        self.steps_left == 0
    }
}

impl Entity for Bullet {
    fn body(&self) -> &Body {
        &self.body
    }

    fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    fn radius(&self) -> f32 {
        BULLET_RADIUS
    }

    fn advance(&mut self) {
        self.body.step();
        self.steps_left = self.steps_left.saturating_sub(1);
        if self.steps_left == 0 {
            self.body.destroyed = true;
        }
    }

    fn can_collide(&self) -> bool {
        !self.body.destroyed && self.steps_left + ARMING_STEPS <= BULLET_LIFETIME
    }
}

#[cfg(test)]
impl Bullet {
    pub(crate) fn armed(mut self) -> Self {
        self.steps_left = BULLET_LIFETIME - ARMING_STEPS;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_bullet_is_immune() {
        let mut bullet = Bullet::new(Vec2::new(10.0, 10.0), Vec2::new(1.0, 0.0));
        assert!(!bullet.can_collide());
        for _ in 0..ARMING_STEPS {
            bullet.advance();
        }
        assert!(bullet.can_collide());
    }

    #[test]
    fn test_bullet_expires_after_lifetime() {
        let mut bullet = Bullet::new(Vec2::new(10.0, 10.0), Vec2::new(1.0, 0.0));
        for _ in 0..BULLET_LIFETIME - 1 {
            bullet.advance();
        }
        assert!(!bullet.is_destroyed());
        bullet.advance();
        assert!(bullet.is_destroyed());
        assert!(bullet.is_expired());
    }

    #[test]
    fn test_remote_bullet_keeps_owner() {
        let bullet = Bullet::remote(Vec2::new(3.0, 4.0), 500, Some("peer".into()));
        assert_eq!(bullet.owner(), Some("peer"));
        assert_eq!(bullet.steps_left(), BULLET_LIFETIME);
    }
}
