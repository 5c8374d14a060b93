use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{Body, Entity};

/// Immunity given to freshly split fragments so siblings spawned on the same
/// point do not destroy each other.
const SUCCESSOR_IMMUNITY: u32 = 10;

/// Per-axis bound for random asteroid velocities.
const MAX_DRIFT: f32 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AsteroidSize {
    Large,
    Medium,
    Small,
}

impl AsteroidSize {
    pub const ALL: [AsteroidSize; 3] = [Self::Large, Self::Medium, Self::Small];

    pub fn radius(self) -> f32 {
        match self {
            Self::Large => 40.0,
            Self::Medium => 20.0,
            Self::Small => 10.0,
        }
    }

    pub fn successor(self) -> Option<Self> {
        match self {
            Self::Large => Some(Self::Medium),
            Self::Medium => Some(Self::Small),
            Self::Small => None,
        }
    }

    /// Maps a radius received from the wire back onto the closest size.
    pub fn from_radius(radius: f32) -> Self {
        Self::ALL
            .into_iter()
            .min_by(|a, b| {
                (a.radius() - radius)
                    .abs()
                    .total_cmp(&(b.radius() - radius).abs())
            })
            .unwrap_or(Self::Small)
    }

    pub fn random(rng: &mut impl Rng) -> Self {
        Self::ALL[rng.random_range(0..Self::ALL.len())]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Asteroid {
    body: Body,
    size: AsteroidSize,
    /// Render orientation only.
    direction: f32,
}

impl Asteroid {
    pub fn new(position: Vec2, velocity: Vec2, size: AsteroidSize, direction: f32) -> Self {
        Self {
            body: Body::new(position, velocity),
            size,
            direction,
        }
    }

    pub fn random_at(position: Vec2, size: AsteroidSize, rng: &mut impl Rng) -> Self {
        Self::new(
            position,
            random_drift(rng),
            size,
            rng.random_range(0.0..std::f32::consts::TAU),
        )
    }

    pub fn size(&self) -> AsteroidSize {
        self.size
    }

    pub fn direction(&self) -> f32 {
        self.direction
    }

    /// Fragments left behind when this asteroid is destroyed.
    pub fn successors(&self, rng: &mut impl Rng) -> Vec<Asteroid> {
        let Some(next) = self.size.successor() else {
            return Vec::new();
        };
        (0..2)
            .map(|_| {
                let mut fragment = Self::random_at(self.body.position, next, rng);
                fragment.body.steps_until_collision = SUCCESSOR_IMMUNITY;
                fragment
            })
            .collect()
    }
}

impl Entity for Asteroid {
    fn body(&self) -> &Body {
        &self.body
    }

    fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    fn radius(&self) -> f32 {
        self.size.radius()
    }

    fn advance(&mut self) {
        self.body.step();
    }
}

fn random_drift(rng: &mut impl Rng) -> Vec2 {
    Vec2::new(
        rng.random_range(-MAX_DRIFT..MAX_DRIFT),
        rng.random_range(-MAX_DRIFT..MAX_DRIFT),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_large_and_medium_split_in_two() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for (size, next) in [
            (AsteroidSize::Large, AsteroidSize::Medium),
            (AsteroidSize::Medium, AsteroidSize::Small),
        ] {
            let parent = Asteroid::new(Vec2::new(300.0, 200.0), Vec2::ZERO, size, 0.0);
            let successors = parent.successors(&mut rng);
            assert_eq!(successors.len(), 2);
            for fragment in &successors {
                assert_eq!(fragment.size(), next);
                assert_eq!(fragment.position(), parent.position());
            }
        }
    }

    #[test]
    fn test_small_leaves_nothing() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let parent = Asteroid::new(Vec2::new(1.0, 1.0), Vec2::ZERO, AsteroidSize::Small, 0.0);
        assert!(parent.successors(&mut rng).is_empty());
    }

    #[test]
    fn test_constant_drift_keeps_direction() {
        let mut rock = Asteroid::new(
            Vec2::new(100.0, 100.0),
            Vec2::new(1.5, -0.5),
            AsteroidSize::Medium,
            1.25,
        );
        rock.advance();
        rock.advance();
        assert!((rock.position() - Vec2::new(103.0, 99.0)).length() < 1e-4);
        assert_eq!(rock.direction(), 1.25);
        assert_eq!(rock.velocity(), Vec2::new(1.5, -0.5));
    }

    #[test]
    fn test_size_from_radius() {
        for size in AsteroidSize::ALL {
            assert_eq!(AsteroidSize::from_radius(size.radius()), size);
        }
        assert_eq!(AsteroidSize::from_radius(38.0), AsteroidSize::Large);
    }
}
