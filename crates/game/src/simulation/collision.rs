use crate::entity::{Asteroid, Bullet, Entity, Spaceship};

/// What one collision pass produced, for the engine to score.
#[derive(Debug, Default, PartialEq)]
pub struct CollisionOutcome {
    /// Points earned by the local ship's bullets.
    pub local_points: u32,
    /// One entry per point earned by a remote participant's bullet.
    pub awarded: Vec<String>,
    pub explosions: u32,
}

/// Resolves every collision of one tick. `ships[0]` is the local ship.
///
/// Pairs are checked in a fixed order: own bullets, enemy bullets,
/// asteroids against ships, then asteroids against each other. A bullet
/// stops at its first hit and anything destroyed earlier in the pass is
/// out of the game for the rest of it.
pub fn resolve(
    ships: &mut [Spaceship],
    own_bullets: &mut [Bullet],
    enemy_bullets: &mut [Bullet],
    asteroids: &mut [Asteroid],
    chain_reaction: bool,
) -> CollisionOutcome {
    let mut outcome = CollisionOutcome::default();

    for bullet in own_bullets.iter_mut() {
        // Own bullets never hit the local ship.
        let targets = ships.get_mut(1..).unwrap_or_default();
        if hit(bullet, asteroids, targets, None) {
            outcome.local_points += 1;
        }
    }

    for bullet in enemy_bullets.iter_mut() {
        let owner = bullet.owner().map(str::to_string);
        if hit(bullet, asteroids, ships, owner.as_deref()) {
            if let Some(owner) = owner {
                outcome.awarded.push(owner);
            }
        }
    }

    for asteroid in asteroids.iter_mut() {
        for ship in ships.iter_mut() {
            if asteroid.collides_with(&*ship) {
                asteroid.destroy();
                ship.destroy();
                outcome.explosions += 1;
                break;
            }
        }
    }

    if chain_reaction {
        for i in 0..asteroids.len() {
            let (head, tail) = asteroids.split_at_mut(i + 1);
            let first = &mut head[i];
            for second in tail.iter_mut() {
                if first.collides_with(&*second) {
                    first.destroy();
                    second.destroy();
                    break;
                }
            }
        }
    }

    outcome
}

/// Lets one bullet hit the first asteroid, then the first ship, it touches.
/// Ships owned by `skip_owner` are passed over.
fn hit(
    bullet: &mut Bullet,
    asteroids: &mut [Asteroid],
    ships: &mut [Spaceship],
    skip_owner: Option<&str>,
) -> bool {
    if !bullet.can_collide() {
        return false;
    }

    if let Some(asteroid) = asteroids.iter_mut().find(|a| a.collides_with(&*bullet)) {
        asteroid.destroy();
        bullet.destroy();
        return true;
    }

    if let Some(ship) = ships
        .iter_mut()
        .filter(|ship| Some(ship.id()) != skip_owner)
        .find(|ship| ship.collides_with(&*bullet))
    {
        ship.destroy();
        bullet.destroy();
        return true;
    }

    false
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;
    use crate::entity::AsteroidSize;

    fn ready_ship(id: &str, position: Vec2) -> Spaceship {
        let mut ship = Spaceship::new(id, id);
        ship.body_mut().position = position;
        ship.body_mut().steps_until_collision = 0;
        ship
    }

    fn rock(x: f32, y: f32, size: AsteroidSize) -> Asteroid {
        Asteroid::new(Vec2::new(x, y), Vec2::ZERO, size, 0.0)
    }

    #[test]
    fn bullet_is_consumed_by_first_hit() {
        let mut ships = vec![ready_ship("me", Vec2::new(700.0, 700.0))];
        let mut own = vec![Bullet::new(Vec2::new(100.0, 100.0), Vec2::ZERO).armed()];
        let mut asteroids = vec![
            rock(100.0, 100.0, AsteroidSize::Large),
            rock(105.0, 100.0, AsteroidSize::Large),
        ];

        let outcome = resolve(&mut ships, &mut own, &mut [], &mut asteroids, false);
        assert_eq!(outcome.local_points, 1);
        assert!(asteroids[0].is_destroyed());
        assert!(!asteroids[1].is_destroyed());
        assert!(own[0].is_destroyed());
    }

    #[test]
    fn destroyed_asteroid_cannot_be_hit_twice() {
        let mut ships = vec![ready_ship("me", Vec2::new(700.0, 700.0))];
        let mut own = vec![
            Bullet::new(Vec2::new(100.0, 100.0), Vec2::ZERO).armed(),
            Bullet::new(Vec2::new(101.0, 100.0), Vec2::ZERO).armed(),
        ];
        let mut asteroids = vec![rock(100.0, 100.0, AsteroidSize::Large)];

        let outcome = resolve(&mut ships, &mut own, &mut [], &mut asteroids, false);
        assert_eq!(outcome.local_points, 1);
        assert!(!own[1].is_destroyed());
    }

    #[test]
    fn enemy_hits_score_for_their_owner() {
        let mut ships = vec![
            ready_ship("me", Vec2::new(400.0, 400.0)),
            ready_ship("a", Vec2::new(600.0, 600.0)),
        ];
        let mut enemy = vec![
            Bullet::remote(Vec2::new(400.0, 400.0), 30, Some("a".into())),
            Bullet::remote(Vec2::new(600.0, 600.0), 30, Some("a".into())),
            Bullet::remote(Vec2::new(100.0, 100.0), 30, None),
        ];
        let mut asteroids = vec![rock(100.0, 100.0, AsteroidSize::Small)];

        let outcome = resolve(&mut ships, &mut [], &mut enemy, &mut asteroids, false);
        assert_eq!(outcome.awarded, vec!["a".to_string()]);
        assert_eq!(outcome.local_points, 0);
        assert!(ships[0].is_destroyed());
        // Nobody shoots themselves.
        assert!(!ships[1].is_destroyed());
        assert!(asteroids[0].is_destroyed());
    }

    #[test]
    fn asteroid_and_ship_destroy_each_other() {
        let mut ships = vec![ready_ship("me", Vec2::new(200.0, 200.0))];
        let mut asteroids = vec![rock(210.0, 200.0, AsteroidSize::Medium)];

        let outcome = resolve(&mut ships, &mut [], &mut [], &mut asteroids, false);
        assert_eq!(outcome.explosions, 1);
        assert!(ships[0].is_destroyed());
        assert!(asteroids[0].is_destroyed());
    }

    #[test]
    fn immune_ship_survives_asteroid() {
        let mut ships = vec![Spaceship::new("me", "me")];
        let center = ships[0].position();
        let mut asteroids = vec![rock(center.x, center.y, AsteroidSize::Large)];

        let outcome = resolve(&mut ships, &mut [], &mut [], &mut asteroids, false);
        assert_eq!(outcome.explosions, 0);
        assert!(!ships[0].is_destroyed());
        assert!(!asteroids[0].is_destroyed());
    }

    #[test]
    fn chain_reaction_is_opt_in() {
        let mut ships = vec![ready_ship("me", Vec2::new(700.0, 700.0))];
        let mut asteroids = vec![
            rock(100.0, 100.0, AsteroidSize::Large),
            rock(130.0, 100.0, AsteroidSize::Large),
        ];

        resolve(&mut ships, &mut [], &mut [], &mut asteroids, false);
        assert!(asteroids.iter().all(|a| !a.is_destroyed()));

        resolve(&mut ships, &mut [], &mut [], &mut asteroids, true);
        assert!(asteroids.iter().all(|a| a.is_destroyed()));
    }
}
