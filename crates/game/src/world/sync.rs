use glam::Vec2;

use super::{WorldError, WorldState};
use crate::entity::{Asteroid, AsteroidSize, BULLET_LIFETIME, Bullet, Entity, Spaceship};
use crate::geometry::{from_array, to_array};
use crate::net::protocol::{
    AsteroidState, BulletState, PlayerSnapshot, ShipState, WorldSnapshot, clip_name,
};

// Host side.
impl WorldState {
    /// Adds the ship of a newly joined participant, coloured by join order.
    pub fn add_peer_ship(&self, id: &str) {
        let mut ships = self.ships.write();
        let mut ship = Spaceship::new(id, "");
        ship.set_color_slot(ships.len());
        ships.push(ship);
    }

    pub fn peer_ship_count(&self) -> usize {
        self.ships.read().len().saturating_sub(1)
    }

    /// `None` when no ship with this id exists.
    pub fn ship_destroyed(&self, id: &str) -> Option<bool> {
        self.ships
            .read()
            .iter()
            .find(|ship| ship.id() == id)
            .map(Entity::is_destroyed)
    }

    pub fn ship_score(&self, id: &str) -> Option<u32> {
        self.ships
            .read()
            .iter()
            .find(|ship| ship.id() == id)
            .map(Spaceship::score)
    }

    /// Stores the latest report of a participant. Reports for ships that
    /// are already gone are dropped and `false` is returned.
    pub fn record_participant(&self, id: &str, snapshot: PlayerSnapshot) -> bool {
        let ships = self.ships.read();
        if !ships.iter().any(|ship| ship.id() == id) {
            return false;
        }
        self.participants.write().insert(id.to_string(), snapshot);
        true
    }

    pub fn has_participant(&self, id: &str) -> bool {
        self.participants.read().contains_key(id)
    }

    pub fn participant_count(&self) -> usize {
        self.participants.read().len()
    }

    /// Publishes the local ship as a participant so that peers see it. A
    /// destroyed local ship is withdrawn instead.
    pub fn publish_local_participant(&self) {
        let id = self.local_id();
        match self.local_player_snapshot() {
            Some(snapshot) if !snapshot.destroyed => {
                self.participants.write().insert(id, snapshot);
            }
            _ => {
                self.participants.write().remove(&id);
            }
        }
    }

    /// Forgets a participant entirely: its ship, its bullets and its report.
    pub fn remove_participant(&self, id: &str) {
        let mut ships = self.ships.write();
        let mut enemy_bullets = self.enemy_bullets.write();

        // The local ship is never removed this way.
        if let Some(index) = ships.iter().skip(1).position(|ship| ship.id() == id) {
            ships.remove(index + 1);
        }
        enemy_bullets.retain(|bullet| bullet.owner() != Some(id));
        self.participants.write().remove(id);
    }

    /// Flags the participant's ship as destroyed and stops listing it.
    pub fn mark_participant_destroyed(&self, id: &str) {
        let mut ships = self.ships.write();
        if let Some(ship) = ships.iter_mut().find(|ship| ship.id() == id) {
            ship.destroy();
        }
        self.participants.write().remove(id);
    }

    /// Mirrors every participant's latest report into the peer ships and
    /// rebuilds the enemy bullet list, in one step relative to the engine.
    pub fn refresh_remote_view(&self) {
        let local_id = self.local_id();
        let mut ships = self.ships.write();
        let mut enemy_bullets = self.enemy_bullets.write();
        let participants = self.participants.read();

        enemy_bullets.clear();
        for ship in ships.iter_mut().skip(1) {
            if ship.id() == local_id {
                continue;
            }
            let Some(snapshot) = participants.get(ship.id()) else {
                continue;
            };
            ship.apply_remote(
                from_array(snapshot.position),
                snapshot.direction,
                snapshot.accelerating,
                snapshot.steps_until_collision,
            );
            ship.set_name(clip_name(&snapshot.name));

            let owner = ship.id().to_string();
            enemy_bullets.extend(snapshot.bullets.iter().map(|bullet| {
                Bullet::remote(
                    from_array(bullet.position),
                    bullet.steps_left,
                    Some(owner.clone()),
                )
            }));
        }
    }

    /// Builds what the participant `id` gets to see: every other listed
    /// participant, all asteroids and everybody else's bullets.
    pub fn world_snapshot_for(&self, id: &str) -> Result<WorldSnapshot, WorldError> {
        let ships = self.ships.read();
        let asteroids = self.asteroids.read();
        let participants = self.participants.read();

        let own = ships
            .iter()
            .find(|ship| ship.id() == id)
            .ok_or_else(|| WorldError::MissingShip(id.to_string()))?;

        let mut snapshot = WorldSnapshot {
            own_destroyed: own.is_destroyed(),
            own_name: clip_name(own.name()),
            own_score: own.score(),
            ..WorldSnapshot::default()
        };

        for ship in ships.iter().filter(|ship| ship.id() != id) {
            let Some(report) = participants.get(ship.id()) else {
                continue;
            };
            snapshot.ships.push(ShipState {
                position: report.position,
                direction: report.direction,
                accelerating: report.accelerating,
                name: clip_name(&report.name),
                score: ship.score(),
            });
            snapshot
                .bullets
                .extend(report.bullets.iter().map(|bullet| bullet.position));
        }

        snapshot.asteroids = asteroids
            .iter()
            .map(|asteroid| AsteroidState {
                position: to_array(asteroid.position()),
                radius: asteroid.radius(),
                direction: asteroid.direction(),
            })
            .collect();

        Ok(snapshot)
    }
}

// Participant side.
impl WorldState {
    /// What the local participant reports about itself.
    pub fn local_player_snapshot(&self) -> Option<PlayerSnapshot> {
        let ships = self.ships.read();
        let own_bullets = self.own_bullets.read();
        let ship = ships.first()?;

        Some(PlayerSnapshot {
            position: to_array(ship.position()),
            direction: ship.direction(),
            steps_until_collision: ship.steps_until_collision(),
            accelerating: ship.is_accelerating(),
            bullets: own_bullets
                .iter()
                .filter(|bullet| !bullet.is_destroyed())
                .map(|bullet| BulletState {
                    position: to_array(bullet.position()),
                    steps_left: bullet.steps_left(),
                })
                .collect(),
            name: clip_name(ship.name()),
            destroyed: ship.is_destroyed(),
        })
    }

    /// Replaces the remote view with the host's snapshot. Applying the same
    /// snapshot again leaves the world unchanged.
    pub fn apply_world_snapshot(&self, snapshot: &WorldSnapshot) {
        let mut ships = self.ships.write();
        let mut enemy_bullets = self.enemy_bullets.write();
        let mut asteroids = self.asteroids.write();

        ships.truncate(1);
        if let Some(own) = ships.first_mut() {
            own.update_score(snapshot.own_score);
            if !snapshot.own_name.is_empty() {
                own.set_name(snapshot.own_name.as_str());
            }
        }

        for (index, state) in snapshot.ships.iter().enumerate() {
            let mut ship = Spaceship::new(format!("peer-{index}"), state.name.as_str());
            ship.apply_remote(from_array(state.position), state.direction, state.accelerating, 0);
            ship.update_score(state.score);
            ship.set_color_slot(index + 1);
            ships.push(ship);
        }

        *asteroids = snapshot
            .asteroids
            .iter()
            .map(|state| {
                Asteroid::new(
                    from_array(state.position),
                    Vec2::ZERO,
                    AsteroidSize::from_radius(state.radius),
                    state.direction,
                )
            })
            .collect();

        *enemy_bullets = snapshot
            .bullets
            .iter()
            .map(|&position| Bullet::remote(from_array(position), BULLET_LIFETIME, None))
            .collect();
    }

    /// Flags the local ship as destroyed. Returns true the first time.
    pub fn mark_local_destroyed(&self) -> bool {
        let mut ships = self.ships.write();
        match ships.first_mut() {
            Some(ship) if !ship.is_destroyed() => {
                ship.destroy();
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::SessionType;

    fn report(x: f32, bullets: usize) -> PlayerSnapshot {
        PlayerSnapshot {
            position: [x, 10.0],
            direction: 0.5,
            steps_until_collision: 0,
            accelerating: true,
            bullets: (0..bullets)
                .map(|i| BulletState {
                    position: [x + i as f32, 20.0],
                    steps_left: 30,
                })
                .collect(),
            name: format!("ship-{x}"),
            destroyed: false,
        }
    }

    fn sample_world_snapshot() -> WorldSnapshot {
        WorldSnapshot {
            own_destroyed: false,
            own_name: "me".to_string(),
            own_score: 4,
            ships: vec![ShipState {
                position: [10.0, 10.0],
                direction: 1.0,
                accelerating: false,
                name: "other".to_string(),
                score: 2,
            }],
            asteroids: vec![AsteroidState {
                position: [300.0, 300.0],
                radius: 20.0,
                direction: 0.3,
            }],
            bullets: vec![[5.0, 5.0], [6.0, 6.0]],
        }
    }

    #[test]
    fn test_reports_for_unknown_ships_are_dropped() {
        let world = WorldState::new(SessionType::Host, "host");
        assert!(!world.record_participant("ghost", report(1.0, 0)));
        assert_eq!(world.participant_count(), 0);

        world.add_peer_ship("a");
        assert!(world.record_participant("a", report(1.0, 0)));
        assert!(world.has_participant("a"));
    }

    #[test]
    fn test_refresh_mirrors_peers_and_their_bullets() {
        let world = WorldState::new(SessionType::Host, "host");
        world.add_peer_ship("a");
        world.add_peer_ship("b");
        world.record_participant("a", report(100.0, 2));
        world.record_participant("b", report(200.0, 1));
        world.refresh_remote_view();

        let ships = world.ships();
        assert_eq!(ships[1].position().x, 100.0);
        assert_eq!(ships[1].name(), "ship-100");
        assert_eq!(ships[2].position().x, 200.0);

        let bullets = world.enemy_bullets();
        assert_eq!(bullets.len(), 3);
        assert_eq!(bullets.iter().filter(|b| b.owner() == Some("a")).count(), 2);
    }

    #[test]
    fn test_snapshot_excludes_the_receiver() {
        let world = WorldState::new(SessionType::Host, "host");
        world.add_peer_ship("a");
        world.add_peer_ship("b");
        world.record_participant("a", report(100.0, 2));
        world.record_participant("b", report(200.0, 1));
        world.publish_local_participant();

        let snapshot = world.world_snapshot_for("a").unwrap();
        assert_eq!(snapshot.ships.len(), 2);
        assert!(snapshot.ships.iter().all(|ship| ship.name != "ship-100"));
        assert_eq!(snapshot.bullets.len(), 1);
        assert!(!snapshot.own_destroyed);
    }

    #[test]
    fn test_snapshot_for_unknown_ship_is_an_error() {
        let world = WorldState::new(SessionType::Host, "host");
        assert!(matches!(
            world.world_snapshot_for("nobody"),
            Err(WorldError::MissingShip(_))
        ));
    }

    #[test]
    fn test_removed_participant_disappears() {
        let world = WorldState::new(SessionType::Host, "host");
        world.add_peer_ship("a");
        world.add_peer_ship("b");
        world.record_participant("a", report(100.0, 2));
        world.record_participant("b", report(200.0, 1));
        world.refresh_remote_view();

        world.remove_participant("a");
        assert_eq!(world.peer_ship_count(), 1);
        assert!(!world.has_participant("a"));
        assert!(world.enemy_bullets().iter().all(|b| b.owner() != Some("a")));

        let snapshot = world.world_snapshot_for("b").unwrap();
        assert!(snapshot.ships.is_empty());
    }

    #[test]
    fn test_destroyed_local_ship_is_withdrawn() {
        let world = WorldState::new(SessionType::Host, "host");
        world.publish_local_participant();
        assert!(world.has_participant(&world.local_id()));

        world.mark_local_destroyed();
        world.publish_local_participant();
        assert!(!world.has_participant(&world.local_id()));
    }

    #[test]
    fn test_destroyed_participant_stops_being_listed() {
        let world = WorldState::new(SessionType::Host, "host");
        world.add_peer_ship("a");
        world.record_participant("a", report(100.0, 0));
        world.mark_participant_destroyed("a");

        assert_eq!(world.ship_destroyed("a"), Some(true));
        assert!(!world.has_participant("a"));
        assert!(world.world_snapshot_for("a").unwrap().own_destroyed);
    }

    #[test]
    fn test_applying_snapshot_twice_is_idempotent() {
        let world = WorldState::new(SessionType::Client, "me");
        let snapshot = sample_world_snapshot();

        world.apply_world_snapshot(&snapshot);
        let ships = world.ships();
        let asteroids = world.asteroids();
        let bullets = world.enemy_bullets();

        world.apply_world_snapshot(&snapshot);
        assert_eq!(world.ships(), ships);
        assert_eq!(world.asteroids(), asteroids);
        assert_eq!(world.enemy_bullets(), bullets);

        assert_eq!(ships.len(), 2);
        assert_eq!(world.local_score(), 4);
        assert_eq!(asteroids[0].size(), AsteroidSize::Medium);
    }

    #[test]
    fn test_own_ship_survives_snapshot() {
        let world = WorldState::new(SessionType::Client, "me");
        let id = world.local_id();
        world.apply_world_snapshot(&sample_world_snapshot());
        world.apply_world_snapshot(&WorldSnapshot::default());

        let ships = world.ships();
        assert_eq!(ships.len(), 1);
        assert_eq!(ships[0].id(), id);
        assert_eq!(ships[0].score(), 4);
    }

    #[test]
    fn test_local_destruction_reported_once() {
        let world = WorldState::new(SessionType::Client, "me");
        assert!(world.mark_local_destroyed());
        assert!(!world.mark_local_destroyed());
        assert!(world.local_player_snapshot().unwrap().destroyed);
    }
}
