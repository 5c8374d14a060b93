mod sync;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};

use crate::entity::{Asteroid, Bullet, Entity, ShipControls, Spaceship};
use crate::net::protocol::PlayerSnapshot;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    #[default]
    Solo,
    Host,
    Client,
}

#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("participant {0} is registered but has no ship")]
    MissingShip(String),
}

/// Every collection the engine mutates in one tick, locked together.
///
/// Locks are always taken in the order ships, own bullets, enemy bullets,
/// asteroids, with the participant map last. Anything else that needs more
/// than one collection follows the same order.
pub struct WorldWriteGuard<'a> {
    pub ships: RwLockWriteGuard<'a, Vec<Spaceship>>,
    pub own_bullets: RwLockWriteGuard<'a, Vec<Bullet>>,
    pub enemy_bullets: RwLockWriteGuard<'a, Vec<Bullet>>,
    pub asteroids: RwLockWriteGuard<'a, Vec<Asteroid>>,
    pub participants: RwLockReadGuard<'a, HashMap<String, PlayerSnapshot>>,
}

/// The shared state of one session. Index 0 of the ship list is always the
/// ship of the local participant.
pub struct WorldState {
    session_type: RwLock<SessionType>,
    local_id: RwLock<String>,
    ships: RwLock<Vec<Spaceship>>,
    own_bullets: RwLock<Vec<Bullet>>,
    enemy_bullets: RwLock<Vec<Bullet>>,
    asteroids: RwLock<Vec<Asteroid>>,
    participants: RwLock<HashMap<String, PlayerSnapshot>>,
    running: AtomicBool,
    controls: ShipControls,
}

impl WorldState {
    pub fn new(session_type: SessionType, name: &str) -> Self {
        let local_id = uuid::Uuid::new_v4().to_string();
        let ship = Spaceship::new(local_id.clone(), name);

        Self {
            session_type: RwLock::new(session_type),
            local_id: RwLock::new(local_id),
            ships: RwLock::new(vec![ship]),
            own_bullets: RwLock::new(Vec::new()),
            enemy_bullets: RwLock::new(Vec::new()),
            asteroids: RwLock::new(Vec::new()),
            participants: RwLock::new(HashMap::new()),
            running: AtomicBool::new(false),
            controls: ShipControls::default(),
        }
    }

    pub fn session_type(&self) -> SessionType {
        *self.session_type.read()
    }

    pub fn set_session_type(&self, session_type: SessionType) {
        *self.session_type.write() = session_type;
    }

    pub fn local_id(&self) -> String {
        self.local_id.read().clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    pub fn controls(&self) -> &ShipControls {
        &self.controls
    }

    /// Back to a fresh single ship session under a new id, as after
    /// returning to the menu.
    pub fn reset(&self) {
        let local_id = uuid::Uuid::new_v4().to_string();
        let mut write = self.write();

        let name = write
            .ships
            .first()
            .map(|ship| ship.name().to_string())
            .unwrap_or_default();
        let ship = Spaceship::new(local_id.clone(), name);
        *write.ships = vec![ship];
        write.own_bullets.clear();
        write.enemy_bullets.clear();
        write.asteroids.clear();
        drop(write);

        self.participants.write().clear();
        *self.local_id.write() = local_id;
        *self.session_type.write() = SessionType::Solo;
        self.controls.clear();
        self.set_running(false);
    }

    /// Empties every collection and lowers the running flag.
    pub fn clear(&self) {
        self.set_running(false);
        let mut write = self.write();
        write.ships.clear();
        write.own_bullets.clear();
        write.enemy_bullets.clear();
        write.asteroids.clear();
        drop(write);
        self.participants.write().clear();
    }

    /// Locks every entity collection for a compound update.
    pub fn write(&self) -> WorldWriteGuard<'_> {
        let ships = self.ships.write();
        let own_bullets = self.own_bullets.write();
        let enemy_bullets = self.enemy_bullets.write();
        let asteroids = self.asteroids.write();
        let participants = self.participants.read();

        WorldWriteGuard {
            ships,
            own_bullets,
            enemy_bullets,
            asteroids,
            participants,
        }
    }

    pub fn ships(&self) -> Vec<Spaceship> {
        self.ships.read().clone()
    }

    /// Ships a renderer should draw: everything that is still alive.
    pub fn renderable_ships(&self) -> Vec<Spaceship> {
        self.ships
            .read()
            .iter()
            .filter(|ship| !ship.is_destroyed())
            .cloned()
            .collect()
    }

    pub fn local_ship(&self) -> Option<Spaceship> {
        self.ships.read().first().cloned()
    }

    pub fn own_bullets(&self) -> Vec<Bullet> {
        self.own_bullets.read().clone()
    }

    pub fn enemy_bullets(&self) -> Vec<Bullet> {
        self.enemy_bullets.read().clone()
    }

    pub fn asteroids(&self) -> Vec<Asteroid> {
        self.asteroids.read().clone()
    }

    pub fn asteroid_count(&self) -> usize {
        self.asteroids.read().len()
    }

    /// A session is over once the local ship is gone or destroyed.
    pub fn is_game_over(&self) -> bool {
        self.ships
            .read()
            .first()
            .is_none_or(|ship| ship.is_destroyed())
    }

    pub fn local_score(&self) -> u32 {
        self.ships.read().first().map_or(0, Spaceship::score)
    }

    pub fn local_name(&self) -> String {
        self.ships
            .read()
            .first()
            .map(|ship| ship.name().to_string())
            .unwrap_or_default()
    }

    pub fn set_local_name(&self, name: &str) {
        if let Some(ship) = self.ships.write().first_mut() {
            ship.set_name(name);
        }
    }

    /// Replaces the asteroid field, for scripted scenarios and tests.
    pub fn set_asteroids(&self, asteroids: Vec<Asteroid>) {
        *self.asteroids.write() = asteroids;
    }

    pub fn set_own_bullets(&self, bullets: Vec<Bullet>) {
        *self.own_bullets.write() = bullets;
    }

    pub fn set_enemy_bullets(&self, bullets: Vec<Bullet>) {
        *self.enemy_bullets.write() = bullets;
    }

    pub fn with_local_ship<R>(&self, f: impl FnOnce(&mut Spaceship) -> R) -> Option<R> {
        self.ships.write().first_mut().map(f)
    }
}

#[cfg(test)]
impl WorldState {
    /// Registers a participant report without a matching ship.
    pub(crate) fn insert_participant_unchecked(&self, id: &str) {
        let snapshot = PlayerSnapshot {
            position: [0.0, 0.0],
            direction: 0.0,
            steps_until_collision: 0,
            accelerating: false,
            bullets: Vec::new(),
            name: id.to_string(),
            destroyed: false,
        };
        self.participants.write().insert(id.to_string(), snapshot);
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;
    use crate::entity::AsteroidSize;

    #[test]
    fn test_new_world_has_local_ship() {
        let world = WorldState::new(SessionType::Solo, "pilot");
        let ship = world.local_ship().unwrap();
        assert_eq!(ship.id(), world.local_id());
        assert_eq!(ship.name(), "pilot");
        assert!(!world.is_running());
        assert!(!world.is_game_over());
    }

    #[test]
    fn test_destroyed_local_ship_means_game_over() {
        let world = WorldState::new(SessionType::Solo, "pilot");
        world.with_local_ship(|ship| ship.destroy());
        assert!(world.is_game_over());
        assert!(world.renderable_ships().is_empty());
        assert_eq!(world.ships().len(), 1);
    }

    #[test]
    fn test_reset_restores_defaults() {
        let world = WorldState::new(SessionType::Host, "pilot");
        let old_id = world.local_id();
        world.set_running(true);
        world.set_asteroids(vec![Asteroid::new(
            Vec2::ZERO,
            Vec2::ZERO,
            AsteroidSize::Large,
            0.0,
        )]);
        world.add_peer_ship("peer");

        world.reset();
        assert_eq!(world.session_type(), SessionType::Solo);
        assert_ne!(world.local_id(), old_id);
        assert_eq!(world.ships().len(), 1);
        assert_eq!(world.local_name(), "pilot");
        assert!(world.asteroids().is_empty());
        assert!(!world.is_running());
    }

    #[test]
    fn test_clear_empties_everything() {
        let world = WorldState::new(SessionType::Solo, "pilot");
        world.set_running(true);
        world.clear();
        assert!(world.ships().is_empty());
        assert!(world.is_game_over());
        assert!(!world.is_running());
    }
}
