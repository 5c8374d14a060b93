use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread;
use std::time::{Duration, Instant};

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::collision;
use super::config::EngineConfig;
use super::timestep::FixedTimestep;
use crate::entity::{Asteroid, AsteroidSize, Entity, Spaceship};
use crate::event::{DecisionRequest, SessionEvent, SoundCue, emit};
use crate::geometry::WORLD_SIZE;
use crate::session::{FrameListener, ScoreSink};
use crate::world::{SessionType, WorldError, WorldState};

const LOOP_SLEEP: Duration = Duration::from_millis(1);

/// Spawn positions rolled before giving up until the next spawn tick.
const SPAWN_ATTEMPTS: usize = 64;

pub struct SimulationEngine {
    world: Arc<WorldState>,
    config: EngineConfig,
    rng: ChaCha8Rng,
    tick: u64,
    asteroid_limit: usize,
    events: Option<Sender<SessionEvent>>,
    frame_listener: Option<Arc<dyn FrameListener>>,
    score_sink: Option<Arc<dyn ScoreSink>>,
    local_loss_reported: bool,
}

impl SimulationEngine {
    pub fn new(world: Arc<WorldState>, config: EngineConfig) -> Self {
        let seed = config.seed.unwrap_or_else(rand::random);
        Self {
            world,
            rng: ChaCha8Rng::seed_from_u64(seed),
            tick: 0,
            asteroid_limit: config.initial_asteroid_limit,
            config,
            events: None,
            frame_listener: None,
            score_sink: None,
            local_loss_reported: false,
        }
    }

    pub fn with_events(mut self, events: Sender<SessionEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_frame_listener(mut self, listener: Arc<dyn FrameListener>) -> Self {
        self.frame_listener = Some(listener);
        self
    }

    pub fn with_score_sink(mut self, sink: Arc<dyn ScoreSink>) -> Self {
        self.score_sink = Some(sink);
        self
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn asteroid_limit(&self) -> usize {
        self.asteroid_limit
    }

    pub fn world(&self) -> &Arc<WorldState> {
        &self.world
    }

    /// One fixed simulation step.
    pub fn tick(&mut self) -> Result<(), WorldError> {
        let state = Arc::clone(&self.world);
        let session_type = state.session_type();
        let authoritative = session_type != SessionType::Client;
        let controls = state.controls().load();
        let mut explosions = 0;

        {
            let mut world = state.write();

            for bullet in world.own_bullets.iter_mut() {
                bullet.advance();
            }

            if let Some(ship) = world.ships.first_mut().filter(|ship| !ship.is_destroyed()) {
                ship.set_controls(controls);
                ship.advance();
                if ship.can_fire() {
                    let bullet = ship.fire();
                    world.own_bullets.push(bullet);
                }
            }

            if authoritative {
                for asteroid in world.asteroids.iter_mut() {
                    asteroid.advance();
                }

                let outcome = collision::resolve(
                    &mut world.ships,
                    &mut world.own_bullets,
                    &mut world.enemy_bullets,
                    &mut world.asteroids,
                    self.config.chain_reaction,
                );
                explosions = outcome.explosions;

                let per_limit = self.config.points_per_limit;
                for _ in 0..outcome.local_points {
                    if let Some(ship) = world.ships.first_mut() {
                        award_point(ship, &mut self.asteroid_limit, per_limit);
                    }
                }
                for owner in &outcome.awarded {
                    match world.ships.iter_mut().find(|ship| ship.id() == owner) {
                        Some(ship) => award_point(ship, &mut self.asteroid_limit, per_limit),
                        None if world.participants.contains_key(owner) => {
                            return Err(WorldError::MissingShip(owner.clone()));
                        }
                        None => log::debug!("no ship to credit for a hit by {}", owner),
                    }
                }
            }

            let mut successors = Vec::new();
            for asteroid in world.asteroids.iter().filter(|a| a.is_destroyed()) {
                successors.extend(asteroid.successors(&mut self.rng));
            }
            world.asteroids.retain(|asteroid| !asteroid.is_destroyed());
            world.asteroids.extend(successors);
            world
                .own_bullets
                .retain(|bullet| !bullet.is_destroyed() && !bullet.is_expired());
            world.enemy_bullets.retain(|bullet| !bullet.is_destroyed());

            if authoritative
                && self.tick % self.config.spawn_interval.max(1) == 0
                && world.asteroids.len() < self.asteroid_limit
            {
                let avoid = world.ships.first().map(Spaceship::position);
                if let Some(asteroid) = self.random_asteroid(avoid) {
                    world.asteroids.push(asteroid);
                }
            }
        }

        if let Some(events) = &self.events {
            for _ in 0..explosions {
                emit(events, SessionEvent::Sound(SoundCue::Explosion));
            }
        }

        self.tick += 1;
        Ok(())
    }

    /// Host bookkeeping that follows every tick.
    fn after_tick(&mut self) {
        if self.world.session_type() != SessionType::Host {
            return;
        }
        self.world.publish_local_participant();

        if !self.local_loss_reported && self.world.is_game_over() {
            self.local_loss_reported = true;
            log::info!("host ship destroyed at tick {}", self.tick);
            if let Some(events) = &self.events {
                emit(events, SessionEvent::Decision(DecisionRequest::OwnShipDestroyed));
            }
        }
    }

    fn random_asteroid(&mut self, avoid: Option<Vec2>) -> Option<Asteroid> {
        let min_distance = self.config.spawn_exclusion_radius;
        for _ in 0..SPAWN_ATTEMPTS {
            let position = Vec2::new(
                self.rng.random_range(0.0..WORLD_SIZE),
                self.rng.random_range(0.0..WORLD_SIZE),
            );
            if avoid.is_some_and(|ship| ship.distance(position) < min_distance) {
                continue;
            }
            let size = AsteroidSize::random(&mut self.rng);
            return Some(Asteroid::random_at(position, size, &mut self.rng));
        }
        log::debug!("no free spot for an asteroid at tick {}", self.tick);
        None
    }

    /// Drives ticks and frame notifications until the world stops running
    /// or, in a solo session, the game is over.
    pub fn run(&mut self) -> Result<(), WorldError> {
        let mut physics = FixedTimestep::new(self.config.physics_period());
        let mut display = FixedTimestep::new(self.config.display_period());
        let mut last = Instant::now();
        let mut last_tick = last;

        let solo = self.world.session_type() == SessionType::Solo;
        log::info!(
            "simulation started ({:?}, {} Hz)",
            self.world.session_type(),
            self.config.physics_rate
        );

        while self.world.is_running() {
            let now = Instant::now();
            let delta = now - last;
            last = now;

            physics.accumulate(delta);
            display.accumulate(delta);

            if physics.consume_tick() {
                self.tick()?;
                self.after_tick();
                last_tick = now;
            }

            if display.consume_tick() {
                if let Some(listener) = &self.frame_listener {
                    listener.frame_ready(now - last_tick);
                }
            }

            if solo && self.world.is_game_over() {
                self.finish_solo();
                break;
            }

            thread::sleep(LOOP_SLEEP);
        }

        log::info!("simulation stopped after {} ticks", self.tick);
        Ok(())
    }

    /// Like [`Self::run`], but treats a broken world as fatal for the process.
    pub fn run_or_abort(&mut self) {
        if let Err(e) = self.run() {
            log::error!("simulation aborted: {}", e);
            std::process::abort();
        }
    }

    fn finish_solo(&mut self) {
        self.world.set_running(false);
        let name = self.world.local_name();
        let score = self.world.local_score();
        log::info!("game over for {} with {} points", name, score);

        if let Some(sink) = &self.score_sink {
            sink.record(&name, score);
        }
        if let Some(events) = &self.events {
            emit(events, SessionEvent::GameOver { name, score });
        }
    }
}

fn award_point(ship: &mut Spaceship, limit: &mut usize, per_limit: u32) {
    let score = ship.increase_score();
    if per_limit > 0 && score % per_limit == 0 {
        *limit += 1;
    }
}
