use std::io;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::event::SessionEvent;
use crate::net::{
    ConnectionEndpoint, Host, NetConfig, NetError, NetworkStats, PeerState, RemoteClient,
};
use crate::simulation::{EngineConfig, SimulationEngine};
use crate::world::{SessionType, WorldState};

/// Told whenever a new frame can be drawn. `since_tick` is the time elapsed
/// since the last physics tick.
pub trait FrameListener: Send + Sync {
    fn frame_ready(&self, since_tick: Duration);
}

/// Receives the final result of every solo game.
pub trait ScoreSink: Send + Sync {
    fn record(&self, name: &str, score: u32);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub name: String,
    pub engine: EngineConfig,
    pub net: NetConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: "player".to_string(),
            engine: EngineConfig::default(),
            net: NetConfig::default(),
        }
    }
}

/// Answers to a [`crate::DecisionRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Spectate,
    HostNewGame,
    ReturnToMenu,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Net(#[from] NetError),
    #[error("could not start a session thread: {0}")]
    Io(#[from] io::Error),
    #[error("a session is already running")]
    AlreadyRunning,
}

/// One game from the local participant's point of view, in any of the
/// three session types.
pub struct Session {
    world: Arc<WorldState>,
    config: SessionConfig,
    events_tx: Sender<SessionEvent>,
    events_rx: Receiver<SessionEvent>,
    frame_listener: Option<Arc<dyn FrameListener>>,
    score_sink: Option<Arc<dyn ScoreSink>>,
    engine_thread: Option<JoinHandle<()>>,
    host: Option<Host>,
    client: Option<RemoteClient>,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            world: Arc::new(WorldState::new(SessionType::Solo, &config.name)),
            config,
            events_tx,
            events_rx,
            frame_listener: None,
            score_sink: None,
            engine_thread: None,
            host: None,
            client: None,
        }
    }

    pub fn with_frame_listener(mut self, listener: Arc<dyn FrameListener>) -> Self {
        self.frame_listener = Some(listener);
        self
    }

    pub fn with_score_sink(mut self, sink: Arc<dyn ScoreSink>) -> Self {
        self.score_sink = Some(sink);
        self
    }

    pub fn world(&self) -> &Arc<WorldState> {
        &self.world
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn events(&self) -> &Receiver<SessionEvent> {
        &self.events_rx
    }

    pub fn is_active(&self) -> bool {
        self.engine_thread.is_some() && self.world.is_running()
    }

    /// Port of the accept socket while hosting.
    pub fn host_port(&self) -> Option<u16> {
        self.host.as_ref().map(Host::port)
    }

    /// Peer traffic of the running host.
    pub fn host_traffic(&self) -> Option<NetworkStats> {
        self.host.as_ref().map(Host::traffic)
    }

    pub fn peer_state(&self) -> Option<PeerState> {
        self.client.as_ref().map(RemoteClient::state)
    }

    pub fn start_solo(&mut self) -> Result<(), SessionError> {
        self.prepare(SessionType::Solo)?;
        self.spawn_engine()
    }

    /// Starts hosting and returns the port joiners should use.
    pub fn start_host(&mut self) -> Result<u16, SessionError> {
        self.prepare(SessionType::Host)?;
        let host = Host::start(
            Arc::clone(&self.world),
            self.config.net.clone(),
            self.events_tx.clone(),
        )
        .inspect_err(|_| self.world.set_running(false))?;
        let port = host.port();
        self.host = Some(host);
        self.spawn_engine()?;
        Ok(port)
    }

    pub fn join(&mut self, target: ConnectionEndpoint) -> Result<(), SessionError> {
        self.prepare(SessionType::Client)?;
        let client = RemoteClient::join(
            Arc::clone(&self.world),
            target,
            &self.config.net,
            self.config.engine.physics_period(),
            self.events_tx.clone(),
        )
        .inspect_err(|_| self.world.set_running(false))?;
        self.client = Some(client);
        self.spawn_engine()
    }

    /// Settles a decision request raised on the event channel.
    pub fn resolve(&mut self, choice: Choice) -> Result<(), SessionError> {
        log::info!("resolving with {:?}", choice);
        match choice {
            Choice::Spectate => {
                if let Some(client) = &self.client {
                    client.spectate();
                }
                Ok(())
            }
            Choice::HostNewGame => {
                self.quit();
                self.start_host().map(|_| ())
            }
            Choice::ReturnToMenu => {
                self.quit();
                self.world.reset();
                self.world.set_local_name(&self.config.name);
                Ok(())
            }
        }
    }

    /// Ends whatever is running and empties the world.
    pub fn quit(&mut self) {
        self.world.set_running(false);
        if let Some(handle) = self.engine_thread.take() {
            if handle.join().is_err() {
                log::warn!("simulation thread panicked");
            }
        }
        if let Some(mut client) = self.client.take() {
            client.shutdown();
        }
        if let Some(mut host) = self.host.take() {
            host.shutdown();
        }
        self.world.clear();
    }

    fn prepare(&mut self, session_type: SessionType) -> Result<(), SessionError> {
        if self.is_active() {
            return Err(SessionError::AlreadyRunning);
        }
        // A finished game still has threads to collect.
        self.quit();
        self.world.reset();
        self.world.set_local_name(&self.config.name);
        self.world.set_session_type(session_type);
        self.world.set_running(true);
        Ok(())
    }

    fn spawn_engine(&mut self) -> Result<(), SessionError> {
        let mut engine = SimulationEngine::new(Arc::clone(&self.world), self.config.engine.clone())
            .with_events(self.events_tx.clone());
        if let Some(listener) = &self.frame_listener {
            engine = engine.with_frame_listener(Arc::clone(listener));
        }
        if let Some(sink) = &self.score_sink {
            engine = engine.with_score_sink(Arc::clone(sink));
        }

        let handle = thread::Builder::new()
            .name("simulation".to_string())
            .spawn(move || engine.run_or_abort())?;
        self.engine_thread = Some(handle);
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.quit();
    }
}
