pub mod entity;
pub mod event;
pub mod geometry;
pub mod net;
pub mod session;
pub mod simulation;
pub mod world;

pub use entity::{
    Asteroid, AsteroidSize, Body, Bullet, ControlFlags, Entity, ShipControls, Spaceship,
};
pub use event::{DecisionRequest, DisconnectReason, SessionEvent, SoundCue};
pub use net::{
    ConnectionEndpoint, Host, MAX_DATAGRAM_SIZE, NetConfig, NetError, NetworkEndpoint,
    NetworkStats, Packet, PacketLossSimulation, PeerState, PlayerSnapshot, ProtocolError,
    RemoteClient, WorldSnapshot,
};
pub use session::{Choice, FrameListener, ScoreSink, Session, SessionConfig, SessionError};
pub use simulation::{EngineConfig, FixedTimestep, SimulationEngine};
pub use world::{SessionType, WorldError, WorldState, WorldWriteGuard};
