mod client;
mod config;
mod endpoint;
mod host;
mod peer;
pub mod protocol;
mod stats;

pub use client::{PeerState, RemoteClient};
pub use config::NetConfig;
pub use endpoint::{ConnectionEndpoint, NetError, NetworkEndpoint};
pub use host::Host;
pub use protocol::{
    Control, MAX_DATAGRAM_SIZE, Packet, PacketHeader, Payload, PlayerSnapshot, ProtocolError,
    WorldSnapshot, sequence_greater_than,
};
pub use stats::{NetworkStats, PacketLossSimulation};
