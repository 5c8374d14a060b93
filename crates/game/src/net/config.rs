use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::stats::PacketLossSimulation;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetConfig {
    /// Where the host's accept socket binds.
    pub bind_addr: String,
    /// How long a joiner waits for each handshake answer.
    pub join_timeout_ms: u64,
    /// How long the host waits for a joiner's kick registration.
    pub registration_timeout_ms: u64,
    /// Read timeout of every blocking receive.
    pub poll_interval_ms: u64,
    /// Silence after which the other side counts as gone.
    pub peer_timeout_ms: u64,
    /// Joiners beyond this are not answered.
    pub max_peers: usize,
    pub packet_loss: PacketLossSimulation,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:0".to_string(),
            join_timeout_ms: 50,
            registration_timeout_ms: 500,
            poll_interval_ms: 100,
            peer_timeout_ms: 5000,
            max_peers: 8,
            packet_loss: PacketLossSimulation::default(),
        }
    }
}

impl NetConfig {
    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    pub fn registration_timeout(&self) -> Duration {
        Duration::from_millis(self.registration_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn peer_timeout(&self) -> Duration {
        Duration::from_millis(self.peer_timeout_ms)
    }
}
