use rand::Rng;
use serde::{Deserialize, Serialize};

/// Artificial outgoing loss, for exercising the protocol's loss tolerance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacketLossSimulation {
    pub enabled: bool,
    pub loss_percent: f32,
}

impl PacketLossSimulation {
    pub fn new(loss_percent: f32) -> Self {
        Self {
            enabled: true,
            loss_percent,
        }
    }

    pub fn should_drop(&self) -> bool {
        if !self.enabled || self.loss_percent <= 0.0 {
            return false;
        }
        rand::rng().random_range(0.0..100.0) < self.loss_percent
    }
}

#[derive(Debug, Clone, Default)]
pub struct NetworkStats {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub packets_dropped: u64,
    pub packets_stale: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

impl NetworkStats {
    pub fn merge(&mut self, other: &NetworkStats) {
        self.packets_sent += other.packets_sent;
        self.packets_received += other.packets_received;
        self.packets_dropped += other.packets_dropped;
        self.packets_stale += other.packets_stale;
        self.bytes_sent += other.bytes_sent;
        self.bytes_received += other.bytes_received;
    }
}

impl std::fmt::Display for NetworkStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "sent {} ({} B), received {} ({} B), stale {}, dropped {}",
            self.packets_sent,
            self.bytes_sent,
            self.packets_received,
            self.bytes_received,
            self.packets_stale,
            self.packets_dropped
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_simulation_never_drops() {
        let sim = PacketLossSimulation {
            enabled: false,
            loss_percent: 100.0,
        };
        assert!((0..100).all(|_| !sim.should_drop()));
    }

    #[test]
    fn test_merge_adds_counters() {
        let mut total = NetworkStats {
            packets_sent: 2,
            bytes_sent: 40,
            ..NetworkStats::default()
        };
        total.merge(&NetworkStats {
            packets_sent: 1,
            packets_received: 3,
            packets_stale: 1,
            bytes_sent: 10,
            ..NetworkStats::default()
        });
        assert_eq!(total.packets_sent, 3);
        assert_eq!(total.packets_received, 3);
        assert_eq!(total.packets_stale, 1);
        assert_eq!(total.bytes_sent, 50);
        assert_eq!(
            total.to_string(),
            "sent 3 (50 B), received 3 (0 B), stale 1, dropped 0"
        );
    }

    #[test]
    fn test_full_loss_always_drops() {
        let sim = PacketLossSimulation::new(100.0);
        assert!((0..100).all(|_| sim.should_drop()));
    }
}
