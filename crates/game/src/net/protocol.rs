use rkyv::util::AlignedVec;
use rkyv::{Archive, Deserialize, Serialize, rancor};

/// Upper bound for any datagram on the wire. Larger snapshots are trimmed.
pub const MAX_DATAGRAM_SIZE: usize = 2024;
pub const PROTOCOL_VERSION: u32 = 1;
pub const PROTOCOL_MAGIC: u32 = 0x4153_5452;
pub const MAX_NAME_LEN: usize = 32;

/// The one-byte datagram used to open a session, announce the data endpoint,
/// register a kick endpoint and quit.
pub const SENTINEL: [u8; 1] = [0];
/// Handshake answer sent from a participant's quit endpoint.
pub const QUIT_ANSWER: [u8; 1] = [1];

const SEQUENCE_WRAP_THRESHOLD: u32 = u32::MAX / 2;

// Rough archived sizes, used to guess how much to shed per trimming round.
const PLAYER_BULLET_WIRE_SIZE: usize = 12;
const WORLD_BULLET_WIRE_SIZE: usize = 8;
const ASTEROID_WIRE_SIZE: usize = 16;

#[inline]
pub fn sequence_greater_than(s1: u32, s2: u32) -> bool {
    ((s1 > s2) && (s1 - s2 <= SEQUENCE_WRAP_THRESHOLD))
        || ((s1 < s2) && (s2 - s1 > SEQUENCE_WRAP_THRESHOLD))
}

/// One-byte control datagrams exchanged outside of snapshot traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Sentinel,
    QuitAnswer,
}

impl Control {
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            Control::Sentinel => &SENTINEL,
            Control::QuitAnswer => &QUIT_ANSWER,
        }
    }

    pub fn parse(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [0] => Some(Control::Sentinel),
            [1] => Some(Control::QuitAnswer),
            _ => None,
        }
    }
}

pub fn clip_name(name: &str) -> String {
    name.chars().take(MAX_NAME_LEN).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub struct PacketHeader {
    pub magic: u32,
    pub version: u32,
    pub sequence: u32,
}

impl PacketHeader {
    pub fn new(sequence: u32) -> Self {
        Self {
            magic: PROTOCOL_MAGIC,
            version: PROTOCOL_VERSION,
            sequence,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.magic == PROTOCOL_MAGIC && self.version == PROTOCOL_VERSION
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct BulletState {
    pub position: [f32; 2],
    pub steps_left: u32,
}

/// What a participant reports about itself every tick.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct PlayerSnapshot {
    pub position: [f32; 2],
    pub direction: f32,
    pub steps_until_collision: u32,
    pub accelerating: bool,
    pub bullets: Vec<BulletState>,
    pub name: String,
    pub destroyed: bool,
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct ShipState {
    pub position: [f32; 2],
    pub direction: f32,
    pub accelerating: bool,
    pub name: String,
    pub score: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct AsteroidState {
    pub position: [f32; 2],
    pub radius: f32,
    pub direction: f32,
}

/// The host's view of the world as seen by one participant.
#[derive(Debug, Clone, PartialEq, Default, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct WorldSnapshot {
    pub own_destroyed: bool,
    pub own_name: String,
    pub own_score: u32,
    pub ships: Vec<ShipState>,
    pub asteroids: Vec<AsteroidState>,
    pub bullets: Vec<[f32; 2]>,
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum Payload {
    Player(PlayerSnapshot),
    World(WorldSnapshot),
}

impl Payload {
    /// Drops some content so the encoded form shrinks by roughly `excess`
    /// bytes. Returns false once there is nothing left that may be dropped.
    fn shed(&mut self, excess: usize) -> bool {
        match self {
            Payload::Player(player) => {
                if player.bullets.is_empty() {
                    return false;
                }
                let count = excess
                    .div_ceil(PLAYER_BULLET_WIRE_SIZE)
                    .clamp(1, player.bullets.len());
                // Oldest shots sit at the front.
                player.bullets.drain(..count);
                true
            }
            Payload::World(world) => {
                if !world.bullets.is_empty() {
                    let count = excess
                        .div_ceil(WORLD_BULLET_WIRE_SIZE)
                        .clamp(1, world.bullets.len());
                    world.bullets.truncate(world.bullets.len() - count);
                    true
                } else if !world.asteroids.is_empty() {
                    let count = excess
                        .div_ceil(ASTEROID_WIRE_SIZE)
                        .clamp(1, world.asteroids.len());
                    world.asteroids.truncate(world.asteroids.len() - count);
                    true
                } else {
                    false
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct Packet {
    pub header: PacketHeader,
    pub payload: Payload,
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("serialization failed: {0}")]
    Serialize(rancor::Error),
    #[error("deserialization failed: {0}")]
    Deserialize(rancor::Error),
    #[error("invalid packet header (magic {magic:#x}, version {version})")]
    InvalidHeader { magic: u32, version: u32 },
    #[error("packet of {size} bytes cannot be trimmed below {limit} bytes")]
    Oversized { size: usize, limit: usize },
    #[error("expected a {expected} snapshot")]
    UnexpectedPayload { expected: &'static str },
}

impl Packet {
    pub fn new(sequence: u32, payload: Payload) -> Self {
        Self {
            header: PacketHeader::new(sequence),
            payload,
        }
    }

    pub fn player(sequence: u32, snapshot: PlayerSnapshot) -> Self {
        Self::new(sequence, Payload::Player(snapshot))
    }

    pub fn world(sequence: u32, snapshot: WorldSnapshot) -> Self {
        Self::new(sequence, Payload::World(snapshot))
    }

    pub fn serialize(&self) -> Result<AlignedVec, ProtocolError> {
        rkyv::to_bytes::<rancor::Error>(self).map_err(ProtocolError::Serialize)
    }

    /// Serializes the packet, trimming bullets and then asteroids until it
    /// fits in `limit` bytes.
    pub fn serialize_within(&mut self, limit: usize) -> Result<AlignedVec, ProtocolError> {
        loop {
            let bytes = self.serialize()?;
            if bytes.len() <= limit {
                return Ok(bytes);
            }
            let size = bytes.len();
            if !self.payload.shed(size - limit) {
                return Err(ProtocolError::Oversized { size, limit });
            }
            log::debug!("trimmed snapshot of {} bytes to fit {} bytes", size, limit);
        }
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, ProtocolError> {
        // Datagram buffers carry no alignment guarantee.
        let mut aligned = AlignedVec::<16>::with_capacity(data.len());
        aligned.extend_from_slice(data);

        let packet = rkyv::from_bytes::<Self, rancor::Error>(&aligned)
            .map_err(ProtocolError::Deserialize)?;
        if !packet.header.is_valid() {
            return Err(ProtocolError::InvalidHeader {
                magic: packet.header.magic,
                version: packet.header.version,
            });
        }
        Ok(packet)
    }

    pub fn into_player(self) -> Result<PlayerSnapshot, ProtocolError> {
        match self.payload {
            Payload::Player(snapshot) => Ok(snapshot),
            Payload::World(_) => Err(ProtocolError::UnexpectedPayload { expected: "player" }),
        }
    }

    pub fn into_world(self) -> Result<WorldSnapshot, ProtocolError> {
        match self.payload {
            Payload::World(snapshot) => Ok(snapshot),
            Payload::Player(_) => Err(ProtocolError::UnexpectedPayload { expected: "world" }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_player() -> PlayerSnapshot {
        PlayerSnapshot {
            position: [120.5, 33.25],
            direction: 1.5,
            steps_until_collision: 4,
            accelerating: true,
            bullets: vec![
                BulletState {
                    position: [1.0, 2.0],
                    steps_left: 40,
                },
                BulletState {
                    position: [700.0, 13.5],
                    steps_left: 2,
                },
            ],
            name: "svenja".to_string(),
            destroyed: false,
        }
    }

    #[test]
    fn test_sequence_comparison() {
        assert!(sequence_greater_than(2, 1));
        assert!(!sequence_greater_than(1, 2));
        assert!(sequence_greater_than(0, u32::MAX));
        assert!(!sequence_greater_than(u32::MAX, 0));
    }

    #[test]
    fn test_player_snapshot_survives_the_wire() {
        let snapshot = sample_player();
        let mut packet = Packet::player(17, snapshot.clone());

        let bytes = packet.serialize_within(MAX_DATAGRAM_SIZE).unwrap();
        let decoded = Packet::deserialize(&bytes).unwrap();

        assert_eq!(decoded.header.sequence, 17);
        assert_eq!(decoded.into_player().unwrap(), snapshot);
    }

    #[test]
    fn test_rejects_foreign_header() {
        let mut packet = Packet::player(1, sample_player());
        packet.header.magic = 0xDEAD_BEEF;
        let bytes = packet.serialize().unwrap();

        assert!(matches!(
            Packet::deserialize(&bytes),
            Err(ProtocolError::InvalidHeader { .. })
        ));
    }

    #[test]
    fn test_rejects_garbage_and_sentinel() {
        assert!(Packet::deserialize(&[0xAB; 64]).is_err());
        assert!(Packet::deserialize(&SENTINEL).is_err());
    }

    #[test]
    fn test_control_markers() {
        assert_eq!(Control::parse(&SENTINEL), Some(Control::Sentinel));
        assert_eq!(Control::parse(&QUIT_ANSWER), Some(Control::QuitAnswer));
        assert_eq!(Control::parse(Control::QuitAnswer.as_bytes()), Some(Control::QuitAnswer));
        assert_eq!(Control::parse(&[]), None);
        assert_eq!(Control::parse(&[0, 0]), None);
    }

    #[test]
    fn test_wrong_payload_kind() {
        let packet = Packet::world(3, WorldSnapshot::default());
        assert!(matches!(
            packet.into_player(),
            Err(ProtocolError::UnexpectedPayload { expected: "player" })
        ));
    }

    #[test]
    fn test_world_snapshot_is_trimmed_to_fit() {
        let mut world = WorldSnapshot {
            own_name: "host".into(),
            ..Default::default()
        };
        world.asteroids = (0..40)
            .map(|i| AsteroidState {
                position: [i as f32, i as f32],
                radius: 20.0,
                direction: 0.0,
            })
            .collect();
        world.bullets = (0..600).map(|i| [i as f32, 0.0]).collect();

        let mut packet = Packet::world(9, world);
        let bytes = packet.serialize_within(MAX_DATAGRAM_SIZE).unwrap();
        assert!(bytes.len() <= MAX_DATAGRAM_SIZE);

        let decoded = Packet::deserialize(&bytes).unwrap().into_world().unwrap();
        assert_eq!(decoded.asteroids.len(), 40);
        assert!(decoded.bullets.len() < 600);
        assert_eq!(decoded.bullets[0], [0.0, 0.0]);
    }

    #[test]
    fn test_player_snapshot_drops_oldest_bullets_first() {
        let mut snapshot = sample_player();
        snapshot.bullets = (0..400)
            .map(|i| BulletState {
                position: [i as f32, 0.0],
                steps_left: i,
            })
            .collect();

        let mut packet = Packet::player(1, snapshot);
        let bytes = packet.serialize_within(MAX_DATAGRAM_SIZE).unwrap();
        let decoded = Packet::deserialize(&bytes).unwrap().into_player().unwrap();

        assert!(decoded.bullets.len() < 400);
        assert_eq!(decoded.bullets.last().map(|b| b.steps_left), Some(399));
    }

    #[test]
    fn test_clip_name() {
        let long = "x".repeat(100);
        assert_eq!(clip_name(&long).len(), MAX_NAME_LEN);
        assert_eq!(clip_name("ana"), "ana");
    }
}
