use std::fmt;
use std::io;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::{Duration, Instant};

use super::protocol::{Control, MAX_DATAGRAM_SIZE, Packet, ProtocolError};
use super::stats::{NetworkStats, PacketLossSimulation};

/// One side of a datagram exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionEndpoint {
    address: IpAddr,
    port: u16,
}

impl ConnectionEndpoint {
    pub fn new(address: IpAddr, port: u16) -> Self {
        Self { address, port }
    }

    pub fn address(&self) -> IpAddr {
        self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }
}

impl From<SocketAddr> for ConnectionEndpoint {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip(), addr.port())
    }
}

impl fmt::Display for ConnectionEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.socket_addr().fmt(f)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("no answer from {endpoint} within {timeout:?}")]
    JoinTimeout {
        endpoint: ConnectionEndpoint,
        timeout: Duration,
    },
    #[error("nothing heard for {0:?}")]
    Silent(Duration),
    #[error("no remote endpoint set")]
    NotConnected,
}

pub struct NetworkEndpoint {
    socket: UdpSocket,
    local_addr: SocketAddr,
    remote: Option<ConnectionEndpoint>,
    stats: NetworkStats,
    recv_buffer: [u8; MAX_DATAGRAM_SIZE],
    read_timeout: Option<Duration>,
    packet_loss_sim: PacketLossSimulation,
}

impl NetworkEndpoint {
    pub fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        let local_addr = socket.local_addr()?;

        Ok(Self {
            socket,
            local_addr,
            remote: None,
            stats: NetworkStats::default(),
            recv_buffer: [0u8; MAX_DATAGRAM_SIZE],
            read_timeout: None,
            packet_loss_sim: PacketLossSimulation::default(),
        })
    }

    /// Binds an ephemeral port on the same interface family as `peer`.
    pub fn bind_for(peer: ConnectionEndpoint) -> io::Result<Self> {
        let unspecified: IpAddr = match peer.address() {
            IpAddr::V4(_) => std::net::Ipv4Addr::UNSPECIFIED.into(),
            IpAddr::V6(_) => std::net::Ipv6Addr::UNSPECIFIED.into(),
        };
        Self::bind(SocketAddr::new(unspecified, 0))
    }

    /// A second handle on the same socket, with its own counters.
    pub fn try_clone(&self) -> io::Result<Self> {
        Ok(Self {
            socket: self.socket.try_clone()?,
            local_addr: self.local_addr,
            remote: self.remote,
            stats: NetworkStats::default(),
            recv_buffer: [0u8; MAX_DATAGRAM_SIZE],
            read_timeout: None,
            packet_loss_sim: self.packet_loss_sim.clone(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn remote(&self) -> Option<ConnectionEndpoint> {
        self.remote
    }

    pub fn set_remote(&mut self, remote: ConnectionEndpoint) {
        self.remote = Some(remote);
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    pub fn record_stale(&mut self) {
        self.stats.packets_stale += 1;
    }

    pub fn set_packet_loss_sim(&mut self, sim: PacketLossSimulation) {
        self.packet_loss_sim = sim;
    }

    /// Sends a snapshot packet to the remote endpoint, trimming it to the
    /// datagram limit first.
    pub fn send(&mut self, packet: &mut Packet) -> Result<usize, NetError> {
        let remote = self.remote.ok_or(NetError::NotConnected)?;
        let data = packet.serialize_within(MAX_DATAGRAM_SIZE)?;

        if self.packet_loss_sim.should_drop() {
            self.stats.packets_dropped += 1;
            return Ok(0);
        }

        let bytes = self.socket.send_to(&data, remote.socket_addr())?;
        self.stats.packets_sent += 1;
        self.stats.bytes_sent += bytes as u64;
        Ok(bytes)
    }

    pub fn send_sentinel(&mut self, to: ConnectionEndpoint) -> Result<(), NetError> {
        self.send_control(Control::Sentinel, to)
    }

    pub fn send_control(&mut self, control: Control, to: ConnectionEndpoint) -> Result<(), NetError> {
        let bytes = control.as_bytes();
        self.socket.send_to(bytes, to.socket_addr())?;
        self.stats.packets_sent += 1;
        self.stats.bytes_sent += bytes.len() as u64;
        Ok(())
    }

    /// Waits up to `timeout` for any datagram and returns its sender.
    pub fn recv_sentinel(&mut self, timeout: Duration) -> Result<Option<ConnectionEndpoint>, NetError> {
        Ok(self.recv_raw(timeout)?.map(|(_, from)| from))
    }

    /// Waits up to `timeout` for a datagram and classifies it. Anything that
    /// is not a control marker comes back as `None` alongside its sender.
    pub fn recv_control(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<(Option<Control>, ConnectionEndpoint)>, NetError> {
        let Some((size, from)) = self.recv_raw(timeout)? else {
            return Ok(None);
        };
        Ok(Some((Control::parse(&self.recv_buffer[..size]), from)))
    }

    /// Waits up to `timeout` for one packet. `Ok(None)` means nothing
    /// arrived in time.
    pub fn recv_packet(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<(Packet, ConnectionEndpoint)>, NetError> {
        let Some((size, from)) = self.recv_raw(timeout)? else {
            return Ok(None);
        };
        let packet = Packet::deserialize(&self.recv_buffer[..size])?;
        Ok(Some((packet, from)))
    }

    /// Like [`Self::recv_packet`], but keeps polling in `poll` sized slices
    /// until `silence` has passed without traffic or `keep_going` says stop.
    pub fn recv_packet_polling(
        &mut self,
        poll: Duration,
        silence: Duration,
        keep_going: impl Fn() -> bool,
    ) -> Result<Option<(Packet, ConnectionEndpoint)>, NetError> {
        let started = Instant::now();
        while keep_going() {
            if let Some(received) = self.recv_packet(poll)? {
                return Ok(Some(received));
            }
            if started.elapsed() >= silence {
                return Err(NetError::Silent(silence));
            }
        }
        Ok(None)
    }

    fn recv_raw(&mut self, timeout: Duration) -> Result<Option<(usize, ConnectionEndpoint)>, NetError> {
        let timeout = timeout.max(Duration::from_millis(1));
        if self.read_timeout != Some(timeout) {
            self.socket.set_read_timeout(Some(timeout))?;
            self.read_timeout = Some(timeout);
        }

        match self.socket.recv_from(&mut self.recv_buffer) {
            Ok((size, from)) => {
                self.stats.packets_received += 1;
                self.stats.bytes_received += size as u64;
                Ok(Some((size, from.into())))
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}
