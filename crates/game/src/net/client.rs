use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use super::config::NetConfig;
use super::endpoint::{ConnectionEndpoint, NetError, NetworkEndpoint};
use super::protocol::{Control, Packet, sequence_greater_than};
use crate::event::{DecisionRequest, SessionEvent, emit};
use crate::world::WorldState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Disconnected,
    Connecting,
    Active,
    DestroyedPendingDecision,
    Spectating,
}

/// The joining side of a session: reports the local ship to the host every
/// tick and mirrors what the host sends back.
pub struct RemoteClient {
    state: Arc<RwLock<PeerState>>,
    running: Arc<AtomicBool>,
    data_endpoint: ConnectionEndpoint,
    quit_endpoint: ConnectionEndpoint,
    control: NetworkEndpoint,
    threads: Vec<JoinHandle<()>>,
}

impl RemoteClient {
    /// Runs the handshake with the host at `target` and starts exchanging.
    pub fn join(
        world: Arc<WorldState>,
        target: ConnectionEndpoint,
        config: &NetConfig,
        tick_period: Duration,
        events: Sender<SessionEvent>,
    ) -> Result<Self, NetError> {
        let state = Arc::new(RwLock::new(PeerState::Connecting));
        let timeout = config.join_timeout();

        let mut data = NetworkEndpoint::bind_for(target)?;
        data.set_packet_loss_sim(config.packet_loss.clone());
        data.send_sentinel(target)?;

        let (data_endpoint, quit_endpoint) = await_answers(&mut data, target, timeout)?;
        data.set_remote(data_endpoint);

        // Registers where the host's goodbye should go.
        let mut kick = NetworkEndpoint::bind_for(target)?;
        kick.send_sentinel(quit_endpoint)?;
        log::info!(
            "joined {} (data {}, quit {})",
            target,
            data_endpoint,
            quit_endpoint
        );

        let control = data.try_clone()?;
        let running = Arc::new(AtomicBool::new(true));
        *state.write() = PeerState::Active;

        let exchange = Exchange {
            world: Arc::clone(&world),
            endpoint: data,
            state: Arc::clone(&state),
            running: Arc::clone(&running),
            events: events.clone(),
            tick_period,
            peer_timeout: config.peer_timeout(),
        };
        let exchange_thread = thread::Builder::new()
            .name("client-exchange".to_string())
            .spawn(move || exchange.run())?;

        let kick_thread = {
            let state = Arc::clone(&state);
            let running = Arc::clone(&running);
            let poll = config.poll_interval();
            thread::Builder::new()
                .name("client-kick".to_string())
                .spawn(move || listen_for_kick(kick, world, state, running, events, poll))?
        };

        Ok(Self {
            state,
            running,
            data_endpoint,
            quit_endpoint,
            control,
            threads: vec![exchange_thread, kick_thread],
        })
    }

    pub fn state(&self) -> PeerState {
        *self.state.read()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn data_endpoint(&self) -> ConnectionEndpoint {
        self.data_endpoint
    }

    pub fn quit_endpoint(&self) -> ConnectionEndpoint {
        self.quit_endpoint
    }

    /// Keeps watching after the local ship was destroyed.
    pub fn spectate(&self) {
        let mut state = self.state.write();
        if *state == PeerState::DestroyedPendingDecision {
            *state = PeerState::Spectating;
        }
    }

    /// Says goodbye to the host and waits for the client threads.
    pub fn shutdown(&mut self) {
        let was_running = self.running.swap(false, Ordering::AcqRel);
        if was_running {
            if let Err(e) = self.control.send_sentinel(self.quit_endpoint) {
                log::warn!("could not tell the host we quit: {}", e);
            }
        }
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                log::warn!("client thread panicked");
            }
        }
        *self.state.write() = PeerState::Disconnected;
    }
}

impl Drop for RemoteClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Collects the host's two handshake answers, in whatever order they
/// arrive: a sentinel from the data endpoint and a quit answer from the quit
/// endpoint.
fn await_answers(
    data: &mut NetworkEndpoint,
    target: ConnectionEndpoint,
    timeout: Duration,
) -> Result<(ConnectionEndpoint, ConnectionEndpoint), NetError> {
    let deadline = Instant::now() + timeout;
    let mut data_endpoint = None;
    let mut quit_endpoint = None;

    loop {
        if let (Some(data_endpoint), Some(quit_endpoint)) = (data_endpoint, quit_endpoint) {
            return Ok((data_endpoint, quit_endpoint));
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(NetError::JoinTimeout {
                endpoint: target,
                timeout,
            });
        }
        match data.recv_control(remaining)? {
            Some((Some(Control::Sentinel), from)) => data_endpoint = Some(from),
            Some((Some(Control::QuitAnswer), from)) => quit_endpoint = Some(from),
            Some((None, from)) => log::debug!("ignoring datagram from {} while joining", from),
            None => {}
        }
    }
}

struct Exchange {
    world: Arc<WorldState>,
    endpoint: NetworkEndpoint,
    state: Arc<RwLock<PeerState>>,
    running: Arc<AtomicBool>,
    events: Sender<SessionEvent>,
    tick_period: Duration,
    peer_timeout: Duration,
}

impl Exchange {
    fn run(mut self) {
        if let Err(e) = self.exchange() {
            log::warn!("lost the host: {}", e);
            if self.running.swap(false, Ordering::AcqRel) {
                *self.state.write() = PeerState::Disconnected;
                self.world.set_running(false);
                emit(
                    &self.events,
                    SessionEvent::Error {
                        message: e.to_string(),
                    },
                );
                emit(&self.events, SessionEvent::Decision(DecisionRequest::HostGone));
            }
        }
    }

    fn exchange(&mut self) -> Result<(), NetError> {
        let mut sequence: u32 = 0;
        let mut last_applied: Option<u32> = None;
        let mut last_heard = Instant::now();
        let mut own_loss_seen = false;

        while self.running.load(Ordering::Acquire) {
            let Some(report) = self.world.local_player_snapshot() else {
                return Ok(());
            };
            self.endpoint.send(&mut Packet::player(sequence, report))?;
            sequence = sequence.wrapping_add(1);

            let deadline = Instant::now() + self.tick_period;
            loop {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                let Some((packet, from)) = self.endpoint.recv_packet(remaining)? else {
                    break;
                };
                if Some(from) != self.endpoint.remote() {
                    continue;
                }
                last_heard = Instant::now();

                let incoming = packet.header.sequence;
                if last_applied.is_some_and(|last| !sequence_greater_than(incoming, last)) {
                    self.endpoint.record_stale();
                    continue;
                }
                last_applied = Some(incoming);

                let snapshot = packet.into_world()?;
                self.world.apply_world_snapshot(&snapshot);

                if snapshot.own_destroyed && !own_loss_seen {
                    own_loss_seen = true;
                    self.world.mark_local_destroyed();
                    *self.state.write() = PeerState::DestroyedPendingDecision;
                    log::info!("our ship was destroyed");
                    emit(
                        &self.events,
                        SessionEvent::Decision(DecisionRequest::OwnShipDestroyed),
                    );
                }
            }

            if last_heard.elapsed() > self.peer_timeout {
                return Err(NetError::Silent(self.peer_timeout));
            }
        }
        Ok(())
    }
}

fn listen_for_kick(
    mut endpoint: NetworkEndpoint,
    world: Arc<WorldState>,
    state: Arc<RwLock<PeerState>>,
    running: Arc<AtomicBool>,
    events: Sender<SessionEvent>,
    poll_interval: Duration,
) {
    while running.load(Ordering::Acquire) {
        match endpoint.recv_sentinel(poll_interval) {
            Ok(Some(from)) => {
                log::info!("host {} closed the session", from);
                if running.swap(false, Ordering::AcqRel) {
                    *state.write() = PeerState::Disconnected;
                    world.set_running(false);
                    emit(&events, SessionEvent::Decision(DecisionRequest::HostGone));
                }
            }
            Ok(None) => {}
            Err(e) => {
                log::warn!("kick listener failed: {}", e);
                return;
            }
        }
    }
}
