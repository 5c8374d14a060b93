use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::endpoint::{ConnectionEndpoint, NetError, NetworkEndpoint};
use super::protocol::{Packet, sequence_greater_than};
use super::stats::NetworkStats;
use crate::event::{DecisionRequest, DisconnectReason, SessionEvent, emit};
use crate::world::{WorldError, WorldState};

/// Host-side exchange with one participant: take its report, answer with
/// the world as that participant should see it.
pub(crate) struct PeerWorker {
    pub id: String,
    pub world: Arc<WorldState>,
    pub endpoint: NetworkEndpoint,
    pub host_running: Arc<AtomicBool>,
    pub quit: Arc<AtomicBool>,
    pub events: Sender<SessionEvent>,
    pub poll_interval: Duration,
    pub peer_timeout: Duration,
    pub traffic: Arc<Mutex<NetworkStats>>,
}

impl PeerWorker {
    pub fn run(mut self) {
        let reason = match self.exchange() {
            Ok(()) => DisconnectReason::Quit,
            Err(NetError::Silent(after)) => {
                log::warn!("peer {} silent for {:?}", self.id, after);
                DisconnectReason::Timeout
            }
            Err(e) => {
                log::warn!("peer {} dropped: {}", self.id, e);
                DisconnectReason::Error
            }
        };
        self.deregister(reason);
    }

    fn exchange(&mut self) -> Result<(), NetError> {
        let mut last_applied: Option<u32> = None;
        let mut sequence: u32 = 0;
        let mut destroyed = false;

        let host_running = Arc::clone(&self.host_running);
        let quit = Arc::clone(&self.quit);
        let keep_going =
            move || host_running.load(Ordering::Acquire) && !quit.load(Ordering::Acquire);

        loop {
            let received = self.endpoint.recv_packet_polling(
                self.poll_interval,
                self.peer_timeout,
                &keep_going,
            )?;
            let Some((packet, from)) = received else {
                return Ok(());
            };
            if Some(from) != self.endpoint.remote() {
                log::debug!("ignoring datagram from {} on peer {}", from, self.id);
                continue;
            }

            let incoming = packet.header.sequence;
            let fresh = last_applied.is_none_or(|last| sequence_greater_than(incoming, last));
            if fresh {
                last_applied = Some(incoming);
                let report = packet.into_player()?;

                if !destroyed {
                    if !self.world.record_participant(&self.id, report) {
                        log::debug!("peer {} has no ship any more", self.id);
                        return Ok(());
                    }
                    self.world.refresh_remote_view();

                    if self.world.ship_destroyed(&self.id) == Some(true) {
                        destroyed = true;
                        self.world.mark_participant_destroyed(&self.id);
                        log::info!("peer {} was destroyed", self.id);
                    }
                }
            } else {
                self.endpoint.record_stale();
            }

            // The quit listener may have removed the participant meanwhile.
            let snapshot = match self.world.world_snapshot_for(&self.id) {
                Ok(snapshot) => snapshot,
                Err(WorldError::MissingShip(_)) => return Ok(()),
            };
            self.endpoint.send(&mut Packet::world(sequence, snapshot))?;
            sequence = sequence.wrapping_add(1);
            *self.traffic.lock() = self.endpoint.stats().clone();

            if !keep_going() {
                return Ok(());
            }
        }
    }

    fn deregister(&self, reason: DisconnectReason) {
        self.world.remove_participant(&self.id);
        let traffic = self.endpoint.stats().clone();
        log::info!("peer {} {} ({})", self.id, reason.as_str(), traffic);
        *self.traffic.lock() = traffic;
        emit(
            &self.events,
            SessionEvent::PeerLeft {
                id: self.id.clone(),
                reason,
            },
        );

        if self.world.peer_ship_count() == 0 && self.world.is_game_over() {
            emit(&self.events, SessionEvent::Decision(DecisionRequest::AllPeersGone));
        }
    }
}

/// Watches a participant's quit endpoint. A sentinel from the
/// participant's data address is its goodbye; a sentinel from any other
/// address registers where the participant wants to hear our own goodbye.
pub(crate) struct QuitListener {
    pub id: String,
    pub world: Arc<WorldState>,
    pub endpoint: NetworkEndpoint,
    pub joiner: ConnectionEndpoint,
    pub kick: Arc<Mutex<Option<ConnectionEndpoint>>>,
    pub host_running: Arc<AtomicBool>,
    pub quit: Arc<AtomicBool>,
    pub poll_interval: Duration,
    pub registration_timeout: Duration,
}

impl QuitListener {
    pub fn run(mut self) {
        let started = Instant::now();
        let mut overdue_reported = false;

        while self.host_running.load(Ordering::Acquire) && !self.quit.load(Ordering::Acquire) {
            match self.endpoint.recv_sentinel(self.poll_interval) {
                Ok(Some(from)) if from == self.joiner => {
                    log::debug!("quit sentinel for {}", self.id);
                    // Gone from everybody's next snapshot, whatever the
                    // worker is waiting on.
                    self.world.remove_participant(&self.id);
                    self.quit.store(true, Ordering::Release);
                }
                Ok(Some(from)) => {
                    log::debug!("{} listens for the host on {}", self.id, from);
                    *self.kick.lock() = Some(from);
                }
                Ok(None) => {
                    if !overdue_reported
                        && started.elapsed() >= self.registration_timeout
                        && self.kick.lock().is_none()
                    {
                        overdue_reported = true;
                        log::warn!("{} never registered a kick endpoint", self.id);
                    }
                }
                Err(e) => {
                    log::warn!("quit listener for {} failed: {}", self.id, e);
                    self.quit.store(true, Ordering::Release);
                }
            }
        }
    }
}
