use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use super::config::NetConfig;
use super::endpoint::{ConnectionEndpoint, NetError, NetworkEndpoint};
use super::peer::{PeerWorker, QuitListener};
use super::protocol::Control;
use super::stats::NetworkStats;
use crate::event::{SessionEvent, emit};
use crate::world::WorldState;

struct PeerEntry {
    kick: Arc<Mutex<Option<ConnectionEndpoint>>>,
    quit: Arc<AtomicBool>,
    traffic: Arc<Mutex<NetworkStats>>,
    threads: Vec<JoinHandle<()>>,
}

type PeerRegistry = Arc<Mutex<HashMap<String, PeerEntry>>>;

/// Accepts joiners on one well-known socket and hands each of them its own
/// pair of sockets and a worker thread.
pub struct Host {
    local_addr: SocketAddr,
    running: Arc<AtomicBool>,
    peers: PeerRegistry,
    retired_traffic: Arc<Mutex<NetworkStats>>,
    accept_thread: Option<JoinHandle<()>>,
}

impl Host {
    pub fn start(
        world: Arc<WorldState>,
        config: NetConfig,
        events: Sender<SessionEvent>,
    ) -> Result<Self, NetError> {
        let mut accept = NetworkEndpoint::bind(config.bind_addr.as_str())?;
        accept.set_packet_loss_sim(config.packet_loss.clone());
        let local_addr = accept.local_addr();
        log::info!("hosting on {}", local_addr);

        let running = Arc::new(AtomicBool::new(true));
        let peers: PeerRegistry = Arc::new(Mutex::new(HashMap::new()));
        let retired_traffic = Arc::new(Mutex::new(NetworkStats::default()));

        let acceptor = Acceptor {
            endpoint: accept,
            world,
            config,
            events,
            running: Arc::clone(&running),
            peers: Arc::clone(&peers),
            retired_traffic: Arc::clone(&retired_traffic),
        };
        let accept_thread = thread::Builder::new()
            .name("host-accept".to_string())
            .spawn(move || acceptor.run())?;

        Ok(Self {
            local_addr,
            running,
            peers,
            retired_traffic,
            accept_thread: Some(accept_thread),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn peer_count(&self) -> usize {
        self.peers.lock().len()
    }

    /// Traffic of every peer exchange so far, including departed peers.
    pub fn traffic(&self) -> NetworkStats {
        let mut total = self.retired_traffic.lock().clone();
        for entry in self.peers.lock().values() {
            total.merge(&entry.traffic.lock());
        }
        total
    }

    /// Tells every participant that the session is over and waits for all
    /// host threads to finish.
    pub fn shutdown(&mut self) {
        if !self.running.swap(false, Ordering::AcqRel) && self.accept_thread.is_none() {
            return;
        }

        let entries: Vec<(String, PeerEntry)> = self.peers.lock().drain().collect();
        match NetworkEndpoint::bind("0.0.0.0:0") {
            Ok(mut kicker) => {
                for (id, entry) in &entries {
                    let Some(kick) = *entry.kick.lock() else {
                        log::debug!("{} has no kick endpoint to notify", id);
                        continue;
                    };
                    if let Err(e) = kicker.send_sentinel(kick) {
                        log::warn!("could not notify {} at {}: {}", id, kick, e);
                    }
                }
            }
            Err(e) => log::warn!("could not bind a socket to notify peers: {}", e),
        }

        for (_, entry) in entries {
            entry.quit.store(true, Ordering::Release);
            for handle in entry.threads {
                if handle.join().is_err() {
                    log::warn!("peer thread panicked");
                }
            }
        }
        if let Some(handle) = self.accept_thread.take() {
            if handle.join().is_err() {
                log::warn!("accept thread panicked");
            }
        }
        log::info!("host on {} shut down", self.local_addr);
    }
}

impl Drop for Host {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Acceptor {
    endpoint: NetworkEndpoint,
    world: Arc<WorldState>,
    config: NetConfig,
    events: Sender<SessionEvent>,
    running: Arc<AtomicBool>,
    peers: PeerRegistry,
    retired_traffic: Arc<Mutex<NetworkStats>>,
}

impl Acceptor {
    fn run(mut self) {
        while self.running.load(Ordering::Acquire) {
            match self.endpoint.recv_control(self.config.poll_interval()) {
                Ok(Some((Some(Control::Sentinel), joiner))) => {
                    if let Err(e) = self.admit(joiner) {
                        log::warn!("handshake with {} failed: {}", joiner, e);
                    }
                }
                Ok(Some((_, from))) => log::debug!("ignoring stray datagram from {}", from),
                Ok(None) => {}
                Err(e) => log::warn!("accept socket error: {}", e),
            }
        }
    }

    fn admit(&mut self, joiner: ConnectionEndpoint) -> Result<(), NetError> {
        if self.peers.lock().len() >= self.config.max_peers {
            log::warn!("turning away {}, session is full", joiner);
            return Ok(());
        }
        log::info!("{} is joining", joiner);

        let mut data = NetworkEndpoint::bind_for(joiner)?;
        data.set_remote(joiner);
        data.set_packet_loss_sim(self.config.packet_loss.clone());
        data.send_sentinel(joiner)?;

        let mut quit_endpoint = NetworkEndpoint::bind_for(joiner)?;
        quit_endpoint.send_control(Control::QuitAnswer, joiner)?;

        let id = uuid::Uuid::new_v4().to_string();
        self.world.add_peer_ship(&id);

        let quit = Arc::new(AtomicBool::new(false));
        let kick = Arc::new(Mutex::new(None));
        let traffic = Arc::new(Mutex::new(NetworkStats::default()));
        self.peers.lock().insert(
            id.clone(),
            PeerEntry {
                kick: Arc::clone(&kick),
                quit: Arc::clone(&quit),
                traffic: Arc::clone(&traffic),
                threads: Vec::new(),
            },
        );

        let worker = PeerWorker {
            id: id.clone(),
            world: Arc::clone(&self.world),
            endpoint: data,
            host_running: Arc::clone(&self.running),
            quit: Arc::clone(&quit),
            events: self.events.clone(),
            poll_interval: self.config.poll_interval(),
            peer_timeout: self.config.peer_timeout(),
            traffic,
        };
        let peers = Arc::clone(&self.peers);
        let retired = Arc::clone(&self.retired_traffic);
        let worker_id = id.clone();
        let worker_thread = thread::Builder::new()
            .name(format!("peer-{}", short(&id)))
            .spawn(move || {
                worker.run();
                let entry = peers.lock().remove(&worker_id);
                if let Some(entry) = entry {
                    retired.lock().merge(&entry.traffic.lock());
                }
            })?;

        let listener = QuitListener {
            id: id.clone(),
            world: Arc::clone(&self.world),
            endpoint: quit_endpoint,
            joiner,
            kick,
            host_running: Arc::clone(&self.running),
            quit,
            poll_interval: self.config.poll_interval(),
            registration_timeout: self.config.registration_timeout(),
        };
        let listener_thread = thread::Builder::new()
            .name(format!("quit-{}", short(&id)))
            .spawn(move || listener.run())?;

        // A worker that already finished has removed its entry; its
        // threads are simply left detached.
        if let Some(entry) = self.peers.lock().get_mut(&id) {
            entry.threads.push(worker_thread);
            entry.threads.push(listener_thread);
        }

        emit(
            &self.events,
            SessionEvent::PeerJoined {
                id,
                endpoint: joiner,
            },
        );
        Ok(())
    }
}

fn short(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
