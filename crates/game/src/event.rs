use std::sync::mpsc::Sender;

use crate::net::ConnectionEndpoint;

/// Audio cues for whoever plays sound effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundCue {
    Explosion,
}

/// A situation the application must settle with [`crate::Session::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionRequest {
    /// The local ship was destroyed: spectate or leave.
    OwnShipDestroyed,
    /// The host's ship is gone and so is every peer: start over or leave.
    AllPeersGone,
    /// The host quit or stopped answering.
    HostGone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    Quit,
    Timeout,
    Error,
}

impl DisconnectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisconnectReason::Quit => "quit",
            DisconnectReason::Timeout => "timed out",
            DisconnectReason::Error => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    PeerJoined {
        id: String,
        endpoint: ConnectionEndpoint,
    },
    PeerLeft {
        id: String,
        reason: DisconnectReason,
    },
    Sound(SoundCue),
    Decision(DecisionRequest),
    GameOver {
        name: String,
        score: u32,
    },
    Error {
        message: String,
    },
}

/// Sends without caring whether anybody still listens.
pub(crate) fn emit(events: &Sender<SessionEvent>, event: SessionEvent) {
    if events.send(event).is_err() {
        log::trace!("session event dropped, receiver is gone");
    }
}
