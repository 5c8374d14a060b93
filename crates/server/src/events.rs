use asteroids::{DecisionRequest, SessionEvent};
use log::Level;

/// A log line for a session event.
pub fn describe(event: &SessionEvent) -> (Level, String) {
    match event {
        SessionEvent::PeerJoined { id, endpoint } => {
            (Level::Info, format!("Peer {} joined from {}", id, endpoint))
        }
        SessionEvent::PeerLeft { id, reason } => {
            (Level::Info, format!("Peer {} {}", id, reason.as_str()))
        }
        SessionEvent::Sound(cue) => (Level::Debug, format!("Sound {:?}", cue)),
        SessionEvent::Decision(request) => (Level::Warn, decision_text(*request).to_string()),
        SessionEvent::GameOver { name, score } => {
            (Level::Info, format!("Game over for {} with {} points", name, score))
        }
        SessionEvent::Error { message } => (Level::Error, message.clone()),
    }
}

pub fn decision_text(request: DecisionRequest) -> &'static str {
    match request {
        DecisionRequest::OwnShipDestroyed => "Host ship destroyed, still serving peers",
        DecisionRequest::AllPeersGone => "Every peer left and the host ship is gone",
        DecisionRequest::HostGone => "Host connection lost",
    }
}
