mod autopilot;
mod config;

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::time::{Duration, Instant};

use anyhow::Result;
use asteroids::{
    Choice, ConnectionEndpoint, DecisionRequest, FrameListener, ScoreSink, Session,
    SessionEvent,
};
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "asteroids-client")]
#[command(about = "Plays asteroids alone or joins a host, flown by an autopilot")]
struct Args {
    #[command(subcommand)]
    mode: Mode,

    #[arg(short, long, help = "Display name of the ship")]
    name: Option<String>,

    #[arg(short, long, help = "TOML file with session settings")]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OnDeath::Spectate)]
    on_death: OnDeath,

    #[arg(long, help = "Stop after this many seconds")]
    duration: Option<u64>,

    #[arg(long, help = "Seed for asteroid spawns in solo games")]
    seed: Option<u64>,

    #[arg(long, help = "Add random thrust to the autopilot")]
    jitter: bool,
}

#[derive(Subcommand)]
enum Mode {
    /// Play alone.
    Solo,
    /// Join a running host.
    Join {
        #[arg(long, default_value = "127.0.0.1")]
        host: IpAddr,
        port: u16,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OnDeath {
    Spectate,
    Menu,
}

/// Counts frames and reports the rate now and then.
#[derive(Default)]
struct FrameCounter {
    frames: AtomicU64,
}

impl FrameListener for FrameCounter {
    fn frame_ready(&self, since_tick: Duration) {
        let frames = self.frames.fetch_add(1, Ordering::Relaxed) + 1;
        if frames % 600 == 0 {
            log::debug!("{} frames drawn, {:?} since last tick", frames, since_tick);
        }
    }
}

struct LogScores;

impl ScoreSink for LogScores {
    fn record(&self, name: &str, score: u32) {
        log::info!("Final score for {}: {}", name, score);
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = config::load(args.config.as_deref())?;
    if let Some(name) = &args.name {
        config.name = name.clone();
    }
    if args.seed.is_some() {
        config.engine.seed = args.seed;
    }

    let frames = Arc::new(FrameCounter::default());
    let mut session = Session::new(config)
        .with_frame_listener(Arc::clone(&frames) as Arc<dyn FrameListener>)
        .with_score_sink(Arc::new(LogScores));

    match args.mode {
        Mode::Solo => session.start_solo()?,
        Mode::Join { host, port } => {
            let target = ConnectionEndpoint::new(host, port);
            session.join(target)?;
            log::info!("Joined {}", target);
        }
    }

    let pilot = autopilot::spawn(Arc::clone(session.world()), args.jitter)?;
    let deadline = args
        .duration
        .map(|secs| Instant::now() + Duration::from_secs(secs));

    run(&mut session, args.on_death, deadline)?;

    session.quit();
    if pilot.join().is_err() {
        log::warn!("autopilot panicked");
    }
    log::info!("{} frames drawn", frames.frames.load(Ordering::Relaxed));
    Ok(())
}

fn run(session: &mut Session, on_death: OnDeath, deadline: Option<Instant>) -> Result<()> {
    loop {
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            log::info!("Time is up with {} points", session.world().local_score());
            return Ok(());
        }

        let event = match session.events().recv_timeout(Duration::from_millis(100)) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return Ok(()),
        };

        match event {
            SessionEvent::GameOver { .. } => return Ok(()),
            SessionEvent::Decision(DecisionRequest::OwnShipDestroyed) => match on_death {
                OnDeath::Spectate => {
                    log::info!("Ship destroyed, spectating");
                    session.resolve(Choice::Spectate)?;
                }
                OnDeath::Menu => {
                    log::info!("Ship destroyed, leaving");
                    session.resolve(Choice::ReturnToMenu)?;
                    return Ok(());
                }
            },
            SessionEvent::Decision(DecisionRequest::HostGone) => {
                log::warn!("The host is gone");
                session.resolve(Choice::ReturnToMenu)?;
                return Ok(());
            }
            SessionEvent::Decision(DecisionRequest::AllPeersGone) => {}
            SessionEvent::Error { message } => log::error!("{}", message),
            SessionEvent::Sound(cue) => log::trace!("sound {:?}", cue),
            SessionEvent::PeerJoined { .. } | SessionEvent::PeerLeft { .. } => {}
        }
    }
}
