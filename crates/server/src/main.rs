mod config;
mod events;
mod tui;

use std::io;
use std::path::PathBuf;
use std::sync::mpsc::RecvTimeoutError;
use std::time::{Duration, Instant};

use anyhow::Result;
use asteroids::{
    Choice, DecisionRequest, PacketLossSimulation, Session, SessionConfig, SessionEvent,
};
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, execute};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use events::describe;
use tui::{HostView, TuiState};

#[derive(Parser)]
#[command(name = "asteroids-host")]
#[command(about = "Hosts a multiplayer asteroids session")]
struct Args {
    #[arg(short, long, help = "Address to bind the accept socket to")]
    bind: Option<String>,

    #[arg(short, long, help = "Port to accept joiners on (0 picks a free one)")]
    port: Option<u16>,

    #[arg(short, long, help = "Display name of the host ship")]
    name: Option<String>,

    #[arg(short, long, help = "TOML file with session settings")]
    config: Option<PathBuf>,

    #[arg(long, help = "Let asteroids destroy each other")]
    chain_reaction: bool,

    #[arg(long, help = "Seed for asteroid spawns")]
    seed: Option<u64>,

    #[arg(long, help = "Host a new game whenever everybody is gone")]
    restart: bool,

    #[arg(long)]
    headless: bool,

    #[arg(long, help = "Enable outgoing packet loss simulation")]
    simulate_packet_loss: bool,

    #[arg(long, default_value_t = 0.0, help = "Packet loss percentage (0-100)")]
    loss_percent: f32,
}

impl Args {
    fn session_config(&self) -> Result<SessionConfig> {
        let mut config = config::load(self.config.as_deref())?;

        if self.bind.is_some() || self.port.is_some() {
            let (file_host, file_port) = config
                .net
                .bind_addr
                .rsplit_once(':')
                .unwrap_or((config.net.bind_addr.as_str(), "0"));
            let host = self.bind.clone().unwrap_or_else(|| file_host.to_string());
            let port = self
                .port
                .map(|p| p.to_string())
                .unwrap_or_else(|| file_port.to_string());
            config.net.bind_addr = format!("{}:{}", host, port);
        }
        if let Some(name) = &self.name {
            config.name = name.clone();
        }
        if self.chain_reaction {
            config.engine.chain_reaction = true;
        }
        if self.seed.is_some() {
            config.engine.seed = self.seed;
        }
        if self.simulate_packet_loss {
            config.net.packet_loss = PacketLossSimulation::new(self.loss_percent);
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.session_config()?;
    let mut session = Session::new(config);

    if args.headless {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
        let port = session.start_host()?;
        log::info!("Hosting on port {}", port);
        run_headless(&mut session, args.restart)?;
        log::info!("Host shutting down");
    } else {
        session.start_host()?;
        run_with_tui(&mut session, args.restart)?;
    }

    session.quit();
    Ok(())
}

fn run_headless(session: &mut Session, restart: bool) -> Result<()> {
    loop {
        let event = match session.events().recv_timeout(Duration::from_millis(100)) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return Ok(()),
        };

        let (level, message) = describe(&event);
        log::log!(level, "{}", message);

        match event {
            SessionEvent::Decision(DecisionRequest::OwnShipDestroyed) => {
                session.resolve(Choice::Spectate)?;
            }
            SessionEvent::Decision(DecisionRequest::AllPeersGone) => {
                if let Some(traffic) = session.host_traffic() {
                    log::info!("Peer traffic: {}", traffic);
                }
                if !restart {
                    return Ok(());
                }
                session.resolve(Choice::HostNewGame)?;
                log::info!("Hosting again on port {}", session.host_port().unwrap_or_default());
            }
            _ => {}
        }
    }
}

fn run_with_tui(session: &mut Session, restart: bool) -> Result<()> {
    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, cursor::Hide)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let started = Instant::now();
    let mut tui_state = TuiState::new();
    tui_state.log_info(format!(
        "Hosting on port {}",
        session.host_port().unwrap_or_default()
    ));

    let mut running = true;
    while running {
        while let Ok(event) = session.events().try_recv() {
            let (level, message) = describe(&event);
            if level <= log::Level::Info {
                tui_state.push_log(level, message);
            }

            match event {
                SessionEvent::Decision(DecisionRequest::OwnShipDestroyed) => {
                    session.resolve(Choice::Spectate)?;
                }
                SessionEvent::Decision(DecisionRequest::AllPeersGone) => {
                    if restart {
                        session.resolve(Choice::HostNewGame)?;
                        tui_state.log_info(format!(
                            "Hosting again on port {}",
                            session.host_port().unwrap_or_default()
                        ));
                    } else {
                        tui_state.set_awaiting_restart(true);
                    }
                }
                _ => {}
            }
        }

        if event::poll(Duration::from_millis(16))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => running = false,
                        KeyCode::Char('n') if tui_state.awaiting_restart() => {
                            session.resolve(Choice::HostNewGame)?;
                            tui_state.set_awaiting_restart(false);
                            tui_state.log_info(format!(
                                "Hosting again on port {}",
                                session.host_port().unwrap_or_default()
                            ));
                        }
                        _ => {}
                    }
                }
            }
        }

        let view = HostView::capture(session, started);
        terminal.draw(|frame| {
            tui::render(frame, &tui_state, &view);
        })?;
    }

    tui_state.log_info("Shutting down...");
    session.quit();

    terminal::disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, cursor::Show)?;

    Ok(())
}
