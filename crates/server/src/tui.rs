use std::collections::VecDeque;
use std::time::Instant;

use asteroids::{Entity, NetworkStats, Session};
use log::Level;
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, List, ListItem, Paragraph};

const MAX_LOG_LINES: usize = 200;

pub struct PlayerRow {
    pub name: String,
    pub score: u32,
    pub destroyed: bool,
    pub local: bool,
}

/// Everything the dashboard shows, captured once per frame.
pub struct HostView {
    pub port: u16,
    pub uptime_secs: u64,
    pub max_peers: usize,
    pub asteroids: usize,
    pub players: Vec<PlayerRow>,
    pub traffic: NetworkStats,
}

impl HostView {
    pub fn capture(session: &Session, started: Instant) -> Self {
        let world = session.world();
        let players = world
            .ships()
            .iter()
            .enumerate()
            .map(|(index, ship)| PlayerRow {
                name: ship.name().to_string(),
                score: ship.score(),
                destroyed: ship.is_destroyed(),
                local: index == 0,
            })
            .collect();

        Self {
            port: session.host_port().unwrap_or_default(),
            uptime_secs: started.elapsed().as_secs(),
            max_peers: session.config().net.max_peers,
            asteroids: world.asteroid_count(),
            players,
            traffic: session.host_traffic().unwrap_or_default(),
        }
    }

    fn peer_count(&self) -> usize {
        self.players.len().saturating_sub(1)
    }
}

#[derive(Default)]
pub struct TuiState {
    log: VecDeque<(Level, String)>,
    awaiting_restart: bool,
}

impl TuiState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_log(&mut self, level: Level, message: impl Into<String>) {
        if self.log.len() == MAX_LOG_LINES {
            self.log.pop_front();
        }
        self.log.push_back((level, message.into()));
    }

    pub fn log_info(&mut self, message: impl Into<String>) {
        self.push_log(Level::Info, message);
    }

    pub fn set_awaiting_restart(&mut self, awaiting: bool) {
        self.awaiting_restart = awaiting;
    }

    pub fn awaiting_restart(&self) -> bool {
        self.awaiting_restart
    }
}

pub fn render(frame: &mut Frame, state: &TuiState, view: &HostView) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(8),
            Constraint::Min(5),
            Constraint::Length(3),
        ])
        .split(frame.area());

    render_header(frame, chunks[0], view);
    render_status(frame, chunks[1], view);
    render_players(frame, chunks[2], view);
    render_log(frame, chunks[3], state);
    render_help(frame, chunks[4], state);
}

fn render_header(frame: &mut Frame, area: Rect, view: &HostView) {
    let title = format!(
        " Asteroids Host - Uptime: {} ",
        format_duration(view.uptime_secs)
    );
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let text = format!(
        "Port: {}  |  Peers: {}  |  Asteroids: {}",
        view.port,
        view.peer_count(),
        view.asteroids
    );
    let paragraph = Paragraph::new(text)
        .block(block)
        .style(Style::default().fg(Color::White));

    frame.render_widget(paragraph, area);
}

fn render_status(frame: &mut Frame, area: Rect, view: &HostView) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);

    let block = Block::default()
        .title(" Seats ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green));

    let max = view.max_peers.max(1);
    let gauge = Gauge::default()
        .block(block)
        .gauge_style(Style::default().fg(Color::Green))
        .ratio((view.peer_count() as f64 / max as f64).min(1.0))
        .label(format!("{}/{} peers", view.peer_count(), max));

    frame.render_widget(gauge, columns[0]);
    render_traffic(frame, columns[1], &view.traffic);
}

fn render_traffic(frame: &mut Frame, area: Rect, traffic: &NetworkStats) {
    let block = Block::default()
        .title(" Traffic ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta));

    let stale_style = if traffic.packets_stale > 0 || traffic.packets_dropped > 0 {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::Gray)
    };
    let line = Line::from(vec![
        Span::styled(
            format!(
                "out {} / {}  in {} / {}  ",
                traffic.packets_sent,
                format_bytes(traffic.bytes_sent),
                traffic.packets_received,
                format_bytes(traffic.bytes_received)
            ),
            Style::default().fg(Color::White),
        ),
        Span::styled(
            format!(
                "stale {}  dropped {}",
                traffic.packets_stale, traffic.packets_dropped
            ),
            stale_style,
        ),
    ]);

    frame.render_widget(Paragraph::new(line).block(block), area);
}

fn render_players(frame: &mut Frame, area: Rect, view: &HostView) {
    let block = Block::default()
        .title(" Players ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));

    let lines: Vec<Line> = view
        .players
        .iter()
        .map(|player| {
            let name = if player.local {
                format!("{} (host)", player.name)
            } else {
                player.name.clone()
            };
            let status = if player.destroyed {
                Span::styled("destroyed", Style::default().fg(Color::Red))
            } else {
                Span::styled("flying", Style::default().fg(Color::Green))
            };
            Line::from(vec![
                Span::styled(format!("{:<40}", name), Style::default().fg(Color::White)),
                Span::styled(format!("{:>6}  ", player.score), Style::default().fg(Color::Gray)),
                status,
            ])
        })
        .collect();

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_log(frame: &mut Frame, area: Rect, state: &TuiState) {
    let block = Block::default()
        .title(" Log ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Blue));

    let visible = area.height.saturating_sub(2) as usize;
    let items: Vec<ListItem> = state
        .log
        .iter()
        .skip(state.log.len().saturating_sub(visible))
        .map(|(level, message)| {
            let color = match level {
                Level::Error => Color::Red,
                Level::Warn => Color::Yellow,
                Level::Info => Color::White,
                Level::Debug | Level::Trace => Color::DarkGray,
            };
            ListItem::new(Span::styled(message.clone(), Style::default().fg(color)))
        })
        .collect();

    frame.render_widget(List::new(items).block(block), area);
}

fn render_help(frame: &mut Frame, area: Rect, state: &TuiState) {
    let block = Block::default()
        .title(" Controls ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let hint = if state.awaiting_restart() {
        "Press 'n' to host a new game, 'q' or ESC to quit"
    } else {
        "Press 'q' or ESC to quit"
    };
    let text = Paragraph::new(hint).block(block).style(
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::ITALIC),
    );

    frame.render_widget(text, area);
}

fn format_bytes(bytes: u64) -> String {
    match bytes {
        b if b >= 1024 * 1024 => format!("{:.1} MiB", b as f64 / (1024.0 * 1024.0)),
        b if b >= 1024 => format!("{:.1} KiB", b as f64 / 1024.0),
        b => format!("{} B", b),
    }
}

fn format_duration(secs: u64) -> String {
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;
    format!("{:02}:{:02}:{:02}", hours, mins, secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_formatting() {
        assert_eq!(format_duration(0), "00:00:00");
        assert_eq!(format_duration(3725), "01:02:05");
    }

    #[test]
    fn byte_formatting() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KiB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MiB");
    }

    #[test]
    fn log_is_bounded() {
        let mut state = TuiState::new();
        for i in 0..MAX_LOG_LINES + 10 {
            state.log_info(format!("line {}", i));
        }
        assert_eq!(state.log.len(), MAX_LOG_LINES);
        assert_eq!(state.log.front().unwrap().1, "line 10");
    }
}
