// Terminal demo using ratatui
// Drives either player variant through PlaybackControl and shows what the
// event notifier reports.

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame, Terminal,
};
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::control::PlaybackControl;
use crate::error::Result;
use crate::events::{EventKind, PlayerEvent};
use crate::player::engine::{Player, TransportState};
use crate::player::item::MediaItem;
use crate::youtube::embed::EmbedState;
use crate::youtube::player::YoutubePlayer;

const EVENT_LOG_LINES: usize = 200;
const VOLUME_STEP: f64 = 0.05;
const RATE_STEP: f64 = 0.25;
const SEEK_STEP: f64 = 10.0;

/// The player variant the demo is driving.
#[derive(Clone)]
pub enum Deck {
    Buffer(Arc<Player>),
    Embedded(Arc<YoutubePlayer>),
}

impl Deck {
    fn control(&self) -> Arc<dyn PlaybackControl> {
        match self {
            Deck::Buffer(player) => player.clone() as Arc<dyn PlaybackControl>,
            Deck::Embedded(player) => player.clone() as Arc<dyn PlaybackControl>,
        }
    }

    fn title(&self) -> &'static str {
        match self {
            Deck::Buffer(_) => "Unified Player (audio)",
            Deck::Embedded(_) => "Unified Player (YouTube)",
        }
    }

    async fn snapshot(&self) -> Snapshot {
        let ready = self.control().is_ready().await;
        match self {
            Deck::Buffer(player) => {
                let state = player.state().await;
                Snapshot {
                    ready,
                    items: player.queue_labels().await,
                    cursor: player.cursor().await,
                    playing: state == TransportState::Playing,
                    state: format!("{:?}", state),
                    level: player.volume().await,
                    volume_percent: player.volume().await * 100.0,
                    rate: player.playback_rate().await,
                    muted: player.is_muted().await,
                    time: player.position().await.map_or(0.0, |p| p.as_secs_f64()),
                    duration: player
                        .current_buffer()
                        .await
                        .map_or(0.0, |buffer| buffer.duration().as_secs_f64()),
                }
            }
            Deck::Embedded(player) => {
                let state = player.current_state().await;
                let volume = player.volume().await;
                let max_volume = player.max_volume().await;
                Snapshot {
                    ready,
                    items: player.current_url().await.into_iter().collect(),
                    cursor: 0,
                    playing: state == EmbedState::Playing,
                    state: state.to_string(),
                    level: if max_volume > 0.0 { volume / max_volume } else { 0.0 },
                    volume_percent: volume,
                    rate: player.playback_rate().await,
                    muted: player.is_muted().await,
                    time: player.current_time().await,
                    duration: player.duration().await,
                }
            }
        }
    }
}

#[derive(Debug, Default)]
struct Snapshot {
    ready: bool,
    items: Vec<String>,
    cursor: usize,
    playing: bool,
    state: String,
    // Caller-side 0-1 level, what set_volume takes
    level: f64,
    volume_percent: f64,
    rate: f64,
    muted: bool,
    time: f64,
    duration: f64,
}

enum AppMode {
    Normal,
    AddingUrl,
}

pub struct PlayerApp {
    deck: Deck,
    control: Arc<dyn PlaybackControl>,
    snapshot: Snapshot,
    event_log: VecDeque<String>,
    events_rx: mpsc::UnboundedReceiver<PlayerEvent>,
    url_input: String,
    mode: AppMode,
    random: bool,
    repeat: bool,
    // Set while play_queue owns advancing
    queue_running: Arc<AtomicBool>,
    should_quit: bool,
    status_message: String,
}

impl PlayerApp {
    pub fn new(deck: Deck) -> Self {
        let control = deck.control();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        for kind in EventKind::ALL {
            let tx = events_tx.clone();
            control.events().on(kind, move |event| {
                let _ = tx.send(event.clone());
            });
        }

        PlayerApp {
            deck,
            control,
            snapshot: Snapshot::default(),
            event_log: VecDeque::new(),
            events_rx,
            url_input: String::new(),
            mode: AppMode::Normal,
            random: false,
            repeat: false,
            queue_running: Arc::new(AtomicBool::new(false)),
            should_quit: false,
            status_message: String::new(),
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.event_loop(&mut terminal).await;

        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
        terminal.show_cursor()?;

        result
    }

    async fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
        loop {
            while let Ok(event) = self.events_rx.try_recv() {
                self.on_player_event(event).await;
            }
            self.snapshot = self.deck.snapshot().await;

            terminal.draw(|f| self.draw_ui(f))?;

            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    self.handle_input(key.code).await;
                }
            }

            if self.should_quit {
                return Ok(());
            }
        }
    }

    async fn on_player_event(&mut self, event: PlayerEvent) {
        match &event {
            PlayerEvent::Random(enabled) => self.random = *enabled,
            PlayerEvent::Repeat(enabled) => self.repeat = *enabled,
            PlayerEvent::Error(message) => self.status_message = format!("Error: {}", message),
            // Auto-advance to the next item when the current one finishes
            PlayerEvent::Ended
                if matches!(self.deck, Deck::Buffer(_)) && !self.queue_running.load(Ordering::SeqCst) =>
            {
                if self.control.has_next().await {
                    self.status_message = "Track finished, playing next...".to_string();
                    self.play_next().await;
                } else {
                    self.status_message = "Playback finished".to_string();
                }
            }
            _ => {}
        }

        let line = match &event {
            PlayerEvent::Log(message) => format!("LOG: {}", message),
            PlayerEvent::Error(message) => format!("ERROR: {}", message),
            other => format!("{}: {:?}", other.kind(), other),
        };
        self.event_log.push_front(line);
        self.event_log.truncate(EVENT_LOG_LINES);
    }

    fn draw_ui(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(10), Constraint::Length(5)])
            .split(frame.size());

        // Header
        let title = if !self.status_message.is_empty() {
            self.status_message.clone()
        } else {
            match self.mode {
                AppMode::AddingUrl => format!("Add URL: {}_", self.url_input),
                AppMode::Normal => "Controls: [a]Add [Space]Play/Pause [s]Stop [r]Replay [n]Next [p]Prev \
                     [Enter]Play queue [↑/↓]Volume [+/-]Rate [←/→]Seek [m]Mute [z]Random [l]Repeat [c]Clear [q]Quit"
                    .to_string(),
            }
        };
        let header = Paragraph::new(title).block(Block::default().borders(Borders::ALL).title(self.deck.title()));
        frame.render_widget(header, chunks[0]);

        let main_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(chunks[1]);

        // Queue
        let queue_items: Vec<ListItem> = self
            .snapshot
            .items
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let style = if i == self.snapshot.cursor {
                    Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                ListItem::new(label.clone()).style(style)
            })
            .collect();
        let queue_list = List::new(queue_items).block(Block::default().borders(Borders::ALL).title("Queue"));
        frame.render_widget(queue_list, main_chunks[0]);

        // Notifications, newest first
        let log_items: Vec<ListItem> = self
            .event_log
            .iter()
            .map(|line| {
                let style = if line.starts_with("ERROR") {
                    Style::default().fg(Color::Red)
                } else {
                    Style::default()
                };
                ListItem::new(line.clone()).style(style)
            })
            .collect();
        let log_list = List::new(log_items).block(Block::default().borders(Borders::ALL).title("Events"));
        frame.render_widget(log_list, main_chunks[1]);

        // Player info
        let snapshot = &self.snapshot;
        let time_str = if snapshot.duration > 0.0 {
            format!("{} / {}", Self::format_time(snapshot.time), Self::format_time(snapshot.duration))
        } else {
            Self::format_time(snapshot.time)
        };
        let player_info = format!(
            "State: {}{} | Volume: {:.0}%{} | Rate: {:.2}x | Time: {}\nRandom: {} | Repeat: {} | Queue: {} items",
            snapshot.state,
            if snapshot.ready { "" } else { " (loading)" },
            snapshot.volume_percent,
            if snapshot.muted { " (muted)" } else { "" },
            snapshot.rate,
            time_str,
            if self.random { "on" } else { "off" },
            if self.repeat { "on" } else { "off" },
            snapshot.items.len(),
        );
        let player_widget = Paragraph::new(player_info).block(Block::default().borders(Borders::ALL).title("Player"));
        frame.render_widget(player_widget, chunks[2]);
    }

    async fn handle_input(&mut self, key: KeyCode) {
        if !matches!(self.mode, AppMode::AddingUrl) {
            self.status_message.clear();
        }

        let result = match self.mode {
            AppMode::AddingUrl => {
                match key {
                    KeyCode::Char(c) => self.url_input.push(c),
                    KeyCode::Backspace => {
                        self.url_input.pop();
                    }
                    KeyCode::Enter => {
                        let url = std::mem::take(&mut self.url_input);
                        self.mode = AppMode::Normal;
                        self.add_url(url).await;
                    }
                    KeyCode::Esc => {
                        self.mode = AppMode::Normal;
                        self.url_input.clear();
                    }
                    _ => {}
                }
                Ok(())
            }
            AppMode::Normal => match key {
                KeyCode::Char('q') => {
                    self.should_quit = true;
                    self.control.stop().await
                }
                KeyCode::Char('a') => {
                    self.mode = AppMode::AddingUrl;
                    Ok(())
                }
                KeyCode::Char(' ') => self.toggle_pause().await,
                KeyCode::Char('s') => self.control.stop().await,
                KeyCode::Char('r') => self.control.replay().await,
                KeyCode::Char('n') => {
                    self.play_next().await;
                    Ok(())
                }
                KeyCode::Char('p') => {
                    self.play_previous().await;
                    Ok(())
                }
                KeyCode::Enter => {
                    self.play_queue();
                    Ok(())
                }
                KeyCode::Up => self.control.set_volume(self.snapshot.level + VOLUME_STEP).await.map(|_| ()),
                KeyCode::Down => self.control.set_volume(self.snapshot.level - VOLUME_STEP).await.map(|_| ()),
                KeyCode::Char('+') => self.control.set_playback_rate(self.snapshot.rate + RATE_STEP).await.map(|_| ()),
                KeyCode::Char('-') => self.control.set_playback_rate(self.snapshot.rate - RATE_STEP).await.map(|_| ()),
                KeyCode::Right => self.control.seek(self.snapshot.time + SEEK_STEP).await,
                KeyCode::Left => self.control.seek(self.snapshot.time - SEEK_STEP).await,
                KeyCode::Char('m') => self.control.set_muted(!self.snapshot.muted).await,
                KeyCode::Char('z') => self.control.set_random(!self.random).await,
                KeyCode::Char('l') => self.control.set_repeat(!self.repeat).await,
                KeyCode::Char('c') => self.control.empty_queue().await,
                _ => Ok(()),
            },
        };

        if let Err(e) = result {
            self.status_message = format!("Error: {}", e);
        }
    }

    async fn add_url(&mut self, url: String) {
        let url = url.trim().to_string();
        self.status_message = format!("Loading: {}...", url);

        let control = self.control.clone();
        let item = MediaItem::Url(url.clone());
        // Embedded enqueue may wait for the platform; keep the UI responsive
        tokio::spawn(async move {
            if let Err(e) = control.enqueue(item).await {
                tracing::warn!("Failed to enqueue {}: {}", url, e);
            }
        });
    }

    async fn toggle_pause(&mut self) -> Result<()> {
        if self.snapshot.playing {
            self.control.pause().await
        } else {
            self.control.play().await
        }
    }

    async fn play_next(&mut self) {
        // next() only repositions; play() starts the new item
        let result = match self.control.next().await {
            Ok(()) => self.control.play().await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => self.status_message = "Playing next track...".to_string(),
            Err(e) => self.status_message = format!("Error: {}", e),
        }
    }

    async fn play_previous(&mut self) {
        let result = match self.control.previous().await {
            Ok(()) => self.control.play().await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => self.status_message = "Playing previous track...".to_string(),
            Err(e) => self.status_message = format!("Error: {}", e),
        }
    }

    fn play_queue(&mut self) {
        if self.queue_running.swap(true, Ordering::SeqCst) {
            return;
        }
        let control = self.control.clone();
        let running = self.queue_running.clone();
        self.status_message = "Playing queue...".to_string();
        tokio::spawn(async move {
            if let Err(e) = control.play_queue().await {
                tracing::info!("Queue playback stopped: {}", e);
            }
            running.store(false, Ordering::SeqCst);
        });
    }

    fn format_time(seconds: f64) -> String {
        let mins = (seconds / 60.0) as u64;
        let secs = (seconds % 60.0) as u64;
        format!("{:02}:{:02}", mins, secs)
    }
}
