// ==========================================
// PLAYER (buffer/stream variant)
// ==========================================
// Owns the queue, the cursor, the transport state and the single active
// source. All mutable state sits behind one async mutex; the only work done
// outside it is decoding and waiting for a source to terminate.
//
// Each started source gets a generation number. Detaching (stop, next,
// empty_queue, or starting another source) bumps the generation and aborts
// the termination watcher before anything new starts, so a late "ended"
// from an old source is dropped instead of being reported.

use async_trait::async_trait;
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::config::PlayerConfig;
use crate::control::PlaybackControl;
use crate::error::{PlayerError, Result};
use crate::events::{EventNotifier, PlayerEvent};
use crate::logging::Reporter;
use crate::player::audio::RodioBackend;
use crate::player::item::{DecodedBuffer, MediaItem, Playable};
use crate::player::queue::Queue;
use crate::player::source::{ActiveSource, AudioBackend, SourceRequest, Termination};
use crate::scale::LinearScale;

pub const PLAYBACK_RATE_RANGE: (f64, f64) = (0.75, 2.0);
pub const VOLUME_RANGE: (f64, f64) = (0.0, 1.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Idle,    // Nothing loaded
    Playing, // Active source running
    Paused,  // Active source suspended, resumable in place
    Stopped, // Explicitly stopped; replay/play start over
    Ended,   // Active source reached its end
}

/// Resolves when the source it was handed out for terminates.
///
/// If that source is replaced or stopped first, resolves to
/// `PlayerError::Superseded`.
#[derive(Debug)]
pub struct PlaybackCompletion {
    rx: oneshot::Receiver<Termination>,
}

impl PlaybackCompletion {
    pub async fn finished(self) -> Result<()> {
        match self.rx.await {
            Ok(Termination::Ended) => Ok(()),
            Ok(Termination::Failed(message)) => Err(PlayerError::Playback(message)),
            Err(_) => Err(PlayerError::Superseded),
        }
    }
}

struct ActiveSlot {
    source: Box<dyn ActiveSource>,
    watcher: JoinHandle<()>,
    waiters: Vec<oneshot::Sender<Termination>>,
}

struct Inner {
    queue: Queue,
    active: Option<ActiveSlot>,
    // Media of the active or most recently stopped source; replay and seek use it
    loaded: Option<Playable>,
    state: TransportState,
    generation: u64,
    volume: f64,
    playback_rate: f64,
    muted: bool,
    random: bool,
    repeat: bool,
}

impl Inner {
    fn effective_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.volume as f32
        }
    }

    // Must run before any new source starts
    fn detach(&mut self) -> Option<ActiveSlot> {
        self.generation += 1;
        let slot = self.active.take()?;
        slot.watcher.abort();
        Some(slot)
    }

    fn stop_active(&mut self) -> Vec<oneshot::Sender<Termination>> {
        match self.detach() {
            Some(slot) => {
                slot.source.stop();
                slot.waiters
            }
            None => Vec::new(),
        }
    }

    fn completion(&mut self) -> Option<PlaybackCompletion> {
        let slot = self.active.as_mut()?;
        let (tx, rx) = oneshot::channel();
        slot.waiters.push(tx);
        Some(PlaybackCompletion { rx })
    }
}

pub struct Player {
    backend: Arc<dyn AudioBackend>,
    inner: Arc<Mutex<Inner>>,
    reporter: Reporter,
    volume_scale: LinearScale,
    rate_scale: LinearScale,
}

impl Player {
    pub fn new(backend: Arc<dyn AudioBackend>, config: &PlayerConfig) -> Self {
        let volume_scale = LinearScale::new(VOLUME_RANGE, VOLUME_RANGE, true);
        let rate_scale = LinearScale::clamped_identity(PLAYBACK_RATE_RANGE.0, PLAYBACK_RATE_RANGE.1);

        let inner = Inner {
            queue: Queue::new(),
            active: None,
            loaded: None,
            state: TransportState::Idle,
            generation: 0,
            volume: volume_scale.apply(config.initial_volume),
            playback_rate: rate_scale.apply(config.initial_playback_rate),
            muted: false,
            random: false,
            repeat: false,
        };

        let player = Player {
            backend,
            inner: Arc::new(Mutex::new(inner)),
            reporter: Reporter::new(config.debug),
            volume_scale,
            rate_scale,
        };

        player.reporter.log("Player ready");
        player.reporter.events.emit_deferred(PlayerEvent::Ready);
        player
    }

    /// Player on the default output device.
    pub fn with_default_output(config: &PlayerConfig) -> Self {
        Self::new(Arc::new(RodioBackend::new()), config)
    }

    // ==========================================
    // PLAYBACK
    // ==========================================
    /// `play()` that also hands back a completion for the source it
    /// started or resumed.
    pub async fn start(&self) -> Result<PlaybackCompletion> {
        let mut inner = self.inner.lock().await;

        if inner.state == TransportState::Paused && inner.active.is_some() {
            if let Some(slot) = &inner.active {
                slot.source.resume();
            }
            inner.state = TransportState::Playing;
            self.reporter.log("Play audio");
            self.reporter.emit(PlayerEvent::Play);
            return inner.completion().ok_or(PlayerError::NoSourceLoaded);
        }

        let item = self.deque(&inner)?;
        self.reporter.log("Play audio");
        self.reporter.emit(PlayerEvent::Play);
        self.start_source(&mut inner, item, Duration::ZERO, Vec::new())
    }

    fn deque(&self, inner: &Inner) -> Result<Playable> {
        match inner.queue.current() {
            Some(item) => {
                self.reporter.log("Deque audio");
                self.reporter.emit(PlayerEvent::Deque);
                Ok(item.clone())
            }
            None => Err(PlayerError::NoItemToPlay {
                index: inner.queue.cursor() as isize,
            }),
        }
    }

    fn start_source(
        &self,
        inner: &mut Inner,
        media: Playable,
        offset: Duration,
        mut waiters: Vec<oneshot::Sender<Termination>>,
    ) -> Result<PlaybackCompletion> {
        waiters.extend(inner.stop_active());

        let request = SourceRequest {
            media: media.clone(),
            offset,
            volume: inner.effective_volume(),
            playback_rate: inner.playback_rate as f32,
        };

        let started = match self.backend.start(request) {
            Ok(started) => started,
            Err(e) => {
                inner.state = TransportState::Idle;
                inner.loaded = None;
                self.reporter.error(&e);
                for waiter in waiters {
                    let _ = waiter.send(Termination::Failed(e.to_string()));
                }
                return Err(e);
            }
        };

        let watcher = tokio::spawn(watch_termination(
            self.inner.clone(),
            self.reporter.clone(),
            inner.generation,
            started.termination,
        ));

        let (tx, rx) = oneshot::channel();
        waiters.push(tx);
        inner.active = Some(ActiveSlot {
            source: started.source,
            watcher,
            waiters,
        });
        inner.loaded = Some(media);
        inner.state = TransportState::Playing;

        Ok(PlaybackCompletion { rx })
    }

    // Moves the cursor for play_queue. Returns false when the run is over.
    fn advance_for_queue(&self, inner: &mut Inner, played: &mut HashSet<usize>) -> bool {
        let len = inner.queue.len();
        if len == 0 {
            return false;
        }
        played.insert(inner.queue.cursor());

        let target = if inner.random {
            if played.len() >= len {
                if !inner.repeat {
                    return false;
                }
                played.clear();
                played.insert(inner.queue.cursor());
            }
            let remaining: Vec<usize> = (0..len).filter(|i| !played.contains(i)).collect();
            if remaining.is_empty() {
                // Single-item queue on repeat
                inner.queue.cursor()
            } else {
                remaining[rand::thread_rng().gen_range(0..remaining.len())]
            }
        } else if inner.queue.has_next() {
            inner.queue.cursor() + 1
        } else if inner.repeat {
            0
        } else {
            return false;
        };

        if inner.queue.move_to(target as isize).is_err() {
            return false;
        }
        self.reporter.log("Next audio");
        self.reporter.emit(PlayerEvent::Next);
        true
    }

    fn check_finite(name: &'static str, value: f64) -> Result<()> {
        if value.is_finite() {
            Ok(())
        } else {
            Err(PlayerError::InvalidControlValue { name, value })
        }
    }

    async fn decode(&self, bytes: Vec<u8>) -> Result<DecodedBuffer> {
        let backend = self.backend.clone();
        tokio::task::spawn_blocking(move || backend.decode(bytes))
            .await
            .map_err(|e| PlayerError::Decode(format!("Task join error: {}", e)))?
    }

    // ==========================================
    // QUERIES
    // ==========================================
    pub async fn state(&self) -> TransportState {
        self.inner.lock().await.state
    }

    pub async fn cursor(&self) -> usize {
        self.inner.lock().await.queue.cursor()
    }

    pub async fn queue_len(&self) -> usize {
        self.inner.lock().await.queue.len()
    }

    pub async fn queue_labels(&self) -> Vec<String> {
        self.inner.lock().await.queue.iter().map(Playable::label).collect()
    }

    pub async fn volume(&self) -> f64 {
        self.inner.lock().await.volume
    }

    pub async fn playback_rate(&self) -> f64 {
        self.inner.lock().await.playback_rate
    }

    pub async fn is_muted(&self) -> bool {
        self.inner.lock().await.muted
    }

    /// Media position of the active source.
    pub async fn position(&self) -> Option<Duration> {
        let inner = self.inner.lock().await;
        inner.active.as_ref().map(|slot| slot.source.position())
    }

    /// The decoded buffer behind the loaded source.
    pub async fn current_buffer(&self) -> Result<DecodedBuffer> {
        let inner = self.inner.lock().await;
        match &inner.loaded {
            Some(Playable::Buffer(buffer)) => Ok(buffer.clone()),
            Some(Playable::Url(_)) => Err(PlayerError::Unsupported("streamed sources have no buffer")),
            None => Err(PlayerError::NoSourceLoaded),
        }
    }
}

async fn watch_termination(
    inner: Arc<Mutex<Inner>>,
    reporter: Reporter,
    generation: u64,
    termination: oneshot::Receiver<Termination>,
) {
    let outcome = termination
        .await
        .unwrap_or_else(|_| Termination::Failed("source closed without finishing".into()));

    let mut inner = inner.lock().await;
    if inner.generation != generation {
        return;
    }
    let Some(slot) = inner.active.take() else {
        return;
    };

    match &outcome {
        Termination::Ended => {
            inner.state = TransportState::Ended;
            reporter.log("Audio ended");
            reporter.emit(PlayerEvent::Ended);
        }
        Termination::Failed(message) => {
            inner.state = TransportState::Idle;
            reporter.error(&PlayerError::Playback(message.clone()));
        }
    }

    for waiter in slot.waiters {
        let _ = waiter.send(outcome.clone());
    }
}

#[async_trait]
impl PlaybackControl for Player {
    fn events(&self) -> &EventNotifier {
        &self.reporter.events
    }

    async fn enqueue(&self, item: MediaItem) -> Result<()> {
        if let Err(e) = item.validate() {
            self.reporter.error(&e);
            return Err(e);
        }

        let playable = match item {
            MediaItem::Url(url) => Playable::Url(url),
            MediaItem::Decoded(buffer) => Playable::Buffer(buffer),
            MediaItem::RawBytes(bytes) => match self.decode(bytes).await {
                Ok(buffer) => Playable::Buffer(buffer),
                Err(e) => {
                    self.reporter.error(&e);
                    return Err(e);
                }
            },
        };

        let mut inner = self.inner.lock().await;
        let index = inner.queue.push(playable);
        self.reporter.log(format!("Enqueue audio #{}", index));
        self.reporter.emit(PlayerEvent::Enqueue);
        Ok(())
    }

    async fn enqueue_all(&self, items: Vec<MediaItem>) -> Result<()> {
        if items.is_empty() {
            let e = PlayerError::EmptyItem;
            self.reporter.error(&e);
            return Err(e);
        }
        // Reject the batch before anything is decoded or appended
        if let Some(e) = items.iter().find_map(|item| item.validate().err()) {
            self.reporter.error(&e);
            return Err(e);
        }
        for item in items {
            self.enqueue(item).await?;
        }
        Ok(())
    }

    async fn empty_queue(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.stop_active();
        inner.queue.clear();
        inner.loaded = None;
        inner.state = TransportState::Idle;
        self.reporter.log("Empty queue");
        self.reporter.emit(PlayerEvent::EmptyQueue);
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        self.start().await.map(|_| ())
    }

    async fn play_queue(&self) -> Result<()> {
        let mut played = HashSet::new();
        loop {
            self.start().await?.finished().await?;

            let mut inner = self.inner.lock().await;
            if !self.advance_for_queue(&mut inner, &mut played) {
                return Ok(());
            }
        }
    }

    async fn pause(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.state == TransportState::Playing && inner.active.is_some() {
            if let Some(slot) = &inner.active {
                slot.source.pause();
            }
            inner.state = TransportState::Paused;
        }
        self.reporter.log("Pause audio");
        self.reporter.emit(PlayerEvent::Pause);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.stop_active();
        if inner.loaded.is_some() {
            inner.state = TransportState::Stopped;
        }
        self.reporter.log("Stop audio");
        self.reporter.emit(PlayerEvent::Stop);
        Ok(())
    }

    async fn replay(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let Some(media) = inner.loaded.clone() else {
            let e = PlayerError::NoSourceLoaded;
            self.reporter.error(&e);
            return Err(e);
        };

        self.reporter.log("Replay audio");
        self.reporter.emit(PlayerEvent::Replay);
        let waiters = inner.detach().map(|slot| {
            slot.source.stop();
            slot.waiters
        });
        self.start_source(&mut inner, media, Duration::ZERO, waiters.unwrap_or_default())
            .map(|_| ())
    }

    async fn next(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner
            .queue
            .advance()
            .map_err(|index| PlayerError::NoItemToPlay { index })?;

        self.reporter.log("Next audio");
        self.reporter.emit(PlayerEvent::Next);
        inner.stop_active();
        inner.loaded = None;
        inner.state = TransportState::Stopped;
        self.reporter.log("Stop audio");
        self.reporter.emit(PlayerEvent::Stop);
        Ok(())
    }

    async fn previous(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner
            .queue
            .retreat()
            .map_err(|index| PlayerError::NoItemToPlay { index })?;

        self.reporter.log("Previous audio");
        self.reporter.emit(PlayerEvent::Previous);
        inner.stop_active();
        inner.loaded = None;
        inner.state = TransportState::Stopped;
        self.reporter.log("Stop audio");
        self.reporter.emit(PlayerEvent::Stop);
        Ok(())
    }

    async fn seek(&self, seconds: f64) -> Result<()> {
        Self::check_finite("seek", seconds)?;
        let mut inner = self.inner.lock().await;
        let media = inner.loaded.clone().ok_or(PlayerError::NoSourceLoaded)?;
        let was_paused = inner.state == TransportState::Paused;

        // Sources cannot seek in place: restart at the offset, keep waiters
        let waiters = inner.detach().map(|slot| {
            slot.source.stop();
            slot.waiters
        });
        let offset = Duration::from_secs_f64(seconds.max(0.0));
        self.start_source(&mut inner, media, offset, waiters.unwrap_or_default())?;

        if was_paused {
            if let Some(slot) = &inner.active {
                slot.source.pause();
            }
            inner.state = TransportState::Paused;
        }
        self.reporter.log(format!("Seek to {:.1}s", seconds.max(0.0)));
        Ok(())
    }

    async fn set_volume(&self, level: f64) -> Result<f64> {
        Self::check_finite("volume", level)?;
        let volume = self.volume_scale.apply(level);

        let mut inner = self.inner.lock().await;
        inner.volume = volume;
        if let Some(slot) = &inner.active {
            slot.source.set_volume(inner.effective_volume());
        }
        self.reporter.log(format!("Set volume: {}", volume));
        self.reporter.emit(PlayerEvent::Volume(volume));
        Ok(volume)
    }

    async fn set_playback_rate(&self, rate: f64) -> Result<f64> {
        Self::check_finite("playbackRate", rate)?;
        let rate = self.rate_scale.apply(rate);

        let mut inner = self.inner.lock().await;
        inner.playback_rate = rate;
        if let Some(slot) = &inner.active {
            slot.source.set_playback_rate(rate as f32);
        }
        self.reporter.log(format!("Set playback rate: {}", rate));
        self.reporter.emit(PlayerEvent::PlaybackRate(rate));
        Ok(rate)
    }

    async fn set_muted(&self, muted: bool) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.muted = muted;
        if let Some(slot) = &inner.active {
            slot.source.set_volume(inner.effective_volume());
        }
        self.reporter.log(format!("Set muted: {}", muted));
        self.reporter.emit(PlayerEvent::Muted(muted));
        Ok(())
    }

    async fn set_random(&self, enabled: bool) -> Result<()> {
        self.inner.lock().await.random = enabled;
        self.reporter.log(format!("Set random: {}", enabled));
        self.reporter.emit(PlayerEvent::Random(enabled));
        Ok(())
    }

    async fn set_repeat(&self, enabled: bool) -> Result<()> {
        self.inner.lock().await.repeat = enabled;
        self.reporter.log(format!("Set repeat: {}", enabled));
        self.reporter.emit(PlayerEvent::Repeat(enabled));
        Ok(())
    }

    /// The rodio output needs no handshake.
    async fn is_ready(&self) -> bool {
        true
    }

    async fn has_next(&self) -> bool {
        self.inner.lock().await.queue.has_next()
    }

    async fn has_previous(&self) -> bool {
        self.inner.lock().await.queue.has_previous()
    }
}
