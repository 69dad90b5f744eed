// ==========================================
// YOUTUBE PLAYER (embedded-video variant)
// ==========================================
// Same transport surface as the buffer/stream Player, delegated to one
// embedded instance at a time. There is no local queue: every enqueue
// tears the previous instance down and binds a new one to the parsed
// video (and optional playlist).
//
// Readiness comes in two steps:
// - the platform loads once per process (see platform.rs)
// - each instance signals Ready after it is built
// Transport calls made before the instance is ready fail with NotReady.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::config::PlayerConfig;
use crate::control::PlaybackControl;
use crate::error::{PlayerError, Result};
use crate::events::{EventNotifier, PlayerEvent};
use crate::logging::Reporter;
use crate::player::engine::PLAYBACK_RATE_RANGE;
use crate::player::item::{DecodedBuffer, MediaItem};
use crate::scale::LinearScale;
use crate::youtube::embed::{EmbedApi, EmbedSignal, EmbedState, EmbeddedPlayer, HostContainer};
use crate::youtube::platform::{Platform, PlatformStatus};
use crate::youtube::url::VideoRef;

/// Native volume range of the embedded player.
pub const EMBED_VOLUME_MAX: f64 = 100.0;

struct Instance {
    host: HostContainer,
    video: VideoRef,
    player: Box<dyn EmbeddedPlayer>,
    signals: JoinHandle<()>,
}

impl Instance {
    fn destroy(self) {
        self.signals.abort();
        self.player.destroy();
        tracing::debug!("Destroyed embedded player {}", self.host.id);
    }
}

struct State {
    instance: Option<Instance>,
    generation: u64,
    ready: bool,
    // Caller's 0-1 level; the scaled value is derived from it
    volume_level: f64,
    volume_scale: LinearScale,
    max_volume: f64,
    playback_rate: f64,
    muted: bool,
    random: bool,
    repeat: bool,
}

impl State {
    fn volume(&self) -> f64 {
        self.volume_scale.apply(self.volume_level)
    }

    fn effective_volume(&self) -> f64 {
        if self.muted {
            0.0
        } else {
            self.volume()
        }
    }

    // Bound and past its Ready signal
    fn instance(&self) -> Result<&Instance> {
        match &self.instance {
            Some(instance) if self.ready => Ok(instance),
            _ => Err(PlayerError::NotReady),
        }
    }
}

pub struct YoutubePlayer {
    api: Arc<dyn EmbedApi>,
    platform: Arc<Platform>,
    state: Arc<Mutex<State>>,
    reporter: Reporter,
    rate_scale: LinearScale,
    max_volume_scale: LinearScale,
    poll_interval: Duration,
    max_poll_attempts: u32,
}

impl YoutubePlayer {
    /// Uses the process-wide platform.
    pub fn new(api: Arc<dyn EmbedApi>, config: &PlayerConfig) -> Self {
        Self::with_platform(api, Platform::global(), config)
    }

    pub fn with_platform(api: Arc<dyn EmbedApi>, platform: Arc<Platform>, config: &PlayerConfig) -> Self {
        let rate_scale = LinearScale::clamped_identity(PLAYBACK_RATE_RANGE.0, PLAYBACK_RATE_RANGE.1);
        let max_volume_scale = LinearScale::new((0.0, 1.0), (0.0, EMBED_VOLUME_MAX), true);
        let max_volume = max_volume_scale.apply(config.embed.initial_max_volume);

        let state = State {
            instance: None,
            generation: 0,
            ready: false,
            volume_level: config.initial_volume.clamp(0.0, 1.0),
            volume_scale: LinearScale::new((0.0, 1.0), (0.0, max_volume), true),
            max_volume,
            playback_rate: rate_scale.apply(config.initial_playback_rate),
            muted: false,
            random: false,
            repeat: false,
        };

        platform.bootstrap(api.clone());

        YoutubePlayer {
            api,
            platform,
            state: Arc::new(Mutex::new(state)),
            reporter: Reporter::new(config.debug),
            rate_scale,
            max_volume_scale,
            poll_interval: config.poll_interval(),
            max_poll_attempts: config.embed.max_poll_attempts,
        }
    }

    // Retry on a fixed delay until the platform has loaded
    async fn await_platform(&self) -> Result<()> {
        for attempt in 0..=self.max_poll_attempts {
            match self.platform.status() {
                PlatformStatus::Ready => return Ok(()),
                PlatformStatus::Failed(message) => return Err(PlayerError::PlatformUnavailable(message)),
                PlatformStatus::Loading if attempt < self.max_poll_attempts => {
                    tracing::debug!("Embed platform not ready, retrying ({})", attempt + 1);
                    tokio::time::sleep(self.poll_interval).await;
                }
                PlatformStatus::Loading => {}
            }
        }
        Err(PlayerError::NotReady)
    }

    fn bind(&self, state: &mut State, video: VideoRef) -> Result<()> {
        if let Some(previous) = state.instance.take() {
            previous.destroy();
        }
        state.ready = false;
        state.generation += 1;

        let host = HostContainer::offscreen();
        let (tx, rx) = mpsc::unbounded_channel();
        let player = self.api.create_player(&host, &video, tx)?;
        tracing::info!("Created embedded player {} for {}", host.id, video.video_id);

        let signals = tokio::spawn(handle_signals(
            self.state.clone(),
            self.reporter.clone(),
            state.generation,
            rx,
        ));

        state.instance = Some(Instance {
            host,
            video,
            player,
            signals,
        });
        Ok(())
    }

    fn check_finite(name: &'static str, value: f64) -> Result<()> {
        if value.is_finite() {
            Ok(())
        } else {
            Err(PlayerError::InvalidControlValue { name, value })
        }
    }

    fn fail<T>(&self, error: PlayerError) -> Result<T> {
        self.reporter.error(&error);
        Err(error)
    }

    /// Replaces whatever is loaded with `url`.
    pub async fn play_url(&self, url: &str) -> Result<()> {
        self.empty_queue().await?;
        self.enqueue(MediaItem::Url(url.to_string())).await
    }

    /// Sets the volume ceiling (0-1, rescaled to 0-100) and re-applies the
    /// current volume level under it. Returns the scaled ceiling.
    pub async fn set_max_volume(&self, level: f64) -> Result<f64> {
        Self::check_finite("maxVolume", level)?;
        let max_volume = self.max_volume_scale.apply(level);

        let volume = {
            let mut state = self.state.lock().await;
            state.max_volume = max_volume;
            state.volume_scale = state.volume_scale.with_range((0.0, max_volume));
            state.volume_level
        };

        self.set_volume(volume).await?;
        self.reporter.log(format!("Set max volume: {}", max_volume));
        self.reporter.emit(PlayerEvent::MaxVolume(max_volume));
        Ok(max_volume)
    }

    // ==========================================
    // QUERIES
    // ==========================================
    pub async fn current_url(&self) -> Option<String> {
        let state = self.state.lock().await;
        state.instance.as_ref().map(|instance| instance.player.video_url())
    }

    /// Bound video, as parsed at enqueue.
    pub async fn current_video(&self) -> Option<VideoRef> {
        let state = self.state.lock().await;
        state.instance.as_ref().map(|instance| instance.video.clone())
    }

    /// Seconds; 0 without an instance.
    pub async fn current_time(&self) -> f64 {
        let state = self.state.lock().await;
        state.instance.as_ref().map_or(0.0, |instance| instance.player.current_time())
    }

    pub async fn duration(&self) -> f64 {
        let state = self.state.lock().await;
        state.instance.as_ref().map_or(0.0, |instance| instance.player.duration())
    }

    pub async fn current_state(&self) -> EmbedState {
        let state = self.state.lock().await;
        EmbedState::from_code(state.instance.as_ref().and_then(|instance| instance.player.state_code()))
    }

    pub async fn volume(&self) -> f64 {
        self.state.lock().await.volume()
    }

    pub async fn max_volume(&self) -> f64 {
        self.state.lock().await.max_volume
    }

    pub async fn playback_rate(&self) -> f64 {
        self.state.lock().await.playback_rate
    }

    pub async fn is_muted(&self) -> bool {
        self.state.lock().await.muted
    }

    pub async fn current_buffer(&self) -> Result<DecodedBuffer> {
        Err(PlayerError::Unsupported("Method not supported with YouTube player."))
    }
}

async fn handle_signals(
    state: Arc<Mutex<State>>,
    reporter: Reporter,
    generation: u64,
    mut rx: mpsc::UnboundedReceiver<EmbedSignal>,
) {
    while let Some(signal) = rx.recv().await {
        let mut state = state.lock().await;
        if state.generation != generation {
            return;
        }

        match signal {
            EmbedSignal::Ready => {
                let volume = state.effective_volume();
                if let Some(instance) = &state.instance {
                    instance.player.set_playback_rate(state.playback_rate);
                    instance.player.set_volume(volume);
                    instance.player.set_shuffle(state.random);
                    instance.player.set_loop(state.repeat);
                }
                state.ready = true;
                reporter.log("Player ready");
                reporter.emit(PlayerEvent::Ready);
            }
            EmbedSignal::StateChange(code) => {
                let embed_state = EmbedState::from_code(Some(code));
                reporter.log(format!("Player state change: {} ({})", code, embed_state));
                reporter.emit(PlayerEvent::StateChange(embed_state));
            }
            EmbedSignal::Error(message) => {
                reporter.error(&PlayerError::Playback(message));
            }
        }
    }
}

#[async_trait]
impl PlaybackControl for YoutubePlayer {
    fn events(&self) -> &EventNotifier {
        &self.reporter.events
    }

    async fn enqueue(&self, item: MediaItem) -> Result<()> {
        if let Err(e) = item.validate() {
            return self.fail(e);
        }
        let url = match item {
            MediaItem::Url(url) => url,
            MediaItem::RawBytes(_) => return self.fail(PlayerError::UnsupportedItem("raw bytes".into())),
            MediaItem::Decoded(_) => return self.fail(PlayerError::UnsupportedItem("decoded buffer".into())),
        };
        let video = match VideoRef::parse(&url) {
            Ok(video) => video,
            Err(e) => return self.fail(e),
        };

        self.reporter.log("Enqueue audio");
        self.reporter.emit(PlayerEvent::Enqueue);

        if let Err(e) = self.await_platform().await {
            return self.fail(e);
        }

        let mut state = self.state.lock().await;
        if let Err(e) = self.bind(&mut state, video) {
            return self.fail(e);
        }
        Ok(())
    }

    /// One instance holds one reference: only the first item is bound.
    async fn enqueue_all(&self, items: Vec<MediaItem>) -> Result<()> {
        match items.into_iter().next() {
            Some(item) => self.enqueue(item).await,
            None => self.fail(PlayerError::EmptyItem),
        }
    }

    async fn empty_queue(&self) -> Result<()> {
        self.stop().await?;

        let mut state = self.state.lock().await;
        if let Some(instance) = state.instance.take() {
            instance.destroy();
        }
        state.generation += 1;
        state.ready = false;
        self.reporter.log("Empty queue");
        self.reporter.emit(PlayerEvent::EmptyQueue);
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        let state = self.state.lock().await;
        match state.instance() {
            Ok(instance) => instance.player.play_video(),
            Err(e) => return self.fail(e),
        }
        self.reporter.log("Play audio");
        self.reporter.emit(PlayerEvent::Play);
        Ok(())
    }

    /// The instance plays its own playlist through.
    async fn play_queue(&self) -> Result<()> {
        self.play().await
    }

    async fn pause(&self) -> Result<()> {
        let state = self.state.lock().await;
        if let Some(instance) = &state.instance {
            instance.player.pause_video();
        }
        self.reporter.log("Pause audio");
        self.reporter.emit(PlayerEvent::Pause);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let state = self.state.lock().await;
        if let Some(instance) = &state.instance {
            instance.player.stop_video();
        }
        self.reporter.log("Stop audio");
        self.reporter.emit(PlayerEvent::Stop);
        Ok(())
    }

    async fn replay(&self) -> Result<()> {
        {
            let state = self.state.lock().await;
            match state.instance() {
                Ok(instance) => instance.player.seek_to(0.0),
                Err(e) => return self.fail(e),
            }
        }
        self.play().await?;
        self.reporter.log("Replay audio");
        self.reporter.emit(PlayerEvent::Replay);
        Ok(())
    }

    async fn next(&self) -> Result<()> {
        let state = self.state.lock().await;
        let instance = match state.instance() {
            Ok(instance) => instance,
            Err(e) => return self.fail(e),
        };
        let index = instance.player.playlist_index();
        if !has_next(instance) {
            return Err(PlayerError::NoItemToPlay {
                index: index.map_or(1, |i| i as isize + 1),
            });
        }

        instance.player.next_video();
        self.reporter.log("Next audio");
        self.reporter.emit(PlayerEvent::Next);
        Ok(())
    }

    async fn previous(&self) -> Result<()> {
        let state = self.state.lock().await;
        let instance = match state.instance() {
            Ok(instance) => instance,
            Err(e) => return self.fail(e),
        };
        let index = instance.player.playlist_index();
        if !has_previous(instance) {
            return Err(PlayerError::NoItemToPlay {
                index: index.map_or(-1, |i| i as isize - 1),
            });
        }

        instance.player.previous_video();
        self.reporter.log("Previous audio");
        self.reporter.emit(PlayerEvent::Previous);
        Ok(())
    }

    async fn seek(&self, seconds: f64) -> Result<()> {
        Self::check_finite("seek", seconds)?;
        let state = self.state.lock().await;
        match state.instance() {
            Ok(instance) => instance.player.seek_to(seconds.max(0.0)),
            Err(e) => return self.fail(e),
        }
        self.reporter.log(format!("Seek to {:.1}s", seconds.max(0.0)));
        Ok(())
    }

    async fn set_volume(&self, level: f64) -> Result<f64> {
        Self::check_finite("volume", level)?;
        let mut state = self.state.lock().await;
        state.volume_level = level.clamp(0.0, 1.0);
        let volume = state.volume();
        if let Some(instance) = &state.instance {
            instance.player.set_volume(state.effective_volume());
        }
        self.reporter.log(format!("Set volume: {}", volume));
        self.reporter.emit(PlayerEvent::Volume(volume));
        Ok(volume)
    }

    async fn set_playback_rate(&self, rate: f64) -> Result<f64> {
        Self::check_finite("playbackRate", rate)?;
        let rate = self.rate_scale.apply(rate);

        let mut state = self.state.lock().await;
        state.playback_rate = rate;
        if let Some(instance) = &state.instance {
            instance.player.set_playback_rate(rate);
        }
        self.reporter.log(format!("Set playback rate: {}", rate));
        self.reporter.emit(PlayerEvent::PlaybackRate(rate));
        Ok(rate)
    }

    async fn set_muted(&self, muted: bool) -> Result<()> {
        let mut state = self.state.lock().await;
        state.muted = muted;
        if let Some(instance) = &state.instance {
            instance.player.set_volume(state.effective_volume());
        }
        self.reporter.log(format!("Set muted: {}", muted));
        self.reporter.emit(PlayerEvent::Muted(muted));
        Ok(())
    }

    async fn set_random(&self, enabled: bool) -> Result<()> {
        let mut state = self.state.lock().await;
        state.random = enabled;
        if let Some(instance) = &state.instance {
            instance.player.set_shuffle(enabled);
        }
        self.reporter.log(format!("Set random: {}", enabled));
        self.reporter.emit(PlayerEvent::Random(enabled));
        Ok(())
    }

    async fn set_repeat(&self, enabled: bool) -> Result<()> {
        let mut state = self.state.lock().await;
        state.repeat = enabled;
        if let Some(instance) = &state.instance {
            instance.player.set_loop(enabled);
        }
        self.reporter.log(format!("Set repeat: {}", enabled));
        self.reporter.emit(PlayerEvent::Repeat(enabled));
        Ok(())
    }

    /// True once the bound instance has signalled Ready.
    async fn is_ready(&self) -> bool {
        self.state.lock().await.ready
    }

    async fn has_next(&self) -> bool {
        let state = self.state.lock().await;
        state.instance.as_ref().is_some_and(has_next)
    }

    async fn has_previous(&self) -> bool {
        let state = self.state.lock().await;
        state.instance.as_ref().is_some_and(has_previous)
    }
}

fn has_next(instance: &Instance) -> bool {
    match instance.player.playlist_index() {
        Some(index) => index + 1 < instance.player.playlist_len(),
        None => false,
    }
}

fn has_previous(instance: &Instance) -> bool {
    matches!(instance.player.playlist_index(), Some(index) if index > 0)
}
