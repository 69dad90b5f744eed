// Hand-written fakes for driving both player variants without audio
// hardware, yt-dlp or a browser.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use unified_player::error::{PlayerError, Result};
use unified_player::events::{EventKind, EventNotifier, PlayerEvent};
use unified_player::player::item::DecodedBuffer;
use unified_player::player::source::{ActiveSource, AudioBackend, SourceRequest, StartedSource, Termination};
use unified_player::youtube::embed::{EmbedApi, EmbedSignal, EmbeddedPlayer, HostContainer};
use unified_player::youtube::url::VideoRef;

// ==========================================
// AUDIO BACKEND
// ==========================================

#[derive(Debug, Default)]
pub struct FakeSourceState {
    pub paused: AtomicBool,
    pub stopped: AtomicBool,
    pub resumes: Mutex<usize>,
    pub volume: Mutex<f32>,
    pub rate: Mutex<f32>,
}

impl FakeSourceState {
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn volume(&self) -> f32 {
        *self.volume.lock().unwrap()
    }

    pub fn rate(&self) -> f32 {
        *self.rate.lock().unwrap()
    }

    pub fn resumes(&self) -> usize {
        *self.resumes.lock().unwrap()
    }
}

struct FakeSource(Arc<FakeSourceState>);

impl ActiveSource for FakeSource {
    fn pause(&self) {
        self.0.paused.store(true, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.0.paused.store(false, Ordering::SeqCst);
        *self.0.resumes.lock().unwrap() += 1;
    }

    fn stop(&self) {
        self.0.stopped.store(true, Ordering::SeqCst);
    }

    fn is_paused(&self) -> bool {
        self.0.is_paused()
    }

    fn set_volume(&self, volume: f32) {
        *self.0.volume.lock().unwrap() = volume;
    }

    fn set_playback_rate(&self, rate: f32) {
        *self.0.rate.lock().unwrap() = rate;
    }

    fn position(&self) -> Duration {
        Duration::ZERO
    }
}

#[derive(Default)]
struct BackendState {
    requests: Vec<SourceRequest>,
    sources: Vec<Arc<FakeSourceState>>,
    terminations: Vec<Option<oneshot::Sender<Termination>>>,
    fail_next_start: bool,
}

/// Records every start; the test decides when (and how) each source ends.
#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<BackendState>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn start_count(&self) -> usize {
        self.state.lock().unwrap().requests.len()
    }

    pub fn request(&self, index: usize) -> SourceRequest {
        self.state.lock().unwrap().requests[index].clone()
    }

    pub fn source(&self, index: usize) -> Arc<FakeSourceState> {
        self.state.lock().unwrap().sources[index].clone()
    }

    /// Sends the termination for the `index`-th started source. Returns
    /// false if nobody was listening any more.
    pub fn finish(&self, index: usize, termination: Termination) -> bool {
        let sender = self.state.lock().unwrap().terminations[index].take();
        match sender {
            Some(sender) => sender.send(termination).is_ok(),
            None => false,
        }
    }

    pub fn fail_next_start(&self) {
        self.state.lock().unwrap().fail_next_start = true;
    }
}

impl AudioBackend for FakeBackend {
    fn start(&self, request: SourceRequest) -> Result<StartedSource> {
        let mut state = self.state.lock().unwrap();
        if std::mem::take(&mut state.fail_next_start) {
            return Err(PlayerError::Playback("device unplugged".into()));
        }

        let source = Arc::new(FakeSourceState::default());
        *source.volume.lock().unwrap() = request.volume;
        *source.rate.lock().unwrap() = request.playback_rate;

        let (tx, rx) = oneshot::channel();
        state.requests.push(request);
        state.sources.push(source.clone());
        state.terminations.push(Some(tx));

        Ok(StartedSource {
            source: Box::new(FakeSource(source)),
            termination: rx,
        })
    }

    /// Each byte becomes one mono sample; input starting with "BAD" fails.
    fn decode(&self, bytes: Vec<u8>) -> Result<DecodedBuffer> {
        if bytes.starts_with(b"BAD") {
            return Err(PlayerError::Decode("unrecognized format".into()));
        }
        DecodedBuffer::new(1, 8000, bytes.iter().map(|b| *b as f32 / 255.0).collect())
    }
}

// ==========================================
// EMBED API
// ==========================================

#[derive(Debug)]
pub struct FakeEmbedState {
    pub host: HostContainer,
    pub video: VideoRef,
    pub calls: Mutex<Vec<String>>,
    pub volume: Mutex<f64>,
    pub rate: Mutex<f64>,
    pub shuffle: AtomicBool,
    pub looped: AtomicBool,
    pub code: Mutex<Option<i32>>,
    pub index: Mutex<Option<usize>>,
    pub len: usize,
    pub destroyed: AtomicBool,
    pub signals: mpsc::UnboundedSender<EmbedSignal>,
}

impl FakeEmbedState {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn volume(&self) -> f64 {
        *self.volume.lock().unwrap()
    }

    pub fn rate(&self) -> f64 {
        *self.rate.lock().unwrap()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    pub fn signal(&self, signal: EmbedSignal) {
        self.signals.send(signal).unwrap();
    }

    fn call(&self, name: &str) {
        self.calls.lock().unwrap().push(name.to_string());
    }
}

struct FakeEmbeddedPlayer(Arc<FakeEmbedState>);

impl EmbeddedPlayer for FakeEmbeddedPlayer {
    fn play_video(&self) {
        self.0.call("play");
        *self.0.code.lock().unwrap() = Some(1);
    }

    fn pause_video(&self) {
        self.0.call("pause");
        *self.0.code.lock().unwrap() = Some(2);
    }

    fn stop_video(&self) {
        self.0.call("stop");
        *self.0.code.lock().unwrap() = Some(5);
    }

    fn seek_to(&self, seconds: f64) {
        self.0.call(&format!("seek {}", seconds));
    }

    fn next_video(&self) {
        self.0.call("next");
        if let Some(index) = self.0.index.lock().unwrap().as_mut() {
            *index += 1;
        }
    }

    fn previous_video(&self) {
        self.0.call("previous");
        if let Some(index) = self.0.index.lock().unwrap().as_mut() {
            *index -= 1;
        }
    }

    fn set_volume(&self, volume: f64) {
        *self.0.volume.lock().unwrap() = volume;
    }

    fn set_playback_rate(&self, rate: f64) {
        *self.0.rate.lock().unwrap() = rate;
    }

    fn set_shuffle(&self, enabled: bool) {
        self.0.shuffle.store(enabled, Ordering::SeqCst);
    }

    fn set_loop(&self, enabled: bool) {
        self.0.looped.store(enabled, Ordering::SeqCst);
    }

    fn current_time(&self) -> f64 {
        12.0
    }

    fn duration(&self) -> f64 {
        240.0
    }

    fn state_code(&self) -> Option<i32> {
        *self.0.code.lock().unwrap()
    }

    fn video_url(&self) -> String {
        self.0.video.watch_url()
    }

    fn playlist_index(&self) -> Option<usize> {
        *self.0.index.lock().unwrap()
    }

    fn playlist_len(&self) -> usize {
        self.0.len
    }

    fn destroy(&self) {
        self.0.call("destroy");
        self.0.destroyed.store(true, Ordering::SeqCst);
    }
}

/// Platform that loads after `load_delay` and builds instances that
/// signal Ready straight away (unless `auto_ready` is off).
pub struct FakeEmbedApi {
    pub load_delay: Duration,
    pub fail_load: bool,
    pub auto_ready: bool,
    /// Entries reported for URLs with a `list` parameter
    pub playlist_len: usize,
    created: Mutex<Vec<Arc<FakeEmbedState>>>,
}

impl FakeEmbedApi {
    pub fn new() -> Arc<Self> {
        Self::with(Duration::ZERO, false)
    }

    pub fn with(load_delay: Duration, fail_load: bool) -> Arc<Self> {
        Arc::new(FakeEmbedApi {
            load_delay,
            fail_load,
            auto_ready: true,
            playlist_len: 3,
            created: Mutex::new(Vec::new()),
        })
    }

    /// Instances stay unready until the test sends `EmbedSignal::Ready`.
    pub fn without_ready() -> Arc<Self> {
        Arc::new(FakeEmbedApi {
            load_delay: Duration::ZERO,
            fail_load: false,
            auto_ready: false,
            playlist_len: 3,
            created: Mutex::new(Vec::new()),
        })
    }

    pub fn created(&self) -> Vec<Arc<FakeEmbedState>> {
        self.created.lock().unwrap().clone()
    }

    pub fn last(&self) -> Arc<FakeEmbedState> {
        self.created.lock().unwrap().last().cloned().expect("no instance created")
    }
}

#[async_trait]
impl EmbedApi for FakeEmbedApi {
    async fn load(&self) -> Result<()> {
        tokio::time::sleep(self.load_delay).await;
        if self.fail_load {
            Err(PlayerError::PlatformUnavailable("script blocked".into()))
        } else {
            Ok(())
        }
    }

    fn create_player(
        &self,
        host: &HostContainer,
        video: &VideoRef,
        signals: mpsc::UnboundedSender<EmbedSignal>,
    ) -> Result<Box<dyn EmbeddedPlayer>> {
        let state = Arc::new(FakeEmbedState {
            host: host.clone(),
            video: video.clone(),
            calls: Mutex::new(Vec::new()),
            volume: Mutex::new(-1.0),
            rate: Mutex::new(-1.0),
            shuffle: AtomicBool::new(false),
            looped: AtomicBool::new(false),
            code: Mutex::new(Some(-1)),
            index: Mutex::new(video.playlist_id.as_ref().map(|_| 0)),
            len: if video.playlist_id.is_some() { self.playlist_len } else { 0 },
            destroyed: AtomicBool::new(false),
            signals: signals.clone(),
        });
        if self.auto_ready {
            signals.send(EmbedSignal::Ready).unwrap();
        }
        self.created.lock().unwrap().push(state.clone());
        Ok(Box::new(FakeEmbeddedPlayer(state)))
    }
}

// ==========================================
// HELPERS
// ==========================================

/// Collects every notification except `log` (which is deferred).
pub fn record(events: &EventNotifier) -> Arc<Mutex<Vec<PlayerEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    for kind in EventKind::ALL {
        if kind == EventKind::Log {
            continue;
        }
        let seen = seen.clone();
        events.on(kind, move |event| seen.lock().unwrap().push(event.clone()));
    }
    seen
}

pub fn kinds(seen: &Arc<Mutex<Vec<PlayerEvent>>>) -> Vec<EventKind> {
    seen.lock().unwrap().iter().map(PlayerEvent::kind).collect()
}

/// Lets spawned tasks (watchers, signal handlers, deferred emits) run.
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

pub async fn wait_for_starts(backend: &FakeBackend, count: usize) {
    for _ in 0..1000 {
        if backend.start_count() >= count {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("expected {} starts, saw {}", count, backend.start_count());
}
