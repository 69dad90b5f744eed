// ==========================================
// AUDIO PLAYBACK ENGINE
// ==========================================
// Buffer/stream adapter backed by rodio.
// It handles:
// - Connecting to the default audio output device
// - Playing decoded PCM buffers and URL/file streams through a Sink
// - Pause/resume in place, volume, playback speed
// - Tracking media position (rodio 0.17 does not report it)
// - Reporting exactly one Ended/Failed per started source
//
// Every source gets its own Sink, so stopping one never touches another.

use rodio::buffer::SamplesBuffer;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

use crate::error::{PlayerError, Result};
use crate::player::item::{DecodedBuffer, Playable};
use crate::player::source::{ActiveSource, AudioBackend, SourceRequest, StartedSource, Termination};

// ==========================================
// PLAYBACK CLOCK
// ==========================================
// Media position = position at the last checkpoint + time running since,
// scaled by the playback rate. Checkpoints happen on pause and rate change.
#[derive(Debug)]
struct Clock {
    base: Duration,
    since: Option<Instant>,
    rate: f32,
}

impl Clock {
    fn new(offset: Duration, rate: f32) -> Self {
        Clock {
            base: offset,
            since: None,
            rate,
        }
    }

    fn position(&self) -> Duration {
        match self.since {
            Some(since) => self.base + since.elapsed().mul_f32(self.rate),
            None => self.base,
        }
    }

    fn run(&mut self) {
        if self.since.is_none() {
            self.since = Some(Instant::now());
        }
    }

    fn halt(&mut self) {
        self.base = self.position();
        self.since = None;
    }

    fn set_rate(&mut self, rate: f32) {
        let running = self.since.is_some();
        self.halt();
        self.rate = rate;
        if running {
            self.run();
        }
    }
}

// ==========================================
// RODIO SOURCE
// ==========================================
struct RodioSource {
    sink: Arc<Sink>,
    clock: Arc<Mutex<Clock>>,
    stopped: Arc<AtomicBool>,
}

fn lock(clock: &Mutex<Clock>) -> MutexGuard<'_, Clock> {
    clock.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ActiveSource for RodioSource {
    fn pause(&self) {
        self.sink.pause();
        lock(&self.clock).halt();
    }

    fn resume(&self) {
        self.sink.play();
        lock(&self.clock).run();
    }

    fn stop(&self) {
        // Flag first so the end watcher stays quiet
        self.stopped.store(true, Ordering::SeqCst);
        self.sink.stop();
        lock(&self.clock).halt();
    }

    fn is_paused(&self) -> bool {
        self.sink.is_paused()
    }

    fn set_volume(&self, volume: f32) {
        self.sink.set_volume(volume);
    }

    fn set_playback_rate(&self, rate: f32) {
        self.sink.set_speed(rate);
        lock(&self.clock).set_rate(rate);
    }

    fn position(&self) -> Duration {
        lock(&self.clock).position()
    }
}

// ==========================================
// RODIO BACKEND
// ==========================================
pub struct RodioBackend {
    // None when no output device exists (e.g. headless server).
    // Decoding still works in that case; starting a source fails.
    handle: Option<OutputStreamHandle>,
}

impl RodioBackend {
    pub fn new() -> Self {
        let handle = match OutputStream::try_default() {
            Ok((stream, handle)) => {
                // The stream must outlive every Sink and is !Send,
                // so it is leaked for the life of the process
                std::mem::forget(stream);
                Some(handle)
            }
            Err(e) => {
                tracing::warn!("No audio output device available: {}", e);
                None
            }
        };

        RodioBackend { handle }
    }

    pub fn has_output(&self) -> bool {
        self.handle.is_some()
    }

    fn new_sink(&self) -> Result<Sink> {
        let handle = self
            .handle
            .as_ref()
            .ok_or_else(|| PlayerError::Playback("no audio output device".into()))?;
        Sink::try_new(handle).map_err(|e| PlayerError::Playback(format!("Failed to open sink: {}", e)))
    }
}

impl Default for RodioBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for RodioBackend {
    fn start(&self, request: SourceRequest) -> Result<StartedSource> {
        let sink = Arc::new(self.new_sink()?);
        sink.set_volume(request.volume);
        sink.set_speed(request.playback_rate);

        let clock = Arc::new(Mutex::new(Clock::new(request.offset, request.playback_rate)));
        let stopped = Arc::new(AtomicBool::new(false));
        let (tx, rx) = oneshot::channel();

        match request.media {
            Playable::Buffer(buffer) => {
                let samples = SamplesBuffer::new(
                    buffer.channels(),
                    buffer.sample_rate(),
                    buffer.samples().to_vec(),
                );
                sink.append(samples.skip_duration(request.offset));
                lock(&clock).run();
                watch_until_end(sink.clone(), stopped.clone(), tx);
            }
            Playable::Url(url) => {
                // Element-style: returns at once, errors arrive as Failed
                let sink = sink.clone();
                let clock = clock.clone();
                let stopped = stopped.clone();
                let offset = request.offset;
                tokio::spawn(async move {
                    match open_stream(&url).await {
                        Ok(decoder) => {
                            if stopped.load(Ordering::SeqCst) {
                                return;
                            }
                            sink.append(decoder.skip_duration(offset));
                            if !sink.is_paused() {
                                lock(&clock).run();
                            }
                            watch_until_end(sink, stopped, tx);
                        }
                        Err(e) => {
                            tracing::warn!("Failed to open {}: {}", url, e);
                            if !stopped.load(Ordering::SeqCst) {
                                let _ = tx.send(Termination::Failed(e.to_string()));
                            }
                        }
                    }
                });
            }
        }

        Ok(StartedSource {
            source: Box::new(RodioSource { sink, clock, stopped }),
            termination: rx,
        })
    }

    fn decode(&self, bytes: Vec<u8>) -> Result<DecodedBuffer> {
        let decoder = new_decoder(bytes)?;
        let channels = decoder.channels();
        let sample_rate = decoder.sample_rate();
        let samples: Vec<f32> = decoder.convert_samples::<f32>().collect();

        if samples.is_empty() {
            return Err(PlayerError::Decode("no audio frames".into()));
        }
        DecodedBuffer::new(channels, sample_rate, samples)
    }
}

// Blocks a worker thread until the sink drains, then reports Ended
// unless the source was stopped in the meantime.
fn watch_until_end(sink: Arc<Sink>, stopped: Arc<AtomicBool>, tx: oneshot::Sender<Termination>) {
    tokio::task::spawn_blocking(move || {
        sink.sleep_until_end();
        if !stopped.load(Ordering::SeqCst) {
            let _ = tx.send(Termination::Ended);
        }
    });
}

async fn open_stream(url: &str) -> Result<Decoder<Cursor<Vec<u8>>>> {
    let bytes = fetch(url).await?;
    tokio::task::spawn_blocking(move || new_decoder(bytes))
        .await
        .map_err(|e| PlayerError::Playback(format!("Task join error: {}", e)))?
}

async fn fetch(url: &str) -> Result<Vec<u8>> {
    if url.starts_with("http://") || url.starts_with("https://") {
        let response = reqwest::get(url).await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    } else {
        let path = url.strip_prefix("file://").unwrap_or(url);
        Ok(tokio::fs::read(path).await?)
    }
}

// Some decoders panic on malformed input instead of returning an error
fn new_decoder(bytes: Vec<u8>) -> Result<Decoder<Cursor<Vec<u8>>>> {
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| Decoder::new(Cursor::new(bytes))));

    match result {
        Ok(Ok(decoder)) => Ok(decoder),
        Ok(Err(e)) => Err(PlayerError::Decode(e.to_string())),
        Err(_) => Err(PlayerError::Decode("decoder panicked on malformed input".into())),
    }
}
