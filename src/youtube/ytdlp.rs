// ==========================================
// YT-DLP EMBED
// ==========================================
// Native stand-in for the iframe player: yt-dlp resolves the audio stream,
// an AudioBackend plays it. Each instance walks its own playlist and
// reports status codes the way the iframe player does:
//   -1 unstarted, 0 ended, 1 playing, 2 paused, 3 buffering, 5 cued

use async_trait::async_trait;
use rand::Rng;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::error::{PlayerError, Result};
use crate::player::audio::RodioBackend;
use crate::player::item::Playable;
use crate::player::source::{ActiveSource, AudioBackend, SourceRequest, Termination};
use crate::youtube::embed::{EmbedApi, EmbedSignal, EmbedState, EmbeddedPlayer, HostContainer};
use crate::youtube::extractor::YouTubeExtractor;
use crate::youtube::url::VideoRef;

pub struct YtDlpEmbed {
    extractor: YouTubeExtractor,
    backend: Arc<dyn AudioBackend>,
}

impl YtDlpEmbed {
    pub fn new(extractor: YouTubeExtractor, backend: Arc<dyn AudioBackend>) -> Self {
        YtDlpEmbed { extractor, backend }
    }

    pub fn with_default_output(ytdlp_path: &str) -> Self {
        Self::new(YouTubeExtractor::new(ytdlp_path), Arc::new(RodioBackend::new()))
    }
}

#[async_trait]
impl EmbedApi for YtDlpEmbed {
    async fn load(&self) -> Result<()> {
        let version = self
            .extractor
            .version()
            .await
            .map_err(|e| PlayerError::PlatformUnavailable(e.to_string()))?;
        tracing::info!("Using yt-dlp {}", version);
        Ok(())
    }

    fn create_player(
        &self,
        host: &HostContainer,
        video: &VideoRef,
        signals: mpsc::UnboundedSender<EmbedSignal>,
    ) -> Result<Box<dyn EmbeddedPlayer>> {
        let shared = Arc::new(Shared {
            extractor: self.extractor.clone(),
            backend: self.backend.clone(),
            signals,
            state: Mutex::new(InstanceState {
                entries: vec![video.watch_url()],
                index: 0,
                playlist: video.playlist_id.is_some(),
                source: None,
                generation: 0,
                code: EmbedState::UNSTARTED,
                cue_offset: 0.0,
                duration: 0.0,
                volume: 100.0,
                rate: 1.0,
                shuffle: false,
                looped: false,
                destroyed: false,
            }),
        });

        tracing::debug!("Mounting yt-dlp player in {}", host.id);
        tokio::spawn(shared.clone().cue(video.clone()));

        Ok(Box::new(YtDlpInstance { shared }))
    }
}

struct InstanceState {
    entries: Vec<String>,
    index: usize,
    playlist: bool,
    source: Option<Box<dyn ActiveSource>>,
    // Bumped whenever the running source is replaced or dropped
    generation: u64,
    code: i32,
    cue_offset: f64,
    duration: f64,
    volume: f64,
    rate: f64,
    shuffle: bool,
    looped: bool,
    destroyed: bool,
}

impl InstanceState {
    fn next_index(&self) -> Option<usize> {
        let len = self.entries.len();
        if self.shuffle && len > 1 {
            let pick = rand::thread_rng().gen_range(0..len - 1);
            return Some(if pick >= self.index { pick + 1 } else { pick });
        }
        if self.index + 1 < len {
            Some(self.index + 1)
        } else if self.looped && len > 0 {
            Some(0)
        } else {
            None
        }
    }

    fn drop_source(&mut self) {
        self.generation += 1;
        if let Some(source) = self.source.take() {
            source.stop();
        }
    }
}

struct Shared {
    extractor: YouTubeExtractor,
    backend: Arc<dyn AudioBackend>,
    signals: mpsc::UnboundedSender<EmbedSignal>,
    state: Mutex<InstanceState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, InstanceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn signal(&self, signal: EmbedSignal) {
        // The receiver is gone once the instance is destroyed
        let _ = self.signals.send(signal);
    }

    fn set_code(&self, state: &mut InstanceState, code: i32) {
        state.code = code;
        self.signal(EmbedSignal::StateChange(code));
    }

    // Resolves the playlist (if any), then reports cued + ready
    async fn cue(self: Arc<Self>, video: VideoRef) {
        let entries = match video.playlist_url() {
            Some(playlist_url) => match self.extractor.get_playlist(&playlist_url).await {
                Ok(entries) if !entries.is_empty() => entries,
                Ok(_) => Vec::new(),
                Err(e) => {
                    tracing::warn!("Could not load playlist {}: {}", playlist_url, e);
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        {
            let mut state = self.lock();
            if state.destroyed {
                return;
            }
            if !entries.is_empty() {
                state.index = entries.iter().position(|e| e.id == video.video_id).unwrap_or(0);
                state.entries = entries.into_iter().map(|e| e.url).collect();
            } else {
                state.playlist = false;
            }
            self.set_code(&mut state, EmbedState::VIDEO_CUED);
        }
        self.signal(EmbedSignal::Ready);
    }

    fn start(self: &Arc<Self>, offset: f64, paused: bool) {
        let (generation, url) = {
            let mut state = self.lock();
            if state.destroyed {
                return;
            }
            state.drop_source();
            state.cue_offset = offset;
            self.set_code(&mut state, EmbedState::BUFFERING);
            (state.generation, state.entries.get(state.index).cloned())
        };

        if let Some(url) = url {
            tokio::spawn(self.clone().run(generation, url, offset, paused));
        }
    }

    async fn run(self: Arc<Self>, generation: u64, url: String, offset: f64, paused: bool) {
        let audio_url = match self.extractor.get_audio_url(&url).await {
            Ok(audio_url) => audio_url,
            Err(e) => return self.fail(generation, e.to_string()),
        };
        let info = self.extractor.get_video_info(&url).await.ok();

        let termination = {
            let mut state = self.lock();
            if state.generation != generation {
                return;
            }
            if let Some(info) = info {
                state.duration = info.duration;
            }

            let request = SourceRequest {
                media: Playable::Url(audio_url),
                offset: Duration::from_secs_f64(offset.max(0.0)),
                volume: (state.volume / 100.0) as f32,
                playback_rate: state.rate as f32,
            };
            let started = match self.backend.start(request) {
                Ok(started) => started,
                Err(e) => {
                    state.code = EmbedState::UNSTARTED;
                    self.signal(EmbedSignal::Error(e.to_string()));
                    return;
                }
            };

            if paused {
                started.source.pause();
                self.set_code(&mut state, EmbedState::PAUSED);
            } else {
                self.set_code(&mut state, EmbedState::PLAYING);
            }
            state.source = Some(started.source);
            started.termination
        };

        let outcome = termination
            .await
            .unwrap_or_else(|_| Termination::Failed("stream closed without finishing".into()));

        let advance = {
            let mut state = self.lock();
            if state.generation != generation {
                return;
            }
            state.source = None;
            state.cue_offset = 0.0;
            match outcome {
                Termination::Ended => {
                    self.set_code(&mut state, EmbedState::ENDED);
                    let next = state.next_index();
                    if let Some(next) = next {
                        state.index = next;
                    }
                    next.is_some()
                }
                Termination::Failed(message) => {
                    state.code = EmbedState::UNSTARTED;
                    self.signal(EmbedSignal::Error(message));
                    false
                }
            }
        };

        if advance {
            self.start(0.0, false);
        }
    }

    fn fail(&self, generation: u64, message: String) {
        let mut state = self.lock();
        if state.generation == generation {
            state.code = EmbedState::UNSTARTED;
            self.signal(EmbedSignal::Error(message));
        }
    }
}

struct YtDlpInstance {
    shared: Arc<Shared>,
}

impl YtDlpInstance {
    fn jump(&self, index: Option<usize>) {
        let Some(index) = index else {
            return;
        };
        self.shared.lock().index = index;
        self.shared.start(0.0, false);
    }
}

impl EmbeddedPlayer for YtDlpInstance {
    fn play_video(&self) {
        let offset = {
            let mut state = self.shared.lock();
            let resumed = match &state.source {
                Some(source) if source.is_paused() => {
                    source.resume();
                    true
                }
                Some(_) => return,
                None => false,
            };
            if resumed {
                self.shared.set_code(&mut state, EmbedState::PLAYING);
                return;
            }
            state.cue_offset
        };
        self.shared.start(offset, false);
    }

    fn pause_video(&self) {
        let mut state = self.shared.lock();
        let Some(source) = &state.source else {
            return;
        };
        source.pause();
        self.shared.set_code(&mut state, EmbedState::PAUSED);
    }

    fn stop_video(&self) {
        let mut state = self.shared.lock();
        state.drop_source();
        state.cue_offset = 0.0;
        self.shared.set_code(&mut state, EmbedState::VIDEO_CUED);
    }

    fn seek_to(&self, seconds: f64) {
        let paused = {
            let mut state = self.shared.lock();
            let Some(paused) = state.source.as_ref().map(|source| source.is_paused()) else {
                // Takes effect on the next play_video
                state.cue_offset = seconds;
                return;
            };
            paused
        };
        self.shared.start(seconds, paused);
    }

    fn next_video(&self) {
        let next = {
            let state = self.shared.lock();
            if state.index + 1 < state.entries.len() {
                Some(state.index + 1)
            } else {
                None
            }
        };
        self.jump(next);
    }

    fn previous_video(&self) {
        let previous = self.shared.lock().index.checked_sub(1);
        self.jump(previous);
    }

    fn set_volume(&self, volume: f64) {
        let mut state = self.shared.lock();
        state.volume = volume.clamp(0.0, 100.0);
        if let Some(source) = &state.source {
            source.set_volume((state.volume / 100.0) as f32);
        }
    }

    fn set_playback_rate(&self, rate: f64) {
        let mut state = self.shared.lock();
        state.rate = rate;
        if let Some(source) = &state.source {
            source.set_playback_rate(rate as f32);
        }
    }

    fn set_shuffle(&self, enabled: bool) {
        self.shared.lock().shuffle = enabled;
    }

    fn set_loop(&self, enabled: bool) {
        self.shared.lock().looped = enabled;
    }

    fn current_time(&self) -> f64 {
        let state = self.shared.lock();
        match &state.source {
            Some(source) => source.position().as_secs_f64(),
            None => state.cue_offset,
        }
    }

    fn duration(&self) -> f64 {
        self.shared.lock().duration
    }

    fn state_code(&self) -> Option<i32> {
        Some(self.shared.lock().code)
    }

    fn video_url(&self) -> String {
        let state = self.shared.lock();
        state.entries.get(state.index).cloned().unwrap_or_default()
    }

    fn playlist_index(&self) -> Option<usize> {
        let state = self.shared.lock();
        state.playlist.then_some(state.index)
    }

    fn playlist_len(&self) -> usize {
        let state = self.shared.lock();
        if state.playlist {
            state.entries.len()
        } else {
            0
        }
    }

    fn destroy(&self) {
        let mut state = self.shared.lock();
        state.destroyed = true;
        state.drop_source();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(entries: usize, index: usize) -> InstanceState {
        InstanceState {
            entries: (0..entries).map(|i| format!("https://www.youtube.com/watch?v={}", i)).collect(),
            index,
            playlist: true,
            source: None,
            generation: 0,
            code: EmbedState::UNSTARTED,
            cue_offset: 0.0,
            duration: 0.0,
            volume: 100.0,
            rate: 1.0,
            shuffle: false,
            looped: false,
            destroyed: false,
        }
    }

    #[test]
    fn next_index_walks_then_stops() {
        assert_eq!(state_with(3, 0).next_index(), Some(1));
        assert_eq!(state_with(3, 2).next_index(), None);
    }

    #[test]
    fn next_index_loops_when_enabled() {
        let mut state = state_with(3, 2);
        state.looped = true;
        assert_eq!(state.next_index(), Some(0));
    }

    #[test]
    fn shuffle_never_repeats_current() {
        let mut state = state_with(4, 1);
        state.shuffle = true;
        for _ in 0..50 {
            let next = state.next_index().unwrap();
            assert!(next < 4);
            assert_ne!(next, 1);
        }
    }
}
