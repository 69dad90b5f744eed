//! Seam between `YoutubePlayer` and whatever actually hosts the video.
//!
//! An [`EmbedApi`] is the platform: it loads once per process and then builds
//! one [`EmbeddedPlayer`] per queued video. Instances report back over an
//! unbounded channel of [`EmbedSignal`]s, mirroring the `onReady` and
//! `onStateChange` callbacks of an iframe player.

use async_trait::async_trait;
use rand::Rng;
use std::fmt;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::youtube::url::VideoRef;

/// Symbolic form of the embedded player's numeric status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedState {
    Unstarted,
    Ended,
    Playing,
    Paused,
    Buffering,
    VideoCued,
    Unknown,
}

impl EmbedState {
    pub const UNSTARTED: i32 = -1;
    pub const ENDED: i32 = 0;
    pub const PLAYING: i32 = 1;
    pub const PAUSED: i32 = 2;
    pub const BUFFERING: i32 = 3;
    pub const VIDEO_CUED: i32 = 5;

    pub fn from_code(code: Option<i32>) -> Self {
        match code {
            Some(Self::UNSTARTED) => EmbedState::Unstarted,
            Some(Self::ENDED) => EmbedState::Ended,
            Some(Self::PLAYING) => EmbedState::Playing,
            Some(Self::PAUSED) => EmbedState::Paused,
            Some(Self::BUFFERING) => EmbedState::Buffering,
            Some(Self::VIDEO_CUED) => EmbedState::VideoCued,
            _ => EmbedState::Unknown,
        }
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            EmbedState::Unstarted => Some(Self::UNSTARTED),
            EmbedState::Ended => Some(Self::ENDED),
            EmbedState::Playing => Some(Self::PLAYING),
            EmbedState::Paused => Some(Self::PAUSED),
            EmbedState::Buffering => Some(Self::BUFFERING),
            EmbedState::VideoCued => Some(Self::VIDEO_CUED),
            EmbedState::Unknown => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EmbedState::Unstarted => "unstarted",
            EmbedState::Ended => "ended",
            EmbedState::Playing => "playing",
            EmbedState::Paused => "paused",
            EmbedState::Buffering => "buffering",
            EmbedState::VideoCued => "video cued",
            EmbedState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for EmbedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EmbedSignal {
    Ready,
    StateChange(i32),
    Error(String),
}

/// Where an instance is mounted. Hidden, 1x1, off-screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostContainer {
    pub id: String,
    pub style: &'static str,
}

impl HostContainer {
    pub const OFFSCREEN_STYLE: &'static str =
        "position:absolute;left:-1000px;bottom:-1000px;visibility:hidden;pointer-events:none";

    pub fn offscreen() -> Self {
        HostContainer {
            id: format!("player_{}", rand::thread_rng().gen_range(0..10_000_000_000u64)),
            style: Self::OFFSCREEN_STYLE,
        }
    }
}

#[async_trait]
pub trait EmbedApi: Send + Sync + 'static {
    /// One-time platform load. Called at most once per `Platform`.
    async fn load(&self) -> Result<()>;

    /// Builds an instance bound to `video`. It must send `EmbedSignal::Ready`
    /// once it accepts transport calls.
    fn create_player(
        &self,
        host: &HostContainer,
        video: &VideoRef,
        signals: mpsc::UnboundedSender<EmbedSignal>,
    ) -> Result<Box<dyn EmbeddedPlayer>>;
}

/// Transport and query surface of one embedded instance. Calls are
/// fire-and-forget; outcomes arrive as signals.
pub trait EmbeddedPlayer: Send + Sync {
    fn play_video(&self);
    fn pause_video(&self);
    fn stop_video(&self);
    fn seek_to(&self, seconds: f64);
    fn next_video(&self);
    fn previous_video(&self);
    /// 0 - 100
    fn set_volume(&self, volume: f64);
    fn set_playback_rate(&self, rate: f64);
    fn set_shuffle(&self, enabled: bool);
    fn set_loop(&self, enabled: bool);

    fn current_time(&self) -> f64;
    fn duration(&self) -> f64;
    fn state_code(&self) -> Option<i32>;
    fn video_url(&self) -> String;
    /// Position in the bound playlist, None without one
    fn playlist_index(&self) -> Option<usize>;
    fn playlist_len(&self) -> usize;

    fn destroy(&self);
}
