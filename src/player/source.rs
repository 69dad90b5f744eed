//! Media adapter seam for the buffer/stream player.
//!
//! An [`AudioBackend`] turns a [`SourceRequest`] into a live [`ActiveSource`]
//! plus a one-shot [`Termination`] signal. Exactly one termination is sent per
//! started source unless it is stopped first; after `stop()` the backend may
//! still send, and the player ignores it.

use std::time::Duration;

use tokio::sync::oneshot;

use crate::error::Result;
use crate::player::item::{DecodedBuffer, Playable};

/// How a started source finished.
#[derive(Debug, Clone, PartialEq)]
pub enum Termination {
    Ended,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct SourceRequest {
    pub media: Playable,
    /// Position to start from; zero for a fresh play
    pub offset: Duration,
    /// Device gain, already clamped to 0.0 - 1.0
    pub volume: f32,
    /// Already clamped to 0.75 - 2.0
    pub playback_rate: f32,
}

pub struct StartedSource {
    pub source: Box<dyn ActiveSource>,
    pub termination: oneshot::Receiver<Termination>,
}

/// Transport surface of one live source.
pub trait ActiveSource: Send + Sync {
    fn pause(&self);
    /// Continues from the paused position.
    fn resume(&self);
    fn stop(&self);
    fn is_paused(&self) -> bool;
    fn set_volume(&self, volume: f32);
    fn set_playback_rate(&self, rate: f32);
    /// Media position, not wall time.
    fn position(&self) -> Duration;
}

pub trait AudioBackend: Send + Sync + 'static {
    /// Starts playback immediately. Failures after this returns are reported
    /// through the termination channel.
    fn start(&self, request: SourceRequest) -> Result<StartedSource>;

    /// Decodes a complete encoded file into PCM. Blocking; callers run it off
    /// the async executor.
    fn decode(&self, bytes: Vec<u8>) -> Result<DecodedBuffer>;
}
