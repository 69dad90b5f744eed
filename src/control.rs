//! The transport interface shared by both player variants.
//!
//! Every method resolves once the request has been applied (playback has
//! *started*, the cursor has moved, the value has been set); waiting for a
//! track to finish is `play_queue` territory.

use async_trait::async_trait;

use crate::error::Result;
use crate::events::EventNotifier;
use crate::player::item::MediaItem;

#[async_trait]
pub trait PlaybackControl: Send + Sync {
    fn events(&self) -> &EventNotifier;

    async fn enqueue(&self, item: MediaItem) -> Result<()>;

    /// Sequential single-item enqueues in iteration order.
    async fn enqueue_all(&self, items: Vec<MediaItem>) -> Result<()> {
        for item in items {
            self.enqueue(item).await?;
        }
        Ok(())
    }

    async fn empty_queue(&self) -> Result<()>;

    /// Resumes a paused source in place, otherwise starts the current item.
    async fn play(&self) -> Result<()>;

    /// Plays from the current item through the end of the queue.
    async fn play_queue(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;
    async fn stop(&self) -> Result<()>;
    async fn replay(&self) -> Result<()>;

    /// Moves to the next item and stops; call `play` to hear it.
    async fn next(&self) -> Result<()>;
    async fn previous(&self) -> Result<()>;

    async fn seek(&self, seconds: f64) -> Result<()>;

    /// Returns the value actually applied after clamping.
    async fn set_volume(&self, level: f64) -> Result<f64>;
    async fn set_playback_rate(&self, rate: f64) -> Result<f64>;

    async fn set_muted(&self, muted: bool) -> Result<()>;
    async fn set_random(&self, enabled: bool) -> Result<()>;
    async fn set_repeat(&self, enabled: bool) -> Result<()>;

    /// Whether transport calls can be delegated yet.
    async fn is_ready(&self) -> bool;

    async fn has_next(&self) -> bool;
    async fn has_previous(&self) -> bool;
}
