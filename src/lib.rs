//! One queue-and-transport interface over two kinds of media adapter:
//!
//! - [`Player`]: decoded PCM buffers, encoded bytes and URL streams played
//!   through rodio
//! - [`YoutubePlayer`]: an embedded video player with a readiness handshake
//!
//! Both implement [`PlaybackControl`] and report through an [`EventNotifier`].

pub mod config;
pub mod control;
pub mod error;
pub mod events;
pub mod logging;
pub mod player;
pub mod scale;
pub mod ui;
pub mod youtube;

pub use config::PlayerConfig;
pub use control::PlaybackControl;
pub use error::{ErrorKind, PlayerError, Result};
pub use events::{EventKind, EventNotifier, PlayerEvent, SubscriptionId};
pub use player::engine::{PlaybackCompletion, Player, TransportState};
pub use player::item::{DecodedBuffer, MediaItem};
pub use youtube::embed::EmbedState;
pub use youtube::player::YoutubePlayer;
