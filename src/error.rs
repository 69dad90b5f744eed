// Error types shared by both player variants
// Every public operation returns Result<T>; no failure leaves the player unusable.

use thiserror::Error;

// ==========================================
// ERROR KIND
// ==========================================
// Coarse grouping of PlayerError so callers can decide what to do
// without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation, // Bad input: empty item, unsupported type, missing video id
    NotReady,   // Backing adapter/platform not initialised yet
    Delegate,   // The native media stack (decoder, device, yt-dlp, HTTP) failed
    EmptyQueue, // Cursor moved out of bounds or nothing loaded
    Lifecycle,  // Operation superseded or not supported by this variant
    Config,
}

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("argument cannot be empty")]
    EmptyItem,

    #[error("invalid type: {0}")]
    UnsupportedItem(String),

    #[error("videoId not found in {0}")]
    MissingVideoId(String),

    #[error("invalid value for {name}: {value}")]
    InvalidControlValue { name: &'static str, value: f64 },

    #[error("player not ready")]
    NotReady,

    #[error("embed platform unavailable: {0}")]
    PlatformUnavailable(String),

    #[error("audio decode failed: {0}")]
    Decode(String),

    #[error("playback failed: {0}")]
    Playback(String),

    #[error("yt-dlp failed: {0}")]
    Extractor(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no item to play at index {index}")]
    NoItemToPlay { index: isize },

    #[error("no audio source loaded")]
    NoSourceLoaded,

    #[error("playback superseded before it finished")]
    Superseded,

    #[error("method not supported: {0}")]
    Unsupported(&'static str),

    #[error("config error: {0}")]
    Config(String),
}

impl PlayerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlayerError::EmptyItem
            | PlayerError::UnsupportedItem(_)
            | PlayerError::MissingVideoId(_)
            | PlayerError::InvalidControlValue { .. } => ErrorKind::Validation,
            PlayerError::NotReady | PlayerError::PlatformUnavailable(_) => ErrorKind::NotReady,
            PlayerError::Decode(_)
            | PlayerError::Playback(_)
            | PlayerError::Extractor(_)
            | PlayerError::Http(_)
            | PlayerError::Io(_)
            | PlayerError::Json(_) => ErrorKind::Delegate,
            PlayerError::NoItemToPlay { .. } | PlayerError::NoSourceLoaded => ErrorKind::EmptyQueue,
            PlayerError::Superseded | PlayerError::Unsupported(_) => ErrorKind::Lifecycle,
            PlayerError::Config(_) => ErrorKind::Config,
        }
    }
}

pub type Result<T> = std::result::Result<T, PlayerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(PlayerError::EmptyItem.kind(), ErrorKind::Validation);
        assert_eq!(
            PlayerError::MissingVideoId("https://host/watch".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(PlayerError::NotReady.kind(), ErrorKind::NotReady);
        assert_eq!(PlayerError::Decode("bad header".into()).kind(), ErrorKind::Delegate);
        assert_eq!(PlayerError::NoItemToPlay { index: 3 }.kind(), ErrorKind::EmptyQueue);
        assert_eq!(PlayerError::NoSourceLoaded.kind(), ErrorKind::EmptyQueue);
        assert_eq!(PlayerError::Superseded.kind(), ErrorKind::Lifecycle);
    }

    #[test]
    fn messages_match_player_wording() {
        assert_eq!(PlayerError::NotReady.to_string(), "player not ready");
        assert_eq!(PlayerError::NoSourceLoaded.to_string(), "no audio source loaded");
        assert_eq!(
            PlayerError::NoItemToPlay { index: -1 }.to_string(),
            "no item to play at index -1"
        );
    }
}
