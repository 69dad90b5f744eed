// Queue items
// What a caller can hand to enqueue(): a URL, undecoded bytes, or PCM that
// has already been decoded. The variant is chosen by whoever builds the item.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{PlayerError, Result};

/// Interleaved f32 PCM.
#[derive(Clone, PartialEq)]
pub struct DecodedBuffer {
    channels: u16,
    sample_rate: u32,
    samples: Arc<[f32]>,
}

impl DecodedBuffer {
    pub fn new(channels: u16, sample_rate: u32, samples: Vec<f32>) -> Result<Self> {
        if channels == 0 || sample_rate == 0 {
            return Err(PlayerError::UnsupportedItem(format!(
                "buffer with {} channels at {} Hz",
                channels, sample_rate
            )));
        }
        Ok(DecodedBuffer {
            channels,
            sample_rate,
            samples: samples.into(),
        })
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }
}

impl fmt::Debug for DecodedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedBuffer")
            .field("channels", &self.channels)
            .field("sample_rate", &self.sample_rate)
            .field("frames", &self.frames())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MediaItem {
    /// Played through a streaming source; may be http(s), file:// or a path
    Url(String),
    /// Encoded audio (mp3, wav, flac, ogg) that must be decoded before queueing
    RawBytes(Vec<u8>),
    Decoded(DecodedBuffer),
}

impl MediaItem {
    /// Rejects items that carry nothing to play.
    pub fn validate(&self) -> Result<()> {
        let empty = match self {
            MediaItem::Url(url) => url.trim().is_empty(),
            MediaItem::RawBytes(bytes) => bytes.is_empty(),
            MediaItem::Decoded(buffer) => buffer.is_empty(),
        };
        if empty {
            Err(PlayerError::EmptyItem)
        } else {
            Ok(())
        }
    }

    /// Builds items from loosely typed input (a JSON request, a playlist file).
    ///
    /// - string -> `Url`
    /// - `{"bytes": [u8, ...]}` -> `RawBytes`
    /// - `{"channels", "sampleRate", "samples"}` -> `Decoded`
    /// - array -> each element in order
    /// - null -> `EmptyItem`; anything else -> `UnsupportedItem`
    pub fn from_json(value: &Value) -> Result<Vec<MediaItem>> {
        match value {
            Value::Array(values) => {
                let mut items = Vec::with_capacity(values.len());
                for value in values {
                    items.push(Self::single_from_json(value)?);
                }
                Ok(items)
            }
            other => Ok(vec![Self::single_from_json(other)?]),
        }
    }

    fn single_from_json(value: &Value) -> Result<MediaItem> {
        match value {
            Value::Null => Err(PlayerError::EmptyItem),
            Value::String(url) => Ok(MediaItem::Url(url.clone())),
            Value::Object(map) => {
                if let Some(bytes) = map.get("bytes") {
                    return Ok(MediaItem::RawBytes(json_bytes(bytes)?));
                }
                if let (Some(channels), Some(rate), Some(samples)) =
                    (map.get("channels"), map.get("sampleRate"), map.get("samples"))
                {
                    let channels = channels
                        .as_u64()
                        .and_then(|c| u16::try_from(c).ok())
                        .ok_or_else(|| PlayerError::UnsupportedItem("channels".into()))?;
                    let rate = rate
                        .as_u64()
                        .and_then(|r| u32::try_from(r).ok())
                        .ok_or_else(|| PlayerError::UnsupportedItem("sampleRate".into()))?;
                    let samples = samples
                        .as_array()
                        .ok_or_else(|| PlayerError::UnsupportedItem("samples".into()))?
                        .iter()
                        .map(|s| s.as_f64().map(|s| s as f32))
                        .collect::<Option<Vec<f32>>>()
                        .ok_or_else(|| PlayerError::UnsupportedItem("samples".into()))?;
                    return Ok(MediaItem::Decoded(DecodedBuffer::new(channels, rate, samples)?));
                }
                Err(PlayerError::UnsupportedItem("object".into()))
            }
            Value::Array(_) => Err(PlayerError::UnsupportedItem("nested array".into())),
            Value::Bool(_) => Err(PlayerError::UnsupportedItem("boolean".into())),
            Value::Number(_) => Err(PlayerError::UnsupportedItem("number".into())),
        }
    }
}

fn json_bytes(value: &Value) -> Result<Vec<u8>> {
    value
        .as_array()
        .ok_or_else(|| PlayerError::UnsupportedItem("bytes".into()))?
        .iter()
        .map(|b| b.as_u64().and_then(|b| u8::try_from(b).ok()))
        .collect::<Option<Vec<u8>>>()
        .ok_or_else(|| PlayerError::UnsupportedItem("bytes".into()))
}

/// A queue entry: everything except raw bytes, which are decoded on enqueue.
#[derive(Debug, Clone, PartialEq)]
pub enum Playable {
    Url(String),
    Buffer(DecodedBuffer),
}

impl Playable {
    pub fn label(&self) -> String {
        match self {
            Playable::Url(url) => url.clone(),
            Playable::Buffer(buffer) => format!(
                "<buffer {}ch {}Hz {:.1}s>",
                buffer.channels(),
                buffer.sample_rate(),
                buffer.duration().as_secs_f64()
            ),
        }
    }
}

impl From<&str> for MediaItem {
    fn from(url: &str) -> Self {
        MediaItem::Url(url.to_string())
    }
}

impl From<String> for MediaItem {
    fn from(url: String) -> Self {
        MediaItem::Url(url)
    }
}

impl From<Vec<u8>> for MediaItem {
    fn from(bytes: Vec<u8>) -> Self {
        MediaItem::RawBytes(bytes)
    }
}

impl From<&[u8]> for MediaItem {
    fn from(bytes: &[u8]) -> Self {
        MediaItem::RawBytes(bytes.to_vec())
    }
}

impl From<DecodedBuffer> for MediaItem {
    fn from(buffer: DecodedBuffer) -> Self {
        MediaItem::Decoded(buffer)
    }
}
