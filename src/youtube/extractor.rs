// YouTube audio stream extractor
// Runs yt-dlp as a subprocess to resolve stream URLs, metadata and playlists

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::process::Command;

use crate::error::{PlayerError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub id: String,
    pub title: String,
    /// Seconds; 0 when unknown (live streams, flat playlist entries)
    pub duration: f64,
    pub uploader: String,
    /// Watch page, not the audio stream
    pub url: String,
}

impl VideoInfo {
    fn from_json(json: &Value) -> Self {
        let id = json["id"].as_str().unwrap_or("").to_string();
        let url = json["webpage_url"]
            .as_str()
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("https://www.youtube.com/watch?v={}", id));

        VideoInfo {
            title: json["title"].as_str().unwrap_or("Unknown").to_string(),
            duration: json["duration"].as_f64().unwrap_or(0.0),
            uploader: json["uploader"].as_str().unwrap_or("Unknown").to_string(),
            id,
            url,
        }
    }
}

#[derive(Debug, Clone)]
pub struct YouTubeExtractor {
    binary: String,
}

impl YouTubeExtractor {
    pub fn new(binary: impl Into<String>) -> Self {
        YouTubeExtractor { binary: binary.into() }
    }

    /// `yt-dlp --version`; fails if the binary is missing.
    pub async fn version(&self) -> Result<String> {
        Ok(self.run(&["--version"]).await?.trim().to_string())
    }

    pub async fn get_audio_url(&self, video_url: &str) -> Result<String> {
        let stdout = self
            .run(&["--get-url", "-f", "bestaudio", "--no-playlist", video_url])
            .await?;

        stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(|line| line.to_string())
            .ok_or_else(|| PlayerError::Extractor(format!("no audio stream for {}", video_url)))
    }

    pub async fn get_video_info(&self, video_url: &str) -> Result<VideoInfo> {
        let stdout = self.run(&["-j", "--no-playlist", video_url]).await?;
        let json: Value = serde_json::from_str(&stdout)?;
        Ok(VideoInfo::from_json(&json))
    }

    /// Entries of a playlist, in playlist order. Flat: no per-entry requests.
    pub async fn get_playlist(&self, playlist_url: &str) -> Result<Vec<VideoInfo>> {
        let stdout = self.run(&["-j", "--flat-playlist", playlist_url]).await?;
        parse_lines(&stdout)
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        tracing::debug!("Running {} {}", self.binary, args.join(" "));

        let output = Command::new(&self.binary)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| PlayerError::Extractor(format!("Failed to run {}: {}", self.binary, e)))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(PlayerError::Extractor(error.trim().to_string()));
        }

        String::from_utf8(output.stdout).map_err(|e| PlayerError::Extractor(format!("Invalid UTF-8: {}", e)))
    }
}

impl Default for YouTubeExtractor {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

// One JSON object per line
fn parse_lines(stdout: &str) -> Result<Vec<VideoInfo>> {
    let mut results = Vec::new();
    for line in stdout.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let json: Value = serde_json::from_str(line)?;
        results.push(VideoInfo::from_json(&json));
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_from_full_json() {
        let json: Value = serde_json::from_str(
            r#"{"id":"abc","title":"Song","duration":212.5,"uploader":"Band",
                "webpage_url":"https://www.youtube.com/watch?v=abc"}"#,
        )
        .unwrap();
        let info = VideoInfo::from_json(&json);
        assert_eq!(info.id, "abc");
        assert_eq!(info.title, "Song");
        assert_eq!(info.duration, 212.5);
        assert_eq!(info.uploader, "Band");
        assert_eq!(info.url, "https://www.youtube.com/watch?v=abc");
    }

    #[test]
    fn flat_playlist_lines() {
        let stdout = "{\"id\":\"a\",\"title\":\"One\"}\n\n{\"id\":\"b\",\"duration\":null}\n";
        let entries = parse_lines(stdout).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title, "One");
        assert_eq!(entries[1].title, "Unknown");
        assert_eq!(entries[1].duration, 0.0);
        assert_eq!(entries[1].url, "https://www.youtube.com/watch?v=b");
    }

    #[test]
    fn bad_line_is_a_json_error() {
        assert!(matches!(parse_lines("not json"), Err(PlayerError::Json(_))));
    }

    #[tokio::test]
    async fn missing_binary_is_an_extractor_error() {
        let extractor = YouTubeExtractor::new("definitely-not-a-real-yt-dlp-binary");
        let err = extractor.version().await.unwrap_err();
        assert!(matches!(err, PlayerError::Extractor(_)));
    }
}
