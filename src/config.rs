// Player configuration
// Stored as JSON in the user's config directory, with environment overrides.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PlayerError, Result};

const APP_DIR: &str = "unified-player";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Volume applied to the first source, 0.0 - 1.0
    pub initial_volume: f64,
    /// Playback rate applied to the first source, 0.75 - 2.0
    pub initial_playback_rate: f64,
    /// Mirror log notifications to tracing at info level instead of debug
    pub debug: bool,
    pub log_filter: String,
    pub ytdlp_path: String,
    pub embed: EmbedConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedConfig {
    /// Delay between readiness checks while the embed platform is loading
    pub poll_interval_ms: u64,
    /// Readiness checks before enqueue gives up with NotReady
    pub max_poll_attempts: u32,
    /// Volume ceiling, 0.0 - 1.0 (rescaled to 0 - 100 for the embedded player)
    pub initial_max_volume: f64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        PlayerConfig {
            initial_volume: 1.0,
            initial_playback_rate: 1.0,
            debug: false,
            log_filter: "info".to_string(),
            ytdlp_path: "yt-dlp".to_string(),
            embed: EmbedConfig::default(),
        }
    }
}

impl Default for EmbedConfig {
    fn default() -> Self {
        EmbedConfig {
            poll_interval_ms: 1000,
            max_poll_attempts: 30,
            initial_max_volume: 1.0,
        }
    }
}

impl PlayerConfig {
    /// `<config dir>/unified-player`, if the platform has one.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR))
    }

    /// Loads the default config file (if any) and applies env overrides.
    pub fn load() -> Result<Self> {
        let config = match Self::config_dir() {
            Some(dir) => Self::load_from(&dir.join(CONFIG_FILE))?,
            None => PlayerConfig::default(),
        };
        Ok(config.with_env_overrides())
    }

    /// Missing file means defaults; an unreadable or malformed one is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(PlayerConfig::default());
        }

        let data = fs::read_to_string(path)
            .map_err(|e| PlayerError::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        serde_json::from_str(&data)
            .map_err(|e| PlayerError::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(path) = std::env::var("UNIFIED_PLAYER_YTDLP") {
            self.ytdlp_path = path;
        }
        if let Ok(filter) = std::env::var("UNIFIED_PLAYER_LOG") {
            self.log_filter = filter;
        }
        if let Ok(debug) = std::env::var("UNIFIED_PLAYER_DEBUG") {
            self.debug = matches!(debug.as_str(), "1" | "true" | "yes");
        }
        self
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.embed.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("unified-player-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = scratch_dir("missing");
        let config = PlayerConfig::load_from(&dir.join(CONFIG_FILE)).unwrap();
        assert_eq!(config, PlayerConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = scratch_dir("partial");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(CONFIG_FILE);
        fs::write(&path, r#"{ "initial_volume": 0.4, "embed": { "poll_interval_ms": 250 } }"#).unwrap();

        let config = PlayerConfig::load_from(&path).unwrap();
        assert_eq!(config.initial_volume, 0.4);
        assert_eq!(config.initial_playback_rate, 1.0);
        assert_eq!(config.embed.poll_interval_ms, 250);
        assert_eq!(config.embed.max_poll_attempts, 30);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = scratch_dir("malformed");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(CONFIG_FILE);
        fs::write(&path, "{ not json").unwrap();

        let err = PlayerConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, PlayerError::Config(_)));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn save_then_load() {
        let dir = scratch_dir("save");
        let path = dir.join(CONFIG_FILE);
        let mut config = PlayerConfig::default();
        config.debug = true;
        config.ytdlp_path = "/opt/bin/yt-dlp".into();

        config.save_to(&path).unwrap();
        assert_eq!(PlayerConfig::load_from(&path).unwrap(), config);
        let _ = fs::remove_dir_all(&dir);
    }
}
