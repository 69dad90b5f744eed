// Logging setup
// The TUI owns the terminal, so the demo sends tracing output to a file.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::error::{PlayerError, Result};
use crate::events::{EventNotifier, PlayerEvent};

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Used when RUST_LOG is not set, e.g. "info" or "unified_player=debug"
    pub filter: String,
    /// None writes to stderr
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            filter: "info".to_string(),
            file: None,
        }
    }
}

/// Installs the global subscriber. Fails if one is already set.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .map_err(|e| PlayerError::Config(format!("Invalid log filter '{}': {}", config.filter, e)))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    let installed = match &config.file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };

    installed.map_err(|e| PlayerError::Config(format!("Failed to install logger: {}", e)))
}

// ==========================================
// PLAYER LOG
// ==========================================
// Every player log line goes two places: tracing, and a `log` notification
// emitted on a later scheduler turn. Errors are emitted immediately.
#[derive(Clone, Debug)]
pub(crate) struct Reporter {
    pub(crate) events: EventNotifier,
    debug: bool,
}

impl Reporter {
    pub(crate) fn new(debug: bool) -> Self {
        Reporter {
            events: EventNotifier::new(),
            debug,
        }
    }

    pub(crate) fn log(&self, message: impl Into<String>) {
        let message = message.into();
        if self.debug {
            tracing::info!("{}", message);
        } else {
            tracing::debug!("{}", message);
        }
        self.events.emit_deferred(PlayerEvent::Log(message));
    }

    pub(crate) fn error(&self, error: &PlayerError) {
        tracing::warn!("{}", error);
        self.events.emit(&PlayerEvent::Error(error.to_string()));
    }

    pub(crate) fn emit(&self, event: PlayerEvent) {
        self.events.emit(&event);
    }
}
