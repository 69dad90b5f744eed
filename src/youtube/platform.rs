// Embed platform bootstrap
// The platform loads once per process, no matter how many players ask.
// Every player watches the same status instead of sharing a callback slot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::watch;

use crate::error::{PlayerError, Result};
use crate::youtube::embed::EmbedApi;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformStatus {
    Loading,
    Ready,
    Failed(String),
}

#[derive(Debug)]
pub struct Platform {
    started: AtomicBool,
    status: watch::Sender<PlatformStatus>,
}

static GLOBAL: OnceLock<Arc<Platform>> = OnceLock::new();

impl Platform {
    pub fn new() -> Self {
        let (status, _) = watch::channel(PlatformStatus::Loading);
        Platform {
            started: AtomicBool::new(false),
            status,
        }
    }

    /// The process-wide platform.
    pub fn global() -> Arc<Platform> {
        GLOBAL.get_or_init(|| Arc::new(Platform::new())).clone()
    }

    /// Starts loading `api` in the background. Only the first call does
    /// anything; later calls (from other players) are no-ops.
    pub fn bootstrap(self: &Arc<Self>, api: Arc<dyn EmbedApi>) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!("Embed platform bootstrap needs a tokio runtime");
                self.started.store(false, Ordering::SeqCst);
                return;
            }
        };

        let platform = self.clone();
        handle.spawn(async move {
            match api.load().await {
                Ok(()) => {
                    tracing::info!("Embed platform ready");
                    platform.status.send_replace(PlatformStatus::Ready);
                }
                Err(e) => {
                    tracing::warn!("Embed platform failed to load: {}", e);
                    platform.status.send_replace(PlatformStatus::Failed(e.to_string()));
                }
            }
        });
    }

    pub fn status(&self) -> PlatformStatus {
        self.status.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        *self.status.borrow() == PlatformStatus::Ready
    }

    /// Resolves once loading has finished either way.
    pub async fn wait_ready(&self) -> Result<()> {
        let mut rx = self.status.subscribe();
        let status = rx
            .wait_for(|status| *status != PlatformStatus::Loading)
            .await
            .map_err(|_| PlayerError::PlatformUnavailable("platform dropped".into()))?
            .clone();

        match status {
            PlatformStatus::Failed(message) => Err(PlayerError::PlatformUnavailable(message)),
            _ => Ok(()),
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::new()
    }
}
