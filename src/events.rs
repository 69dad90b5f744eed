// ==========================================
// EVENT NOTIFIER
// ==========================================
// Publish/subscribe registry used by both player variants.
//
// Handlers are registered per EventKind and invoked synchronously, in
// registration order, by emit(). Registration returns a SubscriptionId;
// removal goes through that handle rather than comparing closures.
//
// The registry lock is never held while a handler runs, so a handler may
// subscribe, unsubscribe or emit again without deadlocking.
//
// Deferred emits go through one channel and one dispatcher task per
// notifier, so they arrive in the order they were queued.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::mpsc;

use crate::youtube::embed::EmbedState;

/// Stable notification identifiers. The string forms are the wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Log,
    Error,
    Ready,
    Play,
    Replay,
    Pause,
    Stop,
    Next,
    Previous,
    Random,
    Repeat,
    PlaybackRate,
    Volume,
    MaxVolume,
    Muted,
    Ended,
    Enqueue,
    Deque,
    EmptyQueue,
    StateChange,
}

impl EventKind {
    pub const ALL: [EventKind; 20] = [
        EventKind::Log,
        EventKind::Error,
        EventKind::Ready,
        EventKind::Play,
        EventKind::Replay,
        EventKind::Pause,
        EventKind::Stop,
        EventKind::Next,
        EventKind::Previous,
        EventKind::Random,
        EventKind::Repeat,
        EventKind::PlaybackRate,
        EventKind::Volume,
        EventKind::MaxVolume,
        EventKind::Muted,
        EventKind::Ended,
        EventKind::Enqueue,
        EventKind::Deque,
        EventKind::EmptyQueue,
        EventKind::StateChange,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Log => "log",
            EventKind::Error => "error",
            EventKind::Ready => "ready",
            EventKind::Play => "play",
            EventKind::Replay => "replay",
            EventKind::Pause => "pause",
            EventKind::Stop => "stop",
            EventKind::Next => "next",
            EventKind::Previous => "previous",
            EventKind::Random => "random",
            EventKind::Repeat => "repeat",
            EventKind::PlaybackRate => "playbackRate",
            EventKind::Volume => "volume",
            EventKind::MaxVolume => "maxVolume",
            EventKind::Muted => "muted",
            EventKind::Ended => "ended",
            EventKind::Enqueue => "enqueue",
            EventKind::Deque => "deque",
            EventKind::EmptyQueue => "emptyQueue",
            EventKind::StateChange => "stateChange",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown event: {}", s))
    }
}

/// A notification together with its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Log(String),
    Error(String),
    Ready,
    Play,
    Replay,
    Pause,
    Stop,
    Next,
    Previous,
    Random(bool),
    Repeat(bool),
    PlaybackRate(f64),
    Volume(f64),
    MaxVolume(f64),
    Muted(bool),
    Ended,
    Enqueue,
    Deque,
    EmptyQueue,
    StateChange(EmbedState),
}

impl PlayerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PlayerEvent::Log(_) => EventKind::Log,
            PlayerEvent::Error(_) => EventKind::Error,
            PlayerEvent::Ready => EventKind::Ready,
            PlayerEvent::Play => EventKind::Play,
            PlayerEvent::Replay => EventKind::Replay,
            PlayerEvent::Pause => EventKind::Pause,
            PlayerEvent::Stop => EventKind::Stop,
            PlayerEvent::Next => EventKind::Next,
            PlayerEvent::Previous => EventKind::Previous,
            PlayerEvent::Random(_) => EventKind::Random,
            PlayerEvent::Repeat(_) => EventKind::Repeat,
            PlayerEvent::PlaybackRate(_) => EventKind::PlaybackRate,
            PlayerEvent::Volume(_) => EventKind::Volume,
            PlayerEvent::MaxVolume(_) => EventKind::MaxVolume,
            PlayerEvent::Muted(_) => EventKind::Muted,
            PlayerEvent::Ended => EventKind::Ended,
            PlayerEvent::Enqueue => EventKind::Enqueue,
            PlayerEvent::Deque => EventKind::Deque,
            PlayerEvent::EmptyQueue => EventKind::EmptyQueue,
            PlayerEvent::StateChange(_) => EventKind::StateChange,
        }
    }
}

/// Handle returned by `on`/`once`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&PlayerEvent) + Send + Sync>;

struct Entry {
    id: SubscriptionId,
    once: bool,
    handler: Handler,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: HashMap<EventKind, Vec<Entry>>,
}

/// Cheap to clone; clones share one registry.
#[derive(Clone, Default)]
pub struct EventNotifier {
    registry: Arc<Mutex<Registry>>,
    // Started by the first deferred emit inside a runtime
    deferred: Arc<Mutex<Option<mpsc::UnboundedSender<PlayerEvent>>>>,
}

impl EventNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&PlayerEvent) + Send + Sync + 'static,
    {
        self.register(kind, false, Arc::new(handler))
    }

    /// Like `on`, but the handler is dropped after its first invocation.
    pub fn once<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&PlayerEvent) + Send + Sync + 'static,
    {
        self.register(kind, true, Arc::new(handler))
    }

    /// Removes one subscription. Returns false if it was already gone.
    pub fn off(&self, kind: EventKind, id: SubscriptionId) -> bool {
        let mut registry = self.lock();
        match registry.handlers.get_mut(&kind) {
            Some(entries) => {
                let before = entries.len();
                entries.retain(|entry| entry.id != id);
                entries.len() != before
            }
            None => false,
        }
    }

    /// Removes every subscription for `kind`.
    pub fn off_all(&self, kind: EventKind) {
        self.lock().handlers.remove(&kind);
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.lock().handlers.get(&kind).map_or(0, Vec::len)
    }

    /// Invokes the handlers registered for the event's kind, in order.
    /// Emitting a kind nobody listens to is a no-op.
    pub fn emit(&self, event: &PlayerEvent) {
        dispatch(&self.registry, event);
    }

    /// Emits on a later scheduler turn, detached from the caller's stack.
    /// Deferred events keep their relative order. Falls back to an
    /// immediate emit outside a tokio runtime.
    pub fn emit_deferred(&self, event: PlayerEvent) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return self.emit(&event);
        };

        let mut queue = self.deferred.lock().unwrap_or_else(PoisonError::into_inner);
        let event = match queue.as_ref() {
            Some(tx) => match tx.send(event) {
                Ok(()) => return,
                // The dispatcher's runtime has shut down
                Err(mpsc::error::SendError(event)) => event,
            },
            None => event,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(event);
        handle.spawn(dispatch_deferred(Arc::downgrade(&self.registry), rx));
        *queue = Some(tx);
    }

    fn register(&self, kind: EventKind, once: bool, handler: Handler) -> SubscriptionId {
        let mut registry = self.lock();
        registry.next_id += 1;
        let id = SubscriptionId(registry.next_id);
        registry
            .handlers
            .entry(kind)
            .or_default()
            .push(Entry { id, once, handler });
        id
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        lock(&self.registry)
    }
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

fn dispatch(registry: &Mutex<Registry>, event: &PlayerEvent) {
    let kind = event.kind();

    // Snapshot under the lock; `once` entries are removed before they run
    let snapshot: Vec<Handler> = {
        let mut registry = lock(registry);
        let Some(entries) = registry.handlers.get_mut(&kind) else {
            return;
        };
        let snapshot = entries.iter().map(|entry| entry.handler.clone()).collect();
        entries.retain(|entry| !entry.once);
        snapshot
    };

    for handler in snapshot {
        handler(event);
    }
}

// Ends once every notifier clone (and with it the sender) is dropped
async fn dispatch_deferred(registry: Weak<Mutex<Registry>>, mut rx: mpsc::UnboundedReceiver<PlayerEvent>) {
    while let Some(event) = rx.recv().await {
        let Some(registry) = registry.upgrade() else {
            return;
        };
        dispatch(&registry, &event);
    }
}

impl fmt::Debug for EventNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.lock();
        let counts: HashMap<&'static str, usize> = registry
            .handlers
            .iter()
            .map(|(kind, entries)| (kind.as_str(), entries.len()))
            .collect();
        f.debug_struct("EventNotifier").field("handlers", &counts).finish()
    }
}
