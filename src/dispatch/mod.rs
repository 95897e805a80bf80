use crate::transport::state::ConnectionState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tracing::debug;

/// A finalized, immutable transcript segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    /// Stable identifier, unique within a session.
    pub utterance_id: String,
    /// Audio channel the utterance was recognized on.
    pub channel_index: u32,
    /// Diarized speaker id, when the backend infers speakers.
    pub speaker_id: Option<u32>,
    /// Display label for the speaker ("you", "caller", "speaker 1", ...).
    pub speaker_label: String,
    pub text: String,
    /// Start of the utterance in ms from session start, when reported.
    pub start_ms: Option<u64>,
    /// End of the utterance in ms from session start, when reported.
    pub end_ms: Option<u64>,
}

/// Everything a session publishes to its subscribers, in delivery order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TranscriptEvent {
    /// Connection lifecycle change; interleaves in order with content events.
    StatusChanged { state: ConnectionState },
    /// Interim transcript for ongoing speech. May repeat for the same
    /// channel; the latest caption is authoritative until finalized.
    Caption {
        channel_index: u32,
        speaker_label: String,
        text: String,
    },
    /// Finalized transcript segment. Emitted at most once per utterance id.
    Utterance(Utterance),
    /// Backend stream metadata.
    Metadata {
        request_id: Option<String>,
        channels: Option<u32>,
        duration_secs: Option<f64>,
    },
    /// Assist suggestion correlated to the utterance that triggered it.
    Suggestion { utterance_id: String, text: String },
    /// Cumulative summary of the conversation so far.
    Summary { text: String },
    /// Backend- or transport-surfaced error, passed through on the stream.
    Error { message: String },
    /// A session reached `Open` and became the active session.
    Started { session_id: String },
    /// A session was deregistered after reaching a terminal state.
    Stopped { session_id: String },
}

/// Subscription key: one per event variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Status,
    Caption,
    Utterance,
    Metadata,
    Suggestion,
    Summary,
    Error,
    Started,
    Stopped,
}

impl TranscriptEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            TranscriptEvent::StatusChanged { .. } => EventKind::Status,
            TranscriptEvent::Caption { .. } => EventKind::Caption,
            TranscriptEvent::Utterance(_) => EventKind::Utterance,
            TranscriptEvent::Metadata { .. } => EventKind::Metadata,
            TranscriptEvent::Suggestion { .. } => EventKind::Suggestion,
            TranscriptEvent::Summary { .. } => EventKind::Summary,
            TranscriptEvent::Error { .. } => EventKind::Error,
            TranscriptEvent::Started { .. } => EventKind::Started,
            TranscriptEvent::Stopped { .. } => EventKind::Stopped,
        }
    }
}

type EventHandler = Arc<dyn Fn(&TranscriptEvent) + Send + Sync>;

struct Registry {
    subscribers: Mutex<HashMap<EventKind, Vec<(u64, EventHandler)>>>,
    next_id: AtomicU64,
}

/// Fans events out to registered subscribers in dispatch order.
///
/// Handlers are snapshotted under the lock and invoked outside it, so a
/// subscriber unregistering concurrently can never deadlock delivery; it
/// either receives the in-flight event or it does not.
#[derive(Clone)]
pub struct EventDispatcher {
    registry: Arc<Registry>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Registry {
                subscribers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Register a handler for one event variant.
    ///
    /// The returned handle unsubscribes explicitly or on drop.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&TranscriptEvent) + Send + Sync + 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::SeqCst);
        {
            let mut subscribers = self.registry.subscribers.lock().expect("dispatcher poisoned");
            subscribers
                .entry(kind)
                .or_default()
                .push((id, Arc::new(handler)));
        }

        Subscription {
            registry: Arc::downgrade(&self.registry),
            kind,
            id,
        }
    }

    /// Deliver an event to every subscriber of its variant.
    pub fn dispatch(&self, event: &TranscriptEvent) {
        let handlers: Vec<EventHandler> = {
            let subscribers = self.registry.subscribers.lock().expect("dispatcher poisoned");
            subscribers
                .get(&event.kind())
                .map(|entries| entries.iter().map(|(_, h)| Arc::clone(h)).collect())
                .unwrap_or_default()
        };

        for handler in handlers {
            handler(event);
        }
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Disposable handle for one registered subscriber.
pub struct Subscription {
    registry: Weak<Registry>,
    kind: EventKind,
    id: u64,
}

impl Subscription {
    /// Remove the subscriber. Consumes the handle; dropping does the same.
    pub fn unsubscribe(self) {}

    fn remove(&self) {
        if let Some(registry) = self.registry.upgrade() {
            let mut subscribers = registry.subscribers.lock().expect("dispatcher poisoned");
            if let Some(entries) = subscribers.get_mut(&self.kind) {
                entries.retain(|(id, _)| *id != self.id);
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.remove();
    }
}

/// Per-session gate in front of the shared dispatcher.
///
/// Sealed once the session publishes its terminal status, so detached
/// post-processing tasks that outlive the session cannot emit events after
/// deregistration and no subscriber observes content after the terminal
/// `StatusChanged`.
#[derive(Clone)]
pub struct EventSink {
    dispatcher: EventDispatcher,
    sealed: Arc<AtomicBool>,
}

impl EventSink {
    pub fn new(dispatcher: EventDispatcher) -> Self {
        Self {
            dispatcher,
            sealed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Emit an event unless the sink is sealed.
    pub fn emit(&self, event: TranscriptEvent) {
        if self.sealed.load(Ordering::SeqCst) {
            debug!(kind = ?event.kind(), "Dropping event emitted after session teardown");
            return;
        }
        self.dispatcher.dispatch(&event);
    }

    /// Emit the terminal status and seal the sink in one step.
    pub fn emit_terminal_status(&self, state: ConnectionState) {
        if self.sealed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.dispatcher.dispatch(&TranscriptEvent::StatusChanged { state });
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::SeqCst)
    }
}
