// Shared test collaborators: a scripted ASR backend, canned generator and
// memory store implementations, and small polling helpers.
#![allow(dead_code)]

use anyhow::{anyhow, Result};
use call_assist::{
    AsrCommand, AsrConnection, AsrConnector, AsrMessage, AssistGenerator, MemoryStore,
    SessionConfig, TranscriptEvent,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

/// Scripted ASR backend for driving sessions without a network.
pub struct MockConnector {
    /// Audio payloads received by the backend, in order.
    pub sent_audio: Arc<Mutex<Vec<Vec<u8>>>>,
    inject: Arc<Mutex<Option<mpsc::Sender<AsrMessage>>>>,
    /// Refuse the handshake entirely.
    pub fail_connect: bool,
    /// Acknowledge a close command with a clean close.
    pub ack_close: bool,
    /// When set, `connect` blocks until the gate is released.
    pub connect_gate: Option<Arc<Notify>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self {
            sent_audio: Arc::new(Mutex::new(Vec::new())),
            inject: Arc::new(Mutex::new(None)),
            fail_connect: false,
            ack_close: true,
            connect_gate: None,
        }
    }

    pub fn refusing() -> Self {
        Self {
            fail_connect: true,
            ..Self::new()
        }
    }

    /// Backend that never acknowledges the close handshake.
    pub fn unresponsive_on_close() -> Self {
        Self {
            ack_close: false,
            ..Self::new()
        }
    }

    /// Backend whose handshake waits for the returned gate.
    pub fn gated() -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let connector = Self {
            connect_gate: Some(Arc::clone(&gate)),
            ..Self::new()
        };
        (connector, gate)
    }

    /// Inject one inbound message as if the backend had sent it.
    pub async fn inject(&self, message: AsrMessage) {
        let sender = self
            .inject
            .lock()
            .unwrap()
            .clone()
            .expect("backend not connected yet");
        sender.send(message).await.expect("session receiver gone");
    }

    /// Inject one raw wire text frame.
    pub async fn inject_text(&self, text: &str) {
        self.inject(AsrMessage::Message(text.to_string())).await;
    }

    pub fn audio_frames(&self) -> Vec<Vec<u8>> {
        self.sent_audio.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl AsrConnector for MockConnector {
    async fn connect(&self, _config: &SessionConfig) -> Result<AsrConnection> {
        if self.fail_connect {
            return Err(anyhow!("mock backend refused connection"));
        }
        if let Some(gate) = &self.connect_gate {
            gate.notified().await;
        }

        let (command_tx, mut command_rx) = mpsc::channel::<AsrCommand>(64);
        let (message_tx, message_rx) = mpsc::channel::<AsrMessage>(64);
        *self.inject.lock().unwrap() = Some(message_tx.clone());

        let sent_audio = Arc::clone(&self.sent_audio);
        let ack_close = self.ack_close;
        tokio::spawn(async move {
            while let Some(command) = command_rx.recv().await {
                match command {
                    AsrCommand::Audio(bytes) => sent_audio.lock().unwrap().push(bytes),
                    AsrCommand::Close => {
                        if ack_close {
                            let _ = message_tx
                                .send(AsrMessage::Closed {
                                    code: Some(1000),
                                    reason: Some("client stop".to_string()),
                                })
                                .await;
                        }
                        break;
                    }
                }
            }
        });

        Ok(AsrConnection {
            commands: command_tx,
            messages: message_rx,
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Canned suggestion/summary generator.
pub struct MockGenerator {
    pub suggest_calls: AtomicUsize,
    pub summarize_calls: AtomicUsize,
    /// When set, `summarize` blocks until released (for coalescing tests).
    pub summarize_gate: Option<Arc<Notify>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self {
            suggest_calls: AtomicUsize::new(0),
            summarize_calls: AtomicUsize::new(0),
            summarize_gate: None,
        }
    }

    pub fn with_gated_summaries() -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let generator = Self {
            summarize_gate: Some(Arc::clone(&gate)),
            ..Self::new()
        };
        (generator, gate)
    }
}

#[async_trait::async_trait]
impl AssistGenerator for MockGenerator {
    async fn suggest(&self, last_utterance: &str, _transcript: &str) -> Result<String> {
        self.suggest_calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("suggested reply to: {}", last_utterance))
    }

    async fn summarize(&self, transcript: &str) -> Result<String> {
        if let Some(gate) = &self.summarize_gate {
            gate.notified().await;
        }
        self.summarize_calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("summary of {} lines", transcript.lines().count()))
    }
}

/// Memory store that records every accepted text.
pub struct MockMemoryStore {
    pub saved: Arc<Mutex<Vec<String>>>,
}

impl MockMemoryStore {
    pub fn new() -> Self {
        Self {
            saved: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait::async_trait]
impl MemoryStore for MockMemoryStore {
    async fn add_text(&self, text: &str) -> Result<String> {
        self.saved.lock().unwrap().push(text.to_string());
        Ok(format!("mem-{}", self.saved.lock().unwrap().len()))
    }
}

/// Generator whose requests always fail.
pub struct FailingGenerator;

#[async_trait::async_trait]
impl AssistGenerator for FailingGenerator {
    async fn suggest(&self, _last_utterance: &str, _transcript: &str) -> Result<String> {
        Err(anyhow!("generator unavailable"))
    }

    async fn summarize(&self, _transcript: &str) -> Result<String> {
        Err(anyhow!("generator unavailable"))
    }
}

/// Memory store that fails a fixed number of times, then accepts.
pub struct FlakyMemoryStore {
    pub fail_first: usize,
    pub attempts: AtomicUsize,
    pub saved: Arc<Mutex<Vec<String>>>,
}

impl FlakyMemoryStore {
    pub fn new(fail_first: usize) -> Self {
        Self {
            fail_first,
            attempts: AtomicUsize::new(0),
            saved: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait::async_trait]
impl MemoryStore for FlakyMemoryStore {
    async fn add_text(&self, text: &str) -> Result<String> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.fail_first {
            return Err(anyhow!("transient store failure"));
        }
        self.saved.lock().unwrap().push(text.to_string());
        Ok(format!("mem-{}", attempt))
    }
}

/// Memory store that always fails, for degradation tests.
pub struct FailingMemoryStore {
    pub attempts: AtomicUsize,
}

impl FailingMemoryStore {
    pub fn new() -> Self {
        Self {
            attempts: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl MemoryStore for FailingMemoryStore {
    async fn add_text(&self, _text: &str) -> Result<String> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(anyhow!("memory store unavailable"))
    }
}

/// Thread-safe event recorder for subscriber callbacks.
#[derive(Clone)]
pub struct EventLog {
    events: Arc<Mutex<Vec<TranscriptEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn handler(&self) -> impl Fn(&TranscriptEvent) + Send + Sync + 'static {
        let events = Arc::clone(&self.events);
        move |event| events.lock().unwrap().push(event.clone())
    }

    pub fn events(&self) -> Vec<TranscriptEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

/// Poll a condition until it holds or the timeout elapses.
pub async fn wait_until<F: Fn() -> bool>(cond: F, timeout_ms: u64) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

/// A valid two-channel multichannel session config.
pub fn multichannel_config() -> SessionConfig {
    SessionConfig {
        you_channel_index: Some(0),
        ..SessionConfig::default()
    }
}
