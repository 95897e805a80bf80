use super::config::SessionConfig;
use super::stats::{SessionDiagnostics, SessionInfo};
use crate::assist::{AssistGenerator, MemoryStore, PersistenceBridge, PostProcessor};
use crate::dispatch::{EventDispatcher, EventSink, TranscriptEvent};
use crate::ingest::IngestQueue;
use crate::recording::RecordingWriter;
use crate::transport::{
    messages, transition, AsrCommand, AsrConnector, AsrMessage, ConnectionEvent, ConnectionState,
};
use anyhow::{anyhow, Result};
use chrono::Utc;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Per-session runtime parameters, all finite and configuration-driven.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Directory receiving session recordings.
    pub recordings_dir: PathBuf,
    /// Ingest queue capacity in frames.
    pub queue_capacity: usize,
    /// Summary cadence: one trigger per this many finalized utterances.
    pub summary_every_utterances: u32,
    /// Memory store write attempts before giving up.
    pub persistence_max_attempts: u32,
    /// Base backoff between memory store attempts.
    pub persistence_backoff: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            recordings_dir: PathBuf::from("recordings"),
            queue_capacity: 256,
            summary_every_utterances: 5,
            persistence_max_attempts: 3,
            persistence_backoff: Duration::from_millis(500),
        }
    }
}

/// One call-assist run: audio in, ordered transcript events out.
///
/// Owns the connection state machine, the ingest queue, the recording
/// writer and the enrichment side paths. Created and driven by the
/// `SessionRegistry`; audio arrives through `push_frame`.
pub struct AssistSession {
    info: SessionInfo,
    config: SessionConfig,

    queue: Arc<IngestQueue>,
    sink: EventSink,

    /// Authoritative state, mutated only through `apply`.
    state: Mutex<ConnectionState>,
    state_tx: watch::Sender<ConnectionState>,
    state_rx: watch::Receiver<ConnectionState>,

    recorder: Mutex<Option<RecordingWriter>>,
    recording_failed: AtomicBool,

    /// Send half of the ASR connection, present once open.
    commands: Mutex<Option<mpsc::Sender<AsrCommand>>>,

    post: Arc<PostProcessor>,
    persistence: Option<Arc<PersistenceBridge>>,

    /// Frames are accepted from creation (queued while connecting) until
    /// the close begins.
    accepting: AtomicBool,
    torn_down: AtomicBool,

    frames_forwarded: AtomicU64,
    utterances: AtomicU64,

    /// Handle back to the owning `Arc`, for spawning the pump tasks.
    self_ref: Weak<AssistSession>,

    forward_task: Mutex<Option<JoinHandle<()>>>,
    receive_task: Mutex<Option<JoinHandle<()>>>,
}

impl AssistSession {
    /// Create a session in `Idle` state. Does not touch the network.
    pub fn new(
        config: SessionConfig,
        generator: Arc<dyn AssistGenerator>,
        memory: Arc<dyn MemoryStore>,
        dispatcher: EventDispatcher,
        options: &SessionOptions,
    ) -> Arc<Self> {
        let id = uuid::Uuid::new_v4().to_string();
        let recording_path = options.recordings_dir.join(format!("assist-{}.wav", id));

        let info = SessionInfo {
            id: id.clone(),
            recording_path: recording_path.clone(),
            started_at: Utc::now(),
        };

        // Recording is its own failure domain: if the file cannot be
        // created the session still runs, without a recording.
        let recorder =
            match RecordingWriter::create(&recording_path, config.sample_rate, config.channels) {
                Ok(writer) => Some(writer),
                Err(e) => {
                    error!("Failed to create recording, session continues without it: {}", e);
                    None
                }
            };
        let recording_failed = recorder.is_none();

        let sink = EventSink::new(dispatcher);
        sink.emit(TranscriptEvent::StatusChanged {
            state: ConnectionState::Idle,
        });

        let persistence = config.auto_save_to_memory.then(|| {
            Arc::new(PersistenceBridge::new(
                memory,
                options.persistence_max_attempts,
                options.persistence_backoff,
            ))
        });

        let post = Arc::new(PostProcessor::new(
            generator,
            sink.clone(),
            persistence.clone(),
            &config,
            options.summary_every_utterances,
        ));

        let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);

        info!("Session {} created ({:?})", id, config.mode);

        Arc::new_cyclic(|self_ref| Self {
            info,
            config,
            queue: Arc::new(IngestQueue::new(options.queue_capacity)),
            sink,
            state: Mutex::new(ConnectionState::Idle),
            state_tx,
            state_rx,
            recorder: Mutex::new(recorder),
            recording_failed: AtomicBool::new(recording_failed),
            commands: Mutex::new(None),
            post,
            persistence,
            accepting: AtomicBool::new(true),
            torn_down: AtomicBool::new(false),
            frames_forwarded: AtomicU64::new(0),
            utterances: AtomicU64::new(0),
            self_ref: self_ref.clone(),
            forward_task: Mutex::new(None),
            receive_task: Mutex::new(None),
        })
    }

    /// Drive the transport `Idle → Connecting → Open` within the timeout.
    ///
    /// On failure the session lands in a terminal `Error` state and the
    /// error is returned to the caller.
    pub async fn open(
        &self,
        connector: &dyn AsrConnector,
        connect_timeout: Duration,
    ) -> Result<()> {
        self.apply(ConnectionEvent::StartRequested);

        let connection =
            match tokio::time::timeout(connect_timeout, connector.connect(&self.config)).await {
                Ok(Ok(connection)) => connection,
                Ok(Err(e)) => {
                    self.apply(ConnectionEvent::HandshakeFailed(e.to_string()));
                    return Err(e);
                }
                Err(_) => {
                    let message = format!(
                        "ASR handshake did not complete within {:?}",
                        connect_timeout
                    );
                    self.apply(ConnectionEvent::HandshakeFailed(message.clone()));
                    return Err(anyhow!(message));
                }
            };

        {
            let mut commands = self.commands.lock().expect("commands poisoned");
            *commands = Some(connection.commands.clone());
        }
        self.apply(ConnectionEvent::HandshakeCompleted);

        // Sessions only exist behind an `Arc` (see `new`), so the upgrade
        // cannot fail while `&self` is alive.
        let this = self.self_ref.upgrade().expect("session not behind Arc");
        let forward = tokio::spawn(Self::forward_loop(Arc::clone(&this), connection.commands));
        let receive = tokio::spawn(Self::receive_loop(this, connection.messages));

        *self.forward_task.lock().expect("forward task poisoned") = Some(forward);
        *self.receive_task.lock().expect("receive task poisoned") = Some(receive);

        Ok(())
    }

    /// Accept one PCM frame from the audio producer. Never blocks.
    ///
    /// Frames are recorded and queued while the session is idle, connecting
    /// or open; once the close begins they are rejected as a no-op.
    pub fn push_frame(&self, pcm: Vec<u8>) {
        if !self.accepting.load(Ordering::SeqCst) {
            debug!("Frame rejected, session no longer accepting audio");
            return;
        }

        {
            let mut recorder = self.recorder.lock().expect("recorder poisoned");
            if let Some(writer) = recorder.as_mut() {
                writer.append_pcm(&pcm);
                if writer.has_failed() {
                    self.recording_failed.store(true, Ordering::SeqCst);
                    *recorder = None;
                }
            }
        }

        self.queue.push(pcm);
    }

    /// Graceful shutdown, bounded by the grace period.
    ///
    /// Stops frame intake, closes the transport, waits for the terminal
    /// state and forces `Closed` if the backend never acknowledges.
    pub async fn stop(&self, grace: Duration) {
        self.accepting.store(false, Ordering::SeqCst);
        self.queue.wake();

        if self.state() == ConnectionState::Open {
            if self.apply(ConnectionEvent::StopRequested).is_some() {
                let commands = self.commands.lock().expect("commands poisoned").clone();
                if let Some(commands) = commands {
                    if commands.try_send(AsrCommand::Close).is_err() {
                        warn!("Could not queue close request, relying on grace period");
                    }
                }
            }
        }

        let mut state_rx = self.state_rx.clone();
        let wait_terminal = async move {
            loop {
                if state_rx.borrow().is_terminal() {
                    return;
                }
                if state_rx.changed().await.is_err() {
                    return;
                }
            }
        };

        if tokio::time::timeout(grace, wait_terminal).await.is_err() {
            warn!(
                "Close handshake did not complete within {:?}, forcing closed",
                grace
            );
            // The receive pump must not publish anything after the forced
            // terminal status.
            if let Some(task) = self.receive_task.lock().expect("receive task poisoned").take() {
                task.abort();
            }
            self.apply(ConnectionEvent::CloseGraceExpired);
        }

        self.teardown();
    }

    /// Idempotent final cleanup: stop intake, stop forwarding, flush and
    /// release the recording.
    pub fn teardown(&self) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }

        self.accepting.store(false, Ordering::SeqCst);
        self.queue.wake();

        if let Some(task) = self.forward_task.lock().expect("forward task poisoned").take() {
            task.abort();
        }

        if let Some(mut writer) = self.recorder.lock().expect("recorder poisoned").take() {
            if let Err(e) = writer.finish() {
                error!("Failed to finalize recording: {}", e);
            }
        }

        debug!("Session {} torn down", self.info.id);
    }

    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    pub fn state(&self) -> ConnectionState {
        self.state_rx.borrow().clone()
    }

    /// Observe state changes; used by the registry's teardown watcher.
    pub fn state_watch(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    pub fn diagnostics(&self) -> SessionDiagnostics {
        SessionDiagnostics {
            state: self.state(),
            frames_pushed: self.queue.pushed_frames(),
            frames_forwarded: self.frames_forwarded.load(Ordering::SeqCst),
            frames_dropped: self.queue.dropped_frames(),
            utterances: self.utterances.load(Ordering::SeqCst),
            recording_failed: self.recording_failed.load(Ordering::SeqCst),
        }
    }

    /// Apply one event to the state machine.
    ///
    /// Transitions, the watch update and the `StatusChanged` emission happen
    /// under one lock, so observers see every state change exactly once and
    /// in order. Invalid transitions are logged and leave the state alone.
    fn apply(&self, event: ConnectionEvent) -> Option<ConnectionState> {
        let mut state = self.state.lock().expect("state poisoned");
        match transition(&state, &event) {
            Ok(next) => {
                debug!(
                    "Session {}: {} -> {}",
                    self.info.id,
                    state.name(),
                    next.name()
                );
                *state = next.clone();
                let _ = self.state_tx.send(next.clone());

                if next.is_terminal() {
                    self.accepting.store(false, Ordering::SeqCst);
                    self.sink.emit_terminal_status(next.clone());
                } else {
                    self.sink.emit(TranscriptEvent::StatusChanged {
                        state: next.clone(),
                    });
                }
                Some(next)
            }
            Err(e) => {
                warn!("Session {}: ignored {}", self.info.id, e);
                None
            }
        }
    }

    /// Forwarder: drains the ingest queue into the transport, in sequence
    /// order, only while the connection is open.
    async fn forward_loop(session: Arc<AssistSession>, commands: mpsc::Sender<AsrCommand>) {
        let mut state_rx = session.state_rx.clone();

        // Wait for the connection to open; frames queued while connecting
        // are forwarded from here.
        loop {
            let current = state_rx.borrow().clone();
            if current == ConnectionState::Open {
                break;
            }
            if current.is_terminal() || current == ConnectionState::Closing {
                return;
            }
            if state_rx.changed().await.is_err() {
                return;
            }
        }

        debug!("Forwarder started for session {}", session.info.id);

        loop {
            while let Some(frame) = session.queue.pop() {
                if commands
                    .send(AsrCommand::Audio(frame.pcm))
                    .await
                    .is_err()
                {
                    debug!("ASR connection gone, forwarder exiting");
                    return;
                }
                session.frames_forwarded.fetch_add(1, Ordering::SeqCst);
            }

            tokio::select! {
                _ = session.queue.wait() => {}
                changed = state_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    if *state_rx.borrow() != ConnectionState::Open {
                        debug!("Connection left open state, forwarder exiting");
                        return;
                    }
                }
            }
        }
    }

    /// Receive pump: the single dispatch point for backend-derived events,
    /// which is what makes delivery order equal arrival order.
    async fn receive_loop(session: Arc<AssistSession>, mut messages: mpsc::Receiver<AsrMessage>) {
        let mut seen_utterances: HashSet<String> = HashSet::new();

        while let Some(message) = messages.recv().await {
            match message {
                AsrMessage::Message(text) => match messages::decode(&text) {
                    Ok(decoded) => {
                        if let Some(event) = decoded.into_event(&session.config) {
                            session.handle_backend_event(event, &mut seen_utterances);
                        }
                    }
                    Err(e) => {
                        warn!("Skipping undecodable backend message: {}", e);
                    }
                },
                AsrMessage::Closed { code, reason } => {
                    let event = if session.state() == ConnectionState::Closing {
                        ConnectionEvent::CloseCompleted { code, reason }
                    } else {
                        ConnectionEvent::BackendClosed { code, reason }
                    };
                    session.apply(event);
                    return;
                }
                AsrMessage::Failed(message) => {
                    session.sink.emit(TranscriptEvent::Error {
                        message: message.clone(),
                    });
                    session.apply(ConnectionEvent::Fault(message));
                    return;
                }
            }
        }

        // Channel dropped without a close or failure notification.
        if !session.state().is_terminal() {
            session.apply(ConnectionEvent::Fault(
                "connection stream ended unexpectedly".to_string(),
            ));
        }
    }

    fn handle_backend_event(&self, event: TranscriptEvent, seen: &mut HashSet<String>) {
        match event {
            TranscriptEvent::Utterance(utterance) => {
                if !seen.insert(utterance.utterance_id.clone()) {
                    warn!(
                        "Duplicate finalized utterance {} dropped",
                        utterance.utterance_id
                    );
                    return;
                }
                self.utterances.fetch_add(1, Ordering::SeqCst);

                if let Some(persistence) = &self.persistence {
                    persistence.save_text(
                        "utterance",
                        format!("{}: {}", utterance.speaker_label, utterance.text),
                    );
                }

                self.sink.emit(TranscriptEvent::Utterance(utterance.clone()));
                self.post.on_utterance(&utterance);
            }
            other => self.sink.emit(other),
        }
    }
}
