use super::config::SessionConfig;
use super::session::{AssistSession, SessionOptions};
use super::stats::{SessionDiagnostics, SessionInfo};
use crate::assist::{AssistGenerator, MemoryStore};
use crate::dispatch::{EventDispatcher, EventKind, Subscription, TranscriptEvent};
use crate::transport::AsrConnector;
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Why `start` was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StartError {
    /// Another session is still non-terminal.
    #[error("another session is already active")]
    AlreadyActive,

    /// The session configuration is inconsistent or out of bounds.
    #[error("invalid session config: {0}")]
    InvalidConfig(String),

    /// The transport did not reach `Open` within the connect timeout.
    #[error("failed to connect to ASR backend: {0}")]
    ConnectFailed(String),
}

/// Why `stop` was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StopError {
    /// Unknown id, or the session is already terminal.
    #[error("no active session with that id")]
    NotFound,
}

/// Registry-level tunables; every bound is finite and comes from service
/// configuration.
#[derive(Debug, Clone)]
pub struct RegistrySettings {
    /// Bounded wait for the transport to reach `Open`.
    pub connect_timeout: Duration,
    /// Bounded wait for a graceful close before forcing `Closed`.
    pub stop_grace: Duration,
    /// Per-session runtime parameters.
    pub session: SessionOptions,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            stop_grace: Duration::from_secs(3),
            session: SessionOptions::default(),
        }
    }
}

/// Top-level orchestrator owning the single active-session slot.
///
/// All slot mutation is serialized through one lifecycle lock, which is the
/// only piece of global mutable state in the crate. Reads (`get_active`,
/// `send_audio`) go through a short non-async lock and never suspend.
pub struct SessionRegistry {
    connector: Arc<dyn AsrConnector>,
    generator: Arc<dyn AssistGenerator>,
    memory: Arc<dyn MemoryStore>,
    dispatcher: EventDispatcher,
    settings: RegistrySettings,

    /// Serializes `start`/`stop`/teardown so no two calls race the slot.
    lifecycle: Mutex<()>,
    /// The sole active session. Written only under the lifecycle lock;
    /// never held across an await.
    active: RwLock<Option<Arc<AssistSession>>>,

    /// Handle back to the owning `Arc`, for the teardown watcher task.
    self_ref: Weak<SessionRegistry>,
}

impl SessionRegistry {
    pub fn new(
        connector: Arc<dyn AsrConnector>,
        generator: Arc<dyn AssistGenerator>,
        memory: Arc<dyn MemoryStore>,
        settings: RegistrySettings,
    ) -> Arc<Self> {
        info!("Session registry using {} ASR connector", connector.name());

        Arc::new_cyclic(|self_ref| Self {
            connector,
            generator,
            memory,
            dispatcher: EventDispatcher::new(),
            settings,
            lifecycle: Mutex::new(()),
            active: RwLock::new(None),
            self_ref: self_ref.clone(),
        })
    }

    /// Register a host callback for one event variant.
    ///
    /// Subscriptions outlive sessions; the returned handle unsubscribes.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&TranscriptEvent) + Send + Sync + 'static,
    {
        self.dispatcher.subscribe(kind, handler)
    }

    /// Start a new session and drive it to `Open`.
    ///
    /// Fails with `AlreadyActive` while another session is non-terminal,
    /// `InvalidConfig` on bad parameters, `ConnectFailed` when the backend
    /// handshake does not complete in time. A failed start leaves no
    /// residual session.
    pub async fn start(&self, config: SessionConfig) -> Result<SessionInfo, StartError> {
        config.validate().map_err(StartError::InvalidConfig)?;

        let _guard = self.lifecycle.lock().await;

        let stale = {
            let active = self.active.read().expect("active slot poisoned");
            match active.as_ref() {
                Some(session) if !session.state().is_terminal() => {
                    return Err(StartError::AlreadyActive)
                }
                Some(session) => Some(Arc::clone(session)),
                None => None,
            }
        };

        // A backend-terminated session can still occupy the slot before its
        // watcher runs; release it here so its teardown and `Stopped` event
        // are not skipped by the handover.
        if let Some(stale) = stale {
            self.release(&stale);
        }

        let session = AssistSession::new(
            config,
            Arc::clone(&self.generator),
            Arc::clone(&self.memory),
            self.dispatcher.clone(),
            &self.settings.session,
        );

        if let Err(e) = session
            .open(self.connector.as_ref(), self.settings.connect_timeout)
            .await
        {
            warn!("Session start failed: {}", e);
            session.teardown();
            return Err(StartError::ConnectFailed(e.to_string()));
        }

        let info = session.info().clone();
        {
            let mut active = self.active.write().expect("active slot poisoned");
            *active = Some(Arc::clone(&session));
        }

        self.dispatcher.dispatch(&TranscriptEvent::Started {
            session_id: info.id.clone(),
        });
        self.spawn_teardown_watcher(Arc::clone(&session));

        info!("Session {} is now active", info.id);
        Ok(info)
    }

    /// Gracefully stop a session. Idempotent: unknown or already-terminal
    /// ids report `NotFound` and have no side effects.
    pub async fn stop(&self, id: &str) -> Result<(), StopError> {
        let _guard = self.lifecycle.lock().await;

        let session = {
            let active = self.active.read().expect("active slot poisoned");
            match active.as_ref() {
                Some(session) if session.info().id == id && !session.state().is_terminal() => {
                    Arc::clone(session)
                }
                _ => return Err(StopError::NotFound),
            }
        };

        session.stop(self.settings.stop_grace).await;
        self.release(&session);
        Ok(())
    }

    /// The active session, if any is non-terminal.
    pub fn get_active(&self) -> Option<SessionInfo> {
        let active = self.active.read().expect("active slot poisoned");
        active
            .as_ref()
            .filter(|session| !session.state().is_terminal())
            .map(|session| session.info().clone())
    }

    /// One-way audio push; unknown ids and terminal sessions are a no-op.
    pub fn send_audio(&self, id: &str, pcm: Vec<u8>) {
        let session = {
            let active = self.active.read().expect("active slot poisoned");
            active
                .as_ref()
                .filter(|session| session.info().id == id)
                .map(Arc::clone)
        };

        match session {
            Some(session) => session.push_frame(pcm),
            None => debug!("Audio frame for unknown session {} ignored", id),
        }
    }

    /// Diagnostics for the session in the slot, active or just finished.
    pub fn diagnostics(&self, id: &str) -> Option<SessionDiagnostics> {
        let active = self.active.read().expect("active slot poisoned");
        active
            .as_ref()
            .filter(|session| session.info().id == id)
            .map(|session| session.diagnostics())
    }

    /// Deregister a session: final cleanup, `Stopped` event, slot release.
    /// Safe to call from both the `stop` path and the teardown watcher.
    fn release(&self, session: &Arc<AssistSession>) {
        session.teardown();

        {
            let mut active = self.active.write().expect("active slot poisoned");
            if let Some(current) = active.as_ref() {
                if Arc::ptr_eq(current, session) {
                    *active = None;
                }
            }
        }

        self.dispatcher.dispatch(&TranscriptEvent::Stopped {
            session_id: session.info().id.clone(),
        });
        info!("Session {} released", session.info().id);
    }

    /// Watch for backend-initiated termination (close or fault) and run the
    /// same release path as an explicit `stop`.
    ///
    /// The task holds only a weak registry handle, so an orphaned watcher
    /// never keeps the registry alive.
    fn spawn_teardown_watcher(&self, session: Arc<AssistSession>) {
        let registry = self.self_ref.clone();
        let mut state_rx = session.state_watch();

        tokio::spawn(async move {
            loop {
                if state_rx.borrow().is_terminal() {
                    break;
                }
                if state_rx.changed().await.is_err() {
                    break;
                }
            }

            let Some(registry) = registry.upgrade() else {
                return;
            };

            let _guard = registry.lifecycle.lock().await;
            let still_registered = {
                let active = registry.active.read().expect("active slot poisoned");
                active
                    .as_ref()
                    .is_some_and(|current| Arc::ptr_eq(current, &session))
            };
            if still_registered {
                debug!(
                    "Session {} reached terminal state, releasing",
                    session.info().id
                );
                registry.release(&session);
            }
        });
    }
}
