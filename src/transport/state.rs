use serde::{Deserialize, Serialize};

/// Lifecycle of the streaming connection to the ASR backend.
///
/// `Idle`, `Closed` and `Error` are terminal: a dropped connection ends the
/// session, and a new call requires a new session. There is no reconnect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closing,
    Closed {
        code: Option<u16>,
        reason: Option<String>,
    },
    Error {
        message: String,
    },
}

impl ConnectionState {
    /// Whether the transport can never leave this state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConnectionState::Idle | ConnectionState::Closed { .. } | ConnectionState::Error { .. }
        )
    }

    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed { .. } => "closed",
            ConnectionState::Error { .. } => "error",
        }
    }
}

/// Events that drive the connection state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// `start()` was requested by the registry.
    StartRequested,
    /// The backend handshake completed.
    HandshakeCompleted,
    /// The backend handshake failed or timed out.
    HandshakeFailed(String),
    /// `stop()` was requested while the connection was open.
    StopRequested,
    /// The backend closed the connection on its side.
    BackendClosed {
        code: Option<u16>,
        reason: Option<String>,
    },
    /// The close handshake completed after a `stop()` request.
    CloseCompleted {
        code: Option<u16>,
        reason: Option<String>,
    },
    /// The close handshake did not finish within the grace period.
    CloseGraceExpired,
    /// An unrecoverable transport fault.
    Fault(String),
}

/// A state/event pair that does not appear in the transition table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid transition: {state} on {event}")]
pub struct InvalidTransition {
    pub state: String,
    pub event: String,
}

/// Pure transition function for the connection automaton.
///
/// Implements exactly the edge table of the transport design; anything else
/// is `InvalidTransition` and leaves the caller's state untouched.
pub fn transition(
    state: &ConnectionState,
    event: &ConnectionEvent,
) -> Result<ConnectionState, InvalidTransition> {
    use ConnectionEvent as E;
    use ConnectionState as S;

    let next = match (state, event) {
        (S::Idle, E::StartRequested) => S::Connecting,

        (S::Connecting, E::HandshakeCompleted) => S::Open,
        (S::Connecting, E::HandshakeFailed(message)) => S::Error {
            message: message.clone(),
        },

        (S::Open, E::StopRequested) => S::Closing,
        (S::Open, E::BackendClosed { code, reason }) => S::Closed {
            code: *code,
            reason: reason.clone(),
        },

        (S::Closing, E::CloseCompleted { code, reason }) => S::Closed {
            code: *code,
            reason: reason.clone(),
        },
        // The backend may complete its side of the close before our close
        // frame round-trips; both paths land in Closed.
        (S::Closing, E::BackendClosed { code, reason }) => S::Closed {
            code: *code,
            reason: reason.clone(),
        },
        (S::Closing, E::CloseGraceExpired) => S::Closed {
            code: None,
            reason: None,
        },

        // Unrecoverable fault from any non-terminal state.
        (s, E::Fault(message)) if !s.is_terminal() => S::Error {
            message: message.clone(),
        },

        (s, e) => {
            return Err(InvalidTransition {
                state: s.name().to_string(),
                event: format!("{:?}", e),
            })
        }
    };

    Ok(next)
}
