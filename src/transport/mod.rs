pub mod messages;
pub mod state;
pub mod ws;

use crate::session::SessionConfig;
use anyhow::Result;
use tokio::sync::mpsc;

pub use messages::BackendMessage;
pub use state::{transition, ConnectionEvent, ConnectionState, InvalidTransition};
pub use ws::WsConnector;

/// Outbound traffic on an established ASR connection.
#[derive(Debug)]
pub enum AsrCommand {
    /// Binary audio payload, forwarded in ingest order.
    Audio(Vec<u8>),
    /// Begin the close handshake.
    Close,
}

/// Inbound traffic from an established ASR connection.
#[derive(Debug, Clone)]
pub enum AsrMessage {
    /// One wire message, still encoded; decoded by `messages::decode`.
    Message(String),
    /// The backend closed the connection.
    Closed {
        code: Option<u16>,
        reason: Option<String>,
    },
    /// The connection failed at the transport level.
    Failed(String),
}

/// An established bidirectional stream to the ASR backend.
pub struct AsrConnection {
    /// Send half: audio frames and the close request.
    pub commands: mpsc::Sender<AsrCommand>,
    /// Receive half: wire messages and connection terminations.
    pub messages: mpsc::Receiver<AsrMessage>,
}

/// Pluggable factory for ASR streaming connections.
///
/// The production implementation is [`WsConnector`]; tests substitute a
/// scripted connector.
#[async_trait::async_trait]
pub trait AsrConnector: Send + Sync {
    /// Open one streaming connection configured for the given session.
    ///
    /// Returning `Ok` means the backend handshake completed.
    async fn connect(&self, config: &SessionConfig) -> Result<AsrConnection>;

    /// Connector name for logging.
    fn name(&self) -> &str;
}
