pub mod assist;
pub mod config;
pub mod dispatch;
pub mod http;
pub mod ingest;
pub mod recording;
pub mod session;
pub mod transport;

pub use assist::{
    AssistGenerator, HttpAssistGenerator, HttpMemoryStore, MemoryStore, PersistenceBridge,
    PostProcessor,
};
pub use config::Config;
pub use dispatch::{EventDispatcher, EventKind, EventSink, Subscription, TranscriptEvent, Utterance};
pub use http::{create_router, AppState};
pub use ingest::{AudioFrame, IngestQueue};
pub use recording::RecordingWriter;
pub use session::{
    AssistSession, RegistrySettings, SessionConfig, SessionDiagnostics, SessionInfo, SessionMode,
    SessionOptions, SessionRegistry, StartError, StopError,
};
pub use transport::{
    AsrCommand, AsrConnection, AsrConnector, AsrMessage, ConnectionEvent, ConnectionState,
    WsConnector,
};
