use crate::transport::ConnectionState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Identity of a running or finished session, returned from `start`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Opaque unique token, never reused within the process lifetime.
    pub id: String,

    /// Where the raw call audio is being recorded.
    pub recording_path: PathBuf,

    /// When the session was started.
    pub started_at: DateTime<Utc>,
}

/// Point-in-time counters for one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDiagnostics {
    /// Current connection state.
    pub state: ConnectionState,

    /// Frames accepted by the ingest queue.
    pub frames_pushed: u64,

    /// Frames forwarded to the ASR backend.
    pub frames_forwarded: u64,

    /// Frames evicted because the ingest queue was full.
    pub frames_dropped: u64,

    /// Finalized utterances emitted so far.
    pub utterances: u64,

    /// Whether recording stopped because of a write failure.
    pub recording_failed: bool,
}
