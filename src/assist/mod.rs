pub mod http;
pub mod persistence;
pub mod postprocess;

use anyhow::Result;

pub use http::{HttpAssistGenerator, HttpMemoryStore};
pub use persistence::PersistenceBridge;
pub use postprocess::PostProcessor;

/// Boundary to the language model used for suggestions and summaries.
///
/// Implementations are simple request/response wrappers; all scheduling,
/// rate limiting and failure containment happen in [`PostProcessor`].
#[async_trait::async_trait]
pub trait AssistGenerator: Send + Sync {
    /// Suggest a reply for the local participant given the latest finalized
    /// utterance and the running transcript.
    async fn suggest(&self, last_utterance: &str, transcript: &str) -> Result<String>;

    /// Produce a cumulative summary of the running transcript.
    async fn summarize(&self, transcript: &str) -> Result<String>;
}

/// Boundary to the external memory store.
#[async_trait::async_trait]
pub trait MemoryStore: Send + Sync {
    /// Store one piece of text, returning the stored id.
    async fn add_text(&self, text: &str) -> Result<String>;
}
