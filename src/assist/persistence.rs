use super::MemoryStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Fire-and-forget writes of finalized text to the external memory store.
///
/// Failures are retried a bounded number of times with backoff, then dropped
/// with a warning. Nothing here is ever fatal to the session or visible on
/// the transcript path.
pub struct PersistenceBridge {
    store: Arc<dyn MemoryStore>,
    max_attempts: u32,
    backoff: Duration,
}

impl PersistenceBridge {
    pub fn new(store: Arc<dyn MemoryStore>, max_attempts: u32, backoff: Duration) -> Self {
        Self {
            store,
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Persist one piece of text on a detached task.
    pub fn save_text(&self, what: &'static str, text: String) {
        let store = Arc::clone(&self.store);
        let max_attempts = self.max_attempts;
        let backoff = self.backoff;

        tokio::spawn(async move {
            for attempt in 1..=max_attempts {
                match store.add_text(&text).await {
                    Ok(id) => {
                        debug!(what, id = %id, "Saved to memory store");
                        return;
                    }
                    Err(e) if attempt < max_attempts => {
                        debug!(what, attempt, "Memory store write failed, retrying: {}", e);
                        tokio::time::sleep(backoff * attempt).await;
                    }
                    Err(e) => {
                        warn!(
                            what,
                            attempts = max_attempts,
                            "Memory store write dropped after retries: {}",
                            e
                        );
                    }
                }
            }
        });
    }
}
