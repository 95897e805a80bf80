use super::{AssistGenerator, PersistenceBridge};
use crate::dispatch::{EventSink, TranscriptEvent, Utterance};
use crate::session::SessionConfig;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Asynchronous enrichment of finalized utterances.
///
/// Every trigger runs as a detached task so the live transcript path is
/// never stalled. Failures are logged and produce no event.
pub struct PostProcessor {
    generator: Arc<dyn AssistGenerator>,
    sink: EventSink,
    persistence: Option<Arc<PersistenceBridge>>,

    auto_suggest: bool,
    auto_summary: bool,

    /// Running transcript, one line per finalized utterance. Shared with
    /// the summary task, which re-snapshots it on every run.
    transcript: Arc<Mutex<Vec<String>>>,

    /// Utterances since the last summary trigger (cadence gate).
    since_summary: AtomicU32,
    summary_every: u32,

    /// At most one summary request in flight; triggers while one is running
    /// coalesce into a single re-run.
    summary_in_flight: Arc<AtomicBool>,
    summary_rerun: Arc<AtomicBool>,
}

impl PostProcessor {
    pub fn new(
        generator: Arc<dyn AssistGenerator>,
        sink: EventSink,
        persistence: Option<Arc<PersistenceBridge>>,
        config: &SessionConfig,
        summary_every: u32,
    ) -> Self {
        Self {
            generator,
            sink,
            persistence,
            auto_suggest: config.auto_suggest,
            auto_summary: config.auto_summary,
            transcript: Arc::new(Mutex::new(Vec::new())),
            since_summary: AtomicU32::new(0),
            summary_every: summary_every.max(1),
            summary_in_flight: Arc::new(AtomicBool::new(false)),
            summary_rerun: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle one finalized utterance. Called exactly once per utterance id
    /// by the session's receive path; never blocks.
    pub fn on_utterance(&self, utterance: &Utterance) {
        let transcript_snapshot = {
            let mut transcript = self.transcript.lock().expect("transcript poisoned");
            transcript.push(format!("{}: {}", utterance.speaker_label, utterance.text));
            transcript.join("\n")
        };

        if self.auto_suggest {
            self.spawn_suggestion(utterance, transcript_snapshot);
        }

        if self.auto_summary {
            let count = self.since_summary.fetch_add(1, Ordering::SeqCst) + 1;
            if count >= self.summary_every {
                self.since_summary.store(0, Ordering::SeqCst);
                self.trigger_summary();
            }
        }
    }

    fn spawn_suggestion(&self, utterance: &Utterance, transcript: String) {
        let generator = Arc::clone(&self.generator);
        let sink = self.sink.clone();
        let utterance_id = utterance.utterance_id.clone();
        let text = utterance.text.clone();

        tokio::spawn(async move {
            match generator.suggest(&text, &transcript).await {
                Ok(suggestion) => {
                    sink.emit(TranscriptEvent::Suggestion {
                        utterance_id,
                        text: suggestion,
                    });
                }
                Err(e) => {
                    warn!("Suggestion generation failed: {}", e);
                }
            }
        });
    }

    fn trigger_summary(&self) {
        if self.summary_in_flight.swap(true, Ordering::SeqCst) {
            // Coalesce: the running task re-runs once with a fresh snapshot.
            self.summary_rerun.store(true, Ordering::SeqCst);
            debug!("Summary already in flight, coalescing trigger");
            return;
        }

        let generator = Arc::clone(&self.generator);
        let sink = self.sink.clone();
        let persistence = self.persistence.clone();
        let transcript = Arc::clone(&self.transcript);
        let in_flight = Arc::clone(&self.summary_in_flight);
        let rerun = Arc::clone(&self.summary_rerun);

        tokio::spawn(async move {
            loop {
                let snapshot = {
                    let transcript = transcript.lock().expect("transcript poisoned");
                    transcript.join("\n")
                };

                match generator.summarize(&snapshot).await {
                    Ok(summary) => {
                        if let Some(persistence) = &persistence {
                            persistence.save_text("summary", summary.clone());
                        }
                        sink.emit(TranscriptEvent::Summary { text: summary });
                    }
                    Err(e) => {
                        warn!("Summary generation failed: {}", e);
                    }
                }

                if !rerun.swap(false, Ordering::SeqCst) {
                    break;
                }
            }
            in_flight.store(false, Ordering::SeqCst);
        });
    }
}
