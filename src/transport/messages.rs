use crate::dispatch::{TranscriptEvent, Utterance};
use crate::session::SessionConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One decoded wire message from the ASR backend.
///
/// The backend speaks JSON text frames; audio flows the other way as binary
/// frames and is not represented here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendMessage {
    /// Interim transcript for ongoing speech. May be revised.
    Partial {
        channel: u32,
        #[serde(default)]
        speaker: Option<String>,
        text: String,
    },
    /// Finalized utterance with a stable identifier.
    Final {
        #[serde(default)]
        utterance_id: Option<String>,
        channel: u32,
        #[serde(default)]
        speaker_id: Option<u32>,
        #[serde(default)]
        speaker: Option<String>,
        text: String,
        #[serde(default)]
        start_ms: Option<u64>,
        #[serde(default)]
        end_ms: Option<u64>,
    },
    /// Stream-level metadata.
    Metadata {
        #[serde(default)]
        request_id: Option<String>,
        #[serde(default)]
        channels: Option<u32>,
        #[serde(default)]
        duration_secs: Option<f64>,
    },
    /// Backend-surfaced error, passed through on the event stream.
    Error { message: String },
}

/// Parse one wire text frame.
pub fn decode(text: &str) -> Result<BackendMessage> {
    serde_json::from_str(text).context("Failed to parse backend message")
}

impl BackendMessage {
    /// Translate this message into a transcript event.
    ///
    /// Returns `None` for messages that violate the data model (an empty
    /// final, or timing bounds with `start_ms > end_ms`); those are logged
    /// and skipped rather than surfaced.
    pub fn into_event(self, config: &SessionConfig) -> Option<TranscriptEvent> {
        match self {
            BackendMessage::Partial {
                channel,
                speaker,
                text,
            } => Some(TranscriptEvent::Caption {
                channel_index: channel,
                speaker_label: config.speaker_label(channel, None, speaker.as_deref()),
                text,
            }),

            BackendMessage::Final {
                utterance_id,
                channel,
                speaker_id,
                speaker,
                text,
                start_ms,
                end_ms,
            } => {
                if let (Some(start), Some(end)) = (start_ms, end_ms) {
                    if start > end {
                        warn!(start, end, "Dropping final with inverted timing bounds");
                        return None;
                    }
                }
                if text.trim().is_empty() {
                    return None;
                }

                Some(TranscriptEvent::Utterance(Utterance {
                    utterance_id: utterance_id
                        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                    channel_index: channel,
                    speaker_id,
                    speaker_label: config.speaker_label(channel, speaker_id, speaker.as_deref()),
                    text,
                    start_ms,
                    end_ms,
                }))
            }

            BackendMessage::Metadata {
                request_id,
                channels,
                duration_secs,
            } => Some(TranscriptEvent::Metadata {
                request_id,
                channels,
                duration_secs,
            }),

            BackendMessage::Error { message } => Some(TranscriptEvent::Error { message }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionMode;

    fn multichannel_config() -> SessionConfig {
        SessionConfig {
            mode: SessionMode::Multichannel,
            channels: 2,
            you_channel_index: Some(0),
            ..SessionConfig::default()
        }
    }

    #[test]
    fn partial_decodes_to_caption_with_you_label() {
        let msg = decode(r#"{"type":"partial","channel":0,"text":"hello th"}"#).unwrap();
        let event = msg.into_event(&multichannel_config()).unwrap();

        match event {
            TranscriptEvent::Caption {
                channel_index,
                speaker_label,
                text,
            } => {
                assert_eq!(channel_index, 0);
                assert_eq!(speaker_label, "you");
                assert_eq!(text, "hello th");
            }
            other => panic!("expected caption, got {:?}", other),
        }
    }

    #[test]
    fn final_with_inverted_bounds_is_dropped() {
        let msg = decode(
            r#"{"type":"final","utterance_id":"u1","channel":1,"text":"hi","start_ms":500,"end_ms":100}"#,
        )
        .unwrap();
        assert!(msg.into_event(&multichannel_config()).is_none());
    }

    #[test]
    fn final_without_id_gets_a_generated_one() {
        let msg = decode(r#"{"type":"final","channel":1,"text":"hi there"}"#).unwrap();
        let event = msg.into_event(&multichannel_config()).unwrap();

        match event {
            TranscriptEvent::Utterance(utterance) => {
                assert!(!utterance.utterance_id.is_empty());
                assert_eq!(utterance.speaker_label, "channel 1");
            }
            other => panic!("expected utterance, got {:?}", other),
        }
    }

    #[test]
    fn diarized_speaker_resolves_to_you() {
        let config = SessionConfig {
            mode: SessionMode::Diarize,
            channels: 1,
            you_channel_index: None,
            diarize_you_speaker_id: Some(1),
            ..SessionConfig::default()
        };

        let msg = decode(
            r#"{"type":"final","utterance_id":"u2","channel":0,"speaker_id":1,"text":"my turn"}"#,
        )
        .unwrap();

        match msg.into_event(&config).unwrap() {
            TranscriptEvent::Utterance(utterance) => {
                assert_eq!(utterance.speaker_label, "you");
                assert_eq!(utterance.speaker_id, Some(1));
            }
            other => panic!("expected utterance, got {:?}", other),
        }
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(decode("not json").is_err());
        assert!(decode(r#"{"type":"unknown","x":1}"#).is_err());
    }
}
