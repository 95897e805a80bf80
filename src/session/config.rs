use serde::{Deserialize, Serialize};

/// How the backend attributes speech to participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Speakers are separated by fixed audio channel index.
    Multichannel,
    /// Speakers are inferred from a single mixed stream.
    Diarize,
}

/// Caller-supplied configuration for one call-assist session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub mode: SessionMode,

    /// Sample rate of the pushed PCM audio in Hz.
    pub sample_rate: u32,

    /// Number of interleaved channels in the pushed PCM audio.
    pub channels: u16,

    /// ASR model name, backend default when unset.
    #[serde(default)]
    pub model: Option<String>,

    /// Language hint (ISO 639-1), backend default when unset.
    #[serde(default)]
    pub language: Option<String>,

    /// Endpointing silence threshold in milliseconds.
    #[serde(default)]
    pub endpointing_ms: Option<u32>,

    /// Utterance-end timer in milliseconds.
    #[serde(default)]
    pub utterance_end_ms: Option<u32>,

    /// Keywords boosted during recognition.
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Key terms boosted during recognition.
    #[serde(default)]
    pub keyterms: Vec<String>,

    /// Channel carrying the local participant (multichannel mode only).
    #[serde(default)]
    pub you_channel_index: Option<u32>,

    /// Diarized speaker id of the local participant (diarize mode only).
    #[serde(default)]
    pub diarize_you_speaker_id: Option<u32>,

    /// Persist finalized text to the memory store.
    #[serde(default)]
    pub auto_save_to_memory: bool,

    /// Generate a suggestion for each finalized utterance.
    #[serde(default)]
    pub auto_suggest: bool,

    /// Generate cumulative summaries on a cadence.
    #[serde(default)]
    pub auto_summary: bool,
}

impl SessionConfig {
    pub const MIN_SAMPLE_RATE: u32 = 8_000;
    pub const MAX_SAMPLE_RATE: u32 = 48_000;
    pub const MAX_CHANNELS: u16 = 2;

    /// Check mode/channel/speaker consistency and audio parameter bounds.
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate < Self::MIN_SAMPLE_RATE || self.sample_rate > Self::MAX_SAMPLE_RATE {
            return Err(format!(
                "sample_rate {} out of range [{}, {}]",
                self.sample_rate,
                Self::MIN_SAMPLE_RATE,
                Self::MAX_SAMPLE_RATE
            ));
        }

        if self.channels == 0 || self.channels > Self::MAX_CHANNELS {
            return Err(format!(
                "channels {} out of range [1, {}]",
                self.channels,
                Self::MAX_CHANNELS
            ));
        }

        match self.mode {
            SessionMode::Multichannel => {
                let Some(you_channel) = self.you_channel_index else {
                    return Err("multichannel mode requires you_channel_index".to_string());
                };
                if self.diarize_you_speaker_id.is_some() {
                    return Err("multichannel mode forbids diarize_you_speaker_id".to_string());
                }
                if you_channel >= u32::from(self.channels) {
                    return Err(format!(
                        "you_channel_index {} out of range for {} channels",
                        you_channel, self.channels
                    ));
                }
            }
            SessionMode::Diarize => {
                if self.diarize_you_speaker_id.is_none() {
                    return Err("diarize mode requires diarize_you_speaker_id".to_string());
                }
                if self.you_channel_index.is_some() {
                    return Err("diarize mode forbids you_channel_index".to_string());
                }
            }
        }

        Ok(())
    }

    /// Display label for a recognized speaker, resolving the local
    /// participant to "you" according to the session mode.
    pub fn speaker_label(
        &self,
        channel_index: u32,
        speaker_id: Option<u32>,
        backend_label: Option<&str>,
    ) -> String {
        match self.mode {
            SessionMode::Multichannel => {
                if self.you_channel_index == Some(channel_index) {
                    "you".to_string()
                } else if let Some(label) = backend_label {
                    label.to_string()
                } else {
                    format!("channel {}", channel_index)
                }
            }
            SessionMode::Diarize => {
                if speaker_id.is_some() && speaker_id == self.diarize_you_speaker_id {
                    "you".to_string()
                } else if let Some(label) = backend_label {
                    label.to_string()
                } else if let Some(id) = speaker_id {
                    format!("speaker {}", id)
                } else {
                    "speaker".to_string()
                }
            }
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: SessionMode::Multichannel,
            sample_rate: 16_000,
            channels: 2,
            model: None,
            language: None,
            endpointing_ms: None,
            utterance_end_ms: None,
            keywords: Vec::new(),
            keyterms: Vec::new(),
            you_channel_index: Some(0),
            diarize_you_speaker_id: None,
            auto_save_to_memory: false,
            auto_suggest: false,
            auto_summary: false,
        }
    }
}
