use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::session::{RegistrySettings, SessionOptions};

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub asr: AsrConfig,
    pub recording: RecordingConfig,
    pub assist: AssistConfig,
    pub memory: MemoryConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct AsrConfig {
    /// ws/wss URL of the backend's streaming endpoint, without query.
    pub endpoint: String,
    pub api_key: Option<String>,
    /// Bounded wait for the handshake to reach open.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Bounded wait for a graceful close.
    #[serde(default = "default_stop_grace_ms")]
    pub stop_grace_ms: u64,
    /// Ingest queue capacity in frames.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

#[derive(Debug, Deserialize)]
pub struct RecordingConfig {
    pub recordings_path: String,
}

#[derive(Debug, Deserialize)]
pub struct AssistConfig {
    /// HTTP endpoint of the suggestion/summary generator.
    pub generator_endpoint: String,
    pub generator_api_key: Option<String>,
    /// Summary cadence in finalized utterances.
    #[serde(default = "default_summary_every")]
    pub summary_every_utterances: u32,
}

#[derive(Debug, Deserialize)]
pub struct MemoryConfig {
    /// HTTP endpoint of the memory store.
    pub endpoint: String,
    pub api_key: Option<String>,
    #[serde(default = "default_persistence_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_persistence_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_stop_grace_ms() -> u64 {
    3_000
}

fn default_queue_capacity() -> usize {
    256
}

fn default_summary_every() -> u32 {
    5
}

fn default_persistence_attempts() -> u32 {
    3
}

fn default_persistence_backoff_ms() -> u64 {
    500
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Registry tunables derived from the loaded file.
    pub fn registry_settings(&self) -> RegistrySettings {
        RegistrySettings {
            connect_timeout: Duration::from_millis(self.asr.connect_timeout_ms),
            stop_grace: Duration::from_millis(self.asr.stop_grace_ms),
            session: SessionOptions {
                recordings_dir: PathBuf::from(&self.recording.recordings_path),
                queue_capacity: self.asr.queue_capacity,
                summary_every_utterances: self.assist.summary_every_utterances,
                persistence_max_attempts: self.memory.max_attempts,
                persistence_backoff: Duration::from_millis(self.memory.backoff_ms),
            },
        }
    }
}
