use super::{AssistGenerator, MemoryStore};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    text: String,
}

/// Language-model boundary over a plain HTTP completion endpoint.
pub struct HttpAssistGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpAssistGenerator {
    pub fn new(endpoint: String, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
        }
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let mut request = self
            .client
            .post(format!("{}/generate", self.endpoint))
            .json(&GenerateRequest { prompt });
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .context("Generator request failed")?
            .error_for_status()
            .context("Generator returned error status")?
            .json::<GenerateResponse>()
            .await
            .context("Failed to parse generator response")?;

        Ok(response.text)
    }
}

#[async_trait::async_trait]
impl AssistGenerator for HttpAssistGenerator {
    async fn suggest(&self, last_utterance: &str, transcript: &str) -> Result<String> {
        let prompt = format!(
            "You are assisting the local participant of an ongoing call.\n\
             Conversation so far:\n{}\n\n\
             The other party just said: \"{}\"\n\
             Suggest a short, natural reply for the local participant.",
            transcript, last_utterance
        );
        self.generate(&prompt).await
    }

    async fn summarize(&self, transcript: &str) -> Result<String> {
        let prompt = format!(
            "Summarize the following call transcript in a few sentences, \
             keeping decisions and action items.\n\n{}",
            transcript
        );
        self.generate(&prompt).await
    }
}

#[derive(Debug, Serialize)]
struct AddTextRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct AddTextResponse {
    id: String,
}

/// Memory-store boundary over a simple "add text" HTTP call.
pub struct HttpMemoryStore {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpMemoryStore {
    pub fn new(endpoint: String, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
        }
    }
}

#[async_trait::async_trait]
impl MemoryStore for HttpMemoryStore {
    async fn add_text(&self, text: &str) -> Result<String> {
        let mut request = self
            .client
            .post(format!("{}/memories", self.endpoint))
            .json(&AddTextRequest { text });
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .context("Memory store request failed")?
            .error_for_status()
            .context("Memory store returned error status")?
            .json::<AddTextResponse>()
            .await
            .context("Failed to parse memory store response")?;

        Ok(response.id)
    }
}
