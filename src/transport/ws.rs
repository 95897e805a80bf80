use super::{AsrCommand, AsrConnection, AsrConnector, AsrMessage};
use crate::session::{SessionConfig, SessionMode};
use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// WebSocket connector to the streaming ASR backend.
///
/// Audio goes out as binary frames in ingest order; results come back as
/// JSON text frames. The close handshake maps to `AsrCommand::Close` and
/// `AsrMessage::Closed`.
pub struct WsConnector {
    endpoint: String,
    api_key: Option<String>,
}

impl WsConnector {
    /// `endpoint` is the ws/wss URL of the backend's streaming listen API,
    /// without query parameters.
    pub fn new(endpoint: String, api_key: Option<String>) -> Self {
        Self { endpoint, api_key }
    }

    fn build_url(&self, config: &SessionConfig) -> String {
        let mut params: Vec<(&str, String)> = vec![
            ("encoding", "linear16".to_string()),
            ("sample_rate", config.sample_rate.to_string()),
            ("channels", config.channels.to_string()),
            ("interim_results", "true".to_string()),
        ];

        match config.mode {
            SessionMode::Multichannel => params.push(("multichannel", "true".to_string())),
            SessionMode::Diarize => params.push(("diarize", "true".to_string())),
        }

        if let Some(model) = &config.model {
            params.push(("model", model.clone()));
        }
        if let Some(language) = &config.language {
            params.push(("language", language.clone()));
        }
        if let Some(ms) = config.endpointing_ms {
            params.push(("endpointing", ms.to_string()));
        }
        if let Some(ms) = config.utterance_end_ms {
            params.push(("utterance_end_ms", ms.to_string()));
        }
        for keyword in &config.keywords {
            params.push(("keywords", keyword.clone()));
        }
        for keyterm in &config.keyterms {
            params.push(("keyterm", keyterm.clone()));
        }

        let query = params
            .iter()
            .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");

        format!("{}?{}", self.endpoint, query)
    }
}

#[async_trait::async_trait]
impl AsrConnector for WsConnector {
    async fn connect(&self, config: &SessionConfig) -> Result<AsrConnection> {
        let url = self.build_url(config);
        debug!("Connecting to ASR backend: {}", self.endpoint);

        let mut request = url
            .into_client_request()
            .context("Invalid ASR endpoint URL")?;
        if let Some(api_key) = &self.api_key {
            let value = format!("Token {}", api_key)
                .parse()
                .context("Invalid ASR API key header")?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let (ws_stream, _) = connect_async(request)
            .await
            .context("ASR backend handshake failed")?;

        info!("ASR streaming connection established");

        let (mut ws_tx, mut ws_rx) = ws_stream.split();
        let (command_tx, mut command_rx) = mpsc::channel::<AsrCommand>(64);
        let (message_tx, message_rx) = mpsc::channel::<AsrMessage>(256);

        // Outbound pump: audio frames and the close request.
        tokio::spawn(async move {
            while let Some(command) = command_rx.recv().await {
                match command {
                    AsrCommand::Audio(bytes) => {
                        if let Err(e) = ws_tx.send(Message::Binary(bytes)).await {
                            warn!("ASR send failed: {}", e);
                            break;
                        }
                    }
                    AsrCommand::Close => {
                        let frame = CloseFrame {
                            code: CloseCode::Normal,
                            reason: "client stop".into(),
                        };
                        if let Err(e) = ws_tx.send(Message::Close(Some(frame))).await {
                            warn!("ASR close frame send failed: {}", e);
                        }
                        break;
                    }
                }
            }
            debug!("ASR outbound pump exited");
        });

        // Inbound pump: wire messages and connection terminations.
        tokio::spawn(async move {
            let mut reported = false;

            while let Some(result) = ws_rx.next().await {
                match result {
                    Ok(Message::Text(text)) => {
                        if message_tx.send(AsrMessage::Message(text)).await.is_err() {
                            return;
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        let (code, reason) = match frame {
                            Some(frame) => (
                                Some(u16::from(frame.code)),
                                if frame.reason.is_empty() {
                                    None
                                } else {
                                    Some(frame.reason.to_string())
                                },
                            ),
                            None => (None, None),
                        };
                        let _ = message_tx.send(AsrMessage::Closed { code, reason }).await;
                        reported = true;
                        break;
                    }
                    Ok(_) => {} // ping/pong/binary: nothing to surface
                    Err(e) => {
                        let _ = message_tx.send(AsrMessage::Failed(e.to_string())).await;
                        reported = true;
                        break;
                    }
                }
            }

            // Stream ended without a close handshake.
            if !reported {
                let _ = message_tx
                    .send(AsrMessage::Closed {
                        code: None,
                        reason: None,
                    })
                    .await;
            }
            debug!("ASR inbound pump exited");
        });

        Ok(AsrConnection {
            commands: command_tx,
            messages: message_rx,
        })
    }

    fn name(&self) -> &str {
        "websocket"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_carries_session_parameters() {
        let connector = WsConnector::new("wss://asr.example.com/listen".to_string(), None);
        let config = SessionConfig {
            model: Some("general".to_string()),
            language: Some("en".to_string()),
            endpointing_ms: Some(300),
            keywords: vec!["invoice number".to_string()],
            ..SessionConfig::default()
        };

        let url = connector.build_url(&config);

        assert!(url.starts_with("wss://asr.example.com/listen?"));
        assert!(url.contains("encoding=linear16"));
        assert!(url.contains("sample_rate=16000"));
        assert!(url.contains("channels=2"));
        assert!(url.contains("multichannel=true"));
        assert!(url.contains("model=general"));
        assert!(url.contains("endpointing=300"));
        assert!(url.contains("keywords=invoice%20number"));
        assert!(!url.contains("diarize"));
    }

    #[test]
    fn diarize_mode_sets_diarize_flag() {
        let connector = WsConnector::new("ws://localhost:9000/listen".to_string(), None);
        let config = SessionConfig {
            mode: SessionMode::Diarize,
            channels: 1,
            you_channel_index: None,
            diarize_you_speaker_id: Some(0),
            ..SessionConfig::default()
        };

        let url = connector.build_url(&config);
        assert!(url.contains("diarize=true"));
        assert!(!url.contains("multichannel"));
    }
}
