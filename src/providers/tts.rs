//! Streaming text-to-speech over WebSocket
//!
//! One persistent connection per provider handle: each synthesis sends a JSON
//! request and then reads binary PCM frames until the server's end-of-stream
//! marker. `abort()` tears the in-flight synthesis down promptly by dropping
//! the socket, which is what unblocks a barge-in mid-sentence.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::providers::{ChunkSink, TtsProvider};
use crate::types::{Language, Voice};

type WsConn = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// End-of-stream marker sent by the server after the last audio frame
const EOS_MARKER: &str = "EOS";
const ERROR_PREFIX: &str = "ERR:";

/// WebSocket streaming synthesis client
pub struct StreamTts {
    url: String,
    speed: f64,
    /// Connection reused across syntheses; serialized by this lock
    conn: tokio::sync::Mutex<Option<WsConn>>,
    /// Abort handle for the synthesis currently in flight
    abort: std::sync::Mutex<Option<CancellationToken>>,
}

impl StreamTts {
    /// `url` carries the full endpoint including credentials, e.g.
    /// `wss://host/ws?api_key=...`
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            speed: 1.05,
            conn: tokio::sync::Mutex::new(None),
            abort: std::sync::Mutex::new(None),
        }
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    async fn run_synthesis(
        &self,
        cancel: &CancellationToken,
        text: &str,
        voice: Voice,
        language: Language,
        on_chunk: ChunkSink<'_>,
    ) -> Result<()> {
        let abort_token = CancellationToken::new();
        *self.abort.lock().unwrap() = Some(abort_token.clone());

        // The connection lock is held for the whole synthesis so concurrent
        // calls serialize on the single socket.
        let mut guard = self.conn.lock().await;
        let mut conn = match guard.take() {
            Some(conn) => conn,
            None => {
                let (conn, _) = connect_async(self.url.as_str())
                    .await
                    .context("failed to connect to synthesis endpoint")?;
                info!("synthesis connection established");
                conn
            }
        };

        let request = serde_json::json!({
            "text": text,
            "voice": voice.as_str(),
            "lang": language.as_str(),
            "speed": self.speed,
        });
        if let Err(e) = conn.send(WsMessage::Text(request.to_string())).await {
            // connection is stale; the next call reconnects
            bail!("failed to send synthesis request: {e}");
        }

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    // dropping the socket closes the transport
                    bail!("synthesis cancelled");
                }
                _ = abort_token.cancelled() => {
                    debug!("synthesis aborted");
                    bail!("synthesis aborted");
                }
                message = conn.next() => {
                    match message {
                        Some(Ok(WsMessage::Binary(payload))) => {
                            on_chunk(payload)?;
                        }
                        Some(Ok(WsMessage::Text(text))) => {
                            if text == EOS_MARKER {
                                *guard = Some(conn);
                                return Ok(());
                            }
                            if let Some(err) = text.strip_prefix(ERROR_PREFIX) {
                                bail!("synthesis error: {}", err.trim());
                            }
                        }
                        Some(Ok(WsMessage::Close(_))) | None => {
                            bail!("synthesis connection closed unexpectedly");
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            bail!("failed to read from synthesis endpoint: {e}");
                        }
                    }
                }
            }
        }
    }
}

#[async_trait]
impl TtsProvider for StreamTts {
    async fn synthesize(
        &self,
        cancel: &CancellationToken,
        text: &str,
        voice: Voice,
        language: Language,
    ) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let mut collect = |chunk: Vec<u8>| -> Result<()> {
            buffer.extend_from_slice(&chunk);
            Ok(())
        };
        self.stream_synthesize(cancel, text, voice, language, &mut collect)
            .await?;
        Ok(buffer)
    }

    async fn stream_synthesize(
        &self,
        cancel: &CancellationToken,
        text: &str,
        voice: Voice,
        language: Language,
        on_chunk: ChunkSink<'_>,
    ) -> Result<()> {
        let result = self.run_synthesis(cancel, text, voice, language, on_chunk).await;
        // the synthesis is over either way; a stale abort handle must not
        // cancel the next turn
        *self.abort.lock().unwrap() = None;
        result
    }

    async fn abort(&self) -> Result<()> {
        if let Some(token) = self.abort.lock().unwrap().take() {
            token.cancel();
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "websocket_tts"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_abort_without_synthesis_is_noop() {
        let tts = StreamTts::new("wss://example.invalid/ws");
        assert!(tts.abort().await.is_ok());
    }

    #[tokio::test]
    async fn test_abort_cancels_in_flight_token() {
        let tts = StreamTts::new("wss://example.invalid/ws");
        let token = CancellationToken::new();
        *tts.abort.lock().unwrap() = Some(token.clone());
        tts.abort().await.unwrap();
        assert!(token.is_cancelled());
        assert!(tts.abort.lock().unwrap().is_none());
    }

    #[test]
    fn test_request_shape() {
        let request = serde_json::json!({
            "text": "hello",
            "voice": Voice::F2.as_str(),
            "lang": Language::En.as_str(),
            "speed": 1.05,
        });
        assert_eq!(request["voice"], "F2");
        assert_eq!(request["lang"], "en");
    }
}
