//! Speech-to-text adapters
//!
//! Two HTTP adapters: a Whisper-style endpoint that takes a WAV upload via
//! multipart form, and a Deepgram-style endpoint that takes raw PCM with the
//! format declared in the content type. Both observe the turn's cancellation
//! token so a barge-in aborts the request mid-flight.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::audio;
use crate::providers::SttProvider;
use crate::types::Language;

const OPENAI_TRANSCRIPTION_URL: &str = "https://api.openai.com/v1/audio/transcriptions";
const DEEPGRAM_LISTEN_URL: &str = "https://api.deepgram.com/v1/listen";

/// Whisper-compatible transcription over multipart HTTP
pub struct WhisperStt {
    api_key: String,
    url: String,
    model: String,
    sample_rate: u32,
    client: Client,
}

#[derive(Deserialize)]
struct WhisperResponse {
    text: String,
}

impl WhisperStt {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            api_key: api_key.into(),
            url: OPENAI_TRANSCRIPTION_URL.to_string(),
            model: if model.is_empty() { "whisper-1".to_string() } else { model },
            sample_rate: 44_100,
            client: Client::new(),
        }
    }

    /// Point at a different Whisper-compatible endpoint (e.g. a local server)
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    async fn request(&self, pcm: &[u8], language: Language) -> Result<String> {
        let wav = audio::wav_bytes(pcm, self.sample_rate)?;
        debug!(bytes = wav.len(), model = %self.model, "uploading audio for transcription");

        let file = reqwest::multipart::Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")?;
        let form = reqwest::multipart::Form::new()
            .text("model", self.model.clone())
            .text("language", language.as_str())
            .part("file", file);

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .context("transcription request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("transcription endpoint returned {}: {}", status, body);
        }

        let parsed: WhisperResponse =
            response.json().await.context("invalid transcription response")?;
        Ok(parsed.text)
    }
}

#[async_trait]
impl SttProvider for WhisperStt {
    async fn transcribe(
        &self,
        cancel: &CancellationToken,
        audio: &[u8],
        language: Language,
    ) -> Result<String> {
        tokio::select! {
            result = self.request(audio, language) => result,
            _ = cancel.cancelled() => bail!("transcription cancelled"),
        }
    }

    fn name(&self) -> &str {
        "whisper_stt"
    }
}

/// Deepgram-style transcription: raw PCM POST, format in the content type
pub struct DeepgramStt {
    api_key: String,
    url: String,
    sample_rate: u32,
    client: Client,
}

#[derive(Deserialize)]
struct DeepgramResponse {
    results: DeepgramResults,
}

#[derive(Deserialize)]
struct DeepgramResults {
    channels: Vec<DeepgramChannel>,
}

#[derive(Deserialize)]
struct DeepgramChannel {
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(Deserialize)]
struct DeepgramAlternative {
    transcript: String,
}

impl DeepgramStt {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            url: DEEPGRAM_LISTEN_URL.to_string(),
            sample_rate: 44_100,
            client: Client::new(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    async fn request(&self, pcm: &[u8], language: Language) -> Result<String> {
        let mut url = url::Url::parse(&self.url).context("invalid deepgram URL")?;
        url.query_pairs_mut()
            .append_pair("model", "nova-2")
            .append_pair("smart_format", "true")
            .append_pair("language", language.as_str());

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Token {}", self.api_key))
            .header(
                "Content-Type",
                format!("audio/l16; rate={}; channels=1", self.sample_rate),
            )
            .body(pcm.to_vec())
            .send()
            .await
            .context("transcription request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("deepgram returned {}: {}", status, body);
        }

        let parsed: DeepgramResponse =
            response.json().await.context("invalid deepgram response")?;
        let transcript = parsed
            .results
            .channels
            .first()
            .and_then(|c| c.alternatives.first())
            .map(|a| a.transcript.clone())
            .unwrap_or_default();
        Ok(transcript)
    }
}

#[async_trait]
impl SttProvider for DeepgramStt {
    async fn transcribe(
        &self,
        cancel: &CancellationToken,
        audio: &[u8],
        language: Language,
    ) -> Result<String> {
        tokio::select! {
            result = self.request(audio, language) => result,
            _ = cancel.cancelled() => bail!("transcription cancelled"),
        }
    }

    fn name(&self) -> &str {
        "deepgram_stt"
    }
}
