//! Orchestration façade
//!
//! [`Orchestrator`] bundles the STT/LLM/TTS provider handles with the engine
//! configuration, stamps out sessions, and runs the one-shot batch pipelines.
//! The realtime path lives in [`ManagedStream`], created per session via
//! [`Orchestrator::new_managed_stream`].

pub mod latency;
pub mod stream;

pub use latency::LatencyBreakdown;
pub use stream::ManagedStream;

use std::sync::{Arc, RwLock};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::echo::EchoSuppressor;
use crate::error::{OrchestratorError, Result};
use crate::providers::{ChunkSink, LlmProvider, SttProvider, TtsProvider, VadProvider};
use crate::session::ConversationSession;
use crate::types::{Language, Role, Voice};

/// Names of the configured providers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderNames {
    pub stt: String,
    pub llm: String,
    pub tts: String,
}

/// Bundle of provider handles plus configuration; cheap to clone
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<OrchestratorInner>,
}

struct OrchestratorInner {
    stt: Arc<dyn SttProvider>,
    llm: Arc<dyn LlmProvider>,
    tts: Arc<dyn TtsProvider>,
    /// Template VAD; each managed stream gets a state-free clone so sessions
    /// don't interfere.
    vad: Option<Box<dyn VadProvider>>,
    /// Template echo suppressor; streams clone its settings, not its buffer
    echo: EchoSuppressor,
    config: RwLock<Config>,
}

impl Orchestrator {
    pub fn new(
        stt: Arc<dyn SttProvider>,
        llm: Arc<dyn LlmProvider>,
        tts: Arc<dyn TtsProvider>,
        config: Config,
    ) -> Self {
        Self {
            inner: Arc::new(OrchestratorInner {
                stt,
                llm,
                tts,
                vad: None,
                echo: EchoSuppressor::new(),
                config: RwLock::new(config),
            }),
        }
    }

    /// Construct with a VAD template, enabling managed streams
    pub fn with_vad(
        stt: Arc<dyn SttProvider>,
        llm: Arc<dyn LlmProvider>,
        tts: Arc<dyn TtsProvider>,
        vad: Box<dyn VadProvider>,
        config: Config,
    ) -> Self {
        Self {
            inner: Arc::new(OrchestratorInner {
                stt,
                llm,
                tts,
                vad: Some(vad),
                echo: EchoSuppressor::new(),
                config: RwLock::new(config),
            }),
        }
    }

    /// Echo-suppression template applied to new streams. Tune it (threshold,
    /// enabled) before creating streams; each stream gets its own copy of the
    /// settings with an empty reference buffer.
    pub fn echo_template(&self) -> &EchoSuppressor {
        &self.inner.echo
    }

    pub fn config(&self) -> Config {
        self.inner.config.read().unwrap().clone()
    }

    pub fn update_config(&self, config: Config) {
        *self.inner.config.write().unwrap() = config;
    }

    pub fn providers(&self) -> ProviderNames {
        ProviderNames {
            stt: self.inner.stt.name().to_string(),
            llm: self.inner.llm.name().to_string(),
            tts: self.inner.tts.name().to_string(),
        }
    }

    pub(crate) fn stt(&self) -> &Arc<dyn SttProvider> {
        &self.inner.stt
    }

    pub(crate) fn tts(&self) -> &Arc<dyn TtsProvider> {
        &self.inner.tts
    }

    /// Transcribe a buffered utterance, bounded by the STT timeout
    pub async fn transcribe(
        &self,
        cancel: &CancellationToken,
        audio: &[u8],
        language: Language,
    ) -> Result<String> {
        let limit = self.config().stt_timeout();
        match timeout(limit, self.inner.stt.transcribe(cancel, audio, language)).await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(_)) if cancel.is_cancelled() => Err(OrchestratorError::Cancelled),
            Ok(Err(e)) => Err(OrchestratorError::TranscriptionFailed(e.to_string())),
            Err(_) if cancel.is_cancelled() => Err(OrchestratorError::Cancelled),
            Err(_) => Err(OrchestratorError::TranscriptionFailed(format!(
                "timed out after {:?}",
                limit
            ))),
        }
    }

    /// Generate the assistant reply for the session's current history,
    /// bounded by the LLM timeout
    pub async fn generate_response(
        &self,
        cancel: &CancellationToken,
        session: &ConversationSession,
    ) -> Result<String> {
        let limit = self.config().llm_timeout();
        let messages = session.context_copy();
        match timeout(limit, self.inner.llm.complete(cancel, &messages)).await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(_)) if cancel.is_cancelled() => Err(OrchestratorError::Cancelled),
            Ok(Err(e)) => Err(OrchestratorError::LlmFailed(e.to_string())),
            Err(_) if cancel.is_cancelled() => Err(OrchestratorError::Cancelled),
            Err(_) => Err(OrchestratorError::LlmFailed(format!("timed out after {:?}", limit))),
        }
    }

    /// Synthesize a complete response to one PCM buffer
    pub async fn synthesize(
        &self,
        cancel: &CancellationToken,
        text: &str,
        voice: Voice,
        language: Language,
    ) -> Result<Vec<u8>> {
        let limit = self.config().tts_timeout();
        match timeout(limit, self.inner.tts.synthesize(cancel, text, voice, language)).await {
            Ok(Ok(audio)) => Ok(audio),
            Ok(Err(_)) if cancel.is_cancelled() => Err(OrchestratorError::Cancelled),
            Ok(Err(e)) => Err(OrchestratorError::TtsFailed(e.to_string())),
            Err(_) if cancel.is_cancelled() => Err(OrchestratorError::Cancelled),
            Err(_) => Err(OrchestratorError::TtsFailed(format!("timed out after {:?}", limit))),
        }
    }

    /// Synthesize incrementally into `on_chunk`
    pub async fn synthesize_stream(
        &self,
        cancel: &CancellationToken,
        text: &str,
        voice: Voice,
        language: Language,
        on_chunk: ChunkSink<'_>,
    ) -> Result<()> {
        let limit = self.config().tts_timeout();
        match timeout(limit, self.inner.tts.stream_synthesize(cancel, text, voice, language, on_chunk))
            .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) if cancel.is_cancelled() => Err(OrchestratorError::Cancelled),
            Ok(Err(e)) => Err(OrchestratorError::TtsFailed(e.to_string())),
            Err(_) if cancel.is_cancelled() => Err(OrchestratorError::Cancelled),
            Err(_) => Err(OrchestratorError::TtsFailed(format!("timed out after {:?}", limit))),
        }
    }

    /// One-shot batch turn: STT → LLM → TTS, returning the transcript and the
    /// complete synthesized reply
    pub async fn process_audio(
        &self,
        cancel: &CancellationToken,
        session: &ConversationSession,
        audio: &[u8],
    ) -> Result<(String, Vec<u8>)> {
        let transcript = self.transcribe(cancel, audio, session.language()).await?;
        if transcript.trim().is_empty() {
            warn!(session_id = %session.id, "empty transcription received");
            return Err(OrchestratorError::EmptyTranscription);
        }
        info!(session_id = %session.id, chars = transcript.len(), "transcription completed");
        session.add_message(Role::User, transcript.trim());

        let response = self.generate_response(cancel, session).await?;
        info!(session_id = %session.id, chars = response.len(), "response generated");
        session.add_message(Role::Assistant, &response);

        let reply = self
            .synthesize(cancel, &response, session.voice(), session.language())
            .await?;
        info!(session_id = %session.id, bytes = reply.len(), "synthesis completed");
        Ok((transcript, reply))
    }

    /// One-shot batch turn with streaming synthesis
    pub async fn process_audio_stream(
        &self,
        cancel: &CancellationToken,
        session: &ConversationSession,
        audio: &[u8],
        on_chunk: ChunkSink<'_>,
    ) -> Result<String> {
        let transcript = self.transcribe(cancel, audio, session.language()).await?;
        if transcript.trim().is_empty() {
            warn!(session_id = %session.id, "empty transcription received");
            return Err(OrchestratorError::EmptyTranscription);
        }
        session.add_message(Role::User, transcript.trim());

        let response = self.generate_response(cancel, session).await?;
        session.add_message(Role::Assistant, &response);

        self.synthesize_stream(cancel, &response, session.voice(), session.language(), on_chunk)
            .await?;
        Ok(transcript)
    }

    /// New session carrying this orchestrator's default bounds, voice and
    /// language
    pub fn new_session_with_defaults(&self, user_id: impl Into<String>) -> Arc<ConversationSession> {
        let config = self.config();
        let session = ConversationSession::new(user_id);
        session.set_max_messages(config.max_context_messages);
        session.set_voice(config.voice_style);
        session.set_language(config.language);
        Arc::new(session)
    }

    /// Append a system message guiding the assistant
    pub fn set_system_prompt(&self, session: &ConversationSession, prompt: impl Into<String>) {
        session.add_message(Role::System, prompt);
    }

    pub fn set_voice(&self, session: &ConversationSession, voice: Voice) {
        session.set_voice(voice);
    }

    pub fn set_language(&self, session: &ConversationSession, language: Language) {
        session.set_language(language);
    }

    /// Clear the session history. System messages are preserved; voice and
    /// language settings are untouched (see
    /// [`ConversationSession::clear_context`]).
    pub fn reset_session(&self, session: &ConversationSession) {
        session.clear_context();
    }

    /// Fresh state-free VAD cloned from the template
    pub(crate) fn clone_vad(&self) -> Option<Box<dyn VadProvider>> {
        self.inner.vad.as_ref().map(|v| v.clone_box())
    }

    /// Create the realtime full-duplex stream for a session. Requires a VAD
    /// template; constructing one without it is a misuse.
    pub fn new_managed_stream(&self, session: Arc<ConversationSession>) -> Result<ManagedStream> {
        let vad = self.clone_vad().ok_or(OrchestratorError::NilProvider("vad"))?;
        let echo = self.inner.echo.clone_settings();
        Ok(ManagedStream::new(self.clone(), session, vad, echo))
    }
}
