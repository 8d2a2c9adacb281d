//! High-level conversation API
//!
//! A thin, friendly wrapper over [`Orchestrator`] + [`ConversationSession`]
//! for callers that want a turn-at-a-time interface instead of the realtime
//! managed stream: feed a buffer or a line of text, get the reply back.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::orchestrator::{Orchestrator, ProviderNames};
use crate::providers::{ChunkSink, LlmProvider, SttProvider, TtsProvider};
use crate::session::ConversationSession;
use crate::types::{Language, Message, Role, Voice};

/// A voice conversation with sensible defaults
pub struct Conversation {
    orch: Orchestrator,
    session: Arc<ConversationSession>,
}

impl Conversation {
    pub fn new(
        stt: Arc<dyn SttProvider>,
        llm: Arc<dyn LlmProvider>,
        tts: Arc<dyn TtsProvider>,
    ) -> Self {
        Self::with_config(stt, llm, tts, Config::default())
    }

    pub fn with_config(
        stt: Arc<dyn SttProvider>,
        llm: Arc<dyn LlmProvider>,
        tts: Arc<dyn TtsProvider>,
        config: Config,
    ) -> Self {
        let orch = Orchestrator::new(stt, llm, tts, config);
        let session = Arc::new(ConversationSession::with_generated_id());
        Self { orch, session }
    }

    /// Add a system message guiding the assistant's behavior
    pub fn set_system_prompt(&self, prompt: impl Into<String>) {
        self.session.add_message(Role::System, prompt);
    }

    pub fn set_voice(&self, voice: Voice) {
        self.session.set_voice(voice);
    }

    /// Set the voice by name, e.g. "M1" or "F3"
    pub fn set_voice_by_name(&self, name: &str) -> anyhow::Result<()> {
        match Voice::from_name(name) {
            Some(voice) => {
                self.session.set_voice(voice);
                Ok(())
            }
            None => anyhow::bail!("invalid voice: {} (must be F1-F5 or M1-M5)", name),
        }
    }

    pub fn set_language(&self, language: Language) {
        self.session.set_language(language);
    }

    /// Set the language by ISO code, e.g. "en" or "ja"
    pub fn set_language_by_name(&self, name: &str) -> anyhow::Result<()> {
        match Language::from_name(name) {
            Some(language) => {
                self.session.set_language(language);
                Ok(())
            }
            None => anyhow::bail!("invalid language: {}", name),
        }
    }

    /// Full audio turn: transcribe, generate a reply and stream its synthesis
    /// into `on_chunk`. Returns the transcript and the reply text.
    pub async fn process_audio(
        &self,
        cancel: &CancellationToken,
        audio: &[u8],
        on_chunk: ChunkSink<'_>,
    ) -> Result<(String, String)> {
        let transcript = self
            .orch
            .process_audio_stream(cancel, &self.session, audio, on_chunk)
            .await?;
        let response = self.session.last_assistant();
        info!(session_id = %self.session.id, "user: {}", transcript);
        info!(session_id = %self.session.id, "assistant: {}", response);
        Ok((transcript, response))
    }

    /// Text turn with voice reply: generate a response and stream its
    /// synthesis into `on_chunk`.
    pub async fn chat(
        &self,
        cancel: &CancellationToken,
        text: &str,
        on_chunk: ChunkSink<'_>,
    ) -> Result<String> {
        self.session.add_message(Role::User, text);
        let response = self.orch.generate_response(cancel, &self.session).await?;
        self.session.add_message(Role::Assistant, &response);

        self.orch
            .synthesize_stream(
                cancel,
                &response,
                self.session.voice(),
                self.session.language(),
                on_chunk,
            )
            .await?;
        Ok(response)
    }

    /// Text in, text out; no synthesis. Useful for debugging providers.
    pub async fn text_only(&self, cancel: &CancellationToken, text: &str) -> Result<String> {
        self.session.add_message(Role::User, text);
        let response = self.orch.generate_response(cancel, &self.session).await?;
        self.session.add_message(Role::Assistant, &response);
        Ok(response)
    }

    /// Conversation history, oldest first
    pub fn context(&self) -> Vec<Message> {
        self.session.context_copy()
    }

    pub fn last_user_message(&self) -> String {
        self.session.last_user()
    }

    pub fn last_assistant_message(&self) -> String {
        self.session.last_assistant()
    }

    /// Reset the history but keep system prompts, voice and language
    pub fn clear_context(&self) {
        self.session.clear_context();
    }

    /// Full wipe: history, system prompts, voice and language
    pub fn reset(&self) {
        self.session.reset();
    }

    pub fn session_id(&self) -> &str {
        &self.session.id
    }

    pub fn session(&self) -> &Arc<ConversationSession> {
        &self.session
    }

    pub fn providers(&self) -> ProviderNames {
        self.orch.providers()
    }

    pub fn config(&self) -> Config {
        self.orch.config()
    }
}
