//! Provider interfaces and adapters
//!
//! The engine drives speech-to-text, language-model and text-to-speech
//! services through these trait objects and never talks to a network itself.
//! Optional capabilities (streaming transcription, VAD tuning) are discovered
//! at runtime through accessor methods rather than separate registrations.

pub mod llm;
pub mod stt;
pub mod tts;

use anyhow::Result;
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::types::{Language, Message, VadEvent, Voice};

pub use llm::ChatCompletionLlm;
pub use stt::{DeepgramStt, WhisperStt};
pub use tts::StreamTts;

/// Callback invoked by a streaming STT provider for each partial or final
/// transcript. The `bool` is true for finals. The provider awaits the returned
/// future before delivering the next transcript, so handlers observe source
/// order.
pub type TranscriptHandler = Arc<dyn Fn(String, bool) -> BoxFuture<'static, ()> + Send + Sync>;

/// Per-chunk sink for streaming synthesis. Returning an error stops the
/// provider's read loop.
pub type ChunkSink<'a> = &'a mut (dyn FnMut(Vec<u8>) -> Result<()> + Send);

/// Speech-to-text
#[async_trait]
pub trait SttProvider: Send + Sync {
    /// Transcribe a complete utterance of raw 16-bit LE mono PCM.
    async fn transcribe(
        &self,
        cancel: &CancellationToken,
        audio: &[u8],
        language: Language,
    ) -> Result<String>;

    fn name(&self) -> &str;

    /// Streaming capability, when the provider supports incremental
    /// transcription. Batch-only providers return `None` (the default).
    fn streaming(&self) -> Option<&dyn StreamingSttProvider> {
        None
    }
}

/// Incremental speech-to-text over a provider-side channel
#[async_trait]
pub trait StreamingSttProvider: Send + Sync {
    /// Open a transcription stream. Audio is pushed through the returned
    /// sender; dropping it signals end-of-speech and the provider finishes
    /// decoding what it has before delivering the final transcript.
    async fn stream_transcribe(
        &self,
        cancel: CancellationToken,
        language: Language,
        on_transcript: TranscriptHandler,
    ) -> Result<mpsc::Sender<Vec<u8>>>;
}

/// Chat-completion language model
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(&self, cancel: &CancellationToken, messages: &[Message]) -> Result<String>;

    fn name(&self) -> &str;
}

/// Text-to-speech
#[async_trait]
pub trait TtsProvider: Send + Sync {
    /// Synthesize to a single buffer of raw PCM.
    async fn synthesize(
        &self,
        cancel: &CancellationToken,
        text: &str,
        voice: Voice,
        language: Language,
    ) -> Result<Vec<u8>>;

    /// Synthesize incrementally, pushing PCM chunks into `on_chunk` as they
    /// arrive.
    async fn stream_synthesize(
        &self,
        cancel: &CancellationToken,
        text: &str,
        voice: Voice,
        language: Language,
        on_chunk: ChunkSink<'_>,
    ) -> Result<()>;

    /// Force any in-flight synthesis to return promptly, e.g. by closing the
    /// transport. Failures are logged by callers, never propagated.
    async fn abort(&self) -> Result<()>;

    fn name(&self) -> &str;
}

/// Runtime tuning knobs exposed by VADs that support them
pub trait VadTuning {
    fn threshold(&self) -> f64;
    fn set_threshold(&mut self, threshold: f64);
    fn min_confirmed(&self) -> u32;
    fn set_min_confirmed(&mut self, frames: u32);
    fn set_adaptive_mode(&mut self, enabled: bool);
}

/// Voice-activity detection over raw PCM chunks
pub trait VadProvider: Send + Sync {
    /// Classify one chunk. Returns `None` while still confirming speech onset.
    fn process(&mut self, chunk: &[u8]) -> Result<Option<VadEvent>>;

    /// Clear speaking state, the silence timer and the onset counter.
    /// Settings (threshold, limits) are kept.
    fn reset(&mut self);

    /// Fresh instance with the same settings and no runtime state.
    fn clone_box(&self) -> Box<dyn VadProvider>;

    fn name(&self) -> &str;

    /// True while speech is currently detected.
    fn is_speaking(&self) -> bool;

    /// RMS of the most recently processed chunk, when tracked.
    fn last_rms(&self) -> f64 {
        0.0
    }

    /// Tuning capability, when supported.
    fn tuning(&mut self) -> Option<&mut dyn VadTuning> {
        None
    }
}
