//! Error taxonomy for the orchestration engine
//!
//! Provider failures are wrapped with the stage that produced them so the
//! consumer can tell a dead STT endpoint from a dead LLM. Cancellation is not
//! an error: a cancelled stage ends the turn silently.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// STT returned whitespace-only text. Ends the turn without touching the
    /// session; never surfaced on the event bus.
    #[error("transcription returned empty text")]
    EmptyTranscription,

    #[error("speech-to-text transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("language model generation failed: {0}")]
    LlmFailed(String),

    #[error("text-to-speech synthesis failed: {0}")]
    TtsFailed(String),

    /// Construction-time misuse: a required provider was not supplied.
    #[error("required provider is missing: {0}")]
    NilProvider(&'static str),

    /// The turn's cancellation token fired. Suppressed from the event bus and
    /// treated as the normal interrupted flow.
    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OrchestratorError {
    /// True when this error is expected cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, OrchestratorError::Cancelled)
    }
}

pub type Result<T, E = OrchestratorError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_stage() {
        let e = OrchestratorError::LlmFailed("timeout".into());
        assert!(e.to_string().contains("language model"));
        assert!(e.to_string().contains("timeout"));
    }

    #[test]
    fn test_cancelled_flag() {
        assert!(OrchestratorError::Cancelled.is_cancelled());
        assert!(!OrchestratorError::EmptyTranscription.is_cancelled());
    }
}
