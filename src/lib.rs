//! voxloop - realtime full-duplex voice agent runtime
//!
//! Turns a continuous microphone stream into a turn-taking voice
//! conversation:
//! - RMS VAD with hysteresis and an adaptive noise floor
//! - correlation-based echo suppression of the bot's own playback
//! - per-turn STT → LLM → TTS pipeline under linked cancellation
//! - barge-in: the user talking over the bot aborts synthesis immediately
//! - a bounded typed event stream driving playback and UI
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use voxloop::orchestrator::Orchestrator;
//! use voxloop::providers::{ChatCompletionLlm, StreamTts, WhisperStt};
//! use voxloop::vad::RmsVad;
//! use voxloop::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let orch = Orchestrator::with_vad(
//!         Arc::new(WhisperStt::new(std::env::var("OPENAI_API_KEY")?, "whisper-1")),
//!         Arc::new(ChatCompletionLlm::new(std::env::var("OPENAI_API_KEY")?, "gpt-4o-mini")),
//!         Arc::new(StreamTts::new(std::env::var("TTS_WS_URL")?)),
//!         Box::new(RmsVad::new(config.vad_threshold, config.vad_silence())),
//!         config,
//!     );
//!     let session = orch.new_session_with_defaults("demo");
//!     let stream = orch.new_managed_stream(session)?;
//!     let events = stream.events();
//!     // feed mic PCM into stream.write(...), play AudioChunk events
//!     Ok(())
//! }
//! ```

pub mod audio;
pub mod config;
pub mod conversation;
pub mod echo;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod providers;
pub mod session;
pub mod types;
pub mod vad;

pub mod cli;

// Re-export the types most callers need
pub use config::Config;
pub use conversation::Conversation;
pub use echo::EchoSuppressor;
pub use error::OrchestratorError;
pub use events::EventReceiver;
pub use orchestrator::{LatencyBreakdown, ManagedStream, Orchestrator, ProviderNames};
pub use session::ConversationSession;
pub use types::{EventKind, Language, Message, OrchestratorEvent, Role, VadEvent, VadEventKind, Voice};
pub use vad::RmsVad;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
