//! Shared types used across modules
//!
//! Core data model for the voice runtime: conversation messages, voice and
//! language selections, VAD events and the consumer-facing event stream.

use serde::{Deserialize, Serialize};

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Wire-format role string ("system" / "user" / "assistant")
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single message in a conversation. Immutable once appended to a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Synthesis voice style (five female, five male)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Voice {
    F1,
    F2,
    F3,
    F4,
    F5,
    M1,
    M2,
    M3,
    M4,
    M5,
}

impl Voice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Voice::F1 => "F1",
            Voice::F2 => "F2",
            Voice::F3 => "F3",
            Voice::F4 => "F4",
            Voice::F5 => "F5",
            Voice::M1 => "M1",
            Voice::M2 => "M2",
            Voice::M3 => "M3",
            Voice::M4 => "M4",
            Voice::M5 => "M5",
        }
    }

    /// Parse a voice name like "F1" or "M3" (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_uppercase().as_str() {
            "F1" => Some(Voice::F1),
            "F2" => Some(Voice::F2),
            "F3" => Some(Voice::F3),
            "F4" => Some(Voice::F4),
            "F5" => Some(Voice::F5),
            "M1" => Some(Voice::M1),
            "M2" => Some(Voice::M2),
            "M3" => Some(Voice::M3),
            "M4" => Some(Voice::M4),
            "M5" => Some(Voice::M5),
            _ => None,
        }
    }
}

impl std::fmt::Display for Voice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response language
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Es,
    Fr,
    De,
    It,
    Pt,
    Ja,
    Zh,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Es => "es",
            Language::Fr => "fr",
            Language::De => "de",
            Language::It => "it",
            Language::Pt => "pt",
            Language::Ja => "ja",
            Language::Zh => "zh",
        }
    }

    /// Parse an ISO code like "en" or "ja" (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "en" => Some(Language::En),
            "es" => Some(Language::Es),
            "fr" => Some(Language::Fr),
            "de" => Some(Language::De),
            "it" => Some(Language::It),
            "pt" => Some(Language::Pt),
            "ja" => Some(Language::Ja),
            "zh" => Some(Language::Zh),
            _ => None,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a processed audio chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadEventKind {
    SpeechStart,
    SpeechEnd,
    Silence,
}

/// Voice-activity event with a unix-millisecond timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VadEvent {
    pub kind: VadEventKind,
    pub timestamp_ms: i64,
}

impl VadEvent {
    pub fn now(kind: VadEventKind) -> Self {
        let timestamp_ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        Self { kind, timestamp_ms }
    }
}

/// Events delivered to the consumer over the stream's event channel.
///
/// Ordering within one turn: `UserSpeaking` ≤ `UserStopped` ≤
/// `TranscriptFinal` ≤ `BotThinking` ≤ `BotResponse` ≤ `BotSpeaking` ≤ first
/// `AudioChunk`. `Interrupted` terminates the audio of the aborted turn; no
/// `AudioChunk` from that turn follows it.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    UserSpeaking,
    UserStopped,
    TranscriptPartial(String),
    TranscriptFinal(String),
    BotThinking,
    BotResponse(String),
    BotSpeaking,
    AudioChunk(Vec<u8>),
    Interrupted,
    Error(String),
}

impl EventKind {
    /// Audio chunks are best-effort; everything else is a control event and is
    /// never dropped silently.
    pub fn is_audio(&self) -> bool {
        matches!(self, EventKind::AudioChunk(_))
    }
}

/// A typed event tagged with the session it belongs to
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OrchestratorEvent {
    pub session_id: String,
    #[serde(flatten)]
    pub kind: EventKind,
}
