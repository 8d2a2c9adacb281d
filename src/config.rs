//! Configuration for the orchestration engine
//!
//! Audio format, conversation bounds, per-stage timeouts and the barge-in
//! policy knobs. All fields have serde defaults so partial config files work.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::{Language, Voice};

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// PCM sample rate in Hz
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Channel count (the engine is mono; kept for provider adapters)
    #[serde(default = "default_channels")]
    pub channels: u16,
    /// Bytes per sample (16-bit PCM)
    #[serde(default = "default_bytes_per_sample")]
    pub bytes_per_sample: u16,
    /// Conversation history cap; oldest messages are evicted beyond this
    #[serde(default = "default_max_context_messages")]
    pub max_context_messages: usize,
    /// Default synthesis voice for new sessions
    #[serde(default = "default_voice")]
    pub voice_style: Voice,
    /// Default language for new sessions
    #[serde(default = "default_language")]
    pub language: Language,
    /// STT stage timeout in seconds
    #[serde(default = "default_stt_timeout")]
    pub stt_timeout_secs: u64,
    /// LLM stage timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub llm_timeout_secs: u64,
    /// TTS stage timeout in seconds
    #[serde(default = "default_tts_timeout")]
    pub tts_timeout_secs: u64,
    /// Minimum word count before a user utterance interrupts the speaking bot.
    /// 1 means any detected speech barges in; higher values let backchannels
    /// ("uh huh") pass without cutting the bot off.
    #[serde(default = "default_min_words_to_interrupt")]
    pub min_words_to_interrupt: usize,
    /// RMS threshold for the default VAD, normalized to [0, 1]
    #[serde(default = "default_vad_threshold")]
    pub vad_threshold: f64,
    /// Silence run length that ends a user turn, in milliseconds
    #[serde(default = "default_vad_silence_ms")]
    pub vad_silence_ms: u64,
    /// Consecutive above-threshold frames required to confirm speech start
    #[serde(default = "default_vad_min_confirmed")]
    pub vad_min_confirmed: u32,
}

fn default_sample_rate() -> u32 {
    44_100
}

fn default_channels() -> u16 {
    1
}

fn default_bytes_per_sample() -> u16 {
    2
}

fn default_max_context_messages() -> usize {
    20
}

fn default_voice() -> Voice {
    Voice::F1
}

fn default_language() -> Language {
    Language::En
}

fn default_stt_timeout() -> u64 {
    30
}

fn default_llm_timeout() -> u64 {
    60
}

fn default_tts_timeout() -> u64 {
    30
}

fn default_min_words_to_interrupt() -> usize {
    1
}

fn default_vad_threshold() -> f64 {
    0.1
}

fn default_vad_silence_ms() -> u64 {
    700
}

fn default_vad_min_confirmed() -> u32 {
    7
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            bytes_per_sample: default_bytes_per_sample(),
            max_context_messages: default_max_context_messages(),
            voice_style: default_voice(),
            language: default_language(),
            stt_timeout_secs: default_stt_timeout(),
            llm_timeout_secs: default_llm_timeout(),
            tts_timeout_secs: default_tts_timeout(),
            min_words_to_interrupt: default_min_words_to_interrupt(),
            vad_threshold: default_vad_threshold(),
            vad_silence_ms: default_vad_silence_ms(),
            vad_min_confirmed: default_vad_min_confirmed(),
        }
    }
}

impl Config {
    pub fn stt_timeout(&self) -> Duration {
        Duration::from_secs(self.stt_timeout_secs)
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }

    pub fn tts_timeout(&self) -> Duration {
        Duration::from_secs(self.tts_timeout_secs)
    }

    pub fn vad_silence(&self) -> Duration {
        Duration::from_millis(self.vad_silence_ms)
    }

    /// Bytes per second of PCM at this configuration
    pub fn bytes_per_second(&self) -> usize {
        self.sample_rate as usize * self.channels as usize * self.bytes_per_sample as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.sample_rate, 44_100);
        assert_eq!(cfg.channels, 1);
        assert_eq!(cfg.max_context_messages, 20);
        assert_eq!(cfg.voice_style, Voice::F1);
        assert_eq!(cfg.language, Language::En);
        assert_eq!(cfg.min_words_to_interrupt, 1);
        assert_eq!(cfg.bytes_per_second(), 88_200);
    }

    #[test]
    fn test_partial_deserialization_fills_defaults() {
        let cfg: Config = serde_json::from_str(r#"{"vad_threshold": 0.2, "language": "es"}"#).unwrap();
        assert_eq!(cfg.vad_threshold, 0.2);
        assert_eq!(cfg.language, Language::Es);
        assert_eq!(cfg.sample_rate, 44_100);
        assert_eq!(cfg.vad_min_confirmed, 7);
    }
}
