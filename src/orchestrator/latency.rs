//! Per-turn latency instrumentation
//!
//! Timestamps are captured inside the stream's state lock as each stage
//! starts and finishes, and folded into a millisecond breakdown on demand.
//! Missing or out-of-order pairs report zero rather than erroring, since a
//! turn can be interrupted between any two stages.

use std::time::Instant;

/// Timestamps for the turn currently in flight. Cleared when a new user turn
/// begins.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct TurnTimings {
    pub user_speech_end: Option<Instant>,
    pub stt_start: Option<Instant>,
    pub stt_end: Option<Instant>,
    pub llm_start: Option<Instant>,
    pub llm_end: Option<Instant>,
    pub tts_start: Option<Instant>,
    pub tts_first_chunk: Option<Instant>,
    pub tts_end: Option<Instant>,
    pub bot_speak_start: Option<Instant>,
    pub last_audio_sent: Option<Instant>,
}

impl TurnTimings {
    /// Clear per-stage marks at the start of a fresh user turn. The previous
    /// turn's speech-end and playback marks survive until replaced, so echo
    /// guards that key off recent playback keep working.
    pub fn reset_turn(&mut self) {
        self.stt_start = None;
        self.stt_end = None;
        self.llm_start = None;
        self.llm_end = None;
        self.tts_start = None;
        self.tts_first_chunk = None;
        self.tts_end = None;
    }

    pub fn breakdown(&self) -> LatencyBreakdown {
        let user = match self.user_speech_end {
            Some(t) => t,
            None => return LatencyBreakdown::default(),
        };

        LatencyBreakdown {
            user_to_stt_final_ms: ms_between(Some(user), self.stt_end),
            stt_ms: ms_between(self.stt_start, self.stt_end),
            user_to_llm_ms: ms_between(Some(user), self.llm_end),
            llm_ms: ms_between(self.llm_start, self.llm_end),
            user_to_tts_first_ms: ms_between(Some(user), self.tts_first_chunk),
            llm_to_tts_first_ms: ms_between(self.llm_end, self.tts_first_chunk),
            tts_total_ms: ms_between(self.tts_start, self.tts_end),
            bot_start_latency_ms: ms_between(Some(user), self.bot_speak_start),
            user_to_play_ms: ms_between(Some(user), self.last_audio_sent),
        }
    }
}

/// Milliseconds from `from` to `to`; zero when either is missing or they are
/// out of order.
fn ms_between(from: Option<Instant>, to: Option<Instant>) -> i64 {
    match (from, to) {
        (Some(a), Some(b)) if b >= a => b.duration_since(a).as_millis() as i64,
        _ => 0,
    }
}

/// Per-stage timings for one turn, all in milliseconds
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LatencyBreakdown {
    /// user stop → final transcript
    pub user_to_stt_final_ms: i64,
    /// STT stage duration
    pub stt_ms: i64,
    /// user stop → LLM completion
    pub user_to_llm_ms: i64,
    /// LLM stage duration
    pub llm_ms: i64,
    /// user stop → first synthesized chunk
    pub user_to_tts_first_ms: i64,
    /// LLM completion → first synthesized chunk
    pub llm_to_tts_first_ms: i64,
    /// TTS stage duration
    pub tts_total_ms: i64,
    /// user stop → bot playback start
    pub bot_start_latency_ms: i64,
    /// user stop → most recent audio chunk sent
    pub user_to_play_ms: i64,
}
