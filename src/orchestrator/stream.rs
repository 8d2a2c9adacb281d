//! Managed full-duplex stream
//!
//! The top-level state machine of the runtime. Microphone PCM comes in
//! through [`ManagedStream::write`]; synthesized speech and control events go
//! out through the bounded event channel. In between: echo gating, VAD,
//! pre-roll capture, turn detection with a speech-end hold, the per-turn
//! STT → LLM → TTS pipeline under linked cancellation, and barge-in handling
//! that aborts all of it the moment the user talks over the bot.
//!
//! Locking: one mutex guards the stream state, held only for field access and
//! never across provider calls or event-channel sends. The VAD and the echo
//! suppressor each have their own lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::audio;
use crate::echo::EchoSuppressor;
use crate::error::{OrchestratorError, Result};
use crate::events::{EventBus, EventReceiver, DEFAULT_CAPACITY};
use crate::orchestrator::latency::{LatencyBreakdown, TurnTimings};
use crate::orchestrator::Orchestrator;
use crate::providers::{TranscriptHandler, VadProvider};
use crate::session::ConversationSession;
use crate::types::{EventKind, OrchestratorEvent, Role, VadEventKind};

/// Grace period after SpeechEnd during which resumed speech re-joins the turn
const SPEECH_END_HOLD: Duration = Duration::from_millis(300);
/// Window after playback during which the VAD runs with a raised threshold
const ECHO_DANGER_ZONE: Duration = Duration::from_millis(250);
/// Raised threshold applied inside the danger zone
const ECHO_DANGER_THRESHOLD: f64 = 0.25;
/// SpeechStart arriving this close to a played chunk is acoustic tail
const ACOUSTIC_TAIL: Duration = Duration::from_millis(120);
/// Onset frames required to barge in while the bot is speaking
const BARGE_IN_MIN_CONFIRMED: u32 = 3;
/// Pre-roll ring bound: ~2 s at 44.1 kHz 16-bit mono
const PRE_ROLL_MAX_BYTES: usize = 176_400;
/// Ring size kept after a trim: ~1.5 s
const PRE_ROLL_KEEP_BYTES: usize = 132_300;
/// Lead-in taken from the ring for echo confirmation: ~100 ms
const LEAD_IN_BYTES: usize = 8_820;
/// Cleaned-chunk energy below this is treated as echo outright
const ECHO_ENERGY_FLOOR: f64 = 1e-8;
/// Cleaned/original energy ratio below this is treated as echo
const ECHO_ENERGY_RATIO: f64 = 0.02;

fn count_words(s: &str) -> usize {
    s.split_whitespace().count()
}

/// Realtime full-duplex conversation stream for one session
pub struct ManagedStream {
    inner: Arc<StreamInner>,
}

pub(crate) struct StreamInner {
    orch: Orchestrator,
    session: Arc<ConversationSession>,
    root: CancellationToken,
    bus: EventBus,
    vad: Mutex<Box<dyn VadProvider>>,
    echo: EchoSuppressor,
    state: Mutex<StreamState>,
    closed: AtomicBool,
}

#[derive(Default)]
struct StreamState {
    pipeline_cancel: Option<CancellationToken>,
    response_cancel: Option<CancellationToken>,
    tts_cancel: Option<CancellationToken>,
    stt_sink: Option<mpsc::Sender<Vec<u8>>>,
    /// Bumped on every interrupt to invalidate in-flight STT callbacks
    stt_generation: u64,
    /// Bumped when a turn driver starts; a superseded driver must not touch
    /// the flags of the turn that replaced it
    turn_serial: u64,
    is_speaking: bool,
    is_thinking: bool,
    /// Blocks audio emission between barge-in detection and the interrupt
    user_interrupting: bool,
    last_interrupted_at: Option<Instant>,
    /// Pre-roll ring of captured mic audio; trimmed only while not speaking
    audio_buf: Vec<u8>,
    /// Raw audio of the last user turn, kept for debug export
    last_user_audio: Vec<u8>,
    timings: TurnTimings,
}

impl ManagedStream {
    pub(crate) fn new(
        orch: Orchestrator,
        session: Arc<ConversationSession>,
        vad: Box<dyn VadProvider>,
        echo: EchoSuppressor,
    ) -> Self {
        Self {
            inner: Arc::new(StreamInner {
                orch,
                session,
                root: CancellationToken::new(),
                bus: EventBus::new(DEFAULT_CAPACITY),
                vad: Mutex::new(vad),
                echo,
                state: Mutex::new(StreamState::default()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Consumer half of the event channel
    pub fn events(&self) -> EventReceiver {
        self.inner.bus.receiver()
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session.id
    }

    /// Feed one chunk of raw 16-bit LE mono PCM from the microphone.
    /// Never performs provider I/O; per-turn work runs on spawned tasks.
    /// Zero-length writes and writes after close are no-ops.
    pub async fn write(&self, chunk: &[u8]) -> Result<()> {
        if chunk.is_empty() || self.inner.closed.load(Ordering::Acquire) {
            return Ok(());
        }
        self.inner.write_chunk(chunk).await
    }

    /// Explicitly stop the bot: cancel the pipeline, drain queued audio and
    /// emit `Interrupted`. Idempotent: with nothing in flight this is a
    /// no-op and emits nothing.
    pub async fn interrupt(&self) {
        {
            let mut state = self.inner.state.lock().unwrap();
            if !state.turn_active() {
                return;
            }
            state.user_interrupting = true;
        }
        self.inner.internal_interrupt().await;
    }

    /// Shut the stream down. Idempotent; later `write` calls are no-ops.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.internal_interrupt().await;
        {
            let mut state = self.inner.state.lock().unwrap();
            state.audio_buf.clear();
            state.stt_sink = None;
        }
        self.inner.echo.clear();
        self.inner.root.cancel();
        // brief grace so spawned turn tasks observe the cancellation
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.inner.bus.close();
    }

    /// Record that playback progressed, extending the echo danger zone
    pub fn notify_audio_played(&self) {
        let mut state = self.inner.state.lock().unwrap();
        state.timings.last_audio_sent = Some(Instant::now());
    }

    /// Feed the echo suppressor the exact samples sent to the speaker
    pub fn record_played_output(&self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        self.inner.echo.record_played(chunk);
    }

    /// RMS of the last chunk seen by the VAD
    pub fn last_rms(&self) -> f64 {
        self.inner.vad.lock().unwrap().last_rms()
    }

    /// Whether the VAD currently detects user speech
    pub fn is_user_speaking(&self) -> bool {
        self.inner.vad.lock().unwrap().is_speaking()
    }

    /// Milliseconds from user speech end to bot playback start (0 when
    /// unavailable)
    pub fn latency_ms(&self) -> i64 {
        let state = self.inner.state.lock().unwrap();
        match (state.timings.user_speech_end, state.timings.bot_speak_start) {
            (Some(user), Some(bot)) if bot >= user => bot.duration_since(user).as_millis() as i64,
            _ => 0,
        }
    }

    /// Milliseconds from user speech end to the most recent audio chunk (0
    /// when unavailable)
    pub fn end_to_end_latency_ms(&self) -> i64 {
        let state = self.inner.state.lock().unwrap();
        match (state.timings.user_speech_end, state.timings.last_audio_sent) {
            (Some(user), Some(sent)) if sent >= user => sent.duration_since(user).as_millis() as i64,
            _ => 0,
        }
    }

    /// Measured per-stage timings for the current/last turn
    pub fn latency_breakdown(&self) -> LatencyBreakdown {
        self.inner.state.lock().unwrap().timings.breakdown()
    }

    /// When the last interrupt fired, if any
    pub fn last_interrupted_at(&self) -> Option<Instant> {
        self.inner.state.lock().unwrap().last_interrupted_at
    }

    /// Raw audio of the last user turn plus an echo-post-processed copy, for
    /// debugging what the STT actually heard. `None` before the first turn.
    pub fn export_last_user_audio(&self) -> Option<(Vec<u8>, Vec<u8>)> {
        let raw = {
            let state = self.inner.state.lock().unwrap();
            if state.last_user_audio.is_empty() {
                return None;
            }
            state.last_user_audio.clone()
        };
        let processed = self.inner.echo.post_process(&raw);
        Some((raw, processed))
    }
}

impl StreamState {
    fn turn_active(&self) -> bool {
        self.pipeline_cancel.is_some()
            || self.response_cancel.is_some()
            || self.tts_cancel.is_some()
            || self.is_speaking
            || self.is_thinking
            || self.user_interrupting
    }
}

impl StreamInner {
    async fn write_chunk(self: &Arc<Self>, chunk: &[u8]) -> Result<()> {
        let (speaking, last_sent) = {
            let state = self.state.lock().unwrap();
            (state.is_speaking, state.timings.last_audio_sent)
        };

        // Realtime echo removal ahead of the VAD. A cleaned chunk whose
        // energy collapsed is echo even if the correlation gate let it by.
        let orig_energy = audio::energy(&audio::bytes_to_samples(chunk));
        let chunk = self.echo.remove_echo_realtime(chunk);
        let cleaned_energy = audio::energy(&audio::bytes_to_samples(&chunk));
        let likely_echo_by_energy = cleaned_energy < ECHO_ENERGY_FLOOR
            || (orig_energy > 0.0 && cleaned_energy / orig_energy < ECHO_ENERGY_RATIO);

        let event = self.run_vad(&chunk, speaking, last_sent)?;

        match event {
            Some(VadEventKind::SpeechStart) => self.on_speech_start(&chunk).await,
            Some(VadEventKind::SpeechEnd) => self.on_speech_end().await,
            _ => {}
        }

        // Forward to streaming STT and the pre-roll ring, but never feed the
        // pipeline our own playback.
        let is_echo = likely_echo_by_energy || self.echo.is_echo(&self.with_lead_in(&chunk));

        let sink = {
            let mut state = self.state.lock().unwrap();
            if !is_echo {
                if let Some(sink) = state.stt_sink.clone() {
                    state.last_user_audio.extend_from_slice(&chunk);
                    Some(sink)
                } else {
                    None
                }
            } else {
                None
            }
        };
        if let Some(sink) = sink {
            // non-blocking: drop on a full provider queue rather than stalling
            let _ = sink.try_send(chunk.clone());
        }

        if !is_echo {
            let user_speaking = self.vad.lock().unwrap().is_speaking();
            let mut state = self.state.lock().unwrap();
            state.audio_buf.extend_from_slice(&chunk);
            if !user_speaking && state.audio_buf.len() > PRE_ROLL_MAX_BYTES {
                let trim_to = state.audio_buf.len() - PRE_ROLL_KEEP_BYTES;
                state.audio_buf.drain(..trim_to);
            }
        }

        Ok(())
    }

    /// Run the VAD with scoped dynamic gating: while the bot speaks, require
    /// a longer onset so echo slips don't self-interrupt; just after playback
    /// (danger zone), disable adaptation and raise the threshold outright.
    fn run_vad(
        &self,
        chunk: &[u8],
        speaking: bool,
        last_sent: Option<Instant>,
    ) -> Result<Option<VadEventKind>> {
        let in_danger_zone =
            !speaking && last_sent.is_some_and(|at| at.elapsed() < ECHO_DANGER_ZONE);

        let mut vad = self.vad.lock().unwrap();
        let saved = vad.tuning().map(|t| (t.threshold(), t.min_confirmed()));
        if let Some(tuning) = vad.tuning() {
            if speaking {
                if tuning.min_confirmed() < BARGE_IN_MIN_CONFIRMED {
                    tuning.set_min_confirmed(BARGE_IN_MIN_CONFIRMED);
                }
            } else if in_danger_zone {
                tuning.set_adaptive_mode(false);
                tuning.set_threshold(ECHO_DANGER_THRESHOLD);
            }
        }

        let event = vad.process(chunk);

        if let (Some((threshold, min_confirmed)), Some(tuning)) = (saved, vad.tuning()) {
            tuning.set_threshold(threshold);
            tuning.set_min_confirmed(min_confirmed);
            tuning.set_adaptive_mode(true);
        }

        Ok(event.map_err(OrchestratorError::Other)?.map(|e| e.kind))
    }

    /// Tail of the pre-roll ring (~100 ms) prepended to the chunk, for more
    /// stable echo correlation than a lone chunk gives.
    fn with_lead_in(&self, chunk: &[u8]) -> Vec<u8> {
        let state = self.state.lock().unwrap();
        let buf = &state.audio_buf;
        let lead = &buf[buf.len().saturating_sub(LEAD_IN_BYTES)..];
        let mut check = Vec::with_capacity(lead.len() + chunk.len());
        check.extend_from_slice(lead);
        check.extend_from_slice(chunk);
        check
    }

    async fn on_speech_start(self: &Arc<Self>, chunk: &[u8]) {
        // Confirm against the echo reference before treating it as the user.
        if self.echo.is_echo(&self.with_lead_in(chunk)) {
            debug!(session_id = %self.session.id, "speech start swallowed as echo");
            return;
        }

        let (speaking, last_sent) = {
            let state = self.state.lock().unwrap();
            (state.is_speaking, state.timings.last_audio_sent)
        };

        // Mic input right on the heels of a played chunk is our own acoustic
        // tail, not a barge-in.
        if speaking && last_sent.is_some_and(|at| at.elapsed() < ACOUSTIC_TAIL) {
            return;
        }

        if speaking {
            // Barge-in: block audio, invalidate in-flight STT, cancel the
            // running turn, then open a fresh STT session over the kept ring.
            let pipeline_cancel = {
                let mut state = self.state.lock().unwrap();
                state.user_interrupting = true;
                state.stt_generation += 1;
                state.stt_sink = None;
                state.pipeline_cancel.take()
            };
            if let Some(token) = pipeline_cancel {
                token.cancel();
            }

            self.emit(EventKind::UserSpeaking).await;
            self.internal_interrupt().await;
            self.start_streaming_stt().await;
            return;
        }

        // Normal turn start
        self.emit(EventKind::UserSpeaking).await;
        {
            let mut state = self.state.lock().unwrap();
            state.timings.reset_turn();
            state.last_user_audio.clear();
        }
        self.internal_interrupt().await;
        self.start_streaming_stt().await;
    }

    async fn on_speech_end(self: &Arc<Self>) {
        {
            let mut state = self.state.lock().unwrap();
            state.timings.user_speech_end = Some(Instant::now());
        }
        self.emit(EventKind::UserStopped).await;

        let buffered = {
            let mut state = self.state.lock().unwrap();
            if state.stt_sink.is_some() {
                // Close the provider's input side so it finishes decoding what
                // it has. The pipeline context stays live for the final.
                state.stt_sink = None;
                None
            } else {
                Some(std::mem::take(&mut state.audio_buf))
            }
        };

        let Some(buffered) = buffered else { return };

        // Speech-end hold: brief pauses re-join the same turn instead of
        // truncating it.
        let this = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(SPEECH_END_HOLD) => {
                    if this.vad.lock().unwrap().is_speaking() {
                        let mut state = this.state.lock().unwrap();
                        let mut merged = buffered;
                        merged.extend_from_slice(&state.audio_buf);
                        state.audio_buf = merged;
                        return;
                    }
                    this.run_batch_pipeline(buffered).await;
                }
                _ = this.root.cancelled() => {}
            }
        });
    }

    async fn start_streaming_stt(self: &Arc<Self>) {
        let stt = self.orch.stt().clone();
        let Some(provider) = stt.streaming() else {
            return;
        };

        let cancel = self.root.child_token();
        let generation = self.state.lock().unwrap().stt_generation;
        let language = self.session.language();

        let weak = Arc::downgrade(self);
        let handler: TranscriptHandler = Arc::new(move |transcript: String, is_final: bool| {
            let weak = weak.clone();
            Box::pin(async move {
                if let Some(stream) = weak.upgrade() {
                    stream.on_transcript(transcript, is_final, generation).await;
                }
            })
        });

        match provider.stream_transcribe(cancel.clone(), language, handler).await {
            Ok(sink) => {
                let pending = {
                    let mut state = self.state.lock().unwrap();
                    state.pipeline_cancel = Some(cancel);
                    state.stt_sink = Some(sink.clone());
                    state.timings.stt_start = Some(Instant::now());
                    if state.audio_buf.is_empty() {
                        None
                    } else {
                        let data = std::mem::take(&mut state.audio_buf);
                        state.last_user_audio = data.clone();
                        Some(data)
                    }
                };
                // flush the pre-roll so STT hears the leading edge of the turn
                if let Some(data) = pending {
                    let _ = sink.try_send(data);
                }
            }
            Err(e) => {
                cancel.cancel();
                self.emit(EventKind::Error(format!("failed to start streaming STT: {e}")))
                    .await;
            }
        }
    }

    async fn on_transcript(self: &Arc<Self>, transcript: String, is_final: bool, generation: u64) {
        let (speaking, thinking, stale) = {
            let state = self.state.lock().unwrap();
            (
                state.is_speaking,
                state.is_thinking,
                state.stt_generation != generation,
            )
        };
        // a callback from before an interrupt belongs to a dead session
        if stale {
            return;
        }

        if speaking {
            let min_words = self.orch.config().min_words_to_interrupt;
            if min_words > 1 {
                if count_words(&transcript) < min_words {
                    // backchannel: keep partials visible, drop short finals
                    if !is_final {
                        self.emit(EventKind::TranscriptPartial(transcript)).await;
                    }
                    return;
                }
                self.internal_interrupt().await;
            } else if !transcript.trim().is_empty() {
                self.internal_interrupt().await;
            }
        } else if thinking && !transcript.trim().is_empty() {
            self.internal_interrupt().await;
        }

        if !is_final {
            self.emit(EventKind::TranscriptPartial(transcript)).await;
            return;
        }

        let transcript = transcript.trim().to_string();
        if transcript.is_empty() {
            return;
        }

        {
            let mut state = self.state.lock().unwrap();
            state.timings.stt_end = Some(Instant::now());
        }
        self.emit(EventKind::TranscriptFinal(transcript.clone())).await;
        self.session.add_message(Role::User, &transcript);

        let token = self.fresh_turn_token();
        let this = self.clone();
        tokio::spawn(async move {
            this.run_llm_and_tts(token).await;
        });
    }

    /// The live pipeline token for the turn, or a fresh child of the root
    /// when the prior one was cancelled (e.g. by our own min-words
    /// interrupt).
    fn fresh_turn_token(&self) -> CancellationToken {
        let mut state = self.state.lock().unwrap();
        match &state.pipeline_cancel {
            Some(token) if !token.is_cancelled() => token.clone(),
            _ => {
                let token = self.root.child_token();
                state.pipeline_cancel = Some(token.clone());
                token
            }
        }
    }

    async fn run_batch_pipeline(self: &Arc<Self>, audio_data: Vec<u8>) {
        self.internal_interrupt().await;

        let token = self.root.child_token();
        {
            let mut state = self.state.lock().unwrap();
            state.pipeline_cancel = Some(token.clone());
            state.timings.stt_start = Some(Instant::now());
            state.last_user_audio = audio_data.clone();
        }

        let language = self.session.language();
        let transcript = match self.orch.transcribe(&token, &audio_data, language).await {
            Ok(text) => {
                let mut state = self.state.lock().unwrap();
                state.timings.stt_end = Some(Instant::now());
                text
            }
            Err(e) => {
                if !e.is_cancelled() && !token.is_cancelled() {
                    self.emit(EventKind::Error(e.to_string())).await;
                }
                return;
            }
        };

        let transcript = transcript.trim().to_string();
        if transcript.is_empty() {
            debug!(session_id = %self.session.id, "empty transcription, turn dropped");
            return;
        }

        let (speaking, thinking) = {
            let state = self.state.lock().unwrap();
            (state.is_speaking, state.is_thinking)
        };
        let min_words = self.orch.config().min_words_to_interrupt;
        if speaking && min_words > 1 && count_words(&transcript) < min_words {
            // short utterance while the bot talks: let it finish
            return;
        }
        if speaking || thinking {
            self.internal_interrupt().await;
        }

        self.emit(EventKind::TranscriptFinal(transcript.clone())).await;
        self.session.add_message(Role::User, &transcript);

        let token = self.fresh_turn_token();
        self.run_llm_and_tts(token).await;
    }

    async fn run_llm_and_tts(self: &Arc<Self>, parent: CancellationToken) {
        let response_token = parent.child_token();
        let serial = {
            let mut state = self.state.lock().unwrap();
            if let Some(prev) = state.response_cancel.take() {
                prev.cancel();
            }
            if let Some(prev) = state.tts_cancel.take() {
                prev.cancel();
            }
            state.response_cancel = Some(response_token.clone());
            state.is_thinking = true;
            state.timings.llm_start = Some(Instant::now());
            state.turn_serial += 1;
            state.turn_serial
        };
        self.emit(EventKind::BotThinking).await;

        let response = match self.orch.generate_response(&response_token, &self.session).await {
            Ok(text) => {
                let mut state = self.state.lock().unwrap();
                state.timings.llm_end = Some(Instant::now());
                text
            }
            Err(e) => {
                if !e.is_cancelled() && !response_token.is_cancelled() {
                    self.emit(EventKind::Error(e.to_string())).await;
                }
                let mut state = self.state.lock().unwrap();
                if state.turn_serial == serial {
                    state.is_thinking = false;
                    state.response_cancel = None;
                }
                return;
            }
        };

        self.session.add_message(Role::Assistant, &response);
        self.emit(EventKind::BotResponse(response.clone())).await;

        let tts_token = response_token.child_token();
        {
            let mut state = self.state.lock().unwrap();
            // a newer turn owns the voice now; don't speak over it
            if state.turn_serial != serial {
                return;
            }
            state.is_thinking = false;
            state.is_speaking = true;
            state.tts_cancel = Some(tts_token.clone());
            let now = Instant::now();
            state.timings.bot_speak_start = Some(now);
            state.timings.tts_start = Some(now);
        }
        // residual mic echo of our own playback must not read as SpeechStart
        self.vad.lock().unwrap().reset();
        self.emit(EventKind::BotSpeaking).await;

        let voice = self.session.voice();
        let language = self.session.language();
        let sink_stream = self.clone();
        let sink_token = tts_token.clone();
        let mut on_chunk = move |chunk: Vec<u8>| -> anyhow::Result<()> {
            if sink_token.is_cancelled() {
                anyhow::bail!("synthesis cancelled");
            }
            {
                let mut state = sink_stream.state.lock().unwrap();
                let now = Instant::now();
                state.timings.last_audio_sent = Some(now);
                state.timings.tts_first_chunk.get_or_insert(now);
            }
            sink_stream.echo.record_played(&chunk);
            sink_stream.emit_audio(chunk);
            Ok(())
        };

        let result = self
            .orch
            .synthesize_stream(&tts_token, &response, voice, language, &mut on_chunk)
            .await;

        {
            let mut state = self.state.lock().unwrap();
            if state.timings.tts_start.is_some() {
                state.timings.tts_end = Some(Instant::now());
            }
        }

        if let Err(e) = result {
            if !e.is_cancelled() && !tts_token.is_cancelled() {
                self.emit(EventKind::Error(e.to_string())).await;
            }
        }

        let mut state = self.state.lock().unwrap();
        if state.turn_serial == serial {
            state.is_speaking = false;
            state.tts_cancel = None;
            state.response_cancel = None;
        }
    }

    /// Tear down whatever turn is in flight. Safe to call at any time; does
    /// nothing when idle.
    async fn internal_interrupt(&self) {
        let (pipeline, response, tts) = {
            let mut state = self.state.lock().unwrap();
            if !state.turn_active() {
                return;
            }
            let tokens = (
                state.pipeline_cancel.take(),
                state.response_cancel.take(),
                state.tts_cancel.take(),
            );
            state.stt_sink = None;
            state.stt_generation += 1;
            state.is_speaking = false;
            state.is_thinking = false;
            state.user_interrupting = false;
            state.last_interrupted_at = Some(Instant::now());
            tokens
        };

        // stale playback must not gate the user's next utterance as echo
        self.echo.clear();

        if let Some(token) = pipeline {
            token.cancel();
        }
        if let Some(token) = response {
            token.cancel();
        }
        if let Some(token) = tts {
            token.cancel();
        }

        // force any synthesize call blocked on the provider to return
        if let Err(e) = self.orch.tts().abort().await {
            warn!(session_id = %self.session.id, error = %e, "tts abort failed");
        }

        let dropped = self.bus.drain_audio();
        if dropped > 0 {
            debug!(session_id = %self.session.id, dropped, "drained queued audio on interrupt");
        }
        self.emit(EventKind::Interrupted).await;
    }

    async fn emit(&self, kind: EventKind) {
        if self.root.is_cancelled() {
            return;
        }
        self.bus
            .push_control(OrchestratorEvent { session_id: self.session.id.clone(), kind })
            .await;
    }

    /// Best-effort audio emission, gated so chunks of an aborted turn never
    /// reach the consumer.
    fn emit_audio(&self, chunk: Vec<u8>) {
        if self.root.is_cancelled() {
            return;
        }
        {
            let state = self.state.lock().unwrap();
            if !state.is_speaking || state.user_interrupting {
                return;
            }
        }
        self.bus.push_audio(OrchestratorEvent {
            session_id: self.session.id.clone(),
            kind: EventKind::AudioChunk(chunk),
        });
    }
}
