//! Shared mock providers and PCM helpers for integration tests
#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use voxloop::providers::{
    ChunkSink, LlmProvider, StreamingSttProvider, SttProvider, TranscriptHandler, TtsProvider,
};
use voxloop::types::{EventKind, Language, Message, Voice};
use voxloop::EventReceiver;

// ─── PCM helpers ─────────────────────────────────────────────

/// One 20 ms chunk at 44.1 kHz with the given normalized amplitude
pub fn chunk_with_rms(rms: f64) -> Vec<u8> {
    let amplitude = (rms * 32768.0) as i16;
    let samples = vec![amplitude; 882];
    let mut out = Vec::with_capacity(samples.len() * 2);
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}

/// 440 Hz tone of the given length in samples
pub fn tone(len: usize, amplitude: f64) -> Vec<u8> {
    let mut out = Vec::with_capacity(len * 2);
    for i in 0..len {
        let phase = i as f64 * 2.0 * std::f64::consts::PI * 440.0 / 44_100.0;
        let sample = (phase.sin() * amplitude * 32767.0) as i16;
        out.extend_from_slice(&sample.to_le_bytes());
    }
    out
}

/// Write `chunk` repeatedly for roughly `duration`, pacing at 20 ms
pub async fn write_for(stream: &voxloop::ManagedStream, chunk: &[u8], duration: Duration) {
    let writes = (duration.as_millis() / 20).max(1);
    for _ in 0..writes {
        stream.write(chunk).await.expect("write failed");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Receive the next event or panic after `timeout`
pub async fn next_event(rx: &EventReceiver, timeout: Duration) -> EventKind {
    match tokio::time::timeout(timeout, rx.recv()).await {
        Ok(Some(ev)) => ev.kind,
        Ok(None) => panic!("event channel closed"),
        Err(_) => panic!("timed out waiting for event"),
    }
}

/// Drain events until one matches `pred` (returning it) or `timeout` elapses
/// (returning everything seen so far as a panic message)
pub async fn wait_for_event(
    rx: &EventReceiver,
    timeout: Duration,
    pred: impl Fn(&EventKind) -> bool,
) -> Vec<EventKind> {
    let mut seen = Vec::new();
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            panic!("timed out; events seen: {:?}", seen);
        }
        match tokio::time::timeout(remaining, rx.recv()).await {
            Ok(Some(ev)) => {
                let matched = pred(&ev.kind);
                seen.push(ev.kind);
                if matched {
                    return seen;
                }
            }
            Ok(None) => panic!("event channel closed; events seen: {:?}", seen),
            Err(_) => panic!("timed out; events seen: {:?}", seen),
        }
    }
}

/// Collect every event delivered within `window`
pub async fn collect_events(rx: &EventReceiver, window: Duration) -> Vec<EventKind> {
    let mut seen = Vec::new();
    let deadline = tokio::time::Instant::now() + window;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            return seen;
        }
        match tokio::time::timeout(remaining, rx.recv()).await {
            Ok(Some(ev)) => seen.push(ev.kind),
            _ => return seen,
        }
    }
}

// ─── Mock STT ────────────────────────────────────────────────

pub struct MockStt {
    pub result: String,
    pub fail: bool,
    pub calls: AtomicUsize,
    pub last_audio_len: AtomicUsize,
}

impl MockStt {
    pub fn new(result: &str) -> Self {
        Self {
            result: result.to_string(),
            fail: false,
            calls: AtomicUsize::new(0),
            last_audio_len: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SttProvider for MockStt {
    async fn transcribe(
        &self,
        _cancel: &CancellationToken,
        audio: &[u8],
        _language: Language,
    ) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_audio_len.store(audio.len(), Ordering::SeqCst);
        if self.fail {
            bail!("stt backend unavailable");
        }
        Ok(self.result.clone())
    }

    fn name(&self) -> &str {
        "mock_stt"
    }
}

// ─── Mock streaming STT ──────────────────────────────────────

/// Scripted streaming STT: plays (text, is_final, at_ms) steps relative to
/// the `stream_transcribe` call, ignoring pushed audio.
pub struct MockStreamingStt {
    pub steps: Vec<(String, bool, u64)>,
    pub sessions: AtomicUsize,
}

impl MockStreamingStt {
    pub fn new(steps: &[(&str, bool, u64)]) -> Self {
        Self {
            steps: steps.iter().map(|(t, f, d)| (t.to_string(), *f, *d)).collect(),
            sessions: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SttProvider for MockStreamingStt {
    async fn transcribe(
        &self,
        _cancel: &CancellationToken,
        _audio: &[u8],
        _language: Language,
    ) -> Result<String> {
        Ok(String::new())
    }

    fn name(&self) -> &str {
        "mock_streaming_stt"
    }

    fn streaming(&self) -> Option<&dyn StreamingSttProvider> {
        Some(self)
    }
}

#[async_trait]
impl StreamingSttProvider for MockStreamingStt {
    async fn stream_transcribe(
        &self,
        cancel: CancellationToken,
        _language: Language,
        on_transcript: TranscriptHandler,
    ) -> Result<mpsc::Sender<Vec<u8>>> {
        // only the first session plays the script; barge-in restarts get silence
        let play = self.sessions.fetch_add(1, Ordering::SeqCst) == 0;
        let steps = if play { self.steps.clone() } else { Vec::new() };
        let (tx, mut rx) = mpsc::channel::<Vec<u8>>(8);

        tokio::spawn(async move {
            // keep the audio side drained so senders never see a full queue
            tokio::spawn(async move { while rx.recv().await.is_some() {} });

            let start = tokio::time::Instant::now();
            for (text, is_final, at_ms) in steps {
                let due = start + Duration::from_millis(at_ms);
                tokio::select! {
                    _ = tokio::time::sleep_until(due) => {}
                    _ = cancel.cancelled() => return,
                }
                on_transcript(text, is_final).await;
            }
        });

        Ok(tx)
    }
}

// ─── Mock LLM ────────────────────────────────────────────────

pub struct MockLlm {
    pub result: String,
    pub delay: Duration,
    pub fail_times: AtomicUsize,
    pub calls: AtomicUsize,
    pub last_messages: Mutex<Vec<Message>>,
}

impl MockLlm {
    pub fn new(result: &str) -> Self {
        Self {
            result: result.to_string(),
            delay: Duration::ZERO,
            fail_times: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            last_messages: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail the next `n` calls before succeeding
    pub fn failing(self, n: usize) -> Self {
        self.fail_times.store(n, Ordering::SeqCst);
        self
    }
}

#[async_trait]
impl LlmProvider for MockLlm {
    async fn complete(&self, cancel: &CancellationToken, messages: &[Message]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_messages.lock().unwrap() = messages.to_vec();

        if !self.delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(self.delay) => {}
                _ = cancel.cancelled() => bail!("completion cancelled"),
            }
        }
        if self
            .fail_times
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            bail!("model exploded");
        }
        Ok(self.result.clone())
    }

    fn name(&self) -> &str {
        "mock_llm"
    }
}

// ─── Mock TTS ────────────────────────────────────────────────

/// Streams a fixed list of chunks, optionally paced
pub struct MockTts {
    pub chunks: Vec<Vec<u8>>,
    pub interval: Duration,
    pub fail: bool,
    pub abort_calls: AtomicUsize,
}

impl MockTts {
    pub fn new(chunks: &[&[u8]]) -> Self {
        Self {
            chunks: chunks.iter().map(|c| c.to_vec()).collect(),
            interval: Duration::ZERO,
            fail: false,
            abort_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TtsProvider for MockTts {
    async fn synthesize(
        &self,
        cancel: &CancellationToken,
        text: &str,
        voice: Voice,
        language: Language,
    ) -> Result<Vec<u8>> {
        let mut all = Vec::new();
        let mut collect = |chunk: Vec<u8>| -> Result<()> {
            all.extend_from_slice(&chunk);
            Ok(())
        };
        self.stream_synthesize(cancel, text, voice, language, &mut collect).await?;
        Ok(all)
    }

    async fn stream_synthesize(
        &self,
        cancel: &CancellationToken,
        _text: &str,
        _voice: Voice,
        _language: Language,
        on_chunk: ChunkSink<'_>,
    ) -> Result<()> {
        if self.fail {
            bail!("synthesis backend unavailable");
        }
        for chunk in &self.chunks {
            if cancel.is_cancelled() {
                bail!("synthesis cancelled");
            }
            on_chunk(chunk.clone())?;
            if !self.interval.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(self.interval) => {}
                    _ = cancel.cancelled() => bail!("synthesis cancelled"),
                }
            }
        }
        Ok(())
    }

    async fn abort(&self) -> Result<()> {
        self.abort_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &str {
        "mock_tts"
    }
}

/// Streams tone chunks forever on the given cadence until cancelled or
/// aborted; stands in for a long assistant reply.
pub struct EndlessTts {
    pub interval: Duration,
    pub abort_calls: AtomicUsize,
    chunk: Vec<u8>,
    current: Mutex<Option<CancellationToken>>,
}

impl EndlessTts {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            abort_calls: AtomicUsize::new(0),
            chunk: tone(441, 0.3),
            current: Mutex::new(None),
        }
    }
}

#[async_trait]
impl TtsProvider for EndlessTts {
    async fn synthesize(
        &self,
        _cancel: &CancellationToken,
        _text: &str,
        _voice: Voice,
        _language: Language,
    ) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }

    async fn stream_synthesize(
        &self,
        cancel: &CancellationToken,
        _text: &str,
        _voice: Voice,
        _language: Language,
        on_chunk: ChunkSink<'_>,
    ) -> Result<()> {
        let abort_token = CancellationToken::new();
        *self.current.lock().unwrap() = Some(abort_token.clone());

        loop {
            if cancel.is_cancelled() || abort_token.is_cancelled() {
                bail!("synthesis cancelled");
            }
            on_chunk(self.chunk.clone())?;
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = cancel.cancelled() => bail!("synthesis cancelled"),
                _ = abort_token.cancelled() => bail!("synthesis aborted"),
            }
        }
    }

    async fn abort(&self) -> Result<()> {
        self.abort_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(token) = self.current.lock().unwrap().take() {
            token.cancel();
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "endless_tts"
    }
}
