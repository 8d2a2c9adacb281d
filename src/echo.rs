//! Echo suppression
//!
//! Correlation-based gate that keeps the bot from hearing itself. The playback
//! path records every chunk sent to the speaker into a rolling reference
//! buffer; the capture path asks whether an incoming mic chunk matches that
//! reference and mutes it when it does. This is an attenuation gate, not a
//! full acoustic echo canceller: a matched chunk is zeroed, not subtracted.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::audio::{bytes_to_samples, energy};

/// Reference buffer bound: ~2 s at 44.1 kHz 16-bit mono
const MAX_REFERENCE_BYTES: usize = 176_400;
/// Frame length for offline post-processing (20 ms at 44.1 kHz)
const POST_PROCESS_FRAME_BYTES: usize = 44_100 * 2 * 20 / 1000;
/// Envelope correlation runs slightly hot; require a bit more than the
/// waveform threshold before calling it echo.
const ENVELOPE_MARGIN: f64 = 0.05;

pub struct EchoSuppressor {
    inner: Mutex<EchoState>,
}

struct EchoState {
    reference: Vec<u8>,
    last_played_at: Option<Instant>,
    echo_threshold: f64,
    echo_silence: Duration,
    enabled: bool,
}

impl Default for EchoSuppressor {
    fn default() -> Self {
        Self::new()
    }
}

impl EchoSuppressor {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(EchoState {
                reference: Vec::new(),
                last_played_at: None,
                echo_threshold: 0.55,
                echo_silence: Duration::from_millis(1200),
                enabled: true,
            }),
        }
    }

    /// Record audio that was just sent to the speakers. Call with the exact
    /// samples played so the reference matches what the microphone picks up.
    pub fn record_played(&self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        let mut state = self.inner.lock().unwrap();
        if !state.enabled {
            return;
        }
        state.reference.extend_from_slice(chunk);
        state.last_played_at = Some(Instant::now());
        if state.reference.len() > MAX_REFERENCE_BYTES {
            let excess = state.reference.len() - MAX_REFERENCE_BYTES;
            state.reference.drain(..excess);
        }
    }

    /// True when the chunk is primarily echo of recently played audio
    pub fn is_echo(&self, chunk: &[u8]) -> bool {
        if chunk.is_empty() {
            return false;
        }
        let state = self.inner.lock().unwrap();
        if !state.enabled || !state.recently_played() || state.reference.is_empty() {
            return false;
        }

        let input = bytes_to_samples(chunk);
        let reference = bytes_to_samples(&state.reference);
        let threshold = state.echo_threshold;
        drop(state);

        if tail_correlation(&input, &reference) > threshold {
            return true;
        }
        // 'S' sounds decorrelate in the waveform under room phase shifts but
        // survive in the energy envelope
        max_envelope_correlation(&input, &reference, 8) > threshold + ENVELOPE_MARGIN
    }

    /// Realtime gate applied to every mic chunk before VAD. Runs a bounded
    /// sliding search over the reference; when the best alignment exceeds the
    /// threshold the chunk comes back muted, otherwise it is returned
    /// unchanged. Stride is |chunk|/4 (min 8 samples) to cap CPU on the hot
    /// path.
    pub fn remove_echo_realtime(&self, input: &[u8]) -> Vec<u8> {
        let state = self.inner.lock().unwrap();
        if !state.enabled || input.is_empty() || !state.recently_played() {
            return input.to_vec();
        }
        let reference = state.reference.clone();
        let threshold = state.echo_threshold;
        drop(state);

        if reference.is_empty() {
            return input.to_vec();
        }

        let in_samples = bytes_to_samples(input);
        let ref_samples = bytes_to_samples(&reference);
        if in_samples.is_empty() || ref_samples.is_empty() {
            return input.to_vec();
        }

        let compare_len = in_samples.len().min(ref_samples.len());
        let in_seg = &in_samples[..compare_len];
        if energy(in_seg) == 0.0 {
            return input.to_vec();
        }

        let best = max_correlation(in_seg, &ref_samples);
        if best < threshold
            && max_envelope_correlation(in_seg, &ref_samples, 8) < threshold + ENVELOPE_MARGIN
        {
            return input.to_vec();
        }

        // mute the matched span; any bytes past the compared span pass through
        let mut out = vec![0u8; input.len()];
        if input.len() > compare_len * 2 {
            out[compare_len * 2..].copy_from_slice(&input[compare_len * 2..]);
        }
        out
    }

    /// Offline variant for debug export: zeroes every 20 ms frame whose best
    /// reference correlation exceeds the threshold.
    pub fn post_process(&self, input: &[u8]) -> Vec<u8> {
        let state = self.inner.lock().unwrap();
        if !state.enabled || input.is_empty() {
            return input.to_vec();
        }
        let reference = bytes_to_samples(&state.reference);
        let threshold = state.echo_threshold;
        drop(state);

        let mut out = input.to_vec();
        for offset in (0..input.len()).step_by(POST_PROCESS_FRAME_BYTES) {
            let end = (offset + POST_PROCESS_FRAME_BYTES).min(input.len());
            let frame = bytes_to_samples(&input[offset..end]);
            if frame.is_empty() || reference.is_empty() {
                continue;
            }
            let compare_len = frame.len().min(reference.len());
            if energy(&frame[..compare_len]) == 0.0 {
                continue;
            }
            if max_correlation(&frame[..compare_len], &reference) > threshold {
                out[offset..end].fill(0);
            }
        }
        out
    }

    /// Drop the reference buffer. Called on interrupt so fresh user speech is
    /// not compared against stale playback.
    pub fn clear(&self) {
        self.inner.lock().unwrap().reference.clear();
    }

    /// Adjust detection sensitivity; values outside [0, 1] are ignored
    pub fn set_threshold(&self, threshold: f64) {
        if (0.0..=1.0).contains(&threshold) {
            self.inner.lock().unwrap().echo_threshold = threshold;
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.inner.lock().unwrap().enabled = enabled;
    }

    /// Fresh suppressor with the same settings and an empty reference
    pub fn clone_settings(&self) -> Self {
        let state = self.inner.lock().unwrap();
        Self {
            inner: Mutex::new(EchoState {
                reference: Vec::new(),
                last_played_at: None,
                echo_threshold: state.echo_threshold,
                echo_silence: state.echo_silence,
                enabled: state.enabled,
            }),
        }
    }

    #[cfg(test)]
    pub(crate) fn reference_len(&self) -> usize {
        self.inner.lock().unwrap().reference.len()
    }
}

impl EchoState {
    fn recently_played(&self) -> bool {
        match self.last_played_at {
            Some(at) => at.elapsed() <= self.echo_silence,
            None => false,
        }
    }
}

/// Normalized correlation of `input` against the tail of `reference`
/// (length-matched). Clamped to [0, 1]; zero energy short-circuits to 0.
fn tail_correlation(input: &[f64], reference: &[f64]) -> f64 {
    if input.is_empty() || reference.is_empty() {
        return 0.0;
    }
    let compare_len = input.len().min(reference.len());
    let tail = &reference[reference.len() - compare_len..];
    let input = &input[..compare_len];

    let in_energy = energy(input);
    let ref_energy = energy(tail);
    if in_energy == 0.0 || ref_energy == 0.0 {
        return 0.0;
    }

    let dot: f64 = input.iter().zip(tail).map(|(a, b)| a * b).sum();
    (dot / (in_energy * ref_energy).sqrt()).clamp(0.0, 1.0)
}

/// Best normalized correlation of `input` across `reference`, using a bounded
/// stride so the realtime path stays cheap. Early-exits at ≥0.999.
fn max_correlation(input: &[f64], reference: &[f64]) -> f64 {
    if input.is_empty() || reference.is_empty() {
        return 0.0;
    }
    let compare_len = input.len().min(reference.len());
    let input = &input[..compare_len];
    let in_energy = energy(input);
    if in_energy == 0.0 {
        return 0.0;
    }

    let stride = (compare_len / 4).max(8);
    let mut best = 0.0f64;
    let mut pos = 0;
    while pos + compare_len <= reference.len() {
        let segment = &reference[pos..pos + compare_len];
        let seg_energy = energy(segment);
        if seg_energy > 0.0 {
            let dot: f64 = input.iter().zip(segment).map(|(a, b)| a * b).sum();
            let corr = dot / (in_energy * seg_energy).sqrt();
            if corr > best {
                best = corr;
                if best >= 0.999 {
                    break;
                }
            }
        }
        pos += stride;
    }
    best.clamp(0.0, 1.0)
}

/// Best correlation between the decimated absolute-value envelopes of the two
/// signals. Catches high-frequency content that phase shifts scramble in the
/// raw waveform.
fn max_envelope_correlation(input: &[f64], reference: &[f64], decimation: usize) -> f64 {
    if input.is_empty() || reference.is_empty() || decimation == 0 {
        return 0.0;
    }

    let envelope = |samples: &[f64]| -> Vec<f64> {
        samples
            .chunks_exact(decimation)
            .map(|w| w.iter().map(|s| s.abs()).sum())
            .collect()
    };

    let mut in_env = envelope(input);
    let ref_env = envelope(reference);

    let compare_len = in_env.len().min(ref_env.len());
    if compare_len == 0 {
        return 0.0;
    }
    in_env.truncate(compare_len);

    let in_mean = in_env.iter().sum::<f64>() / compare_len as f64;
    let mut in_var = 0.0;
    for v in in_env.iter_mut() {
        *v -= in_mean;
        in_var += *v * *v;
    }
    if in_var <= 0.0 {
        return 0.0;
    }

    let stride = (compare_len / 4).max(2);
    let mut best = 0.0f64;
    let mut pos = 0;
    while pos + compare_len <= ref_env.len() {
        let window = &ref_env[pos..pos + compare_len];
        let ref_mean = window.iter().sum::<f64>() / compare_len as f64;

        let mut dot = 0.0;
        let mut ref_var = 0.0;
        for (a, b) in in_env.iter().zip(window) {
            let r = b - ref_mean;
            dot += a * r;
            ref_var += r * r;
        }
        if ref_var > 0.0 {
            let corr = dot / (in_var * ref_var).sqrt();
            if corr > best {
                best = corr;
            }
        }
        pos += stride;
    }
    best
}
