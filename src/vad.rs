//! RMS voice-activity detection
//!
//! A lightweight energy detector with hysteresis: speech starts only after a
//! run of consecutive frames above threshold (filters spikes and echo-onset
//! pops) and ends only after a sustained run of silence. In adaptive mode the
//! detector tracks the ambient noise floor and raises its effective threshold
//! above it, so a noisy room doesn't read as constant speech.

use anyhow::Result;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::audio;
use crate::providers::{VadProvider, VadTuning};
use crate::types::{VadEvent, VadEventKind};

/// EMA weight for noise-floor updates
const NOISE_FLOOR_ALPHA: f64 = 0.05;
/// Adaptive threshold never rises past this, so loud rooms stay usable
const EFFECTIVE_THRESHOLD_CAP: f64 = 0.3;

/// RMS-based VAD with hysteresis and an adaptive noise floor
pub struct RmsVad {
    threshold: f64,
    silence_limit: Duration,
    min_confirmed: u32,
    adaptive: bool,

    speaking: bool,
    silence_start: Option<Instant>,
    consecutive_frames: u32,
    noise_floor: f64,
    last_rms: f64,
}

impl RmsVad {
    pub fn new(threshold: f64, silence_limit: Duration) -> Self {
        Self {
            threshold,
            silence_limit,
            min_confirmed: 7,
            adaptive: true,
            speaking: false,
            silence_start: None,
            consecutive_frames: 0,
            noise_floor: threshold,
            last_rms: 0.0,
        }
    }

    pub fn with_min_confirmed(mut self, frames: u32) -> Self {
        self.min_confirmed = frames.max(1);
        self
    }

    /// Threshold actually applied to the current chunk: in adaptive mode it is
    /// raised to twice the tracked noise floor, capped at 0.3.
    fn effective_threshold(&self) -> f64 {
        if !self.adaptive {
            return self.threshold;
        }
        self.threshold.max(2.0 * self.noise_floor).min(EFFECTIVE_THRESHOLD_CAP)
    }

    fn update_noise_floor(&mut self, rms: f64) {
        if !self.adaptive {
            return;
        }
        if rms < self.noise_floor {
            self.noise_floor = rms;
        } else if !self.speaking && rms < 2.0 * self.threshold {
            self.noise_floor = (1.0 - NOISE_FLOOR_ALPHA) * self.noise_floor + NOISE_FLOOR_ALPHA * rms;
        }
    }
}

impl VadProvider for RmsVad {
    fn process(&mut self, chunk: &[u8]) -> Result<Option<VadEvent>> {
        let rms = audio::rms(chunk);
        self.last_rms = rms;
        self.update_noise_floor(rms);
        let threshold = self.effective_threshold();

        if rms > threshold {
            self.consecutive_frames += 1;
            if !self.speaking {
                if self.consecutive_frames >= self.min_confirmed {
                    self.speaking = true;
                    debug!(rms, threshold, "speech start");
                    return Ok(Some(VadEvent::now(VadEventKind::SpeechStart)));
                }
                // still confirming
                return Ok(None);
            }
            self.silence_start = None;
            return Ok(None);
        }

        self.consecutive_frames = 0;

        if self.speaking {
            let started = *self.silence_start.get_or_insert_with(Instant::now);
            if started.elapsed() >= self.silence_limit {
                self.speaking = false;
                self.silence_start = None;
                debug!(rms, "speech end");
                return Ok(Some(VadEvent::now(VadEventKind::SpeechEnd)));
            }
        }

        Ok(Some(VadEvent::now(VadEventKind::Silence)))
    }

    fn reset(&mut self) {
        self.speaking = false;
        self.silence_start = None;
        self.consecutive_frames = 0;
    }

    fn clone_box(&self) -> Box<dyn VadProvider> {
        Box::new(Self {
            threshold: self.threshold,
            silence_limit: self.silence_limit,
            min_confirmed: self.min_confirmed,
            adaptive: self.adaptive,
            speaking: false,
            silence_start: None,
            consecutive_frames: 0,
            noise_floor: self.threshold,
            last_rms: 0.0,
        })
    }

    fn name(&self) -> &str {
        "rms_vad"
    }

    fn is_speaking(&self) -> bool {
        self.speaking
    }

    fn last_rms(&self) -> f64 {
        self.last_rms
    }

    fn tuning(&mut self) -> Option<&mut dyn VadTuning> {
        Some(self)
    }
}

impl VadTuning for RmsVad {
    fn threshold(&self) -> f64 {
        self.threshold
    }

    fn set_threshold(&mut self, threshold: f64) {
        self.threshold = threshold;
    }

    fn min_confirmed(&self) -> u32 {
        self.min_confirmed
    }

    fn set_min_confirmed(&mut self, frames: u32) {
        self.min_confirmed = frames.max(1);
    }

    fn set_adaptive_mode(&mut self, enabled: bool) {
        self.adaptive = enabled;
    }
}
