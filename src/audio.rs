//! PCM helpers
//!
//! Everything in the engine is raw 16-bit signed little-endian mono PCM.
//! These helpers decode that into normalized f64 samples for the VAD and the
//! echo suppressor, and wrap PCM in a WAV container for HTTP upload or debug
//! export.

use anyhow::{Context, Result};
use std::io::Cursor;
use std::path::Path;

/// Decode 16-bit LE PCM into samples normalized to [-1, 1].
/// A trailing odd byte is ignored.
pub fn bytes_to_samples(data: &[u8]) -> Vec<f64> {
    let mut samples = Vec::with_capacity(data.len() / 2);
    for pair in data.chunks_exact(2) {
        let sample = i16::from_le_bytes([pair[0], pair[1]]);
        samples.push(sample as f64 / 32768.0);
    }
    samples
}

/// Sum of squared samples
pub fn energy(samples: &[f64]) -> f64 {
    samples.iter().map(|s| s * s).sum()
}

/// Root-mean-square of a raw PCM chunk, normalized to [0, 1]
pub fn rms(chunk: &[u8]) -> f64 {
    let n = chunk.len() / 2;
    if n == 0 {
        return 0.0;
    }
    let mut sum = 0.0;
    for pair in chunk.chunks_exact(2) {
        let sample = i16::from_le_bytes([pair[0], pair[1]]);
        let f = sample as f64 / 32768.0;
        sum += f * f;
    }
    (sum / n as f64).sqrt()
}

/// Wrap raw mono 16-bit PCM in an in-memory WAV container
pub fn wav_bytes(pcm: &[u8], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).context("failed to create WAV writer")?;
        for pair in pcm.chunks_exact(2) {
            writer
                .write_sample(i16::from_le_bytes([pair[0], pair[1]]))
                .context("failed to write WAV sample")?;
        }
        writer.finalize().context("failed to finalize WAV")?;
    }
    Ok(cursor.into_inner())
}

/// Write raw mono 16-bit PCM to a WAV file (debug export)
pub fn write_wav(path: impl AsRef<Path>, pcm: &[u8], sample_rate: u32) -> Result<()> {
    let data = wav_bytes(pcm, sample_rate)?;
    std::fs::write(path.as_ref(), data)
        .with_context(|| format!("failed to write {}", path.as_ref().display()))?;
    Ok(())
}

/// Encode i16 samples as raw LE PCM bytes
pub fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_to_samples_roundtrip() {
        let pcm = samples_to_bytes(&[0, 16384, -16384, 32767]);
        let samples = bytes_to_samples(&pcm);
        assert_eq!(samples.len(), 4);
        assert_eq!(samples[0], 0.0);
        assert!((samples[1] - 0.5).abs() < 1e-4);
        assert!((samples[2] + 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_odd_trailing_byte_ignored() {
        let samples = bytes_to_samples(&[0x00, 0x40, 0xFF]);
        assert_eq!(samples.len(), 1);
    }

    #[test]
    fn test_rms_of_silence_is_zero() {
        assert_eq!(rms(&[]), 0.0);
        assert_eq!(rms(&vec![0u8; 256]), 0.0);
    }

    #[test]
    fn test_rms_of_constant_signal() {
        let pcm = samples_to_bytes(&[16384; 128]);
        let value = rms(&pcm);
        assert!((value - 0.5).abs() < 1e-3, "rms was {}", value);
    }

    #[test]
    fn test_wav_header() {
        let pcm = samples_to_bytes(&[1, 2, 3, 4]);
        let wav = wav_bytes(&pcm, 44_100).unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert!(wav.len() > pcm.len());
    }
}
