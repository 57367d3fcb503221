//! RMS loudness of PCM chunks, plus the meter level shown to the candidate.

use serde::{Deserialize, Serialize};

/// Default capture rate in Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Default samples per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// RMS at which the loudness meter reads full scale.
pub const DEFAULT_METER_CEILING: f64 = 1200.0;

/// Loudness of one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AudioSample {
    pub rms: f64,
}

impl AudioSample {
    /// A chunk that could not be read counts as silence.
    pub const SILENT: AudioSample = AudioSample { rms: 0.0 };
}

/// Compute the root-mean-square of a chunk.
///
/// Empty chunks and any non-finite result yield 0.0.
pub fn compute_rms(chunk: &[i16]) -> AudioSample {
    if chunk.is_empty() {
        return AudioSample::SILENT;
    }

    let sum_sq: f64 = chunk
        .iter()
        .map(|&s| {
            let s = s as f64;
            s * s
        })
        .sum();
    let rms = (sum_sq / chunk.len() as f64).sqrt();

    if rms.is_finite() {
        AudioSample { rms }
    } else {
        AudioSample::SILENT
    }
}

/// Coarse band of the loudness meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoudnessBand {
    Quiet,
    Elevated,
    Loud,
}

/// Meter reading derived from an RMS value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoudnessLevel {
    /// Fraction of full scale (0-1)
    pub level: f64,
    pub band: LoudnessBand,
}

impl LoudnessLevel {
    pub fn from_rms(rms: f64, ceiling: f64) -> Self {
        let level = if ceiling > 0.0 && rms.is_finite() {
            (rms / ceiling).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let band = if level < 0.33 {
            LoudnessBand::Quiet
        } else if level < 0.66 {
            LoudnessBand::Elevated
        } else {
            LoudnessBand::Loud
        };

        Self { level, band }
    }
}
