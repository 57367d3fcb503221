//! Warm-up calibration of the neutral gaze position.
//!
//! The controller collects smoothed gaze samples for a fixed wall-clock
//! duration and then freezes their median as the session baseline. Ticks
//! without a face never reach the controller, but the clock keeps running
//! through them, so a candidate who is off camera for the whole warm-up is
//! calibrated against whatever was seen.

use crate::core::gaze::GazeSample;
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Median};
use std::time::{Duration, Instant};
use tracing::info;

/// Default warm-up duration.
pub const DEFAULT_WARMUP: Duration = Duration::from_secs(3);

/// Calibration lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationState {
    Calibrating,
    Calibrated,
}

/// Neutral gaze reference for the session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationBaseline {
    /// Median gaze offset over the warm-up window
    pub gaze_center: GazeSample,
    /// Number of samples the median was taken over
    pub sample_count: usize,
}

/// What a calibration step did with the sample it was given.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalibrationProgress {
    /// Still inside the warm-up window; the sample was recorded.
    Collecting { elapsed: Duration, samples: usize },
    /// The warm-up just ended and this is the frozen baseline.
    Frozen(CalibrationBaseline),
    /// Calibration finished on an earlier tick.
    Calibrated(CalibrationBaseline),
}

/// Two-state warm-up controller.
#[derive(Debug, Clone)]
pub struct CalibrationController {
    warmup: Duration,
    started_at: Instant,
    dx_values: Vec<f64>,
    dy_values: Vec<f64>,
    baseline: Option<CalibrationBaseline>,
}

impl CalibrationController {
    /// Start calibrating at `started_at`.
    pub fn new(warmup: Duration, started_at: Instant) -> Self {
        Self {
            warmup,
            started_at,
            dx_values: Vec::new(),
            dy_values: Vec::new(),
            baseline: None,
        }
    }

    /// Feed the smoothed gaze of a face-bearing tick.
    ///
    /// Samples observed before the warm-up deadline are accumulated. The
    /// first tick at or after the deadline freezes the median of those
    /// samples; its own sample is only used when nothing else was collected.
    pub fn observe(&mut self, now: Instant, gaze: GazeSample) -> CalibrationProgress {
        if let Some(baseline) = self.baseline {
            return CalibrationProgress::Calibrated(baseline);
        }

        let elapsed = self.elapsed(now);
        if elapsed < self.warmup {
            self.dx_values.push(gaze.dx);
            self.dy_values.push(gaze.dy);
            return CalibrationProgress::Collecting {
                elapsed,
                samples: self.dx_values.len(),
            };
        }

        if self.dx_values.is_empty() {
            self.dx_values.push(gaze.dx);
            self.dy_values.push(gaze.dy);
        }

        let sample_count = self.dx_values.len();
        let baseline = CalibrationBaseline {
            gaze_center: GazeSample {
                dx: median(std::mem::take(&mut self.dx_values)),
                dy: median(std::mem::take(&mut self.dy_values)),
            },
            sample_count,
        };
        self.baseline = Some(baseline);

        info!(
            dx = baseline.gaze_center.dx,
            dy = baseline.gaze_center.dy,
            samples = sample_count,
            "gaze calibration frozen after {:.1}s",
            elapsed.as_secs_f64()
        );

        CalibrationProgress::Frozen(baseline)
    }

    pub fn state(&self) -> CalibrationState {
        if self.baseline.is_some() {
            CalibrationState::Calibrated
        } else {
            CalibrationState::Calibrating
        }
    }

    pub fn is_calibrated(&self) -> bool {
        self.baseline.is_some()
    }

    pub fn baseline(&self) -> Option<CalibrationBaseline> {
        self.baseline
    }

    /// Wall-clock time since calibration started.
    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started_at)
    }

    pub fn warmup(&self) -> Duration {
        self.warmup
    }
}

fn median(values: Vec<f64>) -> f64 {
    Data::new(values).median()
}
