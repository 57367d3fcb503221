//! Snapshots for live consumers and the end-of-session integrity report.
//!
//! [`MonitorSnapshot`] is what the relay carries every tick. [`SessionReport`]
//! is the aggregate counter view, and [`IntegrityReport`] is the structured
//! record handed to the report sink once the session is over.

use crate::core::audio::LoudnessLevel;
use crate::core::calibration::{CalibrationBaseline, CalibrationState};
use crate::core::gaze::GazeSample;
use crate::core::violation::{Channel, ChannelSet, ViolationState};
use crate::relay::TerminalStatus;
use crate::transparency::TransparencyStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// The current integrity report format version.
pub const REPORT_VERSION: &str = "1.0";

/// The name of this producer.
pub const PRODUCER_NAME: &str = "proctor-sentinel";

/// Latest annotated measurement, as published to the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    /// Tick counter since session start
    pub tick: u64,
    pub calibration: CalibrationState,
    pub calibrated: bool,
    /// Seconds since calibration started
    pub calibration_elapsed_secs: f64,
    /// Whether this tick produced usable landmarks
    pub face_detected: bool,
    /// Smoothed gaze offset (absent when no usable face this tick)
    pub gaze_offset: Option<GazeSample>,
    /// Unsmoothed gaze offset of this tick
    pub raw_gaze_offset: Option<GazeSample>,
    /// Nose distance from frame center in pixels
    pub head_displacement_px: Option<f64>,
    /// Eye-line tilt in degrees
    pub head_angle_deg: Option<f64>,
    pub audio_rms: f64,
    pub loudness: LoudnessLevel,
    pub eye_violations: u32,
    pub head_violations: u32,
    pub audio_violations: u32,
}

impl Default for MonitorSnapshot {
    fn default() -> Self {
        Self {
            tick: 0,
            calibration: CalibrationState::Calibrating,
            calibrated: false,
            calibration_elapsed_secs: 0.0,
            face_detected: false,
            gaze_offset: None,
            raw_gaze_offset: None,
            head_displacement_px: None,
            head_angle_deg: None,
            audio_rms: 0.0,
            loudness: LoudnessLevel::from_rms(0.0, 1.0),
            eye_violations: 0,
            head_violations: 0,
            audio_violations: 0,
        }
    }
}

/// Aggregate counters for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionReport {
    pub eye_violations: u32,
    /// Head-position and head-angle violations combined
    pub head_violations: u32,
    pub audio_violations: u32,
    pub calibrated: bool,
}

impl SessionReport {
    pub fn total_violations(&self) -> u32 {
        self.eye_violations + self.head_violations + self.audio_violations
    }
}

/// Final state of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSummary {
    pub channel: Channel,
    pub enabled: bool,
    pub violations: u32,
}

/// Everything the processing loop knows when a session ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub report: SessionReport,
    pub channels: Vec<ChannelSummary>,
    pub baseline: Option<CalibrationBaseline>,
    pub ticks: u64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub termination: TerminalStatus,
}

impl SessionSummary {
    pub(crate) fn channel_summaries(
        enabled: ChannelSet,
        state: impl Fn(Channel) -> ViolationState,
    ) -> Vec<ChannelSummary> {
        Channel::ALL
            .iter()
            .map(|&channel| ChannelSummary {
                channel,
                enabled: enabled.contains(channel),
                violations: state(channel).counter,
            })
            .collect()
    }
}

/// Producer metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Structured end-of-session record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub report_version: String,
    pub producer: ReportProducer,
    pub session_id: String,
    pub device_id: String,
    /// Session start (RFC3339)
    pub started_at_utc: String,
    /// Session end (RFC3339)
    pub ended_at_utc: String,
    pub duration_secs: f64,
    pub summary: SessionReport,
    pub channels: Vec<ChannelSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline: Option<CalibrationBaseline>,
    pub termination: TerminalStatus,
    pub ticks: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit: Option<TransparencyStats>,
    /// Human-readable lines for the candidate report
    pub monitoring_flags: Vec<String>,
}

/// Builder for integrity reports.
pub struct ReportBuilder {
    instance_id: Uuid,
    session_id: String,
    device_id: String,
}

impl ReportBuilder {
    /// Create a builder with a fresh instance ID and a time-based session ID.
    pub fn new() -> Self {
        let device_id = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        Self {
            instance_id: Uuid::new_v4(),
            session_id: format!("EXAM-{}", Utc::now().timestamp_millis()),
            device_id,
        }
    }

    /// Set the session ID for generated reports.
    pub fn with_session_id(mut self, session_id: String) -> Self {
        self.session_id = session_id;
        self
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Build the report for a finished session.
    pub fn build(
        &self,
        summary: &SessionSummary,
        audit: Option<TransparencyStats>,
    ) -> IntegrityReport {
        let duration_secs =
            (summary.ended_at - summary.started_at).num_milliseconds() as f64 / 1000.0;

        IntegrityReport {
            report_version: REPORT_VERSION.to_string(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                instance_id: self.instance_id.to_string(),
            },
            session_id: self.session_id.clone(),
            device_id: self.device_id.clone(),
            started_at_utc: summary.started_at.to_rfc3339(),
            ended_at_utc: summary.ended_at.to_rfc3339(),
            duration_secs: duration_secs.max(0.0),
            summary: summary.report,
            channels: summary.channels.clone(),
            baseline: summary.baseline,
            termination: summary.termination.clone(),
            ticks: summary.ticks,
            audit,
            monitoring_flags: monitoring_flags(summary),
        }
    }

    /// Build a report and write it as pretty JSON into `dir`.
    ///
    /// Returns the path of the written file.
    pub fn write(
        &self,
        dir: &Path,
        summary: &SessionSummary,
        audit: Option<TransparencyStats>,
    ) -> Result<PathBuf, ReportError> {
        let report = self.build(summary, audit);
        std::fs::create_dir_all(dir).map_err(|e| ReportError::IoError(e.to_string()))?;

        let path = dir.join(format!(
            "integrity_{}_{}.json",
            self.session_id,
            summary.ended_at.format("%Y%m%d_%H%M%S")
        ));
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| ReportError::SerializeError(e.to_string()))?;
        std::fs::write(&path, json).map_err(|e| ReportError::IoError(e.to_string()))?;

        Ok(path)
    }
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn monitoring_flags(summary: &SessionSummary) -> Vec<String> {
    let mut flags = Vec::new();

    flags.push(if summary.report.calibrated {
        "Calibration: completed".to_string()
    } else {
        "Calibration: not completed".to_string()
    });

    let count = |channels: &[Channel]| -> Option<u32> {
        let relevant: Vec<&ChannelSummary> = summary
            .channels
            .iter()
            .filter(|c| channels.contains(&c.channel) && c.enabled)
            .collect();
        if relevant.is_empty() {
            None
        } else {
            Some(relevant.iter().map(|c| c.violations).sum())
        }
    };

    for (label, channels) in [
        ("Eye gaze", &[Channel::EyeGaze][..]),
        ("Head movement", &[Channel::HeadPosition, Channel::HeadAngle][..]),
        ("Audio", &[Channel::Audio][..]),
    ] {
        let line = match count(channels) {
            None => format!("{label}: not monitored"),
            Some(0) => format!("{label}: no violations"),
            Some(n) => format!("{label}: {n} violation(s)"),
        };
        flags.push(line);
    }

    if let TerminalStatus::DeviceFailure(ref e) = summary.termination {
        flags.push(format!("Monitoring interrupted: {e}"));
    }

    flags
}

/// Report errors.
#[derive(Debug)]
pub enum ReportError {
    IoError(String),
    SerializeError(String),
}

impl std::fmt::Display for ReportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportError::IoError(e) => write!(f, "IO error: {e}"),
            ReportError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for ReportError {}
