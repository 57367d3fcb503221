//! Core measurement and detection pipeline.
//!
//! This module contains:
//! - Gaze, head-pose and audio-loudness measurement
//! - Moving-average smoothing and warm-up calibration
//! - Dwell-time violation detection
//! - Snapshot and report types built from session state

pub mod audio;
pub mod calibration;
pub mod error;
pub mod gaze;
pub mod head;
pub mod report;
pub mod session;
pub mod smoothing;
pub mod violation;

// Re-export commonly used types
pub use audio::{compute_rms, AudioSample, LoudnessBand, LoudnessLevel};
pub use calibration::{
    CalibrationBaseline, CalibrationController, CalibrationProgress, CalibrationState,
};
pub use error::TickError;
pub use gaze::{compute_gaze, GazeSample};
pub use head::{estimate_head_pose, HeadSample};
pub use report::{
    IntegrityReport, MonitorSnapshot, ReportBuilder, ReportError, SessionReport, SessionSummary,
    PRODUCER_NAME, REPORT_VERSION,
};
pub use session::{FaceOutcome, ProctorSession};
pub use smoothing::{MovingAverage, SmoothedSignal};
pub use violation::{
    Channel, ChannelSet, ConfirmedViolations, DecayPolicy, Tolerances, ViolationDetector,
    ViolationState,
};
