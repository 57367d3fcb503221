//! Per-session pipeline state.
//!
//! A [`ProctorSession`] owns everything that accumulates over a session:
//! smoothing windows, the calibration controller and the violation
//! counters. It is driven one tick at a time by the processing loop and
//! never touches a device itself.

use crate::config::DetectorConfig;
use crate::core::audio::{AudioSample, LoudnessLevel};
use crate::core::calibration::{CalibrationBaseline, CalibrationController, CalibrationProgress};
use crate::core::error::TickError;
use crate::core::gaze::{compute_gaze, GazeSample};
use crate::core::head::{estimate_head_pose, HeadSample};
use crate::core::report::{MonitorSnapshot, SessionReport, SessionSummary};
use crate::core::smoothing::MovingAverage;
use crate::core::violation::{ConfirmedViolations, ViolationDetector};
use crate::relay::TerminalStatus;
use crate::source::types::LandmarkFrame;
use chrono::{DateTime, Utc};
use std::time::Instant;

/// What a face-bearing tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum FaceOutcome {
    /// Sample went into the calibration buffers.
    Calibrating { samples: usize },
    /// This tick froze the baseline; nothing was evaluated.
    CalibrationFrozen(CalibrationBaseline),
    /// Gaze and head channels were evaluated against the baseline.
    Evaluated(ConfirmedViolations),
}

#[derive(Debug, Clone)]
struct HeadSmoother {
    dx: MovingAverage,
    dy: MovingAverage,
    angle: MovingAverage,
}

impl HeadSmoother {
    fn new(window: usize) -> Self {
        Self {
            dx: MovingAverage::new(window),
            dy: MovingAverage::new(window),
            angle: MovingAverage::new(window),
        }
    }

    fn push(&mut self, head: HeadSample) -> HeadSample {
        HeadSample {
            dx_px: self.dx.push(head.dx_px),
            dy_px: self.dy.push(head.dy_px),
            angle_deg: self.angle.push(head.angle_deg),
        }
    }
}

/// Pipeline state for one monitoring session.
#[derive(Debug, Clone)]
pub struct ProctorSession {
    gaze_dx: MovingAverage,
    gaze_dy: MovingAverage,
    head: Option<HeadSmoother>,
    audio: Option<MovingAverage>,
    calibration: CalibrationController,
    detector: ViolationDetector,
    meter_ceiling: f64,
    started_at: DateTime<Utc>,
    tick: u64,
    now: Instant,
    face_detected: bool,
    last_gaze: Option<GazeSample>,
    last_raw_gaze: Option<GazeSample>,
    last_head: Option<HeadSample>,
    last_audio: AudioSample,
}

impl ProctorSession {
    /// Start a session whose calibration clock begins at `started_at`.
    pub fn new(config: &DetectorConfig, meter_ceiling: f64, started_at: Instant) -> Self {
        let window = config.smoothing.window;

        Self {
            gaze_dx: MovingAverage::new(window),
            gaze_dy: MovingAverage::new(window),
            head: config.smoothing.head.then(|| HeadSmoother::new(window)),
            audio: config.smoothing.audio.then(|| MovingAverage::new(window)),
            calibration: CalibrationController::new(config.warmup, started_at),
            detector: ViolationDetector::new(
                config.tolerances,
                config.dwell_frames,
                config.channels,
            ),
            meter_ceiling,
            started_at: Utc::now(),
            tick: 0,
            now: started_at,
            face_detected: false,
            last_gaze: None,
            last_raw_gaze: None,
            last_head: None,
            last_audio: AudioSample::SILENT,
        }
    }

    /// Start a new tick at `now`. Clears the per-tick face measurements.
    pub fn begin_tick(&mut self, now: Instant) {
        self.tick += 1;
        self.now = now;
        self.face_detected = false;
        self.last_gaze = None;
        self.last_raw_gaze = None;
        self.last_head = None;
    }

    /// Feed this tick's audio loudness. Audio is evaluated whether or not
    /// calibration has finished.
    pub fn process_audio(&mut self, sample: AudioSample) -> ConfirmedViolations {
        let sample = match self.audio.as_mut() {
            Some(window) => AudioSample {
                rms: window.push(sample.rms),
            },
            None => sample,
        };
        self.last_audio = sample;
        self.detector.evaluate_audio(sample)
    }

    /// Feed this tick's landmarks.
    ///
    /// Measurements are taken before any state is touched, so an error
    /// leaves smoothing windows, calibration buffers and counters exactly
    /// as they were.
    pub fn process_face(
        &mut self,
        frame: Option<&LandmarkFrame>,
    ) -> Result<FaceOutcome, TickError> {
        let frame = frame.ok_or(TickError::NoFaceDetected)?;
        let raw_gaze = compute_gaze(frame)?;
        let raw_head = estimate_head_pose(frame)?;

        let dx = self.gaze_dx.push_signal(raw_gaze.dx);
        let dy = self.gaze_dy.push_signal(raw_gaze.dy);
        let gaze = GazeSample::new(dx.average, dy.average);
        let head = match self.head.as_mut() {
            Some(smoother) => smoother.push(raw_head),
            None => raw_head,
        };

        self.face_detected = true;
        self.last_gaze = Some(gaze);
        self.last_raw_gaze = Some(GazeSample::new(dx.raw, dy.raw));
        self.last_head = Some(head);

        let outcome = match self.calibration.observe(self.now, gaze) {
            CalibrationProgress::Collecting { samples, .. } => FaceOutcome::Calibrating { samples },
            CalibrationProgress::Frozen(baseline) => FaceOutcome::CalibrationFrozen(baseline),
            CalibrationProgress::Calibrated(baseline) => {
                FaceOutcome::Evaluated(self.detector.evaluate_face(gaze, &head, &baseline))
            }
        };
        Ok(outcome)
    }

    /// Annotated view of the current tick.
    pub fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            tick: self.tick,
            calibration: self.calibration.state(),
            calibrated: self.calibration.is_calibrated(),
            calibration_elapsed_secs: self.calibration.elapsed(self.now).as_secs_f64(),
            face_detected: self.face_detected,
            gaze_offset: self.last_gaze,
            raw_gaze_offset: self.last_raw_gaze,
            head_displacement_px: self.last_head.map(|h| h.displacement_px()),
            head_angle_deg: self.last_head.map(|h| h.angle_deg),
            audio_rms: self.last_audio.rms,
            loudness: LoudnessLevel::from_rms(self.last_audio.rms, self.meter_ceiling),
            eye_violations: self.detector.eye_violations(),
            head_violations: self.detector.head_violations(),
            audio_violations: self.detector.audio_violations(),
        }
    }

    pub fn report(&self) -> SessionReport {
        SessionReport {
            eye_violations: self.detector.eye_violations(),
            head_violations: self.detector.head_violations(),
            audio_violations: self.detector.audio_violations(),
            calibrated: self.calibration.is_calibrated(),
        }
    }

    /// Close the session record with the loop's terminal status.
    pub fn summary(&self, termination: TerminalStatus) -> SessionSummary {
        SessionSummary {
            report: self.report(),
            channels: SessionSummary::channel_summaries(self.detector.enabled(), |channel| {
                self.detector.state(channel)
            }),
            baseline: self.calibration.baseline(),
            ticks: self.tick,
            started_at: self.started_at,
            ended_at: Utc::now(),
            termination,
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn detector(&self) -> &ViolationDetector {
        &self.detector
    }

    pub fn calibration(&self) -> &CalibrationController {
        &self.calibration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::violation::{Channel, ChannelSet};
    use crate::source::types::{
        Point, LEFT_EYE_INNER, LEFT_EYE_OUTER, LEFT_IRIS, NOSE_TIP, REQUIRED_LANDMARKS,
        RIGHT_EYE_INNER, RIGHT_EYE_OUTER, RIGHT_IRIS,
    };
    use std::time::Duration;

    const WIDTH: u32 = 640;
    const HEIGHT: u32 = 480;

    /// A level face centered in the frame, with both irises shifted
    /// horizontally by `iris_dx` eye widths.
    fn face(iris_dx: f64) -> LandmarkFrame {
        let mut points = vec![Point::new(0.5, 0.5); REQUIRED_LANDMARKS];
        // Eye width of 0.1 normalized units on both eyes.
        points[LEFT_EYE_OUTER] = Point::new(0.30, 0.40);
        points[LEFT_EYE_INNER] = Point::new(0.40, 0.40);
        points[RIGHT_EYE_INNER] = Point::new(0.60, 0.40);
        points[RIGHT_EYE_OUTER] = Point::new(0.70, 0.40);
        points[LEFT_IRIS] = Point::new(0.35 + iris_dx * 0.1, 0.40);
        points[RIGHT_IRIS] = Point::new(0.65 + iris_dx * 0.1, 0.40);
        points[NOSE_TIP] = Point::new(0.5, 0.5);
        LandmarkFrame::new(WIDTH, HEIGHT, points)
    }

    fn config(warmup_secs: u64) -> DetectorConfig {
        DetectorConfig {
            warmup: Duration::from_secs(warmup_secs),
            ..DetectorConfig::default()
        }
    }

    fn calibrated_session(start: Instant) -> ProctorSession {
        let mut session = ProctorSession::new(&config(1), 1200.0, start);
        session.begin_tick(start);
        session.process_face(Some(&face(0.0))).unwrap();
        session.begin_tick(start + Duration::from_secs(1));
        let outcome = session.process_face(Some(&face(0.0))).unwrap();
        assert!(matches!(outcome, FaceOutcome::CalibrationFrozen(_)));
        session
    }

    #[test]
    fn test_no_face_leaves_state_untouched() {
        let start = Instant::now();
        let mut session = ProctorSession::new(&config(3), 1200.0, start);
        session.begin_tick(start);

        let result = session.process_face(None);
        assert_eq!(result, Err(TickError::NoFaceDetected));

        let snapshot = session.snapshot();
        assert!(!snapshot.face_detected);
        assert!(snapshot.gaze_offset.is_none());
        assert!(!snapshot.calibrated);
    }

    #[test]
    fn test_degenerate_frame_skips_tick() {
        let start = Instant::now();
        let mut session = calibrated_session(start);
        let before = session.clone();

        let mut collapsed = face(0.0);
        collapsed.points[LEFT_EYE_INNER] = collapsed.points[LEFT_EYE_OUTER];
        session.begin_tick(start + Duration::from_secs(2));
        let result = session.process_face(Some(&collapsed));

        assert!(matches!(result, Err(TickError::DegenerateLandmarks(_))));
        assert_eq!(session.gaze_dx.len(), before.gaze_dx.len());
        assert_eq!(session.report(), before.report());
        assert_eq!(
            session.detector().state(Channel::EyeGaze),
            before.detector().state(Channel::EyeGaze)
        );
    }

    #[test]
    fn test_overflowing_iris_leaves_state_untouched() {
        let start = Instant::now();
        let mut session = ProctorSession::new(&config(1), 1200.0, start);
        session.begin_tick(start);
        session.process_face(Some(&face(0.0))).unwrap();

        // During warm-up the bad frame must not reach the calibration buffers.
        let mut overflowing = face(0.0);
        overflowing.points[LEFT_IRIS].x = 1e308;
        session.begin_tick(start + Duration::from_millis(500));
        assert!(matches!(
            session.process_face(Some(&overflowing)),
            Err(TickError::DegenerateLandmarks(_))
        ));
        assert_eq!(session.gaze_dx.len(), 1);

        session.begin_tick(start + Duration::from_secs(1));
        let outcome = session.process_face(Some(&face(0.0))).unwrap();
        let FaceOutcome::CalibrationFrozen(baseline) = outcome else {
            panic!("expected calibration to freeze, got {outcome:?}");
        };
        assert_eq!(baseline.sample_count, 1);
        assert_eq!(baseline.gaze_center, GazeSample::new(0.0, 0.0));

        // After calibration it must not feed the smoothing window or the streak.
        session.begin_tick(start + Duration::from_millis(1100));
        assert!(session.process_face(Some(&overflowing)).is_err());
        assert!(session.snapshot().gaze_offset.is_none());
        for i in 0..4 {
            session.begin_tick(start + Duration::from_millis(1200 + i * 33));
            session.process_face(Some(&face(0.0))).unwrap();
        }

        assert_eq!(session.detector().state(Channel::EyeGaze).streak, 0);
        let gaze = session.snapshot().gaze_offset.unwrap();
        assert!(gaze.dx.is_finite() && gaze.dx.abs() < 1e-9);
    }

    #[test]
    fn test_snapshot_carries_raw_and_smoothed_gaze() {
        let start = Instant::now();
        let mut session = calibrated_session(start);
        session.begin_tick(start + Duration::from_secs(2));
        session.process_face(Some(&face(0.3))).unwrap();

        let snapshot = session.snapshot();
        let raw = snapshot.raw_gaze_offset.unwrap();
        let smoothed = snapshot.gaze_offset.unwrap();
        assert!((raw.dx - 0.3).abs() < 1e-9);
        // Two centered samples and one at 0.3 in the window.
        assert!((smoothed.dx - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_missing_landmarks_are_degenerate() {
        let start = Instant::now();
        let mut session = ProctorSession::new(&config(3), 1200.0, start);
        session.begin_tick(start);

        let frame = LandmarkFrame::new(WIDTH, HEIGHT, vec![Point::new(0.5, 0.5); 10]);
        assert!(matches!(
            session.process_face(Some(&frame)),
            Err(TickError::DegenerateLandmarks(_))
        ));
    }

    #[test]
    fn test_freezing_tick_does_not_evaluate() {
        let start = Instant::now();
        let mut session = ProctorSession::new(&config(1), 1200.0, start);
        session.begin_tick(start);
        session.process_face(Some(&face(0.0))).unwrap();

        // Far off-baseline sample on the freezing tick itself.
        session.begin_tick(start + Duration::from_secs(1));
        session.process_face(Some(&face(0.5))).unwrap();
        assert_eq!(session.detector().state(Channel::EyeGaze).streak, 0);
        assert!(session.snapshot().calibrated);
    }

    #[test]
    fn test_gaze_evaluated_after_calibration() {
        let start = Instant::now();
        let mut session = calibrated_session(start);

        let mut confirmed_at = None;
        for tick in 1..=20u64 {
            session.begin_tick(start + Duration::from_secs(1) + Duration::from_millis(33 * tick));
            let outcome = session.process_face(Some(&face(0.3))).unwrap();
            if let FaceOutcome::Evaluated(confirmed) = outcome {
                if confirmed.channels().contains(&Channel::EyeGaze) && confirmed_at.is_none() {
                    confirmed_at = Some(tick);
                }
            }
        }

        // The moving average crosses 0.06 on the first tick; ten ticks later
        // the violation is confirmed.
        assert_eq!(confirmed_at, Some(10));
        assert_eq!(session.report().eye_violations, 2);
    }

    #[test]
    fn test_audio_runs_before_calibration() {
        let start = Instant::now();
        let mut session = ProctorSession::new(&config(60), 1200.0, start);

        for i in 0..10 {
            session.begin_tick(start + Duration::from_millis(i * 33));
            session.process_audio(AudioSample { rms: 900.0 });
        }

        let report = session.report();
        assert!(!report.calibrated);
        assert_eq!(report.audio_violations, 1);

        let snapshot = session.snapshot();
        assert_eq!(snapshot.audio_rms, 900.0);
        assert!(snapshot.loudness.level > 0.66);
    }

    #[test]
    fn test_audio_smoothing_policy() {
        let start = Instant::now();
        let mut config = config(3);
        config.smoothing.audio = true;
        config.smoothing.window = 2;
        let mut session = ProctorSession::new(&config, 1200.0, start);

        session.process_audio(AudioSample { rms: 1000.0 });
        session.process_audio(AudioSample::SILENT);
        assert_eq!(session.snapshot().audio_rms, 500.0);
    }

    #[test]
    fn test_disabled_channels_stay_zero() {
        let start = Instant::now();
        let mut config = config(0);
        config.channels = ChannelSet::from_csv("audio");
        config.dwell_frames = 1;
        let mut session = ProctorSession::new(&config, 1200.0, start);

        for i in 0..5 {
            session.begin_tick(start + Duration::from_secs(i));
            let _ = session.process_face(Some(&face(0.5)));
        }
        assert_eq!(session.report().eye_violations, 0);
        assert_eq!(session.report().head_violations, 0);
    }

    #[test]
    fn test_summary_carries_baseline_and_status() {
        let start = Instant::now();
        let session = calibrated_session(start);
        let summary = session.summary(TerminalStatus::Stopped);

        assert_eq!(summary.ticks, 2);
        assert_eq!(summary.termination, TerminalStatus::Stopped);
        assert_eq!(summary.channels.len(), 4);
        let baseline = summary.baseline.unwrap();
        assert!(baseline.gaze_center.dx.abs() < 1e-9);
    }
}
