//! Demonstration of a monitoring session driven by synthetic sources.
//!
//! This example shows how to:
//! 1. Implement the landmark and audio source traits
//! 2. Start a monitor and follow its snapshots through the relay
//! 3. Collect the session summary and build an integrity report
//!
//! The scripted candidate looks at the screen during calibration, then
//! glances away, tilts their head, and finally the room gets loud.
//!
//! Run with: cargo run --example replay_demo

use std::f64::consts::PI;
use std::thread;
use std::time::Duration;

use proctor_sentinel::{
    config::Config,
    core::ReportBuilder,
    monitor::Monitor,
    relay::RelayUpdate,
    source::types::{
        Point, LEFT_EYE_INNER, LEFT_EYE_OUTER, LEFT_IRIS, NOSE_TIP, REQUIRED_LANDMARKS,
        RIGHT_EYE_INNER, RIGHT_EYE_OUTER, RIGHT_IRIS,
    },
    source::{AudioChunk, AudioSource, LandmarkFrame, LandmarkSource, SourceError},
    transparency::create_shared_log,
    MONITORING_NOTICE,
};

const FPS: u64 = 30;
const TOTAL_FRAMES: u64 = FPS * 8;

/// Synthetic candidate, one frame per tick at 30 fps.
struct ScriptedCandidate {
    frame: u64,
}

impl LandmarkSource for ScriptedCandidate {
    fn next_frame(&mut self) -> Result<Option<LandmarkFrame>, SourceError> {
        if self.frame >= TOTAL_FRAMES {
            return Err(SourceError::EndOfStream);
        }
        thread::sleep(Duration::from_millis(1000 / FPS));
        self.frame += 1;

        let secs = self.frame as f64 / FPS as f64;
        let frame = match secs {
            // Calibration: looking at the screen
            s if s < 2.0 => Some(face(0.0, 0.0)),
            // Glancing sideways
            s if s < 3.5 => Some(face(0.4, 0.0)),
            // Out of frame
            s if s < 4.0 => None,
            // Head tilted
            s if s < 6.0 => Some(face(0.0, 0.05)),
            _ => Some(face(0.0, 0.0)),
        };
        Ok(frame)
    }
}

/// Landmarks for a centered face with the irises shifted by `iris_dx` eye
/// widths and the right eye raised by `tilt`.
fn face(iris_dx: f64, tilt: f64) -> LandmarkFrame {
    let mut points = vec![Point::new(0.5, 0.5); REQUIRED_LANDMARKS];
    points[LEFT_EYE_OUTER] = Point::new(0.30, 0.40);
    points[LEFT_EYE_INNER] = Point::new(0.40, 0.40);
    points[RIGHT_EYE_INNER] = Point::new(0.60, 0.40 - tilt);
    points[RIGHT_EYE_OUTER] = Point::new(0.70, 0.40 - tilt);
    points[LEFT_IRIS] = Point::new(0.35 + iris_dx * 0.1, 0.40);
    points[RIGHT_IRIS] = Point::new(0.65 + iris_dx * 0.1, 0.40 - tilt);
    points[NOSE_TIP] = Point::new(0.5, 0.5);
    LandmarkFrame::new(640, 480, points)
}

/// A 440 Hz tone that gets loud for the last two seconds.
struct ScriptedRoom {
    chunk: u64,
    chunk_size: usize,
}

impl AudioSource for ScriptedRoom {
    fn read_chunk(&mut self) -> Result<AudioChunk, SourceError> {
        self.chunk += 1;
        let loud = self.chunk > FPS * 6;
        let amplitude = if loud { 4000.0 } else { 150.0 };

        Ok((0..self.chunk_size)
            .map(|i| {
                let t = i as f64 / 44_100.0;
                (amplitude * (2.0 * PI * 440.0 * t).sin()) as i16
            })
            .collect())
    }
}

fn main() {
    println!("Proctor Sentinel - Replay Demo");
    println!("==============================");
    println!();
    println!("{MONITORING_NOTICE}");

    let mut config = Config::default();
    config.detector.warmup = Duration::from_secs(2);

    let log = create_shared_log();
    let builder = ReportBuilder::new();
    println!("Session ID: {}", builder.session_id());
    println!();

    let mut monitor = Monitor::new(config.clone(), log.clone())
        .with_landmarks(Box::new(ScriptedCandidate { frame: 0 }))
        .with_audio(Box::new(ScriptedRoom {
            chunk: 0,
            chunk_size: config.audio.chunk_size,
        }));

    let mut reader = match monitor.start() {
        Ok(reader) => reader,
        Err(e) => {
            eprintln!("Error starting monitor: {e}");
            return;
        }
    };

    loop {
        match reader.wait(Duration::from_millis(500)) {
            Some(RelayUpdate::Snapshot(s)) if s.tick % FPS == 0 => {
                println!(
                    "  t={}s calibrated={} face={} audio={:.0} ({:?}) | eye {} head {} audio {}",
                    s.tick / FPS,
                    s.calibrated,
                    s.face_detected,
                    s.audio_rms,
                    s.loudness.band,
                    s.eye_violations,
                    s.head_violations,
                    s.audio_violations
                );
            }
            Some(RelayUpdate::Terminated(status)) => {
                println!();
                println!("Monitoring ended: {status}");
                break;
            }
            _ => {}
        }
    }

    let Some(summary) = monitor.wait() else {
        eprintln!("Monitor ended without a summary");
        return;
    };

    let report = builder.build(&summary, Some(log.stats()));
    println!();
    println!("=== Integrity Report ===");
    for flag in &report.monitoring_flags {
        println!("  {flag}");
    }
    println!();
    println!("{}", log.summary());
}
